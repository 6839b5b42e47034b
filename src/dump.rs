//! Format records for display (dump text, one-line summaries).

use crate::value::{DataRecord, Value};

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Raw value string: text quoted, numbers as is, bytes as hex.
pub fn format_value(v: &Value) -> String {
    match v {
        Value::Text(s) => format!("{:?}", s),
        Value::Number(n) => format!("{}", n),
        Value::Bytes(b) => format!("hex({})", hex_string(b)),
    }
}

/// Multi-line dump of one record.
pub fn record_to_dump(record: &DataRecord, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    let header = match &record.row_number {
        Some(no) => format!("{}{} #{} {{", pad, record.record_type, no),
        None => format!("{}{} {{", pad, record.record_type),
    };
    let mut lines = vec![header];
    for (name, value) in &record.values {
        lines.push(format!("{}  {}: {}", pad, name, format_value(value)));
    }
    lines.push(format!("{}}}", pad));
    lines.join("\n")
}

/// One-line summary of a record (for listings).
pub fn record_summary_line(record: &DataRecord) -> String {
    let fields: Vec<String> = record
        .values
        .iter()
        .map(|(k, v)| format!("{}={}", k, format_value(v)))
        .collect();
    format!("{}{{{}}}", record.record_type, fields.join(", "))
}

/// Dump of a record list, one block per record, numbered from 1.
pub fn records_to_dump(records: &[DataRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}", i + 1, record_to_dump(r, 0).trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
