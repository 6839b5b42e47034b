//! Reading files with several record shapes: per-fragment quotas, early stop, rebinding.

use proptest::prelude::*;
use recordlayout::{CodecError, DataFile, LayoutError, RecordReader, Settings, Value};
use std::sync::Arc;

fn settings() -> Arc<Settings> {
    Arc::new(Settings::default())
}

fn fixed_file(path: &str) -> DataFile {
    let mut file = DataFile::fixed_length(path, settings()).expect("file");
    file.set_directive("record-separator", "LF").expect("directive");
    file
}

fn add_header(file: &mut DataFile) {
    file.new_fragment()
        .set_record_type("header")
        .set_names(&["kind", "date"])
        .expect("names")
        .set_types(&["半角", "半角"])
        .expect("types")
        .set_lengths(&["1", "8"])
        .expect("lengths")
        .add_row(&["H", "20261016"]);
}

fn add_data(file: &mut DataFile, rows: &[[&str; 3]]) {
    let mut fragment = file.new_fragment();
    fragment
        .set_record_type("data")
        .set_names(&["kind", "id", "name"])
        .expect("names")
        .set_types(&["半角", "半角", "半角"])
        .expect("types")
        .set_lengths(&["1", "4", "4"])
        .expect("lengths");
    for row in rows {
        fragment.add_row(row);
    }
}

fn add_trailer(file: &mut DataFile) {
    file.new_fragment()
        .set_record_type("trailer")
        .set_names(&["kind", "count"])
        .expect("names")
        .set_types(&["半角", "符号無ゾーン10進数"])
        .expect("types")
        .set_lengths(&["1", "8"])
        .expect("lengths")
        .add_row(&["T", "3"]);
}

#[test]
fn test_three_shapes_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shapes.dat").display().to_string();
    let mut file = fixed_file(&path);
    add_header(&mut file);
    add_data(&mut file, &[["D", "0001", "abcd"], ["D", "0002", "ef"], ["D", "0003", "ghij"]]);
    add_trailer(&mut file);
    file.write().expect("write");

    let text = std::fs::read_to_string(&path).expect("read file");
    assert_eq!(text, "H20261016\nD0001abcd\nD0002ef  \nD0003ghij\nT00000003\n");

    let records = file.read().expect("read");
    let types: Vec<&str> = records.iter().map(|r| r.record_type.as_str()).collect();
    assert_eq!(types, ["header", "data", "data", "data", "trailer"]);
    assert_eq!(records[2].get("name"), Some(&Value::text("ef")));
    assert_eq!(records[4].get("count"), Some(&Value::Number(3)));
    assert_eq!(records, file.expected_records().expect("expected"));
}

#[test]
fn test_fragment_without_records_stops_the_read() {
    let mut file = fixed_file("unused.dat");
    add_header(&mut file);
    add_data(&mut file, &[["D", "0001", "abcd"], ["D", "0002", "efgh"]]);
    add_trailer(&mut file);

    let input = b"H20261016\n";
    let records = file.read_from(&input[..]).expect("read");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_type, "header");
}

#[test]
fn test_last_fragment_reads_to_end() {
    let mut file = fixed_file("unused.dat");
    add_header(&mut file);
    add_data(&mut file, &[["D", "0001", "abcd"]]);

    let input = b"H20261016\nD0001abcd\nD0002efgh\nD0003ijkl\n";
    let records = file.read_from(&input[..]).expect("read");
    assert_eq!(records.len(), 4);
    assert!(records[1..].iter().all(|r| r.record_type == "data"));
    assert_eq!(records[3].get("id"), Some(&Value::text("0003")));
}

#[test]
fn test_middle_fragment_without_rows_is_skipped() {
    let mut file = fixed_file("unused.dat");
    add_header(&mut file);
    file.new_fragment()
        .set_record_type("note")
        .set_names(&["kind", "text"])
        .expect("names")
        .set_types(&["半角", "半角"])
        .expect("types")
        .set_lengths(&["1", "8"])
        .expect("lengths");
    add_data(&mut file, &[["D", "0001", "abcd"]]);

    let input = b"H20261016\nD0001abcd\nD0002efgh\n";
    let records = file.read_from(&input[..]).expect("read");
    let types: Vec<&str> = records.iter().map(|r| r.record_type.as_str()).collect();
    assert_eq!(types, ["header", "data", "data"]);
}

#[test]
fn test_truncated_record_is_invalid() {
    let mut file = fixed_file("unused.dat");
    add_header(&mut file);
    add_data(&mut file, &[["D", "0001", "abcd"]]);

    let input = b"H20261016\nD0001";
    let err = file.read_from(&input[..]).expect_err("truncated");
    assert!(
        matches!(err, LayoutError::Codec(CodecError::InvalidData(_))),
        "{:?}",
        err
    );
}

#[test]
fn test_wrong_separator_is_invalid() {
    let mut file = fixed_file("unused.dat");
    add_header(&mut file);
    let err = file.read_from(&b"H20261016;"[..]).expect_err("separator");
    assert!(err.to_string().contains("invalid record separator"), "{}", err);
}

fn variable_file() -> DataFile {
    let mut file = DataFile::variable_length("unused.csv", settings()).expect("file");
    file.set_directive("record-separator", "LF").expect("directive");
    file.new_fragment()
        .set_record_type("head")
        .set_names(&["kind", "count"])
        .expect("names")
        .set_types(&["半角", "半角"])
        .expect("types")
        .add_row(&["h", "2"]);
    file.new_fragment()
        .set_record_type("detail")
        .set_names(&["kind", "a", "b"])
        .expect("names")
        .set_types(&["半角", "半角", "半角"])
        .expect("types")
        .add_row(&["d", "x", "y"]);
    file
}

#[test]
fn test_variable_shapes_switch_between_fragments() {
    let file = variable_file();
    let input = "h,2\n\nd,x,y\nd,\"p,q\",z\n";
    let records = file.read_from(input.as_bytes()).expect("read");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].record_type, "head");
    assert_eq!(records[0].get("count"), Some(&Value::text("2")));
    assert_eq!(records[2].record_type, "detail");
    assert_eq!(records[2].get("a"), Some(&Value::text("p,q")));
}

#[test]
fn test_variable_field_count_mismatch() {
    let file = variable_file();
    let err = file.read_from("h,2,extra\n".as_bytes()).expect_err("field count");
    assert!(err.to_string().contains("number of fields did not match"), "{}", err);
}

#[test]
fn test_reader_rebind_keeps_position() {
    let file = variable_file();
    let input = "h,2\nd,x,y\n";
    let mut reader =
        RecordReader::new(input.as_bytes(), file.single_fragment_layout(0).expect("layout")).expect("reader");
    let head = reader.read_record().expect("read").expect("record");
    assert_eq!(head.record_type, "head");

    reader.rebind(file.single_fragment_layout(1).expect("layout")).expect("rebind");
    assert_eq!(reader.layout().records[0].type_name, "detail");
    let detail = reader.read_record().expect("read").expect("record");
    assert_eq!(detail.get("b"), Some(&Value::text("y")));
    assert!(reader.read_record().expect("read").is_none());
}

fn inferred_width(values: &[String]) -> usize {
    let mut file = DataFile::fixed_length("prop.dat", settings()).expect("file");
    let mut fragment = file.new_fragment();
    fragment
        .set_names(&["v"])
        .expect("names")
        .set_types(&["半角"])
        .expect("types")
        .set_lengths(&["-"])
        .expect("lengths");
    for v in values {
        fragment.add_row(&[v.as_str()]);
    }
    fragment.length_of("v").expect("width")
}

proptest! {
    #[test]
    fn prop_auto_width_ignores_row_order(values in proptest::collection::vec("[a-zあ-ん]{0,6}", 1..8)) {
        let forward = inferred_width(&values);
        let mut reversed = values.clone();
        reversed.reverse();
        prop_assert_eq!(forward, inferred_width(&reversed));
        let longest = values.iter().map(|v| v.len()).max().unwrap_or(0);
        prop_assert_eq!(forward, longest);
    }
}
