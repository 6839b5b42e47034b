//! Record formatter: writes records of a layout to a byte stream and reads them back.
//!
//! Fixed-length records are `record-length` bytes followed by the record separator.
//! Variable-length records are delimited text; a field is quoted when it contains the
//! field separator, the quoting delimiter or a line break.

use crate::codec::{decode_text, encode_text, CodecError};
use crate::definition::{Directive, LayoutDefinition, RecordDefinition};
use crate::file::{FIXED_FILE_TYPE, VARIABLE_FILE_TYPE};
use crate::value::{DataRecord, Value};
use encoding_rs::Encoding;
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::rc::Rc;

const DEFAULT_QUOTE: char = '"';

#[derive(Debug, Clone, PartialEq)]
enum RecordFormat {
    Fixed {
        record_length: usize,
        separator: Vec<u8>,
    },
    Variable {
        encoding: &'static Encoding,
        field_separator: char,
        quote: char,
        record_separator: String,
        ignore_blank_lines: bool,
    },
}

impl RecordFormat {
    fn from_layout(layout: &LayoutDefinition) -> Result<Self, CodecError> {
        let d = &layout.directives;
        let encoding = d.effective_encoding();
        match d.text(Directive::FileType) {
            Some(FIXED_FILE_TYPE) => {
                let record_length = d
                    .int(Directive::RecordLength)
                    .ok_or_else(|| required(Directive::RecordLength))?;
                let separator = encode_text(encoding, d.text(Directive::RecordSeparator).unwrap_or(""));
                Ok(RecordFormat::Fixed {
                    record_length,
                    separator,
                })
            }
            Some(VARIABLE_FILE_TYPE) => {
                let field_separator = single_char(d.text(Directive::FieldSeparator), Directive::FieldSeparator)?
                    .ok_or_else(|| required(Directive::FieldSeparator))?;
                let quote = single_char(d.text(Directive::QuotingDelimiter), Directive::QuotingDelimiter)?
                    .unwrap_or(DEFAULT_QUOTE);
                if encode_text(encoding, &quote.to_string()).len() != 1 {
                    return Err(CodecError::InvalidData(format!(
                        "quoting-delimiter [{}] must be a single byte in {}",
                        quote,
                        encoding.name()
                    )));
                }
                let record_separator = d
                    .text(Directive::RecordSeparator)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| required(Directive::RecordSeparator))?
                    .to_string();
                Ok(RecordFormat::Variable {
                    encoding,
                    field_separator,
                    quote,
                    record_separator,
                    ignore_blank_lines: d.bool(Directive::IgnoreBlankLines).unwrap_or(true),
                })
            }
            other => Err(CodecError::InvalidData(format!(
                "unsupported file-type [{}]",
                other.unwrap_or("")
            ))),
        }
    }
}

fn required(directive: Directive) -> CodecError {
    CodecError::InvalidData(format!("directive '{}' is required", directive))
}

fn single_char(value: Option<&str>, directive: Directive) -> Result<Option<char>, CodecError> {
    let Some(s) = value else {
        return Ok(None);
    };
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Some(c)),
        _ => Err(CodecError::InvalidData(format!(
            "directive '{}' must be a single character: [{}]",
            directive, s
        ))),
    }
}

/// Resolve every field codec of the layout up front.
fn bind(layout: &LayoutDefinition, format: &RecordFormat) -> Result<(), CodecError> {
    for record in &layout.records {
        if let RecordFormat::Fixed { record_length, .. } = format {
            if record.record_length() != *record_length {
                return Err(CodecError::InvalidData(format!(
                    "record type [{}] is {} bytes long but record-length is {}",
                    record.type_name,
                    record.record_length(),
                    record_length
                )));
            }
        }
        for field in &record.fields {
            field.data_type()?;
        }
    }
    Ok(())
}

fn field_error(name: &str, e: CodecError) -> CodecError {
    match e {
        CodecError::InvalidData(msg) => CodecError::InvalidData(format!("field {}: {}", name, msg)),
        other => other,
    }
}

pub struct RecordWriter<W: Write> {
    out: W,
    layout: LayoutDefinition,
    format: RecordFormat,
}

impl RecordWriter<BufWriter<File>> {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path, layout: LayoutDefinition) -> Result<Self, CodecError> {
        let file = File::create(path)?;
        RecordWriter::new(BufWriter::new(file), layout)
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W, layout: LayoutDefinition) -> Result<Self, CodecError> {
        let format = RecordFormat::from_layout(&layout)?;
        bind(&layout, &format)?;
        Ok(RecordWriter { out, layout, format })
    }

    /// Write one record of type `record_type`. Missing values are written as empty text.
    pub fn write(&mut self, record_type: &str, values: &BTreeMap<String, Value>) -> Result<(), CodecError> {
        let record = self.layout.record(record_type).ok_or_else(|| {
            CodecError::InvalidData(format!("record type [{}] is not defined in the layout", record_type))
        })?;
        let empty = Value::text("");
        let bytes = match &self.format {
            RecordFormat::Fixed {
                record_length,
                separator,
            } => {
                let mut buf = Vec::with_capacity(record_length + separator.len());
                for field in &record.fields {
                    let value = values.get(&field.name).unwrap_or(&empty);
                    let encoded = field
                        .data_type()?
                        .encode(value)
                        .map_err(|e| field_error(&field.name, e))?;
                    buf.extend_from_slice(&encoded);
                }
                if buf.len() != *record_length {
                    return Err(CodecError::InvalidData(format!(
                        "invalid record length. record type=[{}], expected length=[{}], actual length=[{}]",
                        record_type,
                        record_length,
                        buf.len()
                    )));
                }
                buf.extend_from_slice(separator);
                buf
            }
            RecordFormat::Variable {
                encoding,
                field_separator,
                quote,
                record_separator,
                ..
            } => {
                let mut line = String::new();
                for (i, field) in record.fields.iter().enumerate() {
                    if i > 0 {
                        line.push(*field_separator);
                    }
                    let value = values.get(&field.name).unwrap_or(&empty);
                    let text = field
                        .data_type()?
                        .to_text(value)
                        .map_err(|e| field_error(&field.name, e))?;
                    push_quoted(&mut line, &text, *field_separator, *quote, record_separator);
                }
                line.push_str(record_separator);
                encode_text(*encoding, &line)
            }
        };
        self.out.write_all(&bytes)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), CodecError> {
        self.out.flush()?;
        Ok(())
    }
}

fn push_quoted(line: &mut String, text: &str, field_separator: char, quote: char, record_separator: &str) {
    let needs_quote = text
        .chars()
        .any(|c| c == field_separator || c == quote || c == '\r' || c == '\n' || record_separator.contains(c));
    if !needs_quote {
        line.push_str(text);
        return;
    }
    line.push(quote);
    for c in text.chars() {
        if c == quote {
            line.push(quote);
        }
        line.push(c);
    }
    line.push(quote);
}

/// Reads records through a single-record layout that can be swapped between reads.
pub struct RecordReader<R: Read> {
    input: BufReader<R>,
    layout: LayoutDefinition,
    format: RecordFormat,
}

impl<R: Read> RecordReader<R> {
    pub fn new(input: R, layout: LayoutDefinition) -> Result<Self, CodecError> {
        let format = RecordFormat::from_layout(&layout)?;
        bind(&layout, &format)?;
        Ok(RecordReader {
            input: BufReader::new(input),
            layout,
            format,
        })
    }

    /// Switch to another layout; the stream position is kept.
    pub fn rebind(&mut self, layout: LayoutDefinition) -> Result<(), CodecError> {
        let format = RecordFormat::from_layout(&layout)?;
        bind(&layout, &format)?;
        debug!(
            "reader rebound. record type=[{}]",
            layout.records.first().map(|r| r.type_name.as_str()).unwrap_or("")
        );
        self.layout = layout;
        self.format = format;
        Ok(())
    }

    pub fn layout(&self) -> &LayoutDefinition {
        &self.layout
    }

    /// Next record, or `None` at the end of the stream.
    pub fn read_record(&mut self) -> Result<Option<DataRecord>, CodecError> {
        let record = Rc::clone(self.layout.records.first().ok_or_else(|| {
            CodecError::InvalidData("layout has no record definition".to_string())
        })?);
        let result = match self.format.clone() {
            RecordFormat::Fixed {
                record_length,
                separator,
            } => self.read_fixed(&record, record_length, &separator)?,
            RecordFormat::Variable {
                encoding,
                field_separator,
                quote,
                record_separator,
                ignore_blank_lines,
            } => {
                let sep = encode_text(encoding, &record_separator);
                let quote_byte = encode_text(encoding, &quote.to_string());
                loop {
                    let Some(bytes) = self.read_delimited(quote_byte[0], &sep)? else {
                        break None;
                    };
                    let line = decode_text(encoding, &bytes)?;
                    if ignore_blank_lines && line.is_empty() {
                        continue;
                    }
                    break Some(self.parse_variable(&record, &line, field_separator, quote)?);
                }
            }
        };
        if let Some(r) = &result {
            trace!("read record. type=[{}] fields={}", r.record_type, r.len());
        }
        Ok(result)
    }

    fn read_fixed(
        &mut self,
        record: &RecordDefinition,
        record_length: usize,
        separator: &[u8],
    ) -> Result<Option<DataRecord>, CodecError> {
        let mut buf = vec![0u8; record_length];
        let n = read_full(&mut self.input, &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        if n < record_length {
            return Err(CodecError::InvalidData(format!(
                "invalid data record found. the length of the record is invalid. expected length=[{}], actual length=[{}]",
                record_length, n
            )));
        }
        if !separator.is_empty() {
            let mut sep = vec![0u8; separator.len()];
            let m = read_full(&mut self.input, &mut sep)?;
            if sep[..m] != *separator {
                return Err(CodecError::InvalidData(format!(
                    "invalid record separator. expected={:02X?}, actual={:02X?}",
                    separator,
                    &sep[..m]
                )));
            }
        }
        let mut out = DataRecord::new(record.type_name.clone());
        for field in &record.fields {
            let start = field.position.saturating_sub(1);
            let end = start + field.size.unwrap_or(0);
            let bytes = buf.get(start..end).ok_or_else(|| {
                CodecError::InvalidData(format!(
                    "field {} exceeds the record. position={}, record length={}",
                    field.name, field.position, record_length
                ))
            })?;
            let value = field
                .data_type()?
                .decode(bytes)
                .map_err(|e| field_error(&field.name, e))?;
            out.insert(field.name.clone(), value);
        }
        Ok(Some(out))
    }

    /// Bytes up to the next record separator that is not inside quotes.
    fn read_delimited(&mut self, quote: u8, separator: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
        let mut buf = Vec::new();
        let mut in_quotes = false;
        let mut byte = [0u8; 1];
        loop {
            if read_full(&mut self.input, &mut byte)? == 0 {
                return Ok(if buf.is_empty() { None } else { Some(buf) });
            }
            buf.push(byte[0]);
            if byte[0] == quote {
                in_quotes = !in_quotes;
            }
            if !in_quotes && buf.ends_with(separator) {
                buf.truncate(buf.len() - separator.len());
                return Ok(Some(buf));
            }
        }
    }

    fn parse_variable(
        &self,
        record: &RecordDefinition,
        line: &str,
        field_separator: char,
        quote: char,
    ) -> Result<DataRecord, CodecError> {
        let texts = split_fields(line, field_separator, quote)?;
        if texts.len() != record.fields.len() {
            return Err(CodecError::InvalidData(format!(
                "number of fields did not match. record type=[{}], expected=[{}], actual=[{}]",
                record.type_name,
                record.fields.len(),
                texts.len()
            )));
        }
        let mut out = DataRecord::new(record.type_name.clone());
        for (field, text) in record.fields.iter().zip(texts) {
            let value = field
                .data_type()?
                .from_text(&text)
                .map_err(|e| field_error(&field.name, e))?;
            out.insert(field.name.clone(), value);
        }
        Ok(out)
    }
}

fn split_fields(line: &str, field_separator: char, quote: char) -> Result<Vec<String>, CodecError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_start = true;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == quote {
                if chars.peek() == Some(&quote) {
                    chars.next();
                    current.push(quote);
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }
        if c == quote && field_start {
            in_quotes = true;
            field_start = false;
        } else if c == field_separator {
            fields.push(std::mem::take(&mut current));
            field_start = true;
        } else {
            current.push(c);
            field_start = false;
        }
    }
    if in_quotes {
        return Err(CodecError::InvalidData(format!("unclosed quotation in record [{}]", line)));
    }
    fields.push(current);
    Ok(fields)
}

fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
