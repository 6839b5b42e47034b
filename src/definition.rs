//! Layout descriptors handed to the record formatter: directives, record and field definitions.

use crate::codec::{CodecError, CodecTable, DataType};
use encoding_rs::{Encoding, UTF_8};
use once_cell::unsync::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// File-scoped configuration names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Directive {
    FileType,
    TextEncoding,
    RecordLength,
    RecordSeparator,
    FieldSeparator,
    QuotingDelimiter,
    IgnoreBlankLines,
}

impl Directive {
    pub fn name(self) -> &'static str {
        match self {
            Directive::FileType => "file-type",
            Directive::TextEncoding => "text-encoding",
            Directive::RecordLength => "record-length",
            Directive::RecordSeparator => "record-separator",
            Directive::FieldSeparator => "field-separator",
            Directive::QuotingDelimiter => "quoting-delimiter",
            Directive::IgnoreBlankLines => "ignore-blank-lines",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A directive value, already converted from its sheet form.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveValue {
    Text(String),
    Int(usize),
    Bool(bool),
    Encoding(&'static Encoding),
}

impl fmt::Display for DirectiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveValue::Text(s) => write!(f, "{:?}", s),
            DirectiveValue::Int(n) => write!(f, "{}", n),
            DirectiveValue::Bool(b) => write!(f, "{}", b),
            DirectiveValue::Encoding(e) => f.write_str(e.name()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    values: BTreeMap<Directive, DirectiveValue>,
}

impl Directives {
    pub fn insert(&mut self, directive: Directive, value: DirectiveValue) {
        self.values.insert(directive, value);
    }

    pub fn get(&self, directive: Directive) -> Option<&DirectiveValue> {
        self.values.get(&directive)
    }

    pub fn text(&self, directive: Directive) -> Option<&str> {
        match self.get(directive) {
            Some(DirectiveValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, directive: Directive) -> Option<usize> {
        match self.get(directive) {
            Some(DirectiveValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn bool(&self, directive: Directive) -> Option<bool> {
        match self.get(directive) {
            Some(DirectiveValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Configured `text-encoding`, if any.
    pub fn encoding(&self) -> Option<&'static Encoding> {
        match self.get(Directive::TextEncoding) {
            Some(DirectiveValue::Encoding(e)) => Some(*e),
            _ => None,
        }
    }

    /// Encoding used for byte accounting and codecs; UTF-8 when none is configured.
    pub fn effective_encoding(&self) -> &'static Encoding {
        self.encoding().unwrap_or(UTF_8)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Directive, &DirectiveValue)> {
        self.values.iter()
    }
}

/// One field of a record shape.
#[derive(Debug)]
pub struct FieldDefinition {
    pub name: String,
    /// 1-based byte offset (fixed-length) or field ordinal (variable-length).
    pub position: usize,
    pub encoding: &'static Encoding,
    /// Symbol used to read the field back (the test variant when one is registered).
    pub type_symbol: String,
    /// Field width in bytes; `None` for delimited fields.
    pub size: Option<usize>,
    codecs: &'static CodecTable,
    data_type: OnceCell<DataType>,
}

impl FieldDefinition {
    pub fn new(
        name: impl Into<String>,
        position: usize,
        encoding: &'static Encoding,
        type_symbol: impl Into<String>,
        size: Option<usize>,
        codecs: &'static CodecTable,
    ) -> Self {
        FieldDefinition {
            name: name.into(),
            position,
            encoding,
            type_symbol: type_symbol.into(),
            size,
            codecs,
            data_type: OnceCell::new(),
        }
    }

    /// Codec of this field, resolved on first use and kept afterwards.
    pub fn data_type(&self) -> Result<&DataType, CodecError> {
        self.data_type
            .get_or_try_init(|| self.codecs.type_of(&self.type_symbol, self.size, self.encoding))
    }
}

/// Ordered fields of one record type.
#[derive(Debug, Default)]
pub struct RecordDefinition {
    pub type_name: String,
    pub fields: Vec<FieldDefinition>,
}

impl RecordDefinition {
    pub fn new(type_name: impl Into<String>) -> Self {
        RecordDefinition {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn add_field(&mut self, field: FieldDefinition) {
        self.fields.push(field);
    }

    /// Sum of fixed field widths.
    pub fn record_length(&self) -> usize {
        self.fields.iter().filter_map(|f| f.size).sum()
    }
}

/// Directives plus the record definitions in declaration order.
#[derive(Debug, Clone, Default)]
pub struct LayoutDefinition {
    pub directives: Directives,
    pub records: Vec<Rc<RecordDefinition>>,
}

impl LayoutDefinition {
    pub fn new(directives: Directives) -> Self {
        LayoutDefinition {
            directives,
            records: Vec::new(),
        }
    }

    pub fn add_record(&mut self, record: Rc<RecordDefinition>) {
        self.records.push(record);
    }

    pub fn record(&self, type_name: &str) -> Option<&Rc<RecordDefinition>> {
        self.records.iter().find(|r| r.type_name == type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_codec_is_memoized() {
        let field = FieldDefinition::new("amount", 1, UTF_8, "Z", Some(5), CodecTable::fixed_length());
        let first = field.data_type().expect("resolve") as *const DataType;
        let second = field.data_type().expect("resolve") as *const DataType;
        assert_eq!(first, second);
    }

    #[test]
    fn effective_encoding_defaults_to_utf8() {
        let mut d = Directives::default();
        assert!(d.encoding().is_none());
        assert_eq!(d.effective_encoding(), UTF_8);
        d.insert(Directive::TextEncoding, DirectiveValue::Encoding(encoding_rs::SHIFT_JIS));
        assert_eq!(d.effective_encoding().name(), "Shift_JIS");
    }
}
