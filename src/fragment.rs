//! One record shape of a data file together with the rows declared against it.

use crate::codec::{convert_to_bytes, encode_text, CodecTable};
use crate::definition::{FieldDefinition, RecordDefinition};
use crate::error::LayoutError;
use crate::file::FileContext;
use crate::mapping::DataTypeMapping;
use crate::value::{DataRecord, Value};
use encoding_rs::Encoding;
use once_cell::unsync::OnceCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Width token asking for the width to be inferred from the rows.
pub const AUTO_WIDTH: &str = "-";

/// Concrete shape of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentShape {
    Fixed,
    Variable,
    /// Fixed-length record standing for one mock outbound message.
    MockMessage,
}

impl FragmentShape {
    pub fn is_fixed(self) -> bool {
        matches!(self, FragmentShape::Fixed | FragmentShape::MockMessage)
    }

    pub fn codecs(self) -> &'static CodecTable {
        if self.is_fixed() {
            CodecTable::fixed_length()
        } else {
            CodecTable::variable_length()
        }
    }

    fn label(self) -> &'static str {
        match self {
            FragmentShape::Fixed => "FixedLengthFileFragment",
            FragmentShape::Variable => "VariableLengthFileFragment",
            FragmentShape::MockMessage => "MockMessage",
        }
    }
}

/// Error injection requested by a mock message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    Timeout,
    MessageException,
}

impl ErrorMode {
    pub const TIMEOUT: &'static str = "errorMode:timeout";
    pub const MESSAGE_EXCEPTION: &'static str = "errorMode:msgException";

    pub fn from_cell(cell: &str) -> Option<Self> {
        match cell {
            Self::TIMEOUT => Some(ErrorMode::Timeout),
            Self::MESSAGE_EXCEPTION => Some(ErrorMode::MessageException),
            _ => None,
        }
    }

    pub fn value(self) -> &'static str {
        match self {
            ErrorMode::Timeout => Self::TIMEOUT,
            ErrorMode::MessageException => Self::MESSAGE_EXCEPTION,
        }
    }
}

/// One declared row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub number: Option<String>,
    pub values: BTreeMap<String, String>,
    pub error_mode: Option<ErrorMode>,
}

#[derive(Debug)]
pub struct DataFileFragment {
    shape: FragmentShape,
    record_type: String,
    names: Vec<String>,
    types: Vec<String>,
    lengths: Vec<String>,
    auto_width: Vec<bool>,
    rows: Vec<Row>,
    definition: OnceCell<Rc<RecordDefinition>>,
}

impl DataFileFragment {
    pub fn new(shape: FragmentShape) -> Self {
        DataFileFragment {
            shape,
            record_type: String::new(),
            names: Vec::new(),
            types: Vec::new(),
            lengths: Vec::new(),
            auto_width: Vec::new(),
            rows: Vec::new(),
            definition: OnceCell::new(),
        }
    }

    pub fn shape(&self) -> FragmentShape {
        self.shape
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolved type symbols.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn lengths(&self) -> &[String] {
        &self.lengths
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows that become physical records (mock message error rows do not).
    pub fn number_of_records(&self) -> usize {
        self.rows.iter().filter(|r| r.error_mode.is_none()).count()
    }

    pub fn set_record_type(&mut self, record_type: impl Into<String>) {
        self.record_type = record_type.into();
        self.definition = OnceCell::new();
    }

    pub fn set_names(&mut self, context: &FileContext, names: Vec<String>) -> Result<(), LayoutError> {
        if names.is_empty() {
            return Err(LayoutError::Config("names must not be null or empty.".to_string()));
        }
        let duplicates = duplicate_names(&names);
        if !duplicates.is_empty() {
            return Err(LayoutError::Config(format!(
                "Duplicate field names are not permitted in a record. duplicate field=[{}] . file=[{}]",
                duplicates.join(", "),
                context.path()
            )));
        }
        self.names = names;
        self.definition = OnceCell::new();
        Ok(())
    }

    /// Set design-notation labels; each is resolved to a type symbol right away.
    pub fn set_types(&mut self, context: &FileContext, labels: Vec<String>) -> Result<(), LayoutError> {
        self.assert_same_size_as_names(&labels, "types")?;
        let mapping = context
            .settings()
            .data_type_mapping(context.directives().encoding());
        self.types = labels
            .iter()
            .map(|label| mapping.resolve(label))
            .collect::<Result<Vec<_>, _>>()?;
        self.definition = OnceCell::new();
        Ok(())
    }

    /// Set width tokens: a byte count or [`AUTO_WIDTH`].
    pub fn set_lengths(&mut self, lengths: Vec<String>) -> Result<(), LayoutError> {
        self.assert_same_size_as_names(&lengths, "lengths")?;
        self.auto_width = lengths.iter().map(|l| l == AUTO_WIDTH).collect();
        self.lengths = lengths;
        self.definition = OnceCell::new();
        Ok(())
    }

    pub fn add_row(&mut self, context: &FileContext, cells: &[String]) {
        let row = self.build_row(context, None, cells);
        self.rows.push(row);
    }

    /// Add a row carrying its row number. For mock messages, an error-mode sentinel in
    /// the first cell turns the row into an error injection row.
    pub fn add_row_with_id(&mut self, context: &FileContext, id: &str, cells: &[String]) {
        if self.shape == FragmentShape::MockMessage {
            if let Some(mode) = cells.first().and_then(|c| ErrorMode::from_cell(c)) {
                let mut values = BTreeMap::new();
                if let Some(first) = self.names.first() {
                    values.insert(first.clone(), mode.value().to_string());
                }
                self.rows.push(Row {
                    number: Some(id.to_string()),
                    values,
                    error_mode: Some(mode),
                });
                return;
            }
        }
        let row = self.build_row(context, Some(id.to_string()), cells);
        self.rows.push(row);
    }

    fn build_row(&mut self, context: &FileContext, number: Option<String>, cells: &[String]) -> Row {
        let encoding = context.directives().effective_encoding();
        let mut values = BTreeMap::new();
        for i in 0..self.names.len() {
            let mut value = cells.get(i).cloned().unwrap_or_default();
            if self.auto_width.get(i).copied().unwrap_or(false) {
                value = remove_line_breaks(&value);
                self.widen(i, &value, encoding);
            }
            values.insert(self.names[i].clone(), value);
        }
        Row {
            number,
            values,
            error_mode: None,
        }
    }

    /// Grow an inferred width to the encoded length of `data`; widths never shrink.
    fn widen(&mut self, index: usize, data: &str, encoding: &'static Encoding) {
        let current = encode_text(encoding, data).len();
        let recorded = self.lengths[index].parse::<usize>().unwrap_or(0);
        if recorded > current {
            return;
        }
        self.lengths[index] = current.to_string();
        self.definition = OnceCell::new();
    }

    fn width_at(&self, index: usize) -> Result<usize, LayoutError> {
        let token = self.lengths.get(index).ok_or_else(|| {
            LayoutError::State(format!("invalid data. no field length at {}. {}", index, self))
        })?;
        token.parse::<usize>().map_err(|_| {
            LayoutError::State(format!(
                "invalid data. field length [{}] of field [{}] is not a number. {}",
                token,
                self.names.get(index).map(String::as_str).unwrap_or(""),
                self
            ))
        })
    }

    pub fn index_of(&self, name: &str) -> Result<usize, LayoutError> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| LayoutError::Config(format!("no such field [{}]. {}", name, self)))
    }

    /// Current width of a fixed-length field.
    pub fn length_of(&self, name: &str) -> Result<usize, LayoutError> {
        self.width_at(self.index_of(name)?)
    }

    /// Sum of the field widths.
    pub fn record_length(&self) -> Result<usize, LayoutError> {
        (0..self.lengths.len()).map(|i| self.width_at(i)).sum()
    }

    /// Record definition of this fragment, built once all rows are known.
    pub fn record_definition(&self, context: &FileContext) -> Result<Rc<RecordDefinition>, LayoutError> {
        self.definition
            .get_or_try_init(|| self.build_definition(context).map(Rc::new))
            .map(Rc::clone)
    }

    fn build_definition(&self, context: &FileContext) -> Result<RecordDefinition, LayoutError> {
        self.check_size()?;
        let codecs = self.shape.codecs();
        let encoding = context.directives().effective_encoding();
        let mut record = RecordDefinition::new(self.record_type.clone());
        let mut byte_position = 1;
        for (i, name) in self.names.iter().enumerate() {
            let symbol = codecs.test_symbol_for(&self.types[i]);
            let field = if self.shape.is_fixed() {
                let width = self.width_at(i)?;
                let field = FieldDefinition::new(name.clone(), byte_position, encoding, symbol, Some(width), codecs);
                byte_position += width;
                field
            } else {
                FieldDefinition::new(name.clone(), i + 1, encoding, symbol, None, codecs)
            };
            record.add_field(field);
        }
        Ok(record)
    }

    fn check_size(&self) -> Result<(), LayoutError> {
        let names = self.names.len();
        let lengths_ok = !self.shape.is_fixed() || self.lengths.len() == names;
        if names == 0 || self.types.len() != names || !lengths_ok {
            return Err(LayoutError::Config(format!(
                "invalid data. field name size is {}, types size is {}, lengths size is {}. {}",
                names,
                self.types.len(),
                self.lengths.len(),
                self
            )));
        }
        Ok(())
    }

    fn assert_same_size_as_names(&self, list: &[String], what: &str) -> Result<(), LayoutError> {
        if list.is_empty() {
            return Err(LayoutError::Config(format!("{} must not be null or empty.", what)));
        }
        if list.len() != self.names.len() {
            return Err(LayoutError::Config(format!(
                "field name size is {}. but {} size is {}. {}",
                self.names.len(),
                what,
                list.len(),
                self
            )));
        }
        Ok(())
    }

    /// Typed values of a row, as handed to the record writer.
    pub fn convert_row(&self, context: &FileContext, row: &Row) -> Result<BTreeMap<String, Value>, LayoutError> {
        let definition = self.record_definition(context)?;
        let mut out = BTreeMap::new();
        for field in &definition.fields {
            let raw = row.values.get(&field.name).map(String::as_str).unwrap_or("");
            out.insert(field.name.clone(), self.convert_value(field, raw)?);
        }
        Ok(out)
    }

    fn convert_value(&self, field: &FieldDefinition, raw: &str) -> Result<Value, LayoutError> {
        if !self.shape.is_fixed() || !field.data_type()?.is_binary() {
            return Ok(Value::text(raw));
        }
        let width = field.size.unwrap_or(0);
        let mut bytes = convert_to_bytes(raw, field.encoding)?;
        if bytes.len() > width {
            return Err(LayoutError::Overflow {
                field: field.name.clone(),
                value: raw.to_string(),
                limit: width,
            });
        }
        bytes.resize(width, 0);
        Ok(Value::Bytes(bytes))
    }

    /// Declared rows as records comparable with what the reader returns.
    pub fn expected_records(&self, context: &FileContext) -> Result<Vec<DataRecord>, LayoutError> {
        let definition = self.record_definition(context)?;
        let mut records = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut record = DataRecord::new(self.record_type.clone());
            record.row_number = row.number.clone();
            if row.error_mode.is_some() {
                for (name, value) in &row.values {
                    record.insert(name.clone(), Value::text(value.clone()));
                }
                records.push(record);
                continue;
            }
            for field in &definition.fields {
                let raw = row.values.get(&field.name).map(String::as_str).unwrap_or("");
                let converted = self.convert_value(field, raw)?;
                record.insert(field.name.clone(), self.remove_padding(field, converted)?);
            }
            records.push(record);
        }
        Ok(records)
    }

    fn remove_padding(&self, field: &FieldDefinition, value: Value) -> Result<Value, LayoutError> {
        if self.shape == FragmentShape::MockMessage {
            if let Value::Text(s) = &value {
                if ErrorMode::from_cell(s).is_some() {
                    return Ok(value);
                }
            }
        }
        Ok(field.data_type()?.remove_padding(value)?)
    }
}

impl fmt::Display for DataFileFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<&BTreeMap<String, String>> = self.rows.iter().map(|r| &r.values).collect();
        write!(
            f,
            "{}{{recordType={}, values={:?}, types={:?}, lengths={:?}}}",
            self.shape.label(),
            self.record_type,
            values,
            self.types,
            self.lengths
        )
    }
}

/// Names that occur more than once, in order of first appearance.
fn duplicate_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for name in names {
        if !seen.insert(name.as_str()) && !duplicates.contains(name) {
            duplicates.push(name.clone());
        }
    }
    duplicates
}

/// Drop line breaks together with the whitespace around them.
fn remove_line_breaks(data: &str) -> String {
    let mut out = String::with_capacity(data.len());
    let mut run = String::new();
    let mut run_has_break = false;
    for c in data.chars() {
        if c.is_ascii_whitespace() {
            run_has_break |= c == '\r' || c == '\n';
            run.push(c);
            continue;
        }
        if !run_has_break {
            out.push_str(&run);
        }
        run.clear();
        run_has_break = false;
        out.push(c);
    }
    if !run_has_break {
        out.push_str(&run);
    }
    out
}
