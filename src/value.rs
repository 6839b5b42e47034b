//! Runtime values exchanged with the record formatter and the comparison side.

use std::collections::BTreeMap;
use std::fmt;

/// A single typed field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    /// Integral value of a numeric type (zoned, packed, numeric string).
    Number(i128),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i128> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bytes(b) => {
                f.write_str("0x")?;
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// One record: record type, the optional diagnostic row number and its field values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataRecord {
    pub record_type: String,
    /// Row number taken from the test data; never part of the physical record.
    pub row_number: Option<String>,
    pub values: BTreeMap<String, Value>,
}

impl DataRecord {
    pub fn new(record_type: impl Into<String>) -> Self {
        DataRecord {
            record_type: record_type.into(),
            row_number: None,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
