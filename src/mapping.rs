//! Design-notation data type labels to type symbols.
//!
//! Interface designs name field types in prose ("半角英数字", "符号付パック10進数", ...).
//! A [`DataTypeMapping`] turns such a label into the type symbol understood by the
//! [`codec`](crate::codec) layer.

use crate::error::LayoutError;
use std::collections::BTreeMap;

/// Built-in label table.
pub const DEFAULT_TABLE: &[(&str, &str)] = &[
    ("半角英字", "X"),
    ("半角数字", "X"),
    ("半角記号", "X"),
    ("半角カナ", "X"),
    ("半角英数字", "X"),
    ("半角英数字記号", "X"),
    ("半角", "X"),
    ("全角英字", "N"),
    ("全角数字", "N"),
    ("全角ひらがな", "N"),
    ("全角カタカナ", "N"),
    ("全角漢字", "N"),
    ("全角", "N"),
    ("全半角", "XN"),
    ("数値", "Z"),
    ("符号無ゾーン10進数", "Z"),
    ("符号付ゾーン10進数", "SZ"),
    ("符号無パック10進数", "P"),
    ("符号付パック10進数", "SP"),
    ("符号無数値", "X9"),
    ("符号付数値", "SX9"),
    ("バイナリ", "B"),
];

pub trait DataTypeMapping {
    /// Type symbol for a design-notation label.
    fn resolve(&self, label: &str) -> Result<String, LayoutError>;
}

/// Table-driven mapping; falls back to [`DEFAULT_TABLE`] until a table is set.
#[derive(Debug, Clone, Default)]
pub struct BasicDataTypeMapping {
    table: Option<BTreeMap<String, String>>,
}

impl BasicDataTypeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: BTreeMap<String, String>) -> Self {
        BasicDataTypeMapping { table: Some(table) }
    }

    /// Replace the active table.
    pub fn set_mapping_table(&mut self, table: BTreeMap<String, String>) {
        self.table = Some(table);
    }

    fn lookup(&self, label: &str) -> Option<&str> {
        match &self.table {
            Some(t) => t.get(label).map(String::as_str),
            None => DEFAULT_TABLE
                .iter()
                .find(|(design, _)| *design == label)
                .map(|(_, symbol)| *symbol),
        }
    }

    fn describe_table(&self) -> String {
        let entries: Vec<String> = match &self.table {
            Some(t) => t.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
            None => DEFAULT_TABLE.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
        };
        format!("{{{}}}", entries.join(", "))
    }
}

impl DataTypeMapping for BasicDataTypeMapping {
    fn resolve(&self, label: &str) -> Result<String, LayoutError> {
        if label.trim().is_empty() {
            return Err(LayoutError::Config(
                "data type label must not be null or empty.".to_string(),
            ));
        }
        match self.lookup(label) {
            Some(symbol) if !symbol.is_empty() => Ok(symbol.to_string()),
            _ => Err(LayoutError::Config(format!(
                "can't convert value [{}]. convert table ={}",
                label,
                self.describe_table()
            ))),
        }
    }
}
