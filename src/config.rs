//! Settings shared by every data file: default directives, type label tables, cache size.

use crate::mapping::BasicDataTypeMapping;
use encoding_rs::Encoding;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

fn default_cache_capacity() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directives applied to every file kind.
    pub default_directives: BTreeMap<String, String>,
    pub fixed_length_directives: BTreeMap<String, String>,
    pub variable_length_directives: BTreeMap<String, String>,
    /// Global label table; the built-in table is used when absent.
    pub data_type_mapping: Option<BTreeMap<String, String>>,
    /// Label tables keyed by encoding name (`UTF-8`, `Shift_JIS`, ...).
    pub encoding_data_type_mappings: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_directives: BTreeMap::new(),
            fixed_length_directives: BTreeMap::new(),
            variable_length_directives: BTreeMap::new(),
            data_type_mapping: None,
            encoding_data_type_mappings: BTreeMap::new(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read settings file {}: {}", path.as_ref().display(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache_capacity == 0 {
            return Err(anyhow::anyhow!("cache_capacity must be greater than zero"));
        }
        for name in self.encoding_data_type_mappings.keys() {
            if Encoding::for_label(name.as_bytes()).is_none() {
                return Err(anyhow::anyhow!("Unknown encoding '{}' in encoding_data_type_mappings", name));
            }
        }
        Ok(())
    }

    /// Label mapping for a file: the encoding-specific table, then the global one, then the built-in one.
    pub fn data_type_mapping(&self, encoding: Option<&'static Encoding>) -> BasicDataTypeMapping {
        let by_encoding = encoding.and_then(|enc| {
            self.encoding_data_type_mappings
                .iter()
                .find(|(name, _)| Encoding::for_label(name.as_bytes()) == Some(enc))
                .map(|(_, table)| table)
        });
        match by_encoding.or(self.data_type_mapping.as_ref()) {
            Some(table) => BasicDataTypeMapping::with_table(table.clone()),
            None => BasicDataTypeMapping::new(),
        }
    }
}
