//! Errors raised while building, writing or reading data files.

use crate::codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// Invalid argument: unknown directive, bad field lists, unresolvable type label.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Inconsistent state: differing record lengths, malformed widths.
    #[error("illegal state: {0}")]
    State(String),
    #[error("value size overflowed. field=[{field}], value=[{value}], size limit=[{limit}]")]
    Overflow {
        field: String,
        value: String,
        limit: usize,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("I/O failure. path=[{path}]: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl LayoutError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        LayoutError::Io {
            path: path.to_string(),
            source,
        }
    }
}
