//! Record separator aliases.

/// Named record separators accepted by the `record-separator` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSeparator {
    None,
    Cr,
    Lf,
    CrLf,
}

impl LineSeparator {
    pub fn value(self) -> &'static str {
        match self {
            LineSeparator::None => "",
            LineSeparator::Cr => "\r",
            LineSeparator::Lf => "\n",
            LineSeparator::CrLf => "\r\n",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "NONE" => Some(LineSeparator::None),
            "CR" => Some(LineSeparator::Cr),
            "LF" => Some(LineSeparator::Lf),
            "CRLF" => Some(LineSeparator::CrLf),
            _ => None,
        }
    }

    /// Evaluate a separator expression: an alias name yields its literal,
    /// anything else is taken to be the literal separator itself.
    pub fn evaluate(expression: &str) -> String {
        match LineSeparator::from_name(expression) {
            Some(ls) => ls.value().to_string(),
            None => expression.to_string(),
        }
    }
}
