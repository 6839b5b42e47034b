//! Field codecs for flat records, looked up by type symbol.
//!
//! Fixed-length data types work on exactly `size` bytes: text types are padded on the
//! right (space or full-width space), numeric types are zoned/packed decimals or
//! zero-padded numeric strings, `B` is raw bytes. Variable-length data types carry no
//! size and convert to and from delimited text.

use crate::value::Value;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Prefix marking the read-back variant of a type symbol (e.g. `TEST_X9` for `X9`).
pub const TEST_SYMBOL_PREFIX: &str = "TEST_";

/// Zone nibble of zoned decimal digits, also the positive sign nibble of packed decimals.
const ZONE_NIBBLE: u8 = 0x3;
/// Sign nibble of negative zoned/packed decimals.
const NEGATIVE_NIBBLE: u8 = 0x7;

const SINGLE_BYTE_PAD: char = ' ';
const DOUBLE_BYTE_PAD: char = '\u{3000}';

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid data format: {0}")]
    InvalidData(String),
    #[error("unknown data type symbol: {0}")]
    UnknownType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTypeKind {
    /// `X`: single-byte characters.
    SingleByte,
    /// `N`: double-byte characters.
    DoubleByte,
    /// `XN`: mixed single/double-byte characters.
    Mixed,
    /// `Z` / `SZ`
    Zoned { signed: bool },
    /// `P` / `SP`
    Packed { signed: bool },
    /// `X9` / `SX9`
    NumberString { signed: bool },
    /// `B`
    Binary,
    /// `TEST_X9` / `TEST_SX9`: written like `NumberString`, read back as the raw text.
    ReadBackNumberString { signed: bool },
}

impl DataTypeKind {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DataTypeKind::Zoned { .. } | DataTypeKind::Packed { .. } | DataTypeKind::NumberString { .. }
        )
    }
}

/// A resolved codec for one field.
#[derive(Debug, Clone)]
pub struct DataType {
    kind: DataTypeKind,
    size: Option<usize>,
    encoding: &'static Encoding,
}

impl DataType {
    pub fn new(kind: DataTypeKind, size: Option<usize>, encoding: &'static Encoding) -> Self {
        DataType { kind, size, encoding }
    }

    pub fn kind(&self) -> DataTypeKind {
        self.kind
    }

    pub fn size(&self) -> Option<usize> {
        self.size
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn is_binary(&self) -> bool {
        self.kind == DataTypeKind::Binary
    }

    /// Encode a value into exactly `size` bytes (fixed-length) or into its text bytes.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let size = match self.size {
            Some(n) => n,
            None => return Ok(encode_text(self.encoding, &self.to_text(value)?)),
        };
        match self.kind {
            DataTypeKind::SingleByte | DataTypeKind::Mixed => {
                self.encode_padded_text(&text_of(value)?, size, SINGLE_BYTE_PAD)
            }
            DataTypeKind::DoubleByte => self.encode_padded_text(&text_of(value)?, size, DOUBLE_BYTE_PAD),
            DataTypeKind::NumberString { signed } | DataTypeKind::ReadBackNumberString { signed } => {
                let s = format_number_string(number_of(value)?, size, signed)?;
                Ok(s.into_bytes())
            }
            DataTypeKind::Zoned { signed } => encode_zoned(number_of(value)?, size, signed),
            DataTypeKind::Packed { signed } => encode_packed(number_of(value)?, size, signed),
            DataTypeKind::Binary => match value {
                Value::Bytes(b) if b.len() == size => Ok(b.clone()),
                Value::Bytes(b) => Err(CodecError::InvalidData(format!(
                    "binary length {} does not match field size {}",
                    b.len(),
                    size
                ))),
                other => Err(CodecError::InvalidData(format!(
                    "binary field requires bytes, got [{}]",
                    other
                ))),
            },
        }
    }

    /// Decode the bytes of one field. Padding is removed.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        match self.kind {
            DataTypeKind::SingleByte | DataTypeKind::Mixed => {
                let s = decode_text(self.encoding, bytes)?;
                Ok(Value::Text(s.trim_end_matches(SINGLE_BYTE_PAD).to_string()))
            }
            DataTypeKind::DoubleByte => {
                let s = decode_text(self.encoding, bytes)?;
                Ok(Value::Text(s.trim_end_matches(DOUBLE_BYTE_PAD).to_string()))
            }
            DataTypeKind::NumberString { signed } => {
                let s = decode_text(self.encoding, bytes)?;
                parse_number_string(&s, signed).map(Value::Number)
            }
            DataTypeKind::Zoned { signed } => decode_zoned(bytes, signed).map(Value::Number),
            DataTypeKind::Packed { signed } => decode_packed(bytes, signed).map(Value::Number),
            DataTypeKind::Binary => Ok(Value::Bytes(bytes.to_vec())),
            DataTypeKind::ReadBackNumberString { .. } => Ok(Value::Text(decode_text(self.encoding, bytes)?)),
        }
    }

    /// Text form of a value inside a delimited record.
    pub fn to_text(&self, value: &Value) -> Result<String, CodecError> {
        match self.kind {
            DataTypeKind::SingleByte
            | DataTypeKind::DoubleByte
            | DataTypeKind::Mixed
            | DataTypeKind::ReadBackNumberString { .. } => Ok(text_of(value)?.into_owned()),
            DataTypeKind::NumberString { signed } => {
                let n = number_of(value)?;
                if !signed && n < 0 {
                    return Err(CodecError::InvalidData(format!(
                        "unsigned number field can't hold negative value [{}]",
                        n
                    )));
                }
                Ok(n.to_string())
            }
            kind => Err(CodecError::InvalidData(format!(
                "{:?} is not supported in delimited records",
                kind
            ))),
        }
    }

    /// Value of one delimited field.
    pub fn from_text(&self, text: &str) -> Result<Value, CodecError> {
        match self.kind {
            DataTypeKind::SingleByte
            | DataTypeKind::DoubleByte
            | DataTypeKind::Mixed
            | DataTypeKind::ReadBackNumberString { .. } => Ok(Value::Text(text.to_string())),
            DataTypeKind::NumberString { signed } => parse_number_string(text, signed).map(Value::Number),
            kind => Err(CodecError::InvalidData(format!(
                "{:?} is not supported in delimited records",
                kind
            ))),
        }
    }

    /// Strip the format-specific padding from a value so it compares equal to a decoded one.
    pub fn remove_padding(&self, value: Value) -> Result<Value, CodecError> {
        if self.kind.is_numeric() {
            return number_of(&value).map(Value::Number);
        }
        let size = match self.size {
            Some(n) => n,
            None => return Ok(value),
        };
        Ok(match (self.kind, value) {
            (DataTypeKind::ReadBackNumberString { signed }, v) => {
                Value::Text(format_number_string(number_of(&v)?, size, signed)?)
            }
            (DataTypeKind::SingleByte | DataTypeKind::Mixed, Value::Text(s)) => {
                Value::Text(s.trim_end_matches(SINGLE_BYTE_PAD).to_string())
            }
            (DataTypeKind::DoubleByte, Value::Text(s)) => {
                Value::Text(s.trim_end_matches(DOUBLE_BYTE_PAD).to_string())
            }
            (_, v) => v,
        })
    }

    fn encode_padded_text(&self, text: &str, size: usize, pad: char) -> Result<Vec<u8>, CodecError> {
        let mut bytes = encode_text(self.encoding, text);
        if bytes.len() > size {
            return Err(CodecError::InvalidData(format!(
                "too large data. field size = '{}' data size = '{}'. data: {}",
                size,
                bytes.len(),
                text
            )));
        }
        let pad_bytes = encode_text(self.encoding, pad.encode_utf8(&mut [0u8; 4]));
        let remaining = size - bytes.len();
        if pad_bytes.is_empty() || remaining % pad_bytes.len() != 0 {
            return Err(CodecError::InvalidData(format!(
                "can't pad [{}] to {} bytes with {:?}",
                text, size, pad
            )));
        }
        for _ in 0..remaining / pad_bytes.len() {
            bytes.extend_from_slice(&pad_bytes);
        }
        Ok(bytes)
    }
}

/// Registry of type symbols for one record format.
#[derive(Debug)]
pub struct CodecTable {
    name: &'static str,
    fixed: bool,
    symbols: BTreeMap<&'static str, DataTypeKind>,
}

static FIXED_LENGTH: Lazy<CodecTable> = Lazy::new(|| {
    CodecTable::new(
        "fixed-length",
        true,
        &[
            ("X", DataTypeKind::SingleByte),
            ("N", DataTypeKind::DoubleByte),
            ("XN", DataTypeKind::Mixed),
            ("Z", DataTypeKind::Zoned { signed: false }),
            ("SZ", DataTypeKind::Zoned { signed: true }),
            ("P", DataTypeKind::Packed { signed: false }),
            ("SP", DataTypeKind::Packed { signed: true }),
            ("X9", DataTypeKind::NumberString { signed: false }),
            ("SX9", DataTypeKind::NumberString { signed: true }),
            ("B", DataTypeKind::Binary),
            ("TEST_X9", DataTypeKind::ReadBackNumberString { signed: false }),
            ("TEST_SX9", DataTypeKind::ReadBackNumberString { signed: true }),
        ],
    )
});

static VARIABLE_LENGTH: Lazy<CodecTable> = Lazy::new(|| {
    CodecTable::new(
        "variable-length",
        false,
        &[
            ("X", DataTypeKind::SingleByte),
            ("N", DataTypeKind::DoubleByte),
            ("XN", DataTypeKind::Mixed),
            ("X9", DataTypeKind::NumberString { signed: false }),
            ("SX9", DataTypeKind::NumberString { signed: true }),
            ("TEST_X9", DataTypeKind::ReadBackNumberString { signed: false }),
            ("TEST_SX9", DataTypeKind::ReadBackNumberString { signed: true }),
        ],
    )
});

impl CodecTable {
    fn new(name: &'static str, fixed: bool, entries: &[(&'static str, DataTypeKind)]) -> Self {
        CodecTable {
            name,
            fixed,
            symbols: entries.iter().copied().collect(),
        }
    }

    pub fn fixed_length() -> &'static CodecTable {
        &FIXED_LENGTH
    }

    pub fn variable_length() -> &'static CodecTable {
        &VARIABLE_LENGTH
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    /// The symbol to use when reading test data back: `TEST_<symbol>` if registered, else `symbol`.
    pub fn test_symbol_for(&self, symbol: &str) -> String {
        let test_symbol = format!("{}{}", TEST_SYMBOL_PREFIX, symbol);
        if self.contains(&test_symbol) {
            test_symbol
        } else {
            symbol.to_string()
        }
    }

    pub fn type_of(
        &self,
        symbol: &str,
        size: Option<usize>,
        encoding: &'static Encoding,
    ) -> Result<DataType, CodecError> {
        let kind = self
            .symbols
            .get(symbol)
            .copied()
            .ok_or_else(|| CodecError::UnknownType(format!("{} ({})", symbol, self.name)))?;
        if !self.fixed {
            return Ok(DataType::new(kind, None, encoding));
        }
        match size {
            Some(n) => Ok(DataType::new(kind, Some(n), encoding)),
            None => Err(CodecError::InvalidData(format!(
                "field size is required for data type {} ({})",
                symbol, self.name
            ))),
        }
    }
}

pub fn encode_text(encoding: &'static Encoding, s: &str) -> Vec<u8> {
    let (bytes, _, _) = encoding.encode(s);
    bytes.into_owned()
}

pub fn decode_text(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, CodecError> {
    let (s, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(CodecError::InvalidData(format!(
            "bytes are not valid {}: {:02X?}",
            encoding.name(),
            bytes
        )));
    }
    Ok(s.into_owned())
}

/// Convert a design-notation binary value: `0x` followed by hex digits, else the text bytes.
pub fn convert_to_bytes(expression: &str, encoding: &'static Encoding) -> Result<Vec<u8>, CodecError> {
    let hex = match expression.strip_prefix("0x").or_else(|| expression.strip_prefix("0X")) {
        Some(h) => h,
        None => return Ok(encode_text(encoding, expression)),
    };
    if hex.len() % 2 != 0 {
        return Err(CodecError::InvalidData(format!(
            "hex value must have an even number of digits [{}]",
            expression
        )));
    }
    let digits = hex.as_bytes();
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks(2) {
        let hi = hex_digit(pair[0]);
        let lo = hex_digit(pair[1]);
        match (hi, lo) {
            (Some(h), Some(l)) => out.push((h << 4) | l),
            _ => {
                return Err(CodecError::InvalidData(format!(
                    "invalid hex value [{}]",
                    expression
                )))
            }
        }
    }
    Ok(out)
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn text_of(value: &Value) -> Result<Cow<'_, str>, CodecError> {
    match value {
        Value::Text(s) => Ok(Cow::Borrowed(s)),
        Value::Number(n) => Ok(Cow::Owned(n.to_string())),
        Value::Bytes(_) => Err(CodecError::InvalidData(format!(
            "text field can't hold bytes [{}]",
            value
        ))),
    }
}

fn number_of(value: &Value) -> Result<i128, CodecError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Text(s) => parse_number(s),
        Value::Bytes(_) => Err(CodecError::InvalidData(format!(
            "numeric field can't hold bytes [{}]",
            value
        ))),
    }
}

/// Empty means zero.
fn parse_number(s: &str) -> Result<i128, CodecError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    s.parse::<i128>()
        .map_err(|_| CodecError::InvalidData(format!("invalid number [{}]", s)))
}

fn parse_number_string(s: &str, signed: bool) -> Result<i128, CodecError> {
    if !signed && s.trim_start().starts_with('-') {
        return Err(CodecError::InvalidData(format!(
            "unsigned number field has a sign [{}]",
            s
        )));
    }
    parse_number(s)
}

fn digits_of(n: i128, size: usize, signed: bool, what: &str) -> Result<(bool, String), CodecError> {
    let negative = n < 0;
    if negative && !signed {
        return Err(CodecError::InvalidData(format!(
            "unsigned {} can't hold negative value [{}]",
            what, n
        )));
    }
    let digits = n.unsigned_abs().to_string();
    if digits.len() > size {
        return Err(CodecError::InvalidData(format!(
            "value [{}] exceeds {} digits of {}",
            n, size, what
        )));
    }
    Ok((negative, format!("{:0>width$}", digits, width = size)))
}

fn format_number_string(n: i128, size: usize, signed: bool) -> Result<String, CodecError> {
    if n < 0 {
        let width = size.checked_sub(1).ok_or_else(|| {
            CodecError::InvalidData(format!("value [{}] exceeds field size {}", n, size))
        })?;
        let (_, digits) = digits_of(n, width, signed, "numeric string")?;
        return Ok(format!("-{}", digits));
    }
    let (_, digits) = digits_of(n, size, signed, "numeric string")?;
    Ok(digits)
}

fn encode_zoned(n: i128, size: usize, signed: bool) -> Result<Vec<u8>, CodecError> {
    let (negative, digits) = digits_of(n, size, signed, "zoned decimal")?;
    let mut out: Vec<u8> = digits.bytes().map(|d| (ZONE_NIBBLE << 4) | (d - b'0')).collect();
    if negative {
        if let Some(last) = out.last_mut() {
            *last = (NEGATIVE_NIBBLE << 4) | (*last & 0x0F);
        }
    }
    Ok(out)
}

fn decode_zoned(bytes: &[u8], signed: bool) -> Result<i128, CodecError> {
    let mut n: i128 = 0;
    let mut negative = false;
    for (i, &b) in bytes.iter().enumerate() {
        let zone = b >> 4;
        let digit = b & 0x0F;
        let is_last = i + 1 == bytes.len();
        let zone_ok = zone == ZONE_NIBBLE || (is_last && signed && zone == NEGATIVE_NIBBLE);
        if digit > 9 || !zone_ok {
            return Err(CodecError::InvalidData(format!(
                "invalid zoned decimal byte 0x{:02X} in {:02X?}",
                b, bytes
            )));
        }
        if is_last && zone == NEGATIVE_NIBBLE {
            negative = true;
        }
        n = accumulate(n, digit, bytes)?;
    }
    Ok(if negative { -n } else { n })
}

fn encode_packed(n: i128, size: usize, signed: bool) -> Result<Vec<u8>, CodecError> {
    let capacity = (size * 2).checked_sub(1).ok_or_else(|| {
        CodecError::InvalidData("packed decimal field size must be at least 1".to_string())
    })?;
    let (negative, digits) = digits_of(n, capacity, signed, "packed decimal")?;
    let mut nibbles: Vec<u8> = digits.bytes().map(|d| d - b'0').collect();
    nibbles.push(if negative { NEGATIVE_NIBBLE } else { ZONE_NIBBLE });
    Ok(nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

fn decode_packed(bytes: &[u8], signed: bool) -> Result<i128, CodecError> {
    let mut n: i128 = 0;
    let mut negative = false;
    for (i, &b) in bytes.iter().enumerate() {
        let hi = b >> 4;
        let lo = b & 0x0F;
        if hi > 9 {
            return Err(CodecError::InvalidData(format!(
                "invalid packed decimal byte 0x{:02X} in {:02X?}",
                b, bytes
            )));
        }
        n = accumulate(n, hi, bytes)?;
        if i + 1 < bytes.len() {
            if lo > 9 {
                return Err(CodecError::InvalidData(format!(
                    "invalid packed decimal byte 0x{:02X} in {:02X?}",
                    b, bytes
                )));
            }
            n = accumulate(n, lo, bytes)?;
        } else if lo == NEGATIVE_NIBBLE && signed {
            negative = true;
        } else if lo != ZONE_NIBBLE {
            return Err(CodecError::InvalidData(format!(
                "invalid packed decimal sign nibble 0x{:X} in {:02X?}",
                lo, bytes
            )));
        }
    }
    Ok(if negative { -n } else { n })
}

fn accumulate(n: i128, digit: u8, bytes: &[u8]) -> Result<i128, CodecError> {
    n.checked_mul(10)
        .and_then(|v| v.checked_add(digit as i128))
        .ok_or_else(|| CodecError::InvalidData(format!("decimal overflow in {:02X?}", bytes)))
}
