//! # recordlayout — record-layout fixtures for flat files
//!
//! Describe flat files as tables (field names, design-notation types, byte widths
//! and literal rows), write them to disk before a test, and read the file a
//! program produced back into records that can be compared with the expected rows.
//!
//! ## Model
//!
//! - **DataFile**: a path, its directives and an ordered list of fragments. Fixed-length,
//!   variable-length and mock-message variants differ in their directive vocabulary.
//! - **Fragment**: one record shape plus its rows. A width of `-` is inferred from the
//!   longest encoded value among the rows.
//! - **Layout**: directives plus one record definition per fragment, handed to the
//!   [`formatter`] to write or read the physical file.
//!
//! ## Reading mixed record shapes
//!
//! A file holding several shapes is read with one reader that is rebound to a
//! single-fragment layout before each fragment: a fragment consumes as many records as
//! it declares rows, the last one reads to the end of the file, and a fragment that
//! finds nothing stops the read.
//!
//! ## Example
//!
//! ```no_run
//! use recordlayout::{DataFile, Settings};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), recordlayout::LayoutError> {
//! let mut file = DataFile::fixed_length("out/users.dat", Arc::new(Settings::default()))?;
//! file.set_directive("record-separator", "LF")?;
//! file.new_fragment()
//!     .set_record_type("user")
//!     .set_names(&["id", "name"])?
//!     .set_types(&["半角数字", "半角"])?
//!     .set_lengths(&["4", "-"])?
//!     .add_row(&["0001", "abc"])
//!     .add_row(&["0022", "wxyz"]);
//! file.write()?;
//! let records = file.read()?;
//! assert_eq!(records, file.expected_records()?);
//! # Ok(())
//! # }
//! ```
//!
//! Fixture sheets (`.tsv`) are turned into data files by [`reader::TestDataParser`].

pub mod cache;
pub mod codec;
pub mod config;
pub mod definition;
pub mod dump;
pub mod error;
pub mod file;
pub mod formatter;
pub mod fragment;
pub mod line_separator;
pub mod mapping;
pub mod parser;
pub mod reader;
pub mod value;

pub use codec::{CodecError, CodecTable, DataType, DataTypeKind};
pub use config::Settings;
pub use definition::{Directive, DirectiveValue, Directives, FieldDefinition, LayoutDefinition, RecordDefinition};
pub use error::LayoutError;
pub use file::{DataFile, FileKind, FixedLength, FragmentEditor, MockMessages, VariableLength};
pub use formatter::{RecordReader, RecordWriter};
pub use fragment::{DataFileFragment, ErrorMode, FragmentShape, Row};
pub use line_separator::LineSeparator;
pub use mapping::{BasicDataTypeMapping, DataTypeMapping};
pub use parser::parse_sheet;
pub use reader::{DataKind, ReaderError, SheetSource, TestDataParser, TextSheetSource};
pub use value::{DataRecord, Value};
