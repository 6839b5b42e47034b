//! Build data files from fixture sheets.
//!
//! A sheet holds groups introduced by a marker row `<KIND><group-id>=<path>`.
//! Each group describes one file: directive rows, then for every fragment a
//! names row, a types row, a lengths row (fixed-length only) and data rows.

use crate::cache::LruCache;
use crate::config::Settings;
use crate::error::LayoutError;
use crate::file::{DataFile, FragmentEditor};
use crate::parser::parse_sheet;
use log::debug;
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

/// Extension of sheet files read by [`TextSheetSource`].
pub const SHEET_EXTENSION: &str = "tsv";

pub type SheetRows = Rc<Vec<Vec<String>>>;

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("can't parse sheet. path=[{path}]: {message}")]
    Sheet { path: String, message: String },
    #[error("can't read sheet. path=[{path}]: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't get data. directory=[{directory}] resource=[{resource}] id=[{id}]")]
    Data {
        directory: String,
        resource: String,
        id: String,
        #[source]
        source: LayoutError,
    },
}

/// Where sheet rows come from.
pub trait SheetSource {
    fn rows(&self, directory: &str, resource: &str) -> Result<Vec<Vec<String>>, ReaderError>;
}

/// Reads `<directory>/<resource>.tsv`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSheetSource;

impl SheetSource for TextSheetSource {
    fn rows(&self, directory: &str, resource: &str) -> Result<Vec<Vec<String>>, ReaderError> {
        let path = Path::new(directory).join(format!("{}.{}", resource, SHEET_EXTENSION));
        let display = path.display().to_string();
        let text = fs::read_to_string(&path).map_err(|source| ReaderError::Source {
            path: display.clone(),
            source,
        })?;
        parse_sheet(&text).map_err(|message| ReaderError::Sheet { path: display, message })
    }
}

/// Marker naming the kind of data a sheet group holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    SetupTable,
    ExpectedTable,
    ExpectedCompleteTable,
    ListMap,
    SetupFixed,
    ExpectedFixed,
    SetupVariable,
    ExpectedVariable,
    Message,
    ExpectedRequestHeaderMessages,
    ExpectedRequestBodyMessages,
    ResponseHeaderMessages,
    ResponseBodyMessages,
}

impl DataKind {
    /// Markers in the order they are tried against a cell.
    pub const ALL: [DataKind; 13] = [
        DataKind::SetupTable,
        DataKind::ExpectedTable,
        DataKind::ExpectedCompleteTable,
        DataKind::ListMap,
        DataKind::SetupFixed,
        DataKind::ExpectedFixed,
        DataKind::SetupVariable,
        DataKind::ExpectedVariable,
        DataKind::Message,
        DataKind::ExpectedRequestHeaderMessages,
        DataKind::ExpectedRequestBodyMessages,
        DataKind::ResponseHeaderMessages,
        DataKind::ResponseBodyMessages,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataKind::SetupTable => "SETUP_TABLE",
            DataKind::ExpectedTable => "EXPECTED_TABLE",
            DataKind::ExpectedCompleteTable => "EXPECTED_COMPLETE_TABLE",
            DataKind::ListMap => "LIST_MAP",
            DataKind::SetupFixed => "SETUP_FIXED",
            DataKind::ExpectedFixed => "EXPECTED_FIXED",
            DataKind::SetupVariable => "SETUP_VARIABLE",
            DataKind::ExpectedVariable => "EXPECTED_VARIABLE",
            DataKind::Message => "MESSAGE",
            DataKind::ExpectedRequestHeaderMessages => "EXPECTED_REQUEST_HEADER_MESSAGES",
            DataKind::ExpectedRequestBodyMessages => "EXPECTED_REQUEST_BODY_MESSAGES",
            DataKind::ResponseHeaderMessages => "RESPONSE_HEADER_MESSAGES",
            DataKind::ResponseBodyMessages => "RESPONSE_BODY_MESSAGES",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Marker a cell starts with, if any.
    pub fn from_cell(cell: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| cell.starts_with(k.name()))
    }

    /// Whether groups of this kind describe a file.
    pub fn is_file(self) -> bool {
        matches!(
            self,
            DataKind::SetupFixed
                | DataKind::ExpectedFixed
                | DataKind::SetupVariable
                | DataKind::ExpectedVariable
                | DataKind::Message
        )
    }

    fn is_variable(self) -> bool {
        matches!(self, DataKind::SetupVariable | DataKind::ExpectedVariable)
    }

    fn new_file(self, path: &str, settings: &Arc<Settings>) -> Result<DataFile, LayoutError> {
        match self {
            DataKind::SetupFixed | DataKind::ExpectedFixed => DataFile::fixed_length(path, Arc::clone(settings)),
            DataKind::SetupVariable | DataKind::ExpectedVariable => {
                DataFile::variable_length(path, Arc::clone(settings))
            }
            DataKind::Message => DataFile::mock_messages(path, Arc::clone(settings)),
            other => Err(LayoutError::Config(format!("data kind [{}] does not describe a file.", other))),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    DirectivesAndNames,
    Types,
    Lengths,
    Values,
}

/// Turns the rows of one group into data files.
struct GroupBuilder<'a> {
    kind: DataKind,
    settings: &'a Arc<Settings>,
    files: Vec<DataFile>,
    status: Status,
}

impl<'a> GroupBuilder<'a> {
    fn new(kind: DataKind, settings: &'a Arc<Settings>) -> Self {
        GroupBuilder {
            kind,
            settings,
            files: Vec::new(),
            status: Status::DirectivesAndNames,
        }
    }

    fn start_file(&mut self, marker_cell: &str) -> Result<(), LayoutError> {
        let path = marker_cell.split_once('=').map(|(_, p)| p).unwrap_or("");
        self.files.push(self.kind.new_file(path, self.settings)?);
        self.status = Status::DirectivesAndNames;
        Ok(())
    }

    fn current_file(&mut self) -> Result<&mut DataFile, LayoutError> {
        self.files
            .last_mut()
            .ok_or_else(|| LayoutError::State("no file is being read.".to_string()))
    }

    fn current_fragment(&mut self) -> Result<FragmentEditor<'_>, LayoutError> {
        let file = self.current_file()?;
        let last = file.fragments().len().checked_sub(1);
        last.and_then(|i| file.fragment_mut(i))
            .ok_or_else(|| LayoutError::State("no fragment is being read.".to_string()))
    }

    fn on_row(&mut self, row: &[String]) -> Result<(), LayoutError> {
        match self.status {
            Status::DirectivesAndNames => {
                if row.len() < 2 {
                    return Err(LayoutError::State(format!(
                        "directive or data names row must have two columns at least. {:?}",
                        row
                    )));
                }
                let file = self.current_file()?;
                if file.kind().resolve_directive(&row[0]).is_some() {
                    file.set_directive(&row[0], &row[1])
                } else {
                    self.start_fragment(row)
                }
            }
            Status::Types => {
                self.current_fragment()?.set_types(tail(row))?;
                self.status = if self.kind.is_variable() {
                    Status::Values
                } else {
                    Status::Lengths
                };
                Ok(())
            }
            Status::Lengths => {
                self.current_fragment()?.set_lengths(tail(row))?;
                self.status = Status::Values;
                Ok(())
            }
            Status::Values if self.kind == DataKind::Message => {
                let id = row.first().map(String::as_str).unwrap_or("");
                self.current_fragment()?.add_row_with_id(id, tail(row));
                Ok(())
            }
            Status::Values => {
                if row.first().map_or(true, |c| c.is_empty()) {
                    self.current_fragment()?.add_row(tail(row));
                    Ok(())
                } else {
                    self.start_fragment(row)
                }
            }
        }
    }

    fn start_fragment(&mut self, names_row: &[String]) -> Result<(), LayoutError> {
        let file = self.current_file()?;
        let mut fragment = file.new_fragment();
        fragment
            .set_record_type(names_row.first().cloned().unwrap_or_default())
            .set_names(tail(names_row))?;
        self.status = Status::Types;
        Ok(())
    }
}

fn tail(row: &[String]) -> &[String] {
    row.get(1..).unwrap_or(&[])
}

/// Scan `rows` for the groups `<kind><group_id>=` and build one file per group.
pub fn build_files(
    rows: &[Vec<String>],
    kind: DataKind,
    group_id: &str,
    settings: &Arc<Settings>,
) -> Result<Vec<DataFile>, LayoutError> {
    let marker = format!("{}{}=", kind.name(), group_id);
    let mut builder = GroupBuilder::new(kind, settings);
    let mut reading = false;
    for row in rows {
        let first = row.first().map(String::as_str).unwrap_or("");
        if first.starts_with(&marker) {
            reading = true;
            builder.start_file(first)?;
        } else if DataKind::from_cell(first).is_none() {
            if reading {
                builder.on_row(row)?;
            }
        } else if reading {
            break;
        }
    }
    Ok(builder.files)
}

/// Parses data files out of sheets, caching raw rows per sheet and remembering
/// lookups that found nothing.
pub struct TestDataParser<S: SheetSource> {
    source: S,
    settings: Arc<Settings>,
    rows_cache: LruCache<String, SheetRows>,
    result_cache: LruCache<String, usize>,
}

impl<S: SheetSource> TestDataParser<S> {
    pub fn new(source: S, settings: Arc<Settings>) -> Self {
        let capacity = settings.cache_capacity;
        Self::with_caches(source, settings, LruCache::new(capacity), LruCache::new(capacity))
    }

    pub fn with_caches(
        source: S,
        settings: Arc<Settings>,
        rows_cache: LruCache<String, SheetRows>,
        result_cache: LruCache<String, usize>,
    ) -> Self {
        TestDataParser {
            source,
            settings,
            rows_cache,
            result_cache,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn rows_cache(&self) -> &LruCache<String, SheetRows> {
        &self.rows_cache
    }

    /// Every file of group `group_id` of `kind` in sheet `resource`.
    ///
    /// Files are rebuilt from cached rows on each call, so callers may mutate them freely.
    pub fn parse(
        &mut self,
        directory: &str,
        resource: &str,
        kind: DataKind,
        group_id: &str,
    ) -> Result<Vec<DataFile>, ReaderError> {
        let result_key = format!("{}/{}/{}/{}", directory, resource, kind, group_id);
        if self.result_cache.get(&result_key) == Some(0) {
            debug!("no data found (cached). key=[{}]", result_key);
            return Ok(Vec::new());
        }
        let rows = self.load_rows(directory, resource)?;
        let files = build_files(&rows, kind, group_id, &self.settings).map_err(|source| ReaderError::Data {
            directory: directory.to_string(),
            resource: resource.to_string(),
            id: group_id.to_string(),
            source,
        })?;
        self.result_cache.put(result_key, files.len());
        Ok(files)
    }

    fn load_rows(&mut self, directory: &str, resource: &str) -> Result<SheetRows, ReaderError> {
        let key = format!("{}/{}", directory, resource);
        if let Some(rows) = self.rows_cache.get(&key) {
            debug!("sheet cache hit. key=[{}]", key);
            return Ok(rows);
        }
        debug!("sheet cache miss. key=[{}]", key);
        let rows: SheetRows = Rc::new(self.source.rows(directory, resource)?);
        self.rows_cache.put(key, Rc::clone(&rows));
        Ok(rows)
    }
}
