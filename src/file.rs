//! Data files: a path, its directives and an ordered list of fragments.
//!
//! A [`DataFile`] is either fixed-length, variable-length or a pool of mock
//! messages. The variant decides the directive vocabulary, the fragment shape and
//! the final touches applied to the layout; everything else (writing the rows,
//! reading them back shape by shape) is shared.

use crate::codec::CodecError;
use crate::config::Settings;
use crate::definition::{Directive, DirectiveValue, Directives, LayoutDefinition};
use crate::error::LayoutError;
use crate::formatter::{RecordReader, RecordWriter};
use crate::fragment::{DataFileFragment, FragmentShape};
use crate::line_separator::LineSeparator;
use crate::value::DataRecord;
use encoding_rs::Encoding;
use log::debug;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

pub const FIXED_FILE_TYPE: &str = "Fixed";
pub const VARIABLE_FILE_TYPE: &str = "Variable";

const FIXED_DIRECTIVES: &[Directive] = &[
    Directive::FileType,
    Directive::TextEncoding,
    Directive::RecordLength,
    Directive::RecordSeparator,
];

const VARIABLE_DIRECTIVES: &[Directive] = &[
    Directive::FileType,
    Directive::TextEncoding,
    Directive::RecordSeparator,
    Directive::FieldSeparator,
    Directive::QuotingDelimiter,
    Directive::IgnoreBlankLines,
];

/// Behavior that differs between file variants.
pub trait FileKind: fmt::Debug {
    /// Value of the `file-type` directive.
    fn file_type(&self) -> &'static str;

    fn new_fragment(&self) -> DataFileFragment;

    /// Directive known to this variant under `name`.
    fn resolve_directive(&self, name: &str) -> Option<Directive>;

    /// Convert a trimmed sheet value into the directive's typed value.
    fn convert_directive_value(&self, directive: Directive, raw: &str) -> Result<DirectiveValue, LayoutError> {
        convert_common(directive, raw)
    }

    /// Variant-specific seed directives, applied after the generic defaults.
    fn default_directives(&self, settings: &Settings) -> Vec<(String, String)>;

    /// Final adjustments on a layout built from this file's fragments.
    fn adjust_layout(&self, _layout: &mut LayoutDefinition, _fragments: &[DataFileFragment]) -> Result<(), LayoutError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLength;

#[derive(Debug, Clone, Copy, Default)]
pub struct VariableLength;

/// Fixed-length file whose rows are mock messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockMessages;

impl FileKind for FixedLength {
    fn file_type(&self) -> &'static str {
        FIXED_FILE_TYPE
    }

    fn new_fragment(&self) -> DataFileFragment {
        DataFileFragment::new(FragmentShape::Fixed)
    }

    fn resolve_directive(&self, name: &str) -> Option<Directive> {
        find_directive(FIXED_DIRECTIVES, name)
    }

    fn default_directives(&self, settings: &Settings) -> Vec<(String, String)> {
        seeds(&settings.fixed_length_directives)
    }

    fn adjust_layout(&self, layout: &mut LayoutDefinition, fragments: &[DataFileFragment]) -> Result<(), LayoutError> {
        let length = shared_record_length(fragments)?;
        layout.directives.insert(Directive::RecordLength, DirectiveValue::Int(length));
        Ok(())
    }
}

impl FileKind for MockMessages {
    fn file_type(&self) -> &'static str {
        FIXED_FILE_TYPE
    }

    fn new_fragment(&self) -> DataFileFragment {
        DataFileFragment::new(FragmentShape::MockMessage)
    }

    fn resolve_directive(&self, name: &str) -> Option<Directive> {
        FixedLength.resolve_directive(name)
    }

    fn default_directives(&self, settings: &Settings) -> Vec<(String, String)> {
        FixedLength.default_directives(settings)
    }

    fn adjust_layout(&self, layout: &mut LayoutDefinition, fragments: &[DataFileFragment]) -> Result<(), LayoutError> {
        FixedLength.adjust_layout(layout, fragments)
    }
}

impl FileKind for VariableLength {
    fn file_type(&self) -> &'static str {
        VARIABLE_FILE_TYPE
    }

    fn new_fragment(&self) -> DataFileFragment {
        DataFileFragment::new(FragmentShape::Variable)
    }

    fn resolve_directive(&self, name: &str) -> Option<Directive> {
        find_directive(VARIABLE_DIRECTIVES, name)
    }

    fn convert_directive_value(&self, directive: Directive, raw: &str) -> Result<DirectiveValue, LayoutError> {
        match directive {
            Directive::FieldSeparator if raw == "\\t" => Ok(DirectiveValue::Text("\t".to_string())),
            Directive::FieldSeparator | Directive::QuotingDelimiter => {
                if raw.chars().count() != 1 {
                    return Err(LayoutError::Config(format!(
                        "{} must be a single character. value=[{}]",
                        directive, raw
                    )));
                }
                Ok(DirectiveValue::Text(raw.to_string()))
            }
            _ => convert_common(directive, raw),
        }
    }

    fn default_directives(&self, settings: &Settings) -> Vec<(String, String)> {
        let mut out = vec![(Directive::FieldSeparator.name().to_string(), ",".to_string())];
        out.extend(seeds(&settings.variable_length_directives));
        out
    }
}

fn find_directive(vocabulary: &[Directive], name: &str) -> Option<Directive> {
    vocabulary.iter().copied().find(|d| d.name() == name)
}

fn seeds(map: &std::collections::BTreeMap<String, String>) -> Vec<(String, String)> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn convert_common(directive: Directive, raw: &str) -> Result<DirectiveValue, LayoutError> {
    match directive {
        Directive::RecordSeparator => Ok(DirectiveValue::Text(LineSeparator::evaluate(raw))),
        Directive::TextEncoding => Encoding::for_label(raw.as_bytes())
            .map(DirectiveValue::Encoding)
            .ok_or_else(|| LayoutError::Config(format!("unsupported text-encoding [{}]", raw))),
        Directive::RecordLength => raw
            .parse::<usize>()
            .map(DirectiveValue::Int)
            .map_err(|_| LayoutError::Config(format!("record-length must be a number. value=[{}]", raw))),
        Directive::IgnoreBlankLines => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(DirectiveValue::Bool(true)),
            "false" => Ok(DirectiveValue::Bool(false)),
            _ => Err(LayoutError::Config(format!(
                "ignore-blank-lines must be true or false. value=[{}]",
                raw
            ))),
        },
        _ => Ok(DirectiveValue::Text(raw.to_string())),
    }
}

/// Record length shared by every fragment; differing lengths are an error.
fn shared_record_length(fragments: &[DataFileFragment]) -> Result<usize, LayoutError> {
    let mut lengths = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        lengths.push((fragment.record_type(), fragment.record_length()?));
    }
    let first = lengths.first().map(|(_, l)| *l).unwrap_or(0);
    if lengths.iter().any(|(_, l)| *l != first) {
        let detail: Vec<String> = lengths
            .iter()
            .map(|(t, l)| format!("{}={}", t, l))
            .collect();
        return Err(LayoutError::State(format!(
            "record-length differs. [{}]",
            detail.join(", ")
        )));
    }
    Ok(first)
}

/// What a fragment needs from the file it belongs to.
#[derive(Debug)]
pub struct FileContext {
    path: String,
    directives: Directives,
    settings: Arc<Settings>,
}

impl FileContext {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Mutable access to one fragment alongside its file's context.
pub struct FragmentEditor<'a> {
    context: &'a FileContext,
    fragment: &'a mut DataFileFragment,
}

impl<'a> FragmentEditor<'a> {
    pub fn set_record_type(&mut self, record_type: impl Into<String>) -> &mut Self {
        self.fragment.set_record_type(record_type);
        self
    }

    pub fn set_names<S: AsRef<str>>(&mut self, names: &[S]) -> Result<&mut Self, LayoutError> {
        self.fragment.set_names(self.context, owned(names))?;
        Ok(self)
    }

    pub fn set_types<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<&mut Self, LayoutError> {
        self.fragment.set_types(self.context, owned(labels))?;
        Ok(self)
    }

    pub fn set_lengths<S: AsRef<str>>(&mut self, lengths: &[S]) -> Result<&mut Self, LayoutError> {
        self.fragment.set_lengths(owned(lengths))?;
        Ok(self)
    }

    pub fn add_row<S: AsRef<str>>(&mut self, cells: &[S]) -> &mut Self {
        self.fragment.add_row(self.context, &owned(cells));
        self
    }

    pub fn add_row_with_id<S: AsRef<str>>(&mut self, id: &str, cells: &[S]) -> &mut Self {
        self.fragment.add_row_with_id(self.context, id, &owned(cells));
        self
    }
}

impl Deref for FragmentEditor<'_> {
    type Target = DataFileFragment;

    fn deref(&self) -> &DataFileFragment {
        self.fragment
    }
}

fn owned<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items.iter().map(|s| s.as_ref().to_string()).collect()
}

#[derive(Debug)]
pub struct DataFile {
    kind: Box<dyn FileKind>,
    context: FileContext,
    fragments: Vec<DataFileFragment>,
}

impl DataFile {
    /// Create a file and seed its directives: generic defaults, `file-type`, then the variant's defaults.
    pub fn new(kind: Box<dyn FileKind>, path: impl Into<String>, settings: Arc<Settings>) -> Result<Self, LayoutError> {
        let generic = seeds(&settings.default_directives);
        let specific = kind.default_directives(&settings);
        let file_type = kind.file_type();
        let mut file = DataFile {
            kind,
            context: FileContext {
                path: path.into(),
                directives: Directives::default(),
                settings,
            },
            fragments: Vec::new(),
        };
        for (name, value) in &generic {
            file.set_directive(name, value)?;
        }
        file.set_directive(Directive::FileType.name(), file_type)?;
        for (name, value) in &specific {
            file.set_directive(name, value)?;
        }
        Ok(file)
    }

    pub fn fixed_length(path: impl Into<String>, settings: Arc<Settings>) -> Result<Self, LayoutError> {
        Self::new(Box::new(FixedLength), path, settings)
    }

    pub fn variable_length(path: impl Into<String>, settings: Arc<Settings>) -> Result<Self, LayoutError> {
        Self::new(Box::new(VariableLength), path, settings)
    }

    pub fn mock_messages(path: impl Into<String>, settings: Arc<Settings>) -> Result<Self, LayoutError> {
        Self::new(Box::new(MockMessages), path, settings)
    }

    pub fn path(&self) -> &str {
        self.context.path()
    }

    pub fn kind(&self) -> &dyn FileKind {
        self.kind.as_ref()
    }

    pub fn directives(&self) -> &Directives {
        self.context.directives()
    }

    pub fn context(&self) -> &FileContext {
        &self.context
    }

    /// Set a directive by name; names outside the variant's vocabulary are rejected.
    pub fn set_directive(&mut self, name: &str, value: &str) -> Result<(), LayoutError> {
        let directive = self
            .kind
            .resolve_directive(name)
            .ok_or_else(|| LayoutError::Config(format!("invalid directive found. [{}]", name)))?;
        let converted = self.kind.convert_directive_value(directive, value.trim())?;
        self.context.directives.insert(directive, converted);
        Ok(())
    }

    /// Append an empty fragment and return an editor for it.
    pub fn new_fragment(&mut self) -> FragmentEditor<'_> {
        let index = self.fragments.len();
        self.fragments.push(self.kind.new_fragment());
        FragmentEditor {
            context: &self.context,
            fragment: &mut self.fragments[index],
        }
    }

    pub fn fragment_mut(&mut self, index: usize) -> Option<FragmentEditor<'_>> {
        let fragment = self.fragments.get_mut(index)?;
        Some(FragmentEditor {
            context: &self.context,
            fragment,
        })
    }

    pub fn fragments(&self) -> &[DataFileFragment] {
        &self.fragments
    }

    /// Layout holding every fragment's record definition.
    pub fn create_layout(&self) -> Result<LayoutDefinition, LayoutError> {
        let mut layout = LayoutDefinition::new(self.context.directives.clone());
        for fragment in &self.fragments {
            layout.add_record(fragment.record_definition(&self.context)?);
        }
        self.kind.adjust_layout(&mut layout, &self.fragments)?;
        Ok(layout)
    }

    /// Layout holding only the record definition of fragment `index`.
    pub fn single_fragment_layout(&self, index: usize) -> Result<LayoutDefinition, LayoutError> {
        let fragment = self
            .fragments
            .get(index)
            .ok_or_else(|| LayoutError::State(format!("no fragment at index {}. file=[{}]", index, self.path())))?;
        let mut layout = LayoutDefinition::new(self.context.directives.clone());
        layout.add_record(fragment.record_definition(&self.context)?);
        self.kind.adjust_layout(&mut layout, &self.fragments)?;
        Ok(layout)
    }

    /// Write every row of every fragment, in declaration order, to the file's path.
    pub fn write(&self) -> Result<(), LayoutError> {
        let layout = self.create_layout()?;
        let result = self.write_records(layout);
        if let Err(e) = &result {
            debug!("exception occurred in writing file. file=[{}] cause={}", self.path(), e);
        }
        result
    }

    fn write_records(&self, layout: LayoutDefinition) -> Result<(), LayoutError> {
        let mut writer = RecordWriter::create(Path::new(self.path()), layout).map_err(|e| self.codec_failure(e))?;
        for fragment in &self.fragments {
            for row in fragment.rows() {
                if let Some(mode) = row.error_mode {
                    debug!(
                        "skip error row. file=[{}] row=[{}] mode=[{}]",
                        self.path(),
                        row.number.as_deref().unwrap_or(""),
                        mode.value()
                    );
                    continue;
                }
                let values = fragment.convert_row(&self.context, row)?;
                writer
                    .write(fragment.record_type(), &values)
                    .map_err(|e| self.codec_failure(e))?;
            }
        }
        writer.finish().map_err(|e| self.codec_failure(e))
    }

    /// Read the file back, one fragment's shape at a time.
    pub fn read(&self) -> Result<Vec<DataRecord>, LayoutError> {
        let file = File::open(self.path()).map_err(|e| LayoutError::io(self.path(), e))?;
        self.read_from(file)
    }

    /// Read records from `input`. Each fragment consumes as many records as it
    /// declares rows; the last one reads to the end. A fragment that finds no
    /// record at all ends the read.
    pub fn read_from<R: Read>(&self, input: R) -> Result<Vec<DataRecord>, LayoutError> {
        let mut result = Vec::new();
        if self.fragments.is_empty() {
            return Ok(result);
        }
        let mut reader = RecordReader::new(input, self.single_fragment_layout(0)?).map_err(|e| self.codec_failure(e))?;
        let last = self.fragments.len() - 1;
        for (index, fragment) in self.fragments.iter().enumerate() {
            if index > 0 {
                reader
                    .rebind(self.single_fragment_layout(index)?)
                    .map_err(|e| self.codec_failure(e))?;
            }
            match self.read_fragment(&mut reader, fragment.number_of_records(), index == last)? {
                Some(records) => result.extend(records),
                None => {
                    debug!(
                        "no more records. file=[{}] record type=[{}]",
                        self.path(),
                        fragment.record_type()
                    );
                    break;
                }
            }
        }
        Ok(result)
    }

    fn read_fragment<R: Read>(
        &self,
        reader: &mut RecordReader<R>,
        quota: usize,
        read_til_eof: bool,
    ) -> Result<Option<Vec<DataRecord>>, LayoutError> {
        let mut records = Vec::new();
        if quota == 0 && !read_til_eof {
            return Ok(Some(records));
        }
        while read_til_eof || records.len() < quota {
            match reader.read_record().map_err(|e| self.codec_failure(e))? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        Ok(if records.is_empty() { None } else { Some(records) })
    }

    /// Declared rows of every fragment as records comparable with [`read`](Self::read).
    pub fn expected_records(&self) -> Result<Vec<DataRecord>, LayoutError> {
        let mut out = Vec::new();
        for fragment in &self.fragments {
            out.extend(fragment.expected_records(&self.context)?);
        }
        Ok(out)
    }

    fn codec_failure(&self, e: CodecError) -> LayoutError {
        match e {
            CodecError::Io(source) => LayoutError::io(self.path(), source),
            other => LayoutError::Codec(other),
        }
    }
}

impl fmt::Display for DataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}File{{path={}, directives={{", self.kind.file_type(), self.path())?;
        for (i, (d, v)) in self.context.directives.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", d, v)?;
        }
        f.write_str("}, fragments=[")?;
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", fragment)?;
        }
        f.write_str("]}")
    }
}
