//! Report rows
//!
//! A row is assembled field by field in a bounded buffer. Because every
//! row under a deleted folder starts with the same provenance columns,
//! the buffer supports [`RowAssembler::mark`] and [`RowAssembler::rewind`]
//! so the prefix is written once and the tail rewritten per row.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::Display;

pub mod sink;

pub use sink::{CollectSink, CsvSink, JsonLinesSink, OutputEncoding, Row, RowSink};

use crate::config::DumpConfig;
use crate::error::{ReportError, Result};

pub const DEFAULT_ROW_CAPACITY: usize = 2 * 1024;

pub const COLUMN_COUNT: usize = 12;

/// Original path, deletion time/size and the `$I` file's own attributes
pub const PROVENANCE_COLUMNS: usize = 7;

/// Written in the data name column when the `$R` entry is gone
pub const MISSING_SENTINEL: &str = "Missing";

pub const HEADER_COLUMNS: [&str; COLUMN_COUNT] = [
    "Original Full Path",
    "Deleted Date Time",
    "Deleted File Size",
    "Recycle Info File",
    "Recycle Info Created",
    "Recycle Info Last Modified",
    "Recycle Info Last Accessed",
    "Original File",
    "Original File Created",
    "Original File Last Modified",
    "Original File Last Accessed",
    "Original File Size",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotePolicy {
    /// Write values verbatim; a separator inside a path shifts the columns
    Never,
    /// Quote values containing the separator, quotes or line breaks
    Rfc4180,
}

impl QuotePolicy {
    pub fn render<'a>(&self, value: &'a str, separator: char) -> Cow<'a, str> {
        match self {
            QuotePolicy::Never => Cow::Borrowed(value),
            QuotePolicy::Rfc4180 => {
                let needs_quotes = value
                    .chars()
                    .any(|c| c == separator || c == '"' || c == '\n' || c == '\r');
                if needs_quotes {
                    Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
                } else {
                    Cow::Borrowed(value)
                }
            }
        }
    }
}

/// Saved cursor position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMark {
    bytes: usize,
    chars: usize,
    fields: usize,
}

/// The row under construction.
///
/// `text` holds the rendered line, `fields` the raw values for sinks that
/// want structure.
#[derive(Debug)]
pub struct RowAssembler {
    text: String,
    chars: usize,
    fields: Vec<String>,
    capacity: usize,
    separator: char,
    quote_policy: QuotePolicy,
}

impl RowAssembler {
    pub fn new(capacity: usize, separator: char, quote_policy: QuotePolicy) -> Self {
        Self {
            text: String::with_capacity(capacity),
            chars: 0,
            fields: Vec::with_capacity(COLUMN_COUNT),
            capacity,
            separator,
            quote_policy,
        }
    }

    pub fn from_config(config: &DumpConfig) -> Self {
        Self::new(config.row_capacity, config.separator, config.quote_policy)
    }

    /// Append a value followed by the separator
    pub fn write_field(&mut self, value: &str) -> Result<()> {
        let rendered = self.quote_policy.render(value, self.separator);
        let needed = self.chars + rendered.chars().count() + 1;
        if needed > self.capacity {
            return Err(ReportError::RowOverflow {
                capacity: self.capacity,
                needed,
            });
        }

        self.text.push_str(&rendered);
        self.text.push(self.separator);
        self.chars = needed;
        self.fields.push(value.to_string());
        Ok(())
    }

    pub fn write_display(&mut self, value: impl Display) -> Result<()> {
        self.write_field(&value.to_string())
    }

    /// Optional values render as an empty field
    pub fn write_optional(&mut self, value: Option<impl Display>) -> Result<()> {
        match value {
            Some(value) => self.write_display(value),
            None => self.write_field(""),
        }
    }

    pub fn write_empty(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.write_field("")?;
        }
        Ok(())
    }

    /// Drop everything written so far
    pub fn clear(&mut self) {
        self.text.clear();
        self.chars = 0;
        self.fields.clear();
    }

    pub fn mark(&self) -> RowMark {
        RowMark {
            bytes: self.text.len(),
            chars: self.chars,
            fields: self.fields.len(),
        }
    }

    /// Return to a position captured by [`mark`](Self::mark) on this row.
    ///
    /// A mark is only meaningful on the assembler and row that produced
    /// it. One that lies ahead of the cursor (taken before a
    /// [`clear`](Self::clear) or on another assembler) leaves the row untouched.
    pub fn rewind(&mut self, mark: RowMark) {
        if mark.bytes > self.text.len()
            || mark.fields > self.fields.len()
            || !self.text.is_char_boundary(mark.bytes)
        {
            tracing::warn!("Ignoring a row mark ahead of the cursor");
            return;
        }
        self.text.truncate(mark.bytes);
        self.chars = mark.chars;
        self.fields.truncate(mark.fields);
    }

    /// Emit the row as it stands; the cursor is left where it is
    pub fn flush(&self, sink: &mut dyn RowSink) -> Result<()> {
        sink.write_row(self.row())?;
        Ok(())
    }

    pub fn row(&self) -> Row<'_> {
        Row {
            line: &self.text,
            fields: &self.fields,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.chars
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One report line with named columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub original_path: String,
    pub deleted_at: String,
    pub deleted_size: String,
    pub index_file_name: String,
    pub index_created: String,
    pub index_modified: String,
    pub index_accessed: String,
    pub data_file_name_or_path: String,
    pub data_created: String,
    pub data_modified: String,
    pub data_accessed: String,
    pub data_size: String,
}

impl OutputRow {
    /// Build from raw values in column order; `None` unless exactly 12 are given
    pub fn from_fields(fields: &[String]) -> Option<Self> {
        let [
            original_path,
            deleted_at,
            deleted_size,
            index_file_name,
            index_created,
            index_modified,
            index_accessed,
            data_file_name_or_path,
            data_created,
            data_modified,
            data_accessed,
            data_size,
        ] = fields
        else {
            return None;
        };

        Some(OutputRow {
            original_path: original_path.clone(),
            deleted_at: deleted_at.clone(),
            deleted_size: deleted_size.clone(),
            index_file_name: index_file_name.clone(),
            index_created: index_created.clone(),
            index_modified: index_modified.clone(),
            index_accessed: index_accessed.clone(),
            data_file_name_or_path: data_file_name_or_path.clone(),
            data_created: data_created.clone(),
            data_modified: data_modified.clone(),
            data_accessed: data_accessed.clone(),
            data_size: data_size.clone(),
        })
    }

    /// The columns shared by a deleted folder and everything under it
    pub fn provenance(&self) -> [&str; PROVENANCE_COLUMNS] {
        [
            self.original_path.as_str(),
            self.deleted_at.as_str(),
            self.deleted_size.as_str(),
            self.index_file_name.as_str(),
            self.index_created.as_str(),
            self.index_modified.as_str(),
            self.index_accessed.as_str(),
        ]
    }

    pub fn is_missing_data(&self) -> bool {
        self.data_file_name_or_path == MISSING_SENTINEL && self.data_size.is_empty()
    }

    pub fn data_size_bytes(&self) -> Option<u64> {
        self.data_size.parse().ok()
    }
}
