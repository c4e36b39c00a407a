//! Per-entry handlers
//!
//! The walk drivers in the parent module list directories; what happens
//! to each listed entry is decided by an [`EntryHandler`]. Top-level
//! `$I` files go through [`IndexFileHandler`], everything found inside a
//! deleted folder through [`DescendantHandler`].

use std::path::{Path, PathBuf};

use super::{walk_tree, DumpStats};
use crate::config::{DecodePolicy, DumpConfig};
use crate::error::Result;
use crate::fs::{DirectoryEntry, FileSystem};
use crate::record::{read_index_file, DecodeError, DeletionRecord, IndexReadError};
use crate::report::{RowAssembler, RowSink, MISSING_SENTINEL};
use crate::walk::pairing::paired_data_file_name;

/// State shared by every handler during one dump
pub struct WalkContext<'a> {
    pub fs: &'a dyn FileSystem,
    pub config: &'a DumpConfig,
    pub row: &'a mut RowAssembler,
    pub sink: &'a mut dyn RowSink,
    pub stats: &'a mut DumpStats,
}

impl WalkContext<'_> {
    /// Flush the current row and count it
    pub fn emit(&mut self) -> Result<()> {
        self.row.flush(&mut *self.sink)?;
        self.stats.rows_emitted += 1;
        Ok(())
    }
}

/// One listed entry as seen by a handler
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'e> {
    /// Directory the entry was listed from
    pub dir: &'e Path,
    /// Path written to the report, relative to the dumped root
    pub report_path: &'e Path,
    pub entry: &'e DirectoryEntry,
    /// 0 for the recycle bin itself, 1 for the direct children of a deleted folder
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    /// List this directory before moving on to its siblings
    Descend,
}

pub trait EntryHandler {
    fn handle(&mut self, ctx: &mut WalkContext<'_>, item: &EntryRef<'_>) -> Result<Visit>;
}

impl<F> EntryHandler for F
where
    F: FnMut(&mut WalkContext<'_>, &EntryRef<'_>) -> Result<Visit>,
{
    fn handle(&mut self, ctx: &mut WalkContext<'_>, item: &EntryRef<'_>) -> Result<Visit> {
        self(ctx, item)
    }
}

/// Decodes a `$I` file, reports its `$R` partner and walks deleted folders
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexFileHandler;

impl EntryHandler for IndexFileHandler {
    fn handle(&mut self, ctx: &mut WalkContext<'_>, item: &EntryRef<'_>) -> Result<Visit> {
        let entry = item.entry;
        if entry.is_directory {
            tracing::debug!("Ignoring directory {} named like an index file", entry.name);
            return Ok(Visit::Continue);
        }
        ctx.stats.index_files += 1;

        let index_path = item.dir.join(&entry.file_name);
        match read_index_file(ctx.fs, &index_path).and_then(require_path) {
            Ok(record) => {
                ctx.stats.records_decoded += 1;
                tracing::debug!(
                    "{} -> {} (v{}, {} bytes)",
                    entry.name,
                    record.report_path(),
                    record.format_version,
                    record.original_size
                );
                ctx.row.write_field(record.report_path())?;
                ctx.row.write_display(record.deleted_at)?;
                ctx.row.write_display(record.original_size)?;
            }
            Err(e) => {
                ctx.stats.records_skipped += 1;
                tracing::warn!("Skipping {}: {}", index_path.display(), e);
                match ctx.config.decode_policy {
                    DecodePolicy::Skip => return Ok(Visit::Continue),
                    DecodePolicy::EmitBlank => ctx.row.write_empty(3)?,
                }
            }
        }
        write_entry_columns(ctx.row, &entry.name, entry)?;

        // everything written so far is repeated on each row under a deleted folder
        let prefix = ctx.row.mark();

        let data = paired_data_file_name(&entry.file_name, ctx.config.data_marker)
            .map(PathBuf::from)
            .and_then(|name| lookup(ctx, &item.dir.join(&name)).map(|data| (name, data)));

        match data {
            Some((name, data)) => {
                write_entry_columns(ctx.row, &name.to_string_lossy(), &data)?;
                ctx.row.write_display(data.size)?;
                ctx.emit()?;

                if data.is_directory {
                    ctx.stats.deleted_folders += 1;
                    ctx.row.rewind(prefix);
                    walk_tree(ctx, item.dir, &name, &mut DescendantHandler)?;
                } else {
                    ctx.stats.deleted_files += 1;
                }
            }
            None => {
                ctx.stats.missing_data += 1;
                tracing::debug!("No data entry paired with {}", entry.name);
                ctx.row.write_field(MISSING_SENTINEL)?;
                ctx.row.write_empty(4)?;
                ctx.emit()?;
            }
        }

        Ok(Visit::Continue)
    }
}

/// Reports an entry inside a deleted folder under the inherited prefix
#[derive(Debug, Default, Clone, Copy)]
pub struct DescendantHandler;

impl EntryHandler for DescendantHandler {
    fn handle(&mut self, ctx: &mut WalkContext<'_>, item: &EntryRef<'_>) -> Result<Visit> {
        let entry = item.entry;
        write_entry_columns(ctx.row, &item.report_path.display().to_string(), entry)?;
        ctx.row.write_display(entry.size)?;
        ctx.emit()?;

        Ok(if entry.is_directory {
            Visit::Descend
        } else {
            Visit::Continue
        })
    }
}

/// Name or path, then created / modified / accessed
fn write_entry_columns(row: &mut RowAssembler, name: &str, entry: &DirectoryEntry) -> Result<()> {
    row.write_field(name)?;
    row.write_optional(entry.created_at)?;
    row.write_optional(entry.modified_at)?;
    row.write_optional(entry.accessed_at)
}

/// A path made only of NULs decodes but names nothing
fn require_path(record: DeletionRecord) -> std::result::Result<DeletionRecord, IndexReadError> {
    if record.report_path().is_empty() {
        return Err(DecodeError::EmptyName.into());
    }
    Ok(record)
}

fn lookup(ctx: &WalkContext<'_>, path: &Path) -> Option<DirectoryEntry> {
    match ctx.fs.stat(path) {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!("Cannot query {}: {}", path.display(), e);
            None
        }
    }
}
