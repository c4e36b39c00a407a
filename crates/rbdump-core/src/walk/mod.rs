//! Recycle bin enumeration
//!
//! A recycle bin folder holds pairs of entries: `$Ixxxxxx` index files
//! and `$Rxxxxxx` data entries. The dump lists every index file, reports
//! its data partner and, for deleted folders, every file and folder below
//! it. Rows under a deleted folder repeat the folder's provenance columns.
//!
//! Folders are walked depth first in pre-order (a folder's row comes
//! before its contents) with an explicit stack of open listings, so
//! nesting depth does not consume call stack.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

mod handler;
pub mod pairing;

pub use handler::{
    DescendantHandler, EntryHandler, EntryRef, IndexFileHandler, Visit, WalkContext,
};
pub use pairing::{paired_data_file_name, paired_data_name};

use crate::config::DumpConfig;
use crate::error::{ReportError, Result};
use crate::fs::{FileSystem, Listing, NamePattern};
use crate::report::{RowAssembler, RowSink, HEADER_COLUMNS};

/// Name prefix of the per-user folders inside `$Recycle.Bin`
pub const PROFILE_PREFIX: &str = "S-1-";

/// Counters for one or more dumped roots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpStats {
    /// `$I` files found
    pub index_files: usize,
    pub records_decoded: usize,
    /// Index files that could not be read or decoded
    pub records_skipped: usize,
    /// Decoded records whose data entry is gone
    pub missing_data: usize,
    pub deleted_files: usize,
    pub deleted_folders: usize,
    /// Directory listings opened below deleted folders
    pub folders_walked: usize,
    pub rows_emitted: usize,
    /// Listings or listing entries the host refused
    pub unreadable_entries: usize,
    pub cycles_skipped: usize,
}

impl DumpStats {
    pub fn merge(&mut self, other: &DumpStats) {
        self.index_files += other.index_files;
        self.records_decoded += other.records_decoded;
        self.records_skipped += other.records_skipped;
        self.missing_data += other.missing_data;
        self.deleted_files += other.deleted_files;
        self.deleted_folders += other.deleted_folders;
        self.folders_walked += other.folders_walked;
        self.rows_emitted += other.rows_emitted;
        self.unreadable_entries += other.unreadable_entries;
        self.cycles_skipped += other.cycles_skipped;
    }
}

/// Dumps recycle bin folders into a sink, one header per folder
pub struct Dumper<'a> {
    fs: &'a dyn FileSystem,
    config: &'a DumpConfig,
    row: RowAssembler,
    totals: DumpStats,
}

impl<'a> Dumper<'a> {
    pub fn new(fs: &'a dyn FileSystem, config: &'a DumpConfig) -> Self {
        Self {
            fs,
            config,
            row: RowAssembler::from_config(config),
            totals: DumpStats::default(),
        }
    }

    pub fn write_header(&mut self, sink: &mut dyn RowSink) -> Result<()> {
        let start = self.row.mark();
        let written = match HEADER_COLUMNS
            .iter()
            .try_for_each(|column| self.row.write_field(column))
        {
            Ok(()) => sink.write_header(self.row.row()).map_err(ReportError::from),
            Err(e) => Err(e),
        };
        self.row.rewind(start);
        written
    }

    /// Header, then one row per `$I` file and per entry under deleted folders
    pub fn dump_root(&mut self, root: &Path, sink: &mut dyn RowSink) -> Result<DumpStats> {
        tracing::info!("Dumping recycle bin {}", root.display());
        self.row.clear();
        self.write_header(sink)?;

        let config = self.config;
        let pattern = NamePattern::prefix(config.index_prefix.as_str());
        let mut stats = DumpStats::default();
        let mut ctx = WalkContext {
            fs: self.fs,
            config,
            row: &mut self.row,
            sink,
            stats: &mut stats,
        };
        for_each_entry(&mut ctx, root, &pattern, &mut IndexFileHandler)?;

        self.totals.merge(&stats);
        tracing::info!(
            "{}: {} index files, {} decoded, {} skipped, {} missing data, {} rows",
            root.display(),
            stats.index_files,
            stats.records_decoded,
            stats.records_skipped,
            stats.missing_data,
            stats.rows_emitted
        );
        Ok(stats)
    }

    /// Counters accumulated over every root dumped so far
    pub fn totals(&self) -> &DumpStats {
        &self.totals
    }
}

/// Run `handler` on each entry of `dir` matching `pattern`, without descending.
///
/// The row cursor is rewound to where it stood on entry before each call,
/// so every entry starts from the same prefix.
pub fn for_each_entry(
    ctx: &mut WalkContext<'_>,
    dir: &Path,
    pattern: &NamePattern,
    handler: &mut dyn EntryHandler,
) -> Result<()> {
    let fs = ctx.fs;
    let listing = match fs.list(dir, pattern) {
        Ok(listing) => listing,
        Err(e) => {
            tracing::warn!("Cannot list {}: {}", dir.display(), e);
            ctx.stats.unreadable_entries += 1;
            return Ok(());
        }
    };

    let start = ctx.row.mark();
    for item in listing {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Unreadable entry in {}: {}", dir.display(), e);
                ctx.stats.unreadable_entries += 1;
                continue;
            }
        };

        ctx.row.rewind(start);
        let report_path = PathBuf::from(&entry.file_name);
        handler.handle(
            ctx,
            &EntryRef {
                dir,
                report_path: &report_path,
                entry: &entry,
                depth: 0,
            },
        )?;
    }
    ctx.row.rewind(start);
    Ok(())
}

struct Frame<'a> {
    listing: Listing<'a>,
    /// Relative to the walk root
    report_dir: PathBuf,
    depth: usize,
}

/// Walk everything below `root/start` in pre-order.
///
/// Each directory's entries are handed to `handler` in listing order; a
/// `Visit::Descend` answer for a directory lists it before the next
/// sibling. Report paths are relative to `root` (`$RABC123/sub/file`).
pub fn walk_tree<'a>(
    ctx: &mut WalkContext<'a>,
    root: &Path,
    start: &Path,
    handler: &mut dyn EntryHandler,
) -> Result<()> {
    let fs: &'a dyn FileSystem = ctx.fs;
    let config = ctx.config;
    let prefix = ctx.row.mark();

    let mut visited = HashSet::new();
    if config.guard_cycles {
        if let Some(id) = fs.identity(&root.join(start)) {
            visited.insert(id);
        }
    }

    let mut stack: Vec<Frame<'a>> = Vec::new();
    if let Some(frame) = open_frame(fs, config, ctx.stats, root, start.to_path_buf(), 1) {
        stack.push(frame);
    }

    while let Some(frame) = stack.last_mut() {
        let Some(item) = frame.listing.next() else {
            stack.pop();
            continue;
        };
        let dir = root.join(&frame.report_dir);
        let depth = frame.depth;

        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Unreadable entry in {}: {}", dir.display(), e);
                ctx.stats.unreadable_entries += 1;
                continue;
            }
        };
        if entry.is_hidden && config.skip_hidden {
            tracing::debug!("Skipping hidden {}", dir.join(&entry.file_name).display());
            continue;
        }

        let report_path = frame.report_dir.join(&entry.file_name);
        ctx.row.rewind(prefix);
        let visit = handler.handle(
            ctx,
            &EntryRef {
                dir: &dir,
                report_path: &report_path,
                entry: &entry,
                depth,
            },
        )?;

        if visit != Visit::Descend || !entry.is_directory {
            continue;
        }
        if config.guard_cycles {
            if let Some(id) = fs.identity(&root.join(&report_path)) {
                if !visited.insert(id) {
                    tracing::warn!(
                        "Not descending into {}: directory already visited",
                        root.join(&report_path).display()
                    );
                    ctx.stats.cycles_skipped += 1;
                    continue;
                }
            }
        }
        if let Some(child) = open_frame(fs, config, ctx.stats, root, report_path, depth + 1) {
            stack.push(child);
        }
    }

    ctx.row.rewind(prefix);
    Ok(())
}

fn open_frame<'a>(
    fs: &'a dyn FileSystem,
    config: &DumpConfig,
    stats: &mut DumpStats,
    root: &Path,
    report_dir: PathBuf,
    depth: usize,
) -> Option<Frame<'a>> {
    if config.max_depth.is_some_and(|max| depth > max) {
        tracing::debug!("Not listing {}: depth limit", report_dir.display());
        return None;
    }

    let dir = root.join(&report_dir);
    match fs.list(&dir, &NamePattern::Any) {
        Ok(listing) => {
            stats.folders_walked += 1;
            Some(Frame {
                listing,
                report_dir,
                depth,
            })
        }
        Err(e) => {
            tracing::warn!("Cannot list {}: {}", dir.display(), e);
            stats.unreadable_entries += 1;
            None
        }
    }
}

/// Per-user recycle bins (`S-1-5-21-…`) inside a drive's `$Recycle.Bin`
pub fn discover_profile_bins(fs: &dyn FileSystem, recycle_bin: &Path) -> io::Result<Vec<PathBuf>> {
    let mut bins = Vec::new();
    for entry in fs.list(recycle_bin, &NamePattern::prefix(PROFILE_PREFIX))? {
        let entry = entry?;
        if entry.is_directory {
            bins.push(recycle_bin.join(&entry.file_name));
        }
    }
    Ok(bins)
}
