//! Windows Recycle Bin metadata dumper
//!
//! Reads the `$I` index files of a recycle bin folder, pairs each with its
//! `$R` data entry and reports original path, deletion time and size next
//! to the timestamps of everything that was deleted, including the full
//! contents of deleted folders.

use anyhow::Result;
use std::path::Path;

pub mod config;
pub mod error;
pub mod fs;
pub mod record;
pub mod report;
pub mod time;
pub mod walk;

pub use config::{DecodePolicy, DumpConfig};
pub use error::ReportError;
pub use fs::{DirectoryEntry, FileSystem, HostFileSystem, MemoryFileSystem, NamePattern};
pub use record::{decode, encode, DecodeError, DeletionRecord};
pub use report::{
    CollectSink, CsvSink, JsonLinesSink, OutputEncoding, OutputRow, QuotePolicy, RowAssembler,
    RowSink,
};
pub use time::FileTime;
pub use walk::{discover_profile_bins, DumpStats, Dumper};

/// Dump one recycle bin folder of the local machine into `sink`
pub fn dump_recycle_bin(
    root: &Path,
    config: &DumpConfig,
    sink: &mut dyn RowSink,
) -> Result<DumpStats> {
    let host = HostFileSystem;
    let mut dumper = Dumper::new(&host, config);
    let stats = dumper.dump_root(root, sink)?;
    sink.finish()?;
    Ok(stats)
}

/// Dump several recycle bin folders, one header each, into `sink`
pub fn dump_recycle_bins<P: AsRef<Path>>(
    roots: &[P],
    config: &DumpConfig,
    sink: &mut dyn RowSink,
) -> Result<DumpStats> {
    let host = HostFileSystem;
    let mut dumper = Dumper::new(&host, config);
    for root in roots {
        dumper.dump_root(root.as_ref(), sink)?;
    }
    sink.finish()?;

    let totals = *dumper.totals();
    tracing::info!(
        "Dump complete: {} roots, {} deleted items, {} rows",
        roots.len(),
        totals.records_decoded,
        totals.rows_emitted
    );
    Ok(totals)
}
