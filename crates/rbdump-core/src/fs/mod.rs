//! Filesystem access used by the dumper
//!
//! The engine never touches `std::fs` directly. Everything it needs from
//! the host (listing a directory, querying one entry, reading an index
//! file) goes through the [`FileSystem`] trait so that recycle stores can
//! be walked on a live volume or replayed from an in-memory tree.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

pub mod host;
pub mod memory;

pub use host::HostFileSystem;
pub use memory::MemoryFileSystem;

use crate::time::FileTime;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Name relative to the containing directory as report text, never `.` or `..`
    pub name: String,
    /// The same name as the host stores it; used to build paths
    pub file_name: OsString,
    pub is_directory: bool,
    /// Only reported on Windows (FILE_ATTRIBUTE_HIDDEN)
    pub is_hidden: bool,
    /// Byte length for files, 0 for directories and links
    pub size: u64,
    pub created_at: Option<FileTime>,
    pub modified_at: Option<FileTime>,
    pub accessed_at: Option<FileTime>,
}

/// A lazy, single-pass directory listing. Dropping it releases the handle.
pub type Listing<'a> = Box<dyn Iterator<Item = io::Result<DirectoryEntry>> + 'a>;

/// Identity used to detect directories reached twice (junction loops)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirIdentity {
    Inode { device: u64, inode: u64 },
    Path(PathBuf),
}

/// Name filter in the style of `FindFirstFile` wildcards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePattern {
    /// `*`
    Any,
    /// `abc*`, compared ASCII case-insensitively like Windows does
    Prefix(String),
}

impl NamePattern {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        NamePattern::Prefix(prefix.into())
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Prefix(prefix) => name
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
        }
    }
}

/// Host services the dumper depends on
pub trait FileSystem {
    /// List the entries of `dir` whose names match `pattern`
    fn list(&self, dir: &Path, pattern: &NamePattern) -> io::Result<Listing<'_>>;

    /// Attributes of a single entry, `None` if it does not exist
    fn stat(&self, path: &Path) -> io::Result<Option<DirectoryEntry>>;

    /// Whole contents of a file
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Stable identity of a directory, if the host can provide one
    fn identity(&self, path: &Path) -> Option<DirIdentity>;
}

/// Last path component, for entries produced by `stat`
pub(crate) fn entry_file_name(path: &Path) -> OsString {
    path.file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| path.as_os_str().to_os_string())
}

/// Last path component as report text
pub(crate) fn entry_name(path: &Path) -> String {
    entry_file_name(path).to_string_lossy().into_owned()
}
