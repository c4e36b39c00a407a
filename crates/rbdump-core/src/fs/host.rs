//! `std::fs` backed filesystem

use std::ffi::OsString;
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

use super::{entry_file_name, DirIdentity, DirectoryEntry, FileSystem, Listing, NamePattern};
use crate::time::FileTime;

#[cfg(windows)]
const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

/// The local machine's filesystem.
///
/// Entries carry their own timestamps, as `FindFirstFile` reports them. A
/// symbolic link or junction counts as a directory when its target is one
/// (junctions carry `FILE_ATTRIBUTE_DIRECTORY`), so the walk enters it;
/// links always report size 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFileSystem;

impl FileSystem for HostFileSystem {
    fn list(&self, dir: &Path, pattern: &NamePattern) -> io::Result<Listing<'_>> {
        // collected up front so the directory handle is closed before any row is written
        let entries: Vec<io::Result<DirectoryEntry>> = fs::read_dir(dir)?
            .filter_map(|item| {
                let item = match item {
                    Ok(item) => item,
                    Err(e) => return Some(Err(e)),
                };
                let file_name = item.file_name();
                if !pattern.matches(&file_name.to_string_lossy()) {
                    return None;
                }
                Some(
                    item.metadata()
                        .map(|meta| describe(&item.path(), file_name, &meta)),
                )
            })
            .collect();

        Ok(Box::new(entries.into_iter()))
    }

    fn stat(&self, path: &Path) -> io::Result<Option<DirectoryEntry>> {
        match fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(describe(path, entry_file_name(path), &meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn identity(&self, path: &Path) -> Option<DirIdentity> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let meta = fs::metadata(path).ok()?;
            Some(DirIdentity::Inode {
                device: meta.dev(),
                inode: meta.ino(),
            })
        }
        #[cfg(not(unix))]
        {
            fs::canonicalize(path).ok().map(DirIdentity::Path)
        }
    }
}

/// `own` is the entry's metadata without following links
fn describe(path: &Path, file_name: OsString, own: &Metadata) -> DirectoryEntry {
    let is_link = own.file_type().is_symlink();
    let is_directory = if is_link {
        // dangling or unreadable targets are reported as plain entries
        fs::metadata(path).is_ok_and(|target| target.is_dir())
    } else {
        own.is_dir()
    };

    DirectoryEntry {
        name: file_name.to_string_lossy().into_owned(),
        file_name,
        is_directory,
        is_hidden: is_hidden(own),
        size: if is_directory || is_link { 0 } else { own.len() },
        created_at: own.created().ok().and_then(FileTime::from_system_time),
        modified_at: own.modified().ok().and_then(FileTime::from_system_time),
        accessed_at: own.accessed().ok().and_then(FileTime::from_system_time),
    }
}

#[cfg(windows)]
fn is_hidden(meta: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn is_hidden(_meta: &Metadata) -> bool {
    false
}
