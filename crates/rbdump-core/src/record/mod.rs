//! `$I` index record parsing
//!
//! Every item moved to the Recycle Bin gets a small `$I` companion file
//! describing where it came from. Two layouts exist, both little-endian:
//!
//! Version 1 (before Windows 10), 544 bytes:
//! - 0x00: u64 version (1)
//! - 0x08: u64 original size in bytes
//! - 0x10: u64 deletion time (FILETIME)
//! - 0x18: 260 UTF-16 units, NUL padded original path
//!
//! Version 2 (Windows 10 and later):
//! - 0x00: u64 version (2)
//! - 0x08: u64 original size in bytes
//! - 0x10: u64 deletion time (FILETIME)
//! - 0x18: u32 path length in UTF-16 units
//! - 0x1C: original path, exactly `length` units

use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::UTF_16LE;
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor};
use std::path::Path;
use thiserror::Error;

use crate::fs::FileSystem;
use crate::time::FileTime;

/// Version tag of the fixed-width layout
pub const FORMAT_LEGACY: u64 = 1;
/// Version tag of the length-prefixed layout
pub const FORMAT_PREFIXED: u64 = 2;

/// version + size + deletion time
pub const HEADER_LEN: usize = 24;
/// Path buffer width of the legacy layout (MAX_PATH)
pub const LEGACY_PATH_UNITS: usize = 260;

const UTF16_UNIT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRecord {
    /// Layout selector; 1 is legacy, anything else is read as length-prefixed
    pub format_version: u64,
    /// Size of the file or folder when it was deleted
    pub original_size: u64,
    pub deleted_at: FileTime,
    /// Absolute location the item was deleted from
    pub original_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("index record truncated in {field}: needed {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("index record has an empty original path")]
    EmptyName,
}

#[derive(Debug, Error)]
pub enum IndexReadError {
    #[error("failed to read index file: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl DeletionRecord {
    pub fn is_legacy(&self) -> bool {
        self.format_version == FORMAT_LEGACY
    }

    /// Path as written to the report.
    ///
    /// Windows counts the terminating NUL in the version 2 length, so the
    /// decoded path usually ends with one; it is dropped here, not in the decoder.
    pub fn report_path(&self) -> &str {
        self.original_path.trim_end_matches('\0')
    }
}

/// Decode one index record from the raw bytes of a `$I` file
pub fn decode(bytes: &[u8]) -> Result<DeletionRecord, DecodeError> {
    let mut cursor = Cursor::new(bytes);

    let format_version = read_u64(&mut cursor, "version")?;
    let original_size = read_u64(&mut cursor, "original size")?;
    let deleted_at = FileTime::from_ticks(read_u64(&mut cursor, "deletion time")?);

    let original_path = if format_version == FORMAT_LEGACY {
        let raw = take(&mut cursor, LEGACY_PATH_UNITS * UTF16_UNIT, "original path")?;
        let end = raw
            .chunks_exact(UTF16_UNIT)
            .position(|unit| unit == [0, 0])
            .map_or(raw.len(), |units| units * UTF16_UNIT);
        decode_utf16(&raw[..end])
    } else {
        let units = read_u32(&mut cursor, "path length")? as usize;
        if units == 0 {
            return Err(DecodeError::EmptyName);
        }
        let needed = units.checked_mul(UTF16_UNIT).ok_or(DecodeError::Truncated {
            field: "original path",
            needed: usize::MAX,
            available: remaining(&cursor),
        })?;
        decode_utf16(take(&mut cursor, needed, "original path")?)
    };

    if original_path.is_empty() {
        return Err(DecodeError::EmptyName);
    }

    Ok(DeletionRecord {
        format_version,
        original_size,
        deleted_at,
        original_path,
    })
}

/// Serialize a record in the layout selected by its version.
///
/// Legacy paths longer than 260 units are cut, shorter ones NUL padded.
pub fn encode(record: &DeletionRecord) -> Vec<u8> {
    let mut units: Vec<u16> = record.original_path.encode_utf16().collect();
    let mut out = Vec::with_capacity(HEADER_LEN + 4 + units.len() * UTF16_UNIT);

    out.extend_from_slice(&record.format_version.to_le_bytes());
    out.extend_from_slice(&record.original_size.to_le_bytes());
    out.extend_from_slice(&record.deleted_at.ticks().to_le_bytes());

    if record.is_legacy() {
        units.resize(LEGACY_PATH_UNITS, 0);
    } else {
        let len = u32::try_from(units.len()).unwrap_or(u32::MAX);
        units.truncate(len as usize);
        out.extend_from_slice(&len.to_le_bytes());
    }

    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Read a `$I` file through the filesystem collaborator and decode it
pub fn read_index_file(
    fs: &dyn FileSystem,
    path: &Path,
) -> Result<DeletionRecord, IndexReadError> {
    let bytes = fs.read(path)?;
    Ok(decode(&bytes)?)
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor
        .get_ref()
        .len()
        .saturating_sub(cursor.position() as usize)
}

fn read_u64(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<u64, DecodeError> {
    let available = remaining(cursor);
    cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| DecodeError::Truncated {
            field,
            needed: 8,
            available,
        })
}

fn read_u32(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<u32, DecodeError> {
    let available = remaining(cursor);
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| DecodeError::Truncated {
            field,
            needed: 4,
            available,
        })
}

fn take<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    needed: usize,
    field: &'static str,
) -> Result<&'a [u8], DecodeError> {
    let available = remaining(cursor);
    if available < needed {
        return Err(DecodeError::Truncated {
            field,
            needed,
            available,
        });
    }
    let start = cursor.position() as usize;
    let data: &'a [u8] = *cursor.get_ref();
    cursor.set_position((start + needed) as u64);
    Ok(&data[start..start + needed])
}

/// UTF-16LE without BOM sniffing; unpaired surrogates become U+FFFD
fn decode_utf16(data: &[u8]) -> String {
    let (text, _had_errors) = UTF_16LE.decode_without_bom_handling(data);
    text.into_owned()
}
