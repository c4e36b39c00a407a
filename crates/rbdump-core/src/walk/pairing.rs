//! `$I` → `$R` name pairing

use std::ffi::{OsStr, OsString};

/// Name of the data entry paired with an index file.
///
/// The second character (the index marker) is replaced by `data_marker`,
/// the identifier and extension are kept: `$IW2Q8ZP.txt` → `$RW2Q8ZP.txt`.
/// Returns `None` for names too short to carry a marker.
pub fn paired_data_name(index_name: &str, data_marker: char) -> Option<String> {
    let mut chars = index_name.char_indices();
    let (_, first) = chars.next()?;
    let (marker_at, marker) = chars.next()?;

    let mut paired = String::with_capacity(index_name.len());
    paired.push(first);
    paired.push(data_marker);
    paired.push_str(&index_name[marker_at + marker.len_utf8()..]);
    Some(paired)
}

/// [`paired_data_name`] over the name as the host stores it.
///
/// Names that are not valid Unicode keep their raw identifier; only the
/// marker unit is replaced, which requires the first two units to be ASCII.
pub fn paired_data_file_name(index_name: &OsStr, data_marker: char) -> Option<OsString> {
    match index_name.to_str() {
        Some(name) => paired_data_name(name, data_marker).map(OsString::from),
        None => replace_marker_unit(index_name, data_marker),
    }
}

#[cfg(unix)]
fn replace_marker_unit(index_name: &OsStr, data_marker: char) -> Option<OsString> {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let marker = u8::try_from(data_marker).ok().filter(u8::is_ascii)?;
    let mut bytes = index_name.as_bytes().to_vec();
    let ascii_head = matches!(bytes.get(..2), Some([first, second]) if first.is_ascii() && second.is_ascii());
    if !ascii_head {
        return None;
    }
    bytes[1] = marker;
    Some(OsString::from_vec(bytes))
}

#[cfg(windows)]
fn replace_marker_unit(index_name: &OsStr, data_marker: char) -> Option<OsString> {
    use std::os::windows::ffi::{OsStrExt, OsStringExt};

    let marker = u8::try_from(data_marker).ok().filter(u8::is_ascii)?;
    let mut units: Vec<u16> = index_name.encode_wide().collect();
    let ascii_head = matches!(units.get(..2), Some([first, second]) if *first < 0x80 && *second < 0x80);
    if !ascii_head {
        return None;
    }
    units[1] = u16::from(marker);
    Some(OsString::from_wide(&units))
}

#[cfg(not(any(unix, windows)))]
fn replace_marker_unit(_index_name: &OsStr, _data_marker: char) -> Option<OsString> {
    None
}
