//! End-to-end dumps of recycle bins laid out on the local disk

use rbdump_core::{
    discover_profile_bins, dump_recycle_bin, dump_recycle_bins, encode, CollectSink, CsvSink,
    DeletionRecord, DumpConfig, FileTime, HostFileSystem, JsonLinesSink, OutputEncoding,
    OutputRow,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_index(dir: &Path, name: &str, original: &str, size: u64) {
    let bytes = encode(&DeletionRecord {
        format_version: 2,
        original_size: size,
        deleted_at: FileTime::from_ticks(133_000_000_000_000_000),
        original_path: original.to_string(),
    });
    fs::write(dir.join(name), bytes).unwrap();
}

/// One deleted file, one deleted folder with a nested folder, one orphan index
fn sample_bin() -> TempDir {
    let temp = TempDir::new().unwrap();
    let bin = temp.path();

    write_index(bin, "$IAAAAAA.txt", "C:\\Users\\bob\\notes.txt", 11);
    fs::write(bin.join("$RAAAAAA.txt"), b"hello world").unwrap();

    write_index(bin, "$IBBBBBB", "C:\\Users\\bob\\photos", 30);
    fs::create_dir_all(bin.join("$RBBBBBB").join("2019")).unwrap();
    fs::write(bin.join("$RBBBBBB").join("cover.jpg"), vec![0u8; 10]).unwrap();
    fs::write(bin.join("$RBBBBBB").join("2019").join("beach.jpg"), vec![0u8; 20]).unwrap();

    write_index(bin, "$ICCCCCC.doc", "C:\\Users\\bob\\gone.doc", 5);

    fs::write(bin.join("desktop.ini"), b"[.ShellClassInfo]").unwrap();
    temp
}

fn rows_by_data_name(rows: &[OutputRow]) -> Vec<(String, String)> {
    let mut named: Vec<_> = rows
        .iter()
        .map(|r| (r.data_file_name_or_path.clone(), r.data_size.clone()))
        .collect();
    named.sort();
    named
}

#[test]
fn test_dump_local_bin() {
    let temp = sample_bin();
    let mut sink = CollectSink::new();

    let stats = dump_recycle_bin(temp.path(), &DumpConfig::default(), &mut sink).unwrap();

    assert_eq!(stats.index_files, 3);
    assert_eq!(stats.deleted_files, 1);
    assert_eq!(stats.deleted_folders, 1);
    assert_eq!(stats.missing_data, 1);
    assert_eq!(stats.rows_emitted, 6);
    assert_eq!(sink.headers, 1);

    let nested = Path::new("$RBBBBBB").join("2019");
    let mut expected = vec![
        ("$RAAAAAA.txt".to_string(), "11".to_string()),
        ("$RBBBBBB".to_string(), "0".to_string()),
        (nested.display().to_string(), "0".to_string()),
        (nested.join("beach.jpg").display().to_string(), "20".to_string()),
        (Path::new("$RBBBBBB").join("cover.jpg").display().to_string(), "10".to_string()),
        ("Missing".to_string(), String::new()),
    ];
    expected.sort();
    assert_eq!(rows_by_data_name(&sink.rows), expected);

    // the folder and its contents share the index columns
    let folder_rows: Vec<_> = sink
        .rows
        .iter()
        .filter(|r| r.index_file_name == "$IBBBBBB")
        .collect();
    assert_eq!(folder_rows.len(), 4);
    assert!(folder_rows
        .iter()
        .all(|r| r.provenance() == folder_rows[0].provenance()));
    assert!(folder_rows.iter().all(|r| !r.index_modified.is_empty()));
    assert!(folder_rows.iter().all(|r| !r.data_modified.is_empty()));
}

#[test]
fn test_csv_report_bytes() {
    let temp = sample_bin();
    let mut sink = CsvSink::new(Vec::new(), OutputEncoding::Utf8);

    dump_recycle_bins(&[temp.path()], &DumpConfig::default(), &mut sink).unwrap();

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 7);
    assert!(lines[0].starts_with("Original Full Path,"));
    assert!(lines.iter().all(|line| line.ends_with(',')));
    assert!(lines
        .iter()
        .any(|line| line.starts_with("C:\\Users\\bob\\notes.txt,") && line.ends_with(",11,")));
}

#[test]
fn test_utf16_report_has_bom() {
    let temp = sample_bin();
    let mut sink = CsvSink::new(Vec::new(), OutputEncoding::Utf16Le);

    dump_recycle_bin(temp.path(), &DumpConfig::default(), &mut sink).unwrap();

    let bytes = sink.into_inner();
    assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
    let units: Vec<u16> = bytes[2..]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let text = String::from_utf16(&units).unwrap();
    assert_eq!(text.matches("\r\n").count(), 7);
    assert!(text.contains("C:\\Users\\bob\\photos,"));
}

#[test]
fn test_json_lines_report() {
    let temp = sample_bin();
    let mut sink = JsonLinesSink::new(Vec::new());

    dump_recycle_bin(temp.path(), &DumpConfig::default(), &mut sink).unwrap();

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let rows: Vec<OutputRow> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows.iter().filter(|r| r.is_missing_data()).count(), 1);
}

#[test]
fn test_multiple_roots_and_profiles() {
    let drive = TempDir::new().unwrap();
    let recycle = drive.path().join("$Recycle.Bin");
    let alice = recycle.join("S-1-5-21-1-1001");
    let bob = recycle.join("S-1-5-21-1-1002");
    fs::create_dir_all(&alice).unwrap();
    fs::create_dir_all(&bob).unwrap();
    fs::write(recycle.join("desktop.ini"), b"").unwrap();

    write_index(&alice, "$I111111", "C:\\a", 1);
    fs::write(alice.join("$R111111"), b"a").unwrap();
    write_index(&bob, "$I222222", "C:\\b", 1);
    fs::write(bob.join("$R222222"), b"b").unwrap();

    let mut bins = discover_profile_bins(&HostFileSystem, &recycle).unwrap();
    bins.sort();
    assert_eq!(bins, vec![alice.clone(), bob.clone()]);

    let mut sink = CollectSink::new();
    let stats = dump_recycle_bins(&bins, &DumpConfig::default(), &mut sink).unwrap();
    assert_eq!(sink.headers, 2);
    assert_eq!(stats.rows_emitted, 2);
    let mut paths: Vec<_> = sink.rows.iter().map(|r| r.original_path.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec!["C:\\a", "C:\\b"]);
}

#[test]
fn test_missing_root_yields_header_only() {
    let temp = TempDir::new().unwrap();
    let absent: PathBuf = temp.path().join("nope");
    let mut sink = CollectSink::new();

    let stats = dump_recycle_bin(&absent, &DumpConfig::default(), &mut sink).unwrap();
    assert_eq!(sink.headers, 1);
    assert!(sink.rows.is_empty());
    assert_eq!(stats.unreadable_entries, 1);
}

#[cfg(unix)]
#[test]
fn test_symlink_loop_with_cycle_guard() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path();
    write_index(bin, "$ILOOP", "C:\\loop", 1);
    let folder = bin.join("$RLOOP");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("f"), b"f").unwrap();
    std::os::unix::fs::symlink(&folder, folder.join("back")).unwrap();

    let config = DumpConfig {
        guard_cycles: true,
        ..Default::default()
    };
    let mut sink = CollectSink::new();
    let stats = dump_recycle_bin(bin, &config, &mut sink).unwrap();

    // the link is reported as a folder but not entered a second time
    assert_eq!(stats.cycles_skipped, 1);
    assert_eq!(stats.rows_emitted, 3);
    let mut expected = vec![
        ("$RLOOP".to_string(), "0".to_string()),
        (Path::new("$RLOOP").join("back").display().to_string(), "0".to_string()),
        (Path::new("$RLOOP").join("f").display().to_string(), "1".to_string()),
    ];
    expected.sort();
    assert_eq!(rows_by_data_name(&sink.rows), expected);
}

#[cfg(unix)]
#[test]
fn test_directory_link_is_walked() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    let other = temp.path().join("other");
    fs::create_dir_all(bin.join("$RX")).unwrap();
    fs::create_dir(&other).unwrap();
    fs::write(other.join("z.txt"), b"zz").unwrap();
    std::os::unix::fs::symlink(&other, bin.join("$RX").join("link")).unwrap();
    write_index(&bin, "$IX", "C:\\x", 2);

    let mut sink = CollectSink::new();
    let stats = dump_recycle_bin(&bin, &DumpConfig::default(), &mut sink).unwrap();

    let link = Path::new("$RX").join("link");
    assert_eq!(
        rows_by_data_name(&sink.rows),
        vec![
            ("$RX".to_string(), "0".to_string()),
            (link.display().to_string(), "0".to_string()),
            (link.join("z.txt").display().to_string(), "2".to_string()),
        ]
    );
    assert_eq!(stats.folders_walked, 2);
    assert_eq!(stats.cycles_skipped, 0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_unicode_names_are_walked() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = TempDir::new().unwrap();
    let bin = temp.path();

    write_index(bin, "$IY", "C:\\y", 3);
    let sub = bin.join("$RY").join(OsStr::from_bytes(b"sub\xff"));
    fs::create_dir_all(&sub).unwrap();
    fs::write(sub.join("inner.txt"), b"abc").unwrap();

    let index = bin.join(OsStr::from_bytes(b"$I\xffQ"));
    fs::write(
        &index,
        encode(&DeletionRecord {
            format_version: 2,
            original_size: 4,
            deleted_at: FileTime::from_ticks(133_000_000_000_000_000),
            original_path: "C:\\odd".to_string(),
        }),
    )
    .unwrap();
    fs::write(bin.join(OsStr::from_bytes(b"$R\xffQ")), b"odd!").unwrap();

    let mut sink = CollectSink::new();
    let stats = dump_recycle_bin(bin, &DumpConfig::default(), &mut sink).unwrap();

    assert_eq!(stats.unreadable_entries, 0);
    assert_eq!(stats.records_skipped, 0);
    assert_eq!(stats.missing_data, 0);
    assert_eq!(stats.rows_emitted, 4);

    let lossy_sub = Path::new("$RY").join("sub\u{FFFD}");
    let mut expected = vec![
        ("$R\u{FFFD}Q".to_string(), "4".to_string()),
        ("$RY".to_string(), "0".to_string()),
        (lossy_sub.display().to_string(), "0".to_string()),
        (lossy_sub.join("inner.txt").display().to_string(), "3".to_string()),
    ];
    expected.sort();
    assert_eq!(rows_by_data_name(&sink.rows), expected);

    let odd = sink
        .rows
        .iter()
        .find(|r| r.original_path == "C:\\odd")
        .unwrap();
    assert_eq!(odd.index_file_name, "$I\u{FFFD}Q");
}
