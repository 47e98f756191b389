use crate::*;
use std::path::Path;

#[test]
fn names_are_zero_padded() {
    assert_eq!(file_name(0, FileKind::Data), "0000.datafile");
    assert_eq!(file_name(7, FileKind::MergedData), "0007.datafile.merged");
    assert_eq!(file_name(42, FileKind::Hint), "0042.hintfile");
    assert_eq!(file_name(12345, FileKind::Data), "12345.datafile");
}

#[test]
fn path_joins_directory() {
    let p = file_path(Path::new("/db"), 3, FileKind::Hint);
    assert_eq!(p, Path::new("/db/0003.hintfile"));
}

#[test]
fn parse_roundtrips_every_kind() {
    for kind in [FileKind::Data, FileKind::MergedData, FileKind::Hint] {
        for id in [0u32, 1, 999, 10_000] {
            assert_eq!(parse_file_name(&file_name(id, kind)), Some((id, kind)));
        }
    }
}

#[test]
fn merged_suffix_is_not_mistaken_for_raw() {
    assert_eq!(
        parse_file_name("0005.datafile.merged"),
        Some((5, FileKind::MergedData))
    );
}

#[test]
fn foreign_names_are_ignored() {
    for name in [
        "LOCK",
        "datafile",
        ".datafile",
        "abc.datafile",
        "12a.hintfile",
        "0001.datafile.tmp",
        "0001.sst",
        "-1.datafile",
    ] {
        assert_eq!(parse_file_name(name), None, "{name}");
    }
}

#[test]
fn overflowing_id_is_ignored() {
    assert_eq!(parse_file_name("99999999999.datafile"), None);
}
