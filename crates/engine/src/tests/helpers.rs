use crate::Options;
use segment::{parse_file_name, FileKind};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Options that rotate the active segment before every put after the first.
pub fn tiny_segments() -> Options {
    Options::default().with_max_segment_size(1)
}

/// Segment-related files in `dir`, sorted by id.
pub fn segment_files(dir: &Path) -> Vec<(u32, FileKind)> {
    let mut out: Vec<(u32, FileKind)> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().and_then(parse_file_name))
        .collect();
    out.sort_by_key(|(id, kind)| (*id, kind.suffix()));
    out
}

pub fn count_kind(dir: &Path, kind: FileKind) -> usize {
    segment_files(dir).iter().filter(|(_, k)| *k == kind).count()
}

pub fn append_garbage(path: &Path, bytes: &[u8]) {
    OpenOptions::new()
        .append(true)
        .open(path)
        .unwrap()
        .write_all(bytes)
        .unwrap();
}

pub fn flip_last_byte(path: &Path) {
    let mut data = fs::read(path).unwrap();
    let last = data.len() - 1;
    data[last] ^= 0xFF;
    fs::write(path, data).unwrap();
}
