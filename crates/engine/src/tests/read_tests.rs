use super::helpers::*;
use crate::*;
use anyhow::Result;
use segment::{file_path, FileKind};
use tempfile::tempdir;

#[test]
fn get_missing_key_is_not_found() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(dir.path(), Options::default())?;

    let err = db.get(b"nope").unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_corruption());
    assert!(!db.has(b"nope")?);
    Ok(())
}

#[test]
fn reads_span_immutable_and_active_segments() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(dir.path(), tiny_segments())?;

    for i in 0..20u32 {
        db.put(format!("key{i}").as_bytes(), format!("value{i}").as_bytes())?;
    }
    for i in 0..20u32 {
        assert_eq!(
            db.get(format!("key{i}").as_bytes())?,
            format!("value{i}").into_bytes()
        );
    }
    Ok(())
}

// -------------------- Corruption --------------------

#[test]
fn flipped_value_byte_is_a_checksum_error() -> Result<()> {
    let dir = tempdir()?;
    {
        let db = Db::open(dir.path(), Options::default())?;
        db.put(b"other", b"fine")?;
        db.put(b"foo", b"bar")?;
        db.close()?;
    }

    flip_last_byte(&file_path(dir.path(), 0, FileKind::Data));

    let db = Db::open(dir.path(), Options::default())?;
    let err = db.get(b"foo").unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { segment_id: 0, .. }));
    assert!(err.is_corruption());

    // Other keys are unaffected.
    assert_eq!(db.get(b"other")?, b"fine");
    Ok(())
}

// -------------------- Fold --------------------

#[test]
fn fold_visits_every_live_key() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(dir.path(), tiny_segments())?;

    for i in 0..10u32 {
        db.put(format!("k{i}").as_bytes(), b"v")?;
    }
    db.delete(b"k3")?;
    db.put(b"k5", b"again")?;

    let mut keys: Vec<String> = Vec::new();
    db.fold(|k| {
        keys.push(String::from_utf8_lossy(k).into_owned());
        Ok::<(), Error>(())
    })?;
    keys.sort();

    let mut expected: Vec<String> = (0..10).filter(|i| *i != 3).map(|i| format!("k{i}")).collect();
    expected.sort();
    assert_eq!(keys, expected);
    Ok(())
}

#[test]
fn fold_surfaces_first_visitor_error() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(dir.path(), Options::default())?;
    for i in 0..5u32 {
        db.put(format!("k{i}").as_bytes(), b"v")?;
    }

    let mut calls = 0;
    let res: anyhow::Result<()> = db.fold(|_| {
        calls += 1;
        anyhow::bail!("visitor gave up")
    });

    assert_eq!(res.unwrap_err().to_string(), "visitor gave up");
    assert_eq!(calls, 1);
    Ok(())
}

#[test]
fn fold_on_empty_db() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(dir.path(), Options::default())?;
    let mut calls = 0;
    db.fold(|_| {
        calls += 1;
        Ok::<(), Error>(())
    })?;
    assert_eq!(calls, 0);
    Ok(())
}

// -------------------- Accessors --------------------

#[test]
fn stats_and_debug() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(dir.path(), tiny_segments())?;
    db.put(b"a", b"1")?;
    db.put(b"b", b"2")?;

    let stats = db.stats()?;
    assert_eq!(stats.keys, 2);
    assert_eq!(stats.active_segment_id, 1);
    assert_eq!(stats.immutable_segments, 1);
    assert_eq!(stats.merged_segments, 0);
    assert_eq!(stats.max_segment_id, 1);

    let dbg = format!("{:?}", db);
    assert!(dbg.contains("Db"));
    assert!(dbg.contains("keys: 2"));
    assert_eq!(db.path(), dir.path());
    assert_eq!(db.options().max_segment_size, 1);
    Ok(())
}
