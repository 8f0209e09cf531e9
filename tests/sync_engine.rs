//! Synchronization scenarios on real directories.

mod common;

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use camino::Utf8PathBuf;

use arbor::backing::{FileBacking, NOT_CANCELED};
use arbor::native::NativeBacking;
use arbor::sync::{SyncAction, SyncEngine, SyncResults};

use common::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn native_root(dir: &tempfile::TempDir) -> Arc<dyn FileBacking> {
    Arc::new(NativeBacking::new(
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
    ))
}

fn run_sync(
    source: &Arc<dyn FileBacking>,
    dest: &Arc<dyn FileBacking>,
) -> Result<SyncResults> {
    let mut engine = SyncEngine::new();
    Ok(engine
        .sync(source, dest, &NOT_CANCELED)?
        .expect("not canceled"))
}

#[test]
fn fresh_copy_then_deletion_counts() -> Result<()> {
    init_logging();
    let src = tempfile::tempdir()?;
    let dst = tempfile::tempdir()?;
    fs::write(src.path().join("a"), "alpha")?;
    fs::create_dir(src.path().join("b"))?;
    fs::write(src.path().join("b/c"), "gamma")?;

    let source = native_root(&src);
    let dest = native_root(&dst);

    let results = run_sync(&source, &dest)?;
    assert_eq!(results.files_added, 2);
    assert_eq!(results.directories_added, 1);
    assert_eq!(results.files_deleted, 0);
    assert_eq!(read_all(&*dest.child_named("a")), "alpha");
    assert_eq!(read_all(&*resolve_child(&dest, "b", "c")), "gamma");

    // Drop b (and b/c) from the source; the re-sync removes both.
    fs::remove_dir_all(src.path().join("b"))?;
    let results = run_sync(&source, &dest)?;
    assert_eq!(results.files_deleted, 1);
    assert_eq!(results.directories_deleted, 1);
    assert_eq!(results.files_added, 0);
    assert!(!dest.child_named("b").stat().exists);
    Ok(())
}

fn resolve_child(
    root: &Arc<dyn FileBacking>,
    a: &str,
    b: &str,
) -> Arc<dyn FileBacking> {
    root.child_named(a).child_named(b)
}

#[test]
fn second_sync_is_idempotent() -> Result<()> {
    init_logging();
    let src = tempfile::tempdir()?;
    let dst = tempfile::tempdir()?;
    fs::write(src.path().join("one"), "1")?;
    fs::create_dir(src.path().join("nest"))?;
    fs::write(src.path().join("nest/two"), "2")?;

    let source = native_root(&src);
    let dest = native_root(&dst);

    run_sync(&source, &dest)?;
    let again = run_sync(&source, &dest)?;
    assert_eq!(again.files_added, 0);
    assert_eq!(again.files_updated, 0);
    assert_eq!(again.files_deleted, 0);
    assert_eq!(again.directories_added, 0);
    assert_eq!(again.directories_deleted, 0);
    Ok(())
}

#[test]
fn matched_mtimes_skip_the_copy_entirely() -> Result<()> {
    init_logging();
    let src = tempfile::tempdir()?;
    let dst = tempfile::tempdir()?;
    fs::write(src.path().join("big"), "payload")?;

    let source = native_root(&src);
    let dest = native_root(&dst);
    run_sync(&source, &dest)?;

    // Instrument the source file: a second sync must not even open it.
    let (counted_file, opens) = CountingBacking::new(source.child_named("big"));
    let mut engine = SyncEngine::new();
    engine
        .sync(&counted_file, &dest.child_named("big"), &NOT_CANCELED)?
        .expect("not canceled");
    assert_eq!(opens.load(std::sync::atomic::Ordering::Relaxed), 0);
    Ok(())
}

#[test]
fn updated_source_files_are_recopied() -> Result<()> {
    init_logging();
    let src = tempfile::tempdir()?;
    let dst = tempfile::tempdir()?;
    fs::write(src.path().join("f"), "old")?;

    let source = native_root(&src);
    let dest = native_root(&dst);
    run_sync(&source, &dest)?;

    fs::write(src.path().join("f"), "newer")?;
    source.child_named("f").set_last_modified(7_777_000);
    let results = run_sync(&source, &dest)?;
    assert_eq!(results.files_updated, 1);
    assert_eq!(results.files_added, 0);
    assert_eq!(read_all(&*dest.child_named("f")), "newer");
    assert_eq!(dest.child_named("f").stat().last_modified, 7_777_000);
    Ok(())
}

#[test]
fn a_file_blocking_a_directory_is_replaced() -> Result<()> {
    init_logging();
    let src = tempfile::tempdir()?;
    let dst = tempfile::tempdir()?;
    fs::create_dir(src.path().join("node"))?;
    fs::write(src.path().join("node/leaf"), "L")?;
    fs::write(dst.path().join("node"), "in the way")?;

    let results = run_sync(&native_root(&src), &native_root(&dst))?;
    assert_eq!(results.files_deleted, 1);
    assert_eq!(results.directories_added, 1);
    assert_eq!(results.files_added, 1);
    Ok(())
}

#[cfg(unix)]
#[test]
fn destination_symlinks_are_left_alone() -> Result<()> {
    init_logging();
    let src = tempfile::tempdir()?;
    let dst = tempfile::tempdir()?;
    fs::write(src.path().join("link"), "regular in source")?;
    fs::write(dst.path().join("target"), "pointed at")?;
    std::os::unix::fs::symlink(dst.path().join("target"), dst.path().join("link"))?;

    let results = run_sync(&native_root(&src), &native_root(&dst))?;
    assert_eq!(results.files_updated, 0);
    let meta = fs::symlink_metadata(dst.path().join("link"))?;
    assert!(meta.file_type().is_symlink(), "symlink survived the sync");
    Ok(())
}

#[test]
fn the_policy_overrides_the_defaults() -> Result<()> {
    init_logging();
    let src = tempfile::tempdir()?;
    let dst = tempfile::tempdir()?;
    fs::write(src.path().join("wanted"), "w")?;
    fs::write(src.path().join("ignored"), "i")?;
    fs::write(dst.path().join("stray"), "s")?;

    let mut engine = SyncEngine::new().with_policy(Box::new(|source, _dest| {
        match source.map(|s| s.name().to_owned()).as_deref() {
            Some("ignored") => SyncAction::Ignore,
            Some(_) => SyncAction::Copy,
            // Keep destination-only files instead of deleting them.
            None => SyncAction::Ignore,
        }
    }));
    let results = engine
        .sync(&native_root(&src), &native_root(&dst), &NOT_CANCELED)?
        .expect("not canceled");

    assert_eq!(results.files_added, 1);
    assert_eq!(results.files_deleted, 0);
    let dest = native_root(&dst);
    assert!(dest.child_named("wanted").stat().exists);
    assert!(!dest.child_named("ignored").stat().exists);
    assert!(dest.child_named("stray").stat().exists, "policy kept it");
    Ok(())
}

#[test]
fn case_insensitive_matching_pairs_children() -> Result<()> {
    init_logging();
    let src = tempfile::tempdir()?;
    let dst = tempfile::tempdir()?;
    fs::write(src.path().join("README"), "upper")?;
    fs::write(dst.path().join("readme"), "lower")?;
    // Give them distinct mtimes so the pair counts as an update.
    let source = native_root(&src);
    let dest = native_root(&dst);
    source.child_named("README").set_last_modified(5_000_000);

    let mut engine = SyncEngine::new().case_insensitive();
    let results = engine
        .sync(&source, &dest, &NOT_CANCELED)?
        .expect("not canceled");
    // Matched by name despite the case difference: an update, not an
    // add-plus-delete.
    assert_eq!(results.files_updated, 1);
    assert_eq!(results.files_added, 0);
    assert_eq!(results.files_deleted, 0);
    Ok(())
}
