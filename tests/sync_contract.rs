//! Purpose: Contract coverage for `recursive_copy`.
//! Exports: Integration tests only.
//! Role: Pin idempotence, filtering, link mode, and overwrite policy.
//! Invariants: Every test builds its own source and destination trees in a tempdir.

use std::fs;
use std::path::Path;

use stowage::api::{SyncEventKind, SyncOptions, recursive_copy};

fn seed(root: &Path) {
    fs::create_dir_all(root.join("runs/exp1")).expect("mkdir");
    fs::create_dir_all(root.join("empty")).expect("mkdir");
    fs::write(root.join("index.json"), b"{\"runs\":1}").expect("write");
    fs::write(root.join("runs/exp1/metrics.pkl"), b"\x80\x03N.").expect("write");
    fs::write(root.join("runs/exp1/notes.txt"), b"first try").expect("write");
}

#[test]
fn second_run_without_overwrite_mutates_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("source");
    let dst = temp.path().join("mirror");
    seed(&src);

    let first = recursive_copy(&src, &dst, &SyncOptions::new().overwrite(false)).expect("first");
    assert_eq!(first.copied.len(), 3);
    assert_eq!(first.up_to_date, 0);
    assert_eq!(
        fs::read(dst.join("runs/exp1/notes.txt")).expect("read"),
        b"first try"
    );

    let second = recursive_copy(&src, &dst, &SyncOptions::new().overwrite(false)).expect("second");
    assert_eq!(second.mutations(), 0);
    assert!(second.overwritten.is_empty());
    assert_eq!(second.up_to_date, 3);
}

#[test]
fn existing_destination_files_are_left_alone() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("source");
    let dst = temp.path().join("mirror");
    seed(&src);
    fs::create_dir_all(&dst).expect("mkdir");
    fs::write(dst.join("index.json"), b"local edit").expect("write");

    let report = recursive_copy(&src, &dst, &SyncOptions::new()).expect("sync");
    assert_eq!(report.copied.len(), 2);
    assert_eq!(report.up_to_date, 1);
    assert_eq!(fs::read(dst.join("index.json")).expect("read"), b"local edit");
}

#[test]
fn reject_all_filter_still_creates_destination() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("source");
    let dst = temp.path().join("deep/mirror");
    seed(&src);

    let report = recursive_copy(&src, &dst, &SyncOptions::new().filter(|_| false)).expect("sync");
    assert_eq!(report.mutations(), 0);
    assert!(dst.is_dir());
    assert_eq!(fs::read_dir(&dst).expect("read_dir").count(), 0);
}

#[test]
fn filter_sees_file_names_only() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("source");
    let dst = temp.path().join("mirror");
    seed(&src);

    let report = recursive_copy(
        &src,
        &dst,
        &SyncOptions::new().filter(|name| name.ends_with(".pkl")),
    )
    .expect("sync");
    assert_eq!(report.copied, vec![dst.join("runs/exp1/metrics.pkl")]);
    assert!(!dst.join("index.json").exists());
}

#[cfg(unix)]
#[test]
fn softlinks_resolve_to_source_bytes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("source");
    let dst = temp.path().join("links");
    seed(&src);

    let report = recursive_copy(&src, &dst, &SyncOptions::new().softlink(true)).expect("sync");
    assert_eq!(report.linked.len(), 3);
    assert!(report.copied.is_empty());

    for relative in ["index.json", "runs/exp1/metrics.pkl", "runs/exp1/notes.txt"] {
        let link = dst.join(relative);
        let meta = fs::symlink_metadata(&link).expect("link metadata");
        assert!(meta.file_type().is_symlink(), "{relative}");
        let target = fs::read_link(&link).expect("read_link");
        assert!(target.is_absolute(), "{relative}");
        assert_eq!(
            fs::read(&link).expect("through link"),
            fs::read(src.join(relative)).expect("source")
        );
    }

    let again = recursive_copy(&src, &dst, &SyncOptions::new().softlink(true)).expect("again");
    assert_eq!(again.mutations(), 0);
    assert_eq!(again.up_to_date, 3);
}

#[test]
fn overwrite_replaces_conflicts_and_reports_them() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("source");
    let dst = temp.path().join("mirror");
    seed(&src);
    fs::create_dir_all(dst.join("runs/exp1/notes.txt")).expect("conflicting dir");

    let report = recursive_copy(&src, &dst, &SyncOptions::new()).expect("sync");
    assert_eq!(report.overwritten, vec![dst.join("runs/exp1/notes.txt")]);
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].kind, SyncEventKind::Overwrite);
    assert_eq!(
        fs::read(dst.join("runs/exp1/notes.txt")).expect("read"),
        b"first try"
    );

    fs::remove_file(dst.join("runs/exp1/notes.txt")).expect("remove");
    fs::create_dir_all(dst.join("runs/exp1/notes.txt")).expect("conflicting dir again");
    let kept = recursive_copy(&src, &dst, &SyncOptions::new().overwrite(false)).expect("sync");
    assert_eq!(kept.skipped, vec![dst.join("runs/exp1/notes.txt")]);
    assert_eq!(kept.events[0].kind, SyncEventKind::Skip);
    assert!(dst.join("runs/exp1/notes.txt").is_dir());
}

#[cfg(unix)]
#[test]
fn overwrite_unlinks_a_directory_symlink_without_touching_its_target() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("source");
    let dst = temp.path().join("mirror");
    let target = temp.path().join("shared");
    fs::create_dir_all(&src).expect("mkdir");
    fs::create_dir_all(&dst).expect("mkdir");
    fs::create_dir_all(&target).expect("mkdir");
    fs::write(src.join("data"), b"fresh bytes").expect("write");
    fs::write(target.join("keep"), b"still here").expect("write");
    std::os::unix::fs::symlink(&target, dst.join("data")).expect("symlink");

    let report = recursive_copy(&src, &dst, &SyncOptions::new()).expect("sync");
    assert_eq!(report.overwritten, vec![dst.join("data")]);
    assert_eq!(report.events[0].kind, SyncEventKind::Overwrite);
    assert_eq!(report.copied, vec![dst.join("data")]);

    let meta = fs::symlink_metadata(dst.join("data")).expect("metadata");
    assert!(meta.file_type().is_file());
    assert_eq!(fs::read(dst.join("data")).expect("read"), b"fresh bytes");
    assert_eq!(fs::read(target.join("keep")).expect("read"), b"still here");
}
