//! Purpose: Mirror a source tree into a destination by copying or symlinking missing files.
//! Exports: `recursive_copy`, `SyncOptions`, `SyncReport`, `SyncEvent`, `snapshot`.
//! Role: Idempotent one-way synchronizer; repeated runs only touch what is missing.
//! Invariants: Snapshots are computed per call and never cached.
//! Invariants: Each tree is snapshotted relative to its own root.
//! Invariants: No rollback; the first failure aborts and earlier copies remain.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::dirs::ensure_dir;
use crate::core::error::{Error, ErrorKind};

type Filter<'a> = Box<dyn Fn(&str) -> bool + 'a>;

pub struct SyncOptions<'a> {
    softlink: bool,
    overwrite: bool,
    filter: Option<Filter<'a>>,
}

impl Default for SyncOptions<'_> {
    fn default() -> Self {
        Self {
            softlink: false,
            overwrite: true,
            filter: None,
        }
    }
}

impl<'a> SyncOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link destination files to the absolute source path instead of copying bytes.
    pub fn softlink(mut self, softlink: bool) -> Self {
        self.softlink = softlink;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Keep only source files whose name passes `filter`; directories are always walked.
    pub fn filter(mut self, filter: impl Fn(&str) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    fn accepts(&self, name: &str) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(name))
    }
}

impl fmt::Debug for SyncOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("softlink", &self.softlink)
            .field("overwrite", &self.overwrite)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// One file of a tree: its directory relative to the root, and its name.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SnapshotEntry {
    pub dir: PathBuf,
    pub name: OsString,
}

impl SnapshotEntry {
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.dir).join(&self.name)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncEventKind {
    Overwrite,
    Skip,
}

impl SyncEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncEventKind::Overwrite => "overwrite",
            SyncEventKind::Skip => "skip",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyncEvent {
    pub kind: SyncEventKind,
    pub path: PathBuf,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SyncReport {
    pub copied: Vec<PathBuf>,
    pub linked: Vec<PathBuf>,
    pub overwritten: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub up_to_date: usize,
    pub events: Vec<SyncEvent>,
}

impl SyncReport {
    /// Number of destination entries created, replaced or linked.
    pub fn mutations(&self) -> usize {
        self.copied.len() + self.linked.len()
    }

    fn record(&mut self, kind: SyncEventKind, path: &Path) {
        match kind {
            SyncEventKind::Overwrite => {
                tracing::info!(path = %path.display(), "exists, overwrite");
                self.overwritten.push(path.to_path_buf());
            }
            SyncEventKind::Skip => {
                tracing::info!(path = %path.display(), "exists, skip");
                self.skipped.push(path.to_path_buf());
            }
        }
        self.events.push(SyncEvent {
            kind,
            path: path.to_path_buf(),
        });
    }
}

/// Collects every non-directory entry under `root` that `keep` accepts by file name.
pub fn snapshot(
    root: &Path,
    keep: impl Fn(&str) -> bool,
) -> Result<BTreeSet<SnapshotEntry>, Error> {
    let mut entries = BTreeSet::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|err| walk_error(root, err))?;
        let is_dir = entry.file_type().is_dir()
            || (entry.path_is_symlink() && entry.path().is_dir());
        if is_dir {
            continue;
        }
        let name = entry.file_name().to_os_string();
        if !keep(&name.to_string_lossy()) {
            continue;
        }
        let relative = entry.path().strip_prefix(root).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("walked entry escaped its root")
                .with_path(entry.path())
                .with_source(err)
        })?;
        let dir = relative.parent().map(Path::to_path_buf).unwrap_or_default();
        entries.insert(SnapshotEntry { dir, name });
    }
    Ok(entries)
}

pub fn recursive_copy(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    options: &SyncOptions<'_>,
) -> Result<SyncReport, Error> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    let wanted = snapshot(src, |name| options.accepts(name))?;
    ensure_dir(dst)?;
    let present = snapshot(dst, |_| true)?;

    let mut report = SyncReport::default();
    for entry in &wanted {
        if present.contains(entry) {
            report.up_to_date += 1;
            continue;
        }
        ensure_dir(dst.join(&entry.dir))?;
        let src_path = entry.under(src);
        let dst_path = entry.under(dst);

        if let Ok(meta) = fs::symlink_metadata(&dst_path) {
            if !options.overwrite {
                report.record(SyncEventKind::Skip, &dst_path);
                continue;
            }
            remove_existing(&dst_path, &meta)?;
            report.record(SyncEventKind::Overwrite, &dst_path);
        }

        if options.softlink {
            link(&src_path, &dst_path)?;
            report.linked.push(dst_path);
        } else {
            fs::copy(&src_path, &dst_path).map_err(|err| Error::io(&dst_path, err))?;
            report.copied.push(dst_path);
        }
    }
    tracing::debug!(
        src = %src.display(),
        dst = %dst.display(),
        copied = report.copied.len(),
        linked = report.linked.len(),
        skipped = report.skipped.len(),
        "sync finished"
    );
    Ok(report)
}

fn remove_existing(path: &Path, meta: &fs::Metadata) -> Result<(), Error> {
    let file_type = meta.file_type();
    let removed = if file_type.is_symlink() {
        remove_link(path)
    } else if file_type.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|err| Error::io(path, err))
}

#[cfg(unix)]
fn remove_link(path: &Path) -> std::io::Result<()> {
    fs::remove_file(path)
}

#[cfg(windows)]
fn remove_link(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

fn link(src: &Path, dst: &Path) -> Result<(), Error> {
    let target = std::path::absolute(src).map_err(|err| Error::io(src, err))?;
    #[cfg(unix)]
    let linked = std::os::unix::fs::symlink(&target, dst);
    #[cfg(windows)]
    let linked = std::os::windows::fs::symlink_file(&target, dst);
    linked.map_err(|err| Error::io(dst, err))
}

fn walk_error(root: &Path, err: walkdir::Error) -> Error {
    let path = err.path().unwrap_or(root).to_path_buf();
    let kind = match err.io_error().map(|io_err| io_err.kind()) {
        Some(std::io::ErrorKind::NotFound) => ErrorKind::NotFound,
        Some(std::io::ErrorKind::PermissionDenied) => ErrorKind::Permission,
        _ => ErrorKind::Io,
    };
    Error::new(kind)
        .with_message("failed to walk directory tree")
        .with_path(path)
        .with_source(err)
}
