// Directory creation helpers shared by the synchronizer and callers.
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

/// Creates `path` and any missing parents; succeeds if it already exists.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let path = path.as_ref();
    match fs::create_dir_all(path) {
        Ok(()) => Ok(path.to_path_buf()),
        Err(err) if path.exists() && !path.is_dir() => Err(Error::new(ErrorKind::AlreadyExists)
            .with_message("a non-directory occupies this path")
            .with_path(path)
            .with_source(err)),
        Err(err) => Err(Error::io(path, err)),
    }
}

/// Joins `segments` (each trimmed of surrounding spaces) and ensures the result exists.
pub fn make_dir<I, S>(segments: I) -> Result<PathBuf, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let path = segments
        .into_iter()
        .fold(PathBuf::new(), |path, segment| path.join(segment.as_ref().trim_matches(' ')));
    if path.as_os_str().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("make_dir needs at least one segment")
        );
    }
    ensure_dir(path)
}
