//! Purpose: Extension-directed `load` and `save` over the codec table.
//! Exports: `load`, `save`, `load_as`, `save_as`, `resolve_format`.
//! Role: Entry point for persisting artifacts without naming a codec.
//! Invariants: Paths that are not valid UTF-8 short-circuit to `Ok(None)`.
//! Invariants: Unknown extensions fail with `UnknownExtension` naming the path.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_pickle::SerOptions;

use crate::core::codec::{Artifact, LoadOptions, codec_for, create, json_error, pickle_error};
use crate::core::error::{Error, ErrorKind};
use crate::core::format::{Format, FormatRegistry};

/// Picks the explicit format, or infers one from the extension of `path`.
pub fn resolve_format(path: &str, format: Option<Format>) -> Result<Format, Error> {
    if let Some(format) = format {
        return Ok(format);
    }
    FormatRegistry::global().infer(path).ok_or_else(|| {
        Error::new(ErrorKind::UnknownExtension)
            .with_message(format!("unrecognized extension in `{path}`"))
            .with_path(path)
            .with_hint("Pass an explicit format or use a registered extension.")
    })
}

pub fn load(
    path: impl AsRef<Path>,
    format: Option<Format>,
    options: &LoadOptions,
) -> Result<Option<Artifact>, Error> {
    let path = path.as_ref();
    let Some(name) = path.to_str() else {
        return Ok(None);
    };
    let format = resolve_format(name, format)?;
    tracing::debug!(path = %name, %format, "load");
    (codec_for(format).read)(path, options).map(Some)
}

pub fn save(
    value: &Artifact,
    path: impl AsRef<Path>,
    format: Option<Format>,
) -> Result<Option<()>, Error> {
    let path = path.as_ref();
    let Some(name) = path.to_str() else {
        return Ok(None);
    };
    let format = resolve_format(name, format)?;
    tracing::debug!(path = %name, %format, artifact = value.kind(), "save");
    (codec_for(format).write)(value, path).map(Some)
}

/// Loads a JSON or pickle file straight into a serde type.
pub fn load_as<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    format: Option<Format>,
) -> Result<Option<T>, Error> {
    let path = path.as_ref();
    let Some(name) = path.to_str() else {
        return Ok(None);
    };
    let format = resolve_format(name, format)?;
    let file = match format {
        Format::Json | Format::Pickle => File::open(path).map_err(|err| Error::io(path, err))?,
        other => return Err(not_serde(other, path)),
    };
    let reader = BufReader::new(file);
    let value = match format {
        Format::Json => serde_json::from_reader(reader).map_err(|err| json_error(path, err))?,
        _ => serde_pickle::from_reader(reader, LoadOptions::default().pickle())
            .map_err(|err| pickle_error(path, err))?,
    };
    Ok(Some(value))
}

/// Saves any serde type as JSON or pickle.
pub fn save_as<T: Serialize>(
    value: &T,
    path: impl AsRef<Path>,
    format: Option<Format>,
) -> Result<Option<()>, Error> {
    let path = path.as_ref();
    let Some(name) = path.to_str() else {
        return Ok(None);
    };
    let bytes = match resolve_format(name, format)? {
        Format::Json => serde_json::to_vec(value).map_err(|err| json_error(path, err))?,
        Format::Pickle => serde_pickle::to_vec(value, SerOptions::new())
            .map_err(|err| pickle_error(path, err))?,
        other => return Err(not_serde(other, path)),
    };
    let mut writer = create(path)?;
    writer.write_all(&bytes).map_err(|err| Error::io(path, err))?;
    writer.flush().map_err(|err| Error::io(path, err))?;
    Ok(Some(()))
}

fn not_serde(format: Format, path: &Path) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("{format} files do not hold serde values"))
        .with_path(path)
        .with_hint("Use load/save with an Artifact for checkpoints and images.")
}
