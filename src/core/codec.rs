//! Purpose: Pair every `Format` with the reader/writer that implements it.
//! Exports: `Artifact`, `LoadOptions`, `Codec`, `codec_for`.
//! Role: Closed dispatch table consumed by `persist::load` and `persist::save`.
//! Invariants: Every format has exactly one codec; the match is exhaustive.
//! Invariants: Codec failures keep the library error as `source()`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Number, Value};
use serde_pickle::{DeOptions, HashableValue, SerOptions};

use crate::core::checkpoint::{Checkpoint, read_checkpoint, write_checkpoint};
use crate::core::error::{Error, ErrorKind};
use crate::core::format::Format;
use crate::core::image::{ImageOptions, MedicalImage, read_image, write_image};

/// An in-memory value moved by `load` and `save`.
#[derive(Debug)]
pub enum Artifact {
    Json(Value),
    Pickle(serde_pickle::Value),
    Checkpoint(Checkpoint),
    Image(Box<MedicalImage>),
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Json(_) => "json",
            Artifact::Pickle(_) => "pickle",
            Artifact::Checkpoint(_) => "checkpoint",
            Artifact::Image(_) => "image",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoadOptions {
    /// Decode Python 2 byte strings in pickles as text.
    pub decode_strings: bool,
    /// Accept pickles that reference classes this process cannot resolve.
    pub replace_unresolved_globals: bool,
    pub skip_pixel_data: bool,
}

impl LoadOptions {
    pub(crate) fn pickle(&self) -> DeOptions {
        let mut options = DeOptions::new();
        if self.decode_strings {
            options = options.decode_strings();
        }
        if self.replace_unresolved_globals {
            options = options.replace_unresolved_globals();
        }
        options
    }

    fn image(&self) -> ImageOptions {
        ImageOptions {
            skip_pixel_data: self.skip_pixel_data,
        }
    }
}

pub type ReadFn = fn(&Path, &LoadOptions) -> Result<Artifact, Error>;
pub type WriteFn = fn(&Artifact, &Path) -> Result<(), Error>;

#[derive(Clone, Copy)]
pub struct Codec {
    pub read: ReadFn,
    pub write: WriteFn,
}

static JSON: Codec = Codec {
    read: read_json,
    write: write_json,
};
static PICKLE: Codec = Codec {
    read: read_pickle,
    write: write_pickle,
};
static CHECKPOINT: Codec = Codec {
    read: read_tensor_checkpoint,
    write: write_tensor_checkpoint,
};
static IMAGE: Codec = Codec {
    read: read_medical_image,
    write: write_medical_image,
};

pub fn codec_for(format: Format) -> &'static Codec {
    match format {
        Format::Json => &JSON,
        Format::Pickle => &PICKLE,
        Format::TensorCheckpoint => &CHECKPOINT,
        Format::MedicalImage => &IMAGE,
    }
}

fn read_json(path: &Path, _options: &LoadOptions) -> Result<Artifact, Error> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let value = serde_json::from_reader(BufReader::new(file)).map_err(|err| json_error(path, err))?;
    Ok(Artifact::Json(value))
}

fn write_json(value: &Artifact, path: &Path) -> Result<(), Error> {
    let json = match value {
        Artifact::Json(json) => json.clone(),
        Artifact::Pickle(pickle) => pickle_to_json(pickle).map_err(|err| err.with_path(path))?,
        other => return Err(mismatch(other, Format::Json, path)),
    };
    let mut writer = create(path)?;
    serde_json::to_writer(&mut writer, &json).map_err(|err| json_error(path, err))?;
    writer.flush().map_err(|err| Error::io(path, err))
}

fn read_pickle(path: &Path, options: &LoadOptions) -> Result<Artifact, Error> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let value = serde_pickle::value_from_reader(BufReader::new(file), options.pickle())
        .map_err(|err| pickle_error(path, err))?;
    Ok(Artifact::Pickle(value))
}

fn write_pickle(value: &Artifact, path: &Path) -> Result<(), Error> {
    let bytes = match value {
        Artifact::Pickle(pickle) => serde_pickle::value_to_vec(pickle, SerOptions::new()),
        Artifact::Json(json) => serde_pickle::to_vec(json, SerOptions::new()),
        other => return Err(mismatch(other, Format::Pickle, path)),
    }
    .map_err(|err| pickle_error(path, err))?;
    let mut writer = create(path)?;
    writer.write_all(&bytes).map_err(|err| Error::io(path, err))?;
    writer.flush().map_err(|err| Error::io(path, err))
}

fn read_tensor_checkpoint(path: &Path, _options: &LoadOptions) -> Result<Artifact, Error> {
    read_checkpoint(path).map(Artifact::Checkpoint)
}

fn write_tensor_checkpoint(value: &Artifact, path: &Path) -> Result<(), Error> {
    match value {
        Artifact::Checkpoint(checkpoint) => write_checkpoint(checkpoint, path),
        other => Err(mismatch(other, Format::TensorCheckpoint, path)),
    }
}

fn read_medical_image(path: &Path, options: &LoadOptions) -> Result<Artifact, Error> {
    read_image(path, options.image()).map(|image| Artifact::Image(Box::new(image)))
}

fn write_medical_image(value: &Artifact, path: &Path) -> Result<(), Error> {
    match value {
        Artifact::Image(image) => write_image(image, path),
        other => Err(mismatch(other, Format::MedicalImage, path)),
    }
}

pub(crate) fn create(path: &Path) -> Result<BufWriter<File>, Error> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|err| Error::io(path, err))
}

pub(crate) fn json_error(path: &Path, err: serde_json::Error) -> Error {
    if err.is_io() {
        return Error::new(ErrorKind::Io).with_path(path).with_source(err);
    }
    Error::new(ErrorKind::Corrupt)
        .with_message("invalid json document")
        .with_path(path)
        .with_source(err)
}

pub(crate) fn pickle_error(path: &Path, err: serde_pickle::Error) -> Error {
    match err {
        serde_pickle::Error::Io(io_err) => Error::io(path, io_err),
        other => Error::new(ErrorKind::Corrupt)
            .with_message("invalid pickle stream")
            .with_path(path)
            .with_source(other),
    }
}

fn mismatch(value: &Artifact, format: Format, path: &Path) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("cannot encode a {} artifact as {format}", value.kind()))
        .with_path(path)
}

/// Converts a pickle value into JSON when every key is a string and every number fits.
pub fn pickle_to_json(value: &serde_pickle::Value) -> Result<Value, Error> {
    use serde_pickle::Value as Pickle;

    let unsupported = |what: &str| {
        Error::new(ErrorKind::Usage).with_message(format!("pickle {what} has no json equivalent"))
    };
    match value {
        Pickle::None => Ok(Value::Null),
        Pickle::Bool(flag) => Ok(Value::Bool(*flag)),
        Pickle::I64(num) => Ok(Value::from(*num)),
        Pickle::F64(num) => Number::from_f64(*num)
            .map(Value::Number)
            .ok_or_else(|| unsupported("non-finite float")),
        Pickle::String(text) => Ok(Value::String(text.clone())),
        Pickle::List(items) | Pickle::Tuple(items) => items
            .iter()
            .map(pickle_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Pickle::Dict(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                let HashableValue::String(key) = key else {
                    return Err(unsupported("dict key"));
                };
                map.insert(key.clone(), pickle_to_json(item)?);
            }
            Ok(Value::Object(map))
        }
        Pickle::Int(_) => Err(unsupported("big integer")),
        Pickle::Bytes(_) => Err(unsupported("bytes")),
        Pickle::Set(_) | Pickle::FrozenSet(_) => Err(unsupported("set")),
    }
}

#[cfg(test)]
mod tests {
    use super::{Artifact, LoadOptions, codec_for, pickle_to_json};
    use crate::core::checkpoint::Checkpoint;
    use crate::core::error::ErrorKind;
    use crate::core::format::Format;
    use serde_json::json;
    use serde_pickle::{HashableValue, Value as Pickle};
    use std::collections::BTreeMap;

    #[test]
    fn every_format_has_a_codec() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("probe");
        for format in Format::ALL {
            let codec = codec_for(format);
            let err = (codec.read)(&path, &LoadOptions::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound, "format {format}");
        }
    }

    #[test]
    fn json_artifact_crosses_into_pickle_and_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("value.pkl");
        let value = json!({"name": "scan", "sizes": [1, 2.5, null], "ok": true});

        (codec_for(Format::Pickle).write)(&Artifact::Json(value.clone()), &path).expect("write");
        let loaded =
            (codec_for(Format::Pickle).read)(&path, &LoadOptions::default()).expect("read");
        let Artifact::Pickle(pickle) = loaded else {
            panic!("expected pickle artifact");
        };
        assert_eq!(pickle_to_json(&pickle).expect("convert"), value);
    }

    #[test]
    fn checkpoint_cannot_be_written_as_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("weights.json");
        let err = (codec_for(Format::Json).write)(&Artifact::Checkpoint(Checkpoint::new()), &path)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(!path.exists());
    }

    #[test]
    fn pickle_values_without_json_form_are_rejected() {
        let mut dict = BTreeMap::new();
        dict.insert(HashableValue::I64(1), Pickle::String("one".into()));
        let err = pickle_to_json(&Pickle::Dict(dict)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        assert!(pickle_to_json(&Pickle::Bytes(vec![1, 2])).is_err());
        assert!(pickle_to_json(&Pickle::F64(f64::NAN)).is_err());
        assert_eq!(
            pickle_to_json(&Pickle::Tuple(vec![Pickle::None, Pickle::I64(4)])).unwrap(),
            json!([null, 4])
        );
    }

    #[test]
    fn malformed_json_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"a\":}").expect("write");
        let err = (codec_for(Format::Json).read)(&path, &LoadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert!(std::error::Error::source(&err).is_some());
    }
}
