//! Purpose: Map logical format tags to the file extensions that imply them.
//! Exports: `Format`, `Extensions`, `FormatRegistry`, `extension_of`.
//! Role: Shared policy for inferring a codec from a filename.
//! Invariants: The inverse table is derived once from the forward table.
//! Invariants: Duplicate extensions across formats resolve to the last entry.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Format {
    Json,
    Pickle,
    TensorCheckpoint,
    MedicalImage,
}

impl Format {
    pub const ALL: [Format; 4] = [
        Format::Json,
        Format::Pickle,
        Format::TensorCheckpoint,
        Format::MedicalImage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Pickle => "pickle",
            Format::TensorCheckpoint => "tensor-checkpoint",
            Format::MedicalImage => "medical-image",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "pickle" | "pkl" => Ok(Format::Pickle),
            "tensor-checkpoint" | "checkpoint" | "torch" | "safetensors" => {
                Ok(Format::TensorCheckpoint)
            }
            "medical-image" | "image" | "sitk" | "dicom" => Ok(Format::MedicalImage),
            _ => Err(Error::new(ErrorKind::NotImplemented)
                .with_message(format!("unsupported format `{value}`"))
                .with_hint("Known formats: json, pickle, tensor-checkpoint, medical-image.")),
        }
    }
}

/// Forward-table value: one extension or an ordered list of them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Extensions {
    One(String),
    Many(Vec<String>),
}

impl Extensions {
    fn into_vec(self) -> Vec<String> {
        match self {
            Extensions::One(ext) => vec![ext],
            Extensions::Many(exts) => exts,
        }
    }
}

impl From<&str> for Extensions {
    fn from(ext: &str) -> Self {
        Extensions::One(ext.to_string())
    }
}

impl From<&[&str]> for Extensions {
    fn from(exts: &[&str]) -> Self {
        Extensions::Many(exts.iter().map(|ext| ext.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Extensions {
    fn from(exts: [&str; N]) -> Self {
        Extensions::from(&exts[..])
    }
}

#[derive(Clone, Debug)]
pub struct FormatRegistry {
    forward: Vec<(Format, Vec<String>)>,
    inverse: HashMap<String, Format>,
}

static GLOBAL: LazyLock<FormatRegistry> = LazyLock::new(FormatRegistry::default);

impl FormatRegistry {
    pub fn new<I, E>(table: I) -> Self
    where
        I: IntoIterator<Item = (Format, E)>,
        E: Into<Extensions>,
    {
        let mut forward = Vec::new();
        let mut inverse = HashMap::new();
        for (format, exts) in table {
            let exts = exts
                .into()
                .into_vec()
                .into_iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect::<Vec<_>>();
            for ext in &exts {
                inverse.insert(ext.clone(), format);
            }
            forward.push((format, exts));
        }
        Self { forward, inverse }
    }

    /// The process-wide registry built from the default table.
    pub fn global() -> &'static FormatRegistry {
        &GLOBAL
    }

    /// Returns `None` for extensions with no registered format.
    pub fn resolve(&self, ext: &str) -> Option<Format> {
        self.inverse.get(&ext.to_ascii_lowercase()).copied()
    }

    pub fn infer(&self, path: &str) -> Option<Format> {
        self.resolve(extension_of(path))
    }

    pub fn extensions(&self, format: Format) -> &[String] {
        self.forward
            .iter()
            .rev()
            .find(|(candidate, _)| *candidate == format)
            .map(|(_, exts)| exts.as_slice())
            .unwrap_or(&[])
    }

    pub fn entries(&self) -> impl Iterator<Item = (Format, &[String])> {
        self.forward
            .iter()
            .map(|(format, exts)| (*format, exts.as_slice()))
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        FormatRegistry::new([
            (Format::Json, Extensions::from("json")),
            (Format::Pickle, Extensions::from("pkl")),
            (Format::TensorCheckpoint, Extensions::from("safetensors")),
            (Format::MedicalImage, Extensions::from(["dicom", "dcm"])),
        ])
    }
}

/// Substring after the last `.`, or the whole input when it has none.
pub fn extension_of(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::{Extensions, Format, FormatRegistry, extension_of};
    use crate::core::error::ErrorKind;

    #[test]
    fn multi_extension_formats_resolve_to_one_tag() {
        let registry = FormatRegistry::global();
        for format in Format::ALL {
            for ext in registry.extensions(format) {
                assert_eq!(registry.resolve(ext), Some(format), "extension {ext}");
            }
        }
        assert_eq!(registry.resolve("dicom"), Some(Format::MedicalImage));
        assert_eq!(registry.resolve("dcm"), Some(Format::MedicalImage));
    }

    #[test]
    fn resolution_is_case_insensitive() {
        let registry = FormatRegistry::global();
        assert_eq!(registry.resolve("JSON"), Some(Format::Json));
        assert_eq!(registry.resolve("Dcm"), Some(Format::MedicalImage));
        assert_eq!(registry.resolve("yaml"), None);
        assert_eq!(registry.resolve(".json"), None);
    }

    #[test]
    fn duplicate_extensions_resolve_to_last_entry() {
        let registry = FormatRegistry::new([
            (Format::Json, Extensions::from("dat")),
            (Format::Pickle, Extensions::from(["bin", "dat"])),
        ]);
        assert_eq!(registry.resolve("dat"), Some(Format::Pickle));
        assert_eq!(registry.extensions(Format::Json), ["dat".to_string()]);
    }

    #[test]
    fn extension_is_text_after_last_dot() {
        assert_eq!(extension_of("scan.001.DCM"), "DCM");
        assert_eq!(extension_of("dir.v1/Makefile"), "v1/Makefile");
        assert_eq!(extension_of("README"), "README");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(
            FormatRegistry::global().infer("out/weights.safetensors"),
            Some(Format::TensorCheckpoint)
        );
    }

    #[test]
    fn format_names_parse_with_aliases() {
        assert_eq!("torch".parse::<Format>().unwrap(), Format::TensorCheckpoint);
        assert_eq!("sitk".parse::<Format>().unwrap(), Format::MedicalImage);
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        for format in Format::ALL {
            assert_eq!(format.name().parse::<Format>().unwrap(), format);
        }
        let err = "hdf5".parse::<Format>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
        assert!(err.message().unwrap().contains("hdf5"));
    }
}
