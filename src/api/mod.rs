//! Purpose: Define the stable public Rust API boundary for stowage.
//! Exports: Load/save, directory sync, format registry, and error types.
//! Role: Public, additive-only surface used by the CLI and downstream crates.
//! Invariants: Callers should not need to reach into `core` for common tasks.

pub use crate::core::checkpoint::{Checkpoint, Device, Tensor};
pub use crate::core::codec::{Artifact, LoadOptions, pickle_to_json};
pub use crate::core::coerce::{read_bytes, read_str, read_str_or};
pub use crate::core::dirs::{ensure_dir, make_dir};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::format::{Extensions, Format, FormatRegistry, extension_of};
pub use crate::core::image::{ImageOptions, MedicalImage};
pub use crate::core::persist::{load, load_as, resolve_format, save, save_as};
pub use crate::core::sync::{
    SnapshotEntry, SyncEvent, SyncEventKind, SyncOptions, SyncReport, recursive_copy,
};
pub use safetensors::tensor::Dtype;
