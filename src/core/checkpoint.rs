// Tensor checkpoints stored as safetensors; loading always lands tensors in host memory.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use memmap2::Mmap;
use safetensors::tensor::{Dtype, SafeTensors, TensorView};

use crate::core::error::{Error, ErrorKind};

const DEVICE_KEY_PREFIX: &str = "stowage.device.";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Device {
    Cpu,
    Cuda(usize),
    Mps,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda(index) => write!(f, "cuda:{index}"),
            Device::Mps => f.write_str("mps"),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cpu" => Ok(Device::Cpu),
            "mps" => Ok(Device::Mps),
            "cuda" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|index| index.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(|| {
                    Error::new(ErrorKind::Usage).with_message(format!("unknown device `{other}`"))
                }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub dtype: Dtype,
    pub shape: Vec<usize>,
    pub data: Vec<u8>,
    pub device: Device,
}

impl Tensor {
    pub fn new(dtype: Dtype, shape: Vec<usize>, data: Vec<u8>) -> Self {
        Self {
            dtype,
            shape,
            data,
            device: Device::Cpu,
        }
    }

    pub fn on(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Self {
        let data = values
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        Self::new(Dtype::F32, shape, data)
    }

    /// Decodes little-endian `f32` data; `None` for any other dtype.
    pub fn to_f32(&self) -> Option<Vec<f32>> {
        if self.dtype != Dtype::F32 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Checkpoint {
    pub tensors: BTreeMap<String, Tensor>,
    pub metadata: BTreeMap<String, String>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tensor(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.tensors.insert(name.into(), tensor);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub fn read_checkpoint(path: &Path) -> Result<Checkpoint, Error> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    // Safety: the map is read-only and dropped before this function returns.
    let mmap = unsafe { Mmap::map(&file).map_err(|err| Error::io(path, err))? };

    let (_, header) = SafeTensors::read_metadata(&mmap).map_err(|err| corrupt(path, err))?;
    let tensors = SafeTensors::deserialize(&mmap).map_err(|err| corrupt(path, err))?;

    let mut checkpoint = Checkpoint::new();
    if let Some(metadata) = header.metadata() {
        for (key, value) in metadata {
            match key.strip_prefix(DEVICE_KEY_PREFIX) {
                Some(name) => {
                    tracing::debug!(tensor = %name, from = %value, "mapping tensor to cpu");
                }
                None => {
                    checkpoint.metadata.insert(key.clone(), value.clone());
                }
            }
        }
    }
    for (name, view) in tensors.tensors() {
        let tensor = Tensor::new(view.dtype(), view.shape().to_vec(), view.data().to_vec());
        checkpoint.tensors.insert(name, tensor);
    }
    Ok(checkpoint)
}

pub fn write_checkpoint(checkpoint: &Checkpoint, path: &Path) -> Result<(), Error> {
    let mut views = Vec::with_capacity(checkpoint.tensors.len());
    for (name, tensor) in &checkpoint.tensors {
        let view = TensorView::new(tensor.dtype, tensor.shape.clone(), &tensor.data).map_err(
            |err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("tensor `{name}` does not match its shape"))
                    .with_path(path)
                    .with_source(err)
            },
        )?;
        views.push((name.as_str(), view));
    }

    let mut metadata: HashMap<String, String> = checkpoint
        .metadata
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    for (name, tensor) in &checkpoint.tensors {
        if tensor.device != Device::Cpu {
            metadata.insert(format!("{DEVICE_KEY_PREFIX}{name}"), tensor.device.to_string());
        }
    }
    let metadata = (!metadata.is_empty()).then_some(metadata);

    let bytes = safetensors::tensor::serialize(views, &metadata).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode checkpoint")
            .with_path(path)
            .with_source(err)
    })?;

    let file = File::create(path).map_err(|err| Error::io(path, err))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes).map_err(|err| Error::io(path, err))?;
    writer.flush().map_err(|err| Error::io(path, err))?;
    Ok(())
}

fn corrupt(path: &Path, err: safetensors::tensor::SafeTensorError) -> Error {
    Error::new(ErrorKind::Corrupt)
        .with_message("invalid safetensors file")
        .with_path(path)
        .with_source(err)
}
