use crate::constants::file::{CHECKPOINT_EXTENSION, CHECKPOINT_PREFIX, XZ_LEVEL};
use crate::constants::quantization::{QUANTIZE_MASK_HIGH, QUANTIZE_MASK_LOW};
use crate::error::{Result, ZeroDceError};
use bincode::{deserialize, serialize};
use byteorder::{BigEndian, ByteOrder};
use candle_core::{DType, Tensor};
use candle_nn::VarMap;
use log::{info, warn};
use ndarray::{ArrayD, IxDyn};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::FpCategory;
use std::path::{Path, PathBuf};
use xz2::read::{XzDecoder, XzEncoder};

/// A named parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedParameter {
	pub name: String,
	pub value: ArrayD<f32>,
}

/// The network hyperparameters and parameters stored in a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescription {
	pub scale_factor: u32,
	pub number_f: u32,
	pub parameters: Vec<NamedParameter>,
}

impl NetworkDescription {
	/// Snapshot of every variable in `varmap`, sorted by name.
	pub fn from_varmap(varmap: &VarMap, scale_factor: usize, number_f: usize) -> Result<Self> {
		let data = varmap
			.data()
			.lock()
			.map_err(|_| ZeroDceError::Checkpoint("Parameter store lock poisoned".into()))?;
		let mut names: Vec<&String> = data.keys().collect();
		names.sort();

		let mut parameters = Vec::with_capacity(names.len());
		for name in names {
			let tensor = data[name].as_tensor().to_dtype(DType::F32)?;
			let shape = tensor.dims().to_vec();
			let values = tensor.flatten_all()?.to_vec1::<f32>()?;
			let value = ArrayD::from_shape_vec(IxDyn(&shape), values)
				.map_err(|e| ZeroDceError::Checkpoint(format!("Bad shape for {}: {}", name, e)))?;
			parameters.push(NamedParameter {
				name: name.clone(),
				value,
			});
		}

		Ok(Self {
			scale_factor: scale_factor as u32,
			number_f: number_f as u32,
			parameters,
		})
	}
}

/// Serialises and compresses the description.
/// If quantise = true, then the least significant 12 bits are zeroed to improve compression.
pub fn network_to_bytes(mut desc: NetworkDescription, quantise: bool) -> Result<Vec<u8>> {
	for param in &mut desc.parameters {
		for e in param.value.iter_mut() {
			if let FpCategory::Subnormal = e.classify() {
				*e = 0.0;
			}
			if quantise {
				let mut bytes = [0; 4];
				BigEndian::write_f32(&mut bytes, *e);
				bytes[2] &= QUANTIZE_MASK_HIGH;
				bytes[3] &= QUANTIZE_MASK_LOW;
				*e = BigEndian::read_f32(&bytes);
			}
		}
	}

	let serialized: Vec<u8> = serialize(&desc)?;
	let shuffled = shuffle(&serialized, 4);
	let compressed = XzEncoder::new(shuffled.as_slice(), XZ_LEVEL)
		.bytes()
		.collect::<::std::result::Result<Vec<_>, _>>()?;
	Ok(compressed)
}

/// Decompresses and deserialises a description written by [`network_to_bytes`].
pub fn network_from_bytes(data: &[u8]) -> Result<NetworkDescription> {
	let decompressed = XzDecoder::new(data)
		.bytes()
		.collect::<::std::result::Result<Vec<_>, _>>()
		.map_err(|e| ZeroDceError::Checkpoint(format!("Not a valid checkpoint: {}", e)))?;
	let unshuffled = unshuffle(&decompressed, 4);
	Ok(deserialize(&unshuffled)?)
}

/// Shuffle f32 bytes so that all first bytes are contiguous etc
/// Improves compression of floating point data
pub fn shuffle(data: &[u8], stride: usize) -> Vec<u8> {
	let mut vec = Vec::with_capacity(data.len());
	for offset in 0..stride {
		for i in 0..(data.len() + stride - 1 - offset) / stride {
			vec.push(data[offset + i * stride])
		}
	}
	debug_assert_eq!(vec.len(), data.len());
	vec
}

/// Inverts `shuffle()`
pub fn unshuffle(data: &[u8], stride: usize) -> Vec<u8> {
	let mut vec = vec![0; data.len()];
	let mut inc = 0;
	for offset in 0..stride {
		for i in 0..(data.len() + stride - 1 - offset) / stride {
			vec[offset + i * stride] = data[inc];
			inc += 1;
		}
	}
	debug_assert_eq!(inc, data.len());
	vec
}

/// Writes `Epoch<N>.pth` snapshots every `interval` epochs.
pub struct CheckpointManager {
	folder: PathBuf,
	interval: usize,
	quantise: bool,
}

impl CheckpointManager {
	pub fn new(folder: impl AsRef<Path>, interval: usize, quantise: bool) -> Self {
		Self {
			folder: folder.as_ref().to_path_buf(),
			interval: interval.max(1),
			quantise,
		}
	}

	/// `epoch` is 0-based.
	pub fn should_checkpoint(&self, epoch: usize) -> bool {
		(epoch + 1) % self.interval == 0
	}

	pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
		self.folder
			.join(format!("{}{}.{}", CHECKPOINT_PREFIX, epoch, CHECKPOINT_EXTENSION))
	}

	pub fn save(&self, epoch: usize, desc: NetworkDescription) -> Result<PathBuf> {
		fs::create_dir_all(&self.folder)?;
		let path = self.checkpoint_path(epoch);
		save_description(&path, desc, self.quantise)?;
		Ok(path)
	}
}

pub fn save_description(path: &Path, desc: NetworkDescription, quantise: bool) -> Result<()> {
	let bytes = network_to_bytes(desc, quantise)?;
	let mut file = File::create(path)?;
	file.write_all(&bytes)?;
	Ok(())
}

/// Reads named tensors from one of our checkpoints or from a PyTorch `state_dict` archive.
pub fn read_parameters(path: &Path) -> Result<(Option<NetworkDescription>, HashMap<String, Tensor>)> {
	if !path.exists() {
		return Err(ZeroDceError::FileNotFound(path.to_path_buf()));
	}
	let mut data = Vec::new();
	File::open(path)?.read_to_end(&mut data)?;

	if data.starts_with(b"PK") {
		info!("Reading PyTorch state_dict from {}", path.display());
		let tensors = candle_core::pickle::read_all(path)?;
		let named = tensors
			.into_iter()
			.map(|(name, tensor)| {
				let name = name.strip_prefix("module.").map(str::to_string).unwrap_or(name);
				(name, tensor)
			})
			.collect();
		return Ok((None, named));
	}

	let desc = network_from_bytes(&data)?;
	let mut named = HashMap::with_capacity(desc.parameters.len());
	for param in &desc.parameters {
		let values: Vec<f32> = param.value.iter().cloned().collect();
		let tensor = Tensor::from_vec(values, param.value.shape(), &candle_core::Device::Cpu)?;
		named.insert(param.name.clone(), tensor);
	}
	Ok((Some(desc), named))
}

/// Copies the parameters stored at `path` into `varmap`.
pub fn load_parameters(varmap: &VarMap, path: &Path, scale_factor: usize) -> Result<()> {
	let (desc, tensors) = read_parameters(path)?;
	if let Some(desc) = &desc {
		if desc.scale_factor as usize != scale_factor {
			warn!(
				"Checkpoint was trained with scale factor {}, running with {}",
				desc.scale_factor, scale_factor
			);
		}
	}
	assign_parameters(varmap, &tensors)?;
	info!("Loaded parameters from {}", path.display());
	Ok(())
}

/// Every variable must be present with a matching shape; extra tensors are ignored.
pub fn assign_parameters(varmap: &VarMap, tensors: &HashMap<String, Tensor>) -> Result<()> {
	let data = varmap
		.data()
		.lock()
		.map_err(|_| ZeroDceError::Checkpoint("Parameter store lock poisoned".into()))?;
	for (name, var) in data.iter() {
		let tensor = tensors
			.get(name)
			.ok_or_else(|| ZeroDceError::Checkpoint(format!("Missing parameter {}", name)))?;
		if tensor.dims() != var.dims() {
			return Err(ZeroDceError::Checkpoint(format!(
				"Shape mismatch for {}: checkpoint {:?}, network {:?}",
				name,
				tensor.dims(),
				var.dims()
			)));
		}
		var.set(&tensor.to_dtype(var.dtype())?.to_device(var.device())?)?;
	}
	Ok(())
}
