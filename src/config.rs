use crate::constants::{file, network, training};
use crate::device::{DeviceKind, Precision};
use crate::error::{Result, ZeroDceError};
use std::path::PathBuf;

/// Hyperparameters and paths of one training run. Immutable once training starts.
#[derive(Debug, Clone)]
pub struct TrainConfig {
	pub lowlight_images_path: PathBuf,
	pub val_images_path: Option<PathBuf>,
	pub lr: f64,
	pub weight_decay: f64,
	/// Global gradient norm limit. Unset leaves gradients untouched.
	pub grad_clip_norm: Option<f64>,
	pub num_epochs: usize,
	pub train_batch_size: usize,
	pub val_batch_size: usize,
	pub num_workers: usize,
	pub display_iter: usize,
	pub scale_factor: usize,
	pub image_size: u32,
	pub snapshots_folder: PathBuf,
	pub load_pretrain: bool,
	pub pretrain_dir: PathBuf,
	pub snapshot_epoch: usize,
	pub precision: Precision,
	pub device: DeviceKind,
	pub seed: Option<u64>,
	pub quantise: bool,
}

impl Default for TrainConfig {
	fn default() -> Self {
		Self {
			lowlight_images_path: PathBuf::from(file::DEFAULT_TRAIN_PATH),
			val_images_path: None,
			lr: training::DEFAULT_LEARNING_RATE,
			weight_decay: training::DEFAULT_WEIGHT_DECAY,
			grad_clip_norm: None,
			num_epochs: training::DEFAULT_NUM_EPOCHS,
			train_batch_size: training::DEFAULT_TRAIN_BATCH_SIZE,
			val_batch_size: training::DEFAULT_VAL_BATCH_SIZE,
			num_workers: training::DEFAULT_NUM_WORKERS,
			display_iter: training::DEFAULT_DISPLAY_ITER,
			scale_factor: network::DEFAULT_SCALE_FACTOR,
			image_size: training::DEFAULT_IMAGE_SIZE,
			snapshots_folder: PathBuf::from(file::DEFAULT_SNAPSHOTS_FOLDER),
			load_pretrain: false,
			pretrain_dir: PathBuf::from(file::DEFAULT_PRETRAIN_PATH),
			snapshot_epoch: training::DEFAULT_SNAPSHOT_EPOCH,
			precision: Precision::F32,
			device: DeviceKind::Auto,
			seed: None,
			quantise: false,
		}
	}
}

impl TrainConfig {
	pub fn builder() -> TrainConfigBuilder {
		TrainConfigBuilder::default()
	}

	/// Starts a builder pre-populated with this configuration.
	pub fn to_builder(&self) -> TrainConfigBuilder {
		TrainConfigBuilder { base: self.clone() }
	}

	pub fn validate(&self) -> Result<()> {
		if !(self.lr > 0.0) {
			return Err(ZeroDceError::InvalidParameter(format!(
				"Learning rate ({}) must be greater than 0",
				self.lr
			)));
		}
		if self.weight_decay < 0.0 {
			return Err(ZeroDceError::InvalidParameter(format!(
				"Weight decay ({}) must not be negative",
				self.weight_decay
			)));
		}
		if let Some(norm) = self.grad_clip_norm {
			if !(norm >= 0.0) {
				return Err(ZeroDceError::InvalidParameter(format!(
					"Gradient clip norm ({}) must not be negative",
					norm
				)));
			}
		}
		if self.num_epochs == 0 {
			return Err(ZeroDceError::InvalidParameter("Number of epochs must be greater than 0".into()));
		}
		if self.train_batch_size == 0 {
			return Err(ZeroDceError::InvalidParameter(format!(
				"Train batch size ({}) must be greater than 0",
				self.train_batch_size
			)));
		}
		if self.val_batch_size == 0 {
			return Err(ZeroDceError::InvalidParameter(format!(
				"Validation batch size ({}) must be greater than 0",
				self.val_batch_size
			)));
		}
		if self.display_iter == 0 {
			return Err(ZeroDceError::InvalidParameter("Display interval must be greater than 0".into()));
		}
		if self.snapshot_epoch == 0 {
			return Err(ZeroDceError::InvalidParameter("Snapshot interval must be greater than 0".into()));
		}
		if self.scale_factor == 0 {
			return Err(ZeroDceError::InvalidParameter("Scale factor must be greater than 0".into()));
		}
		if (self.image_size as usize) < self.scale_factor {
			return Err(ZeroDceError::InvalidParameter(format!(
				"Image size ({}) must be at least the scale factor ({})",
				self.image_size, self.scale_factor
			)));
		}
		if (self.image_size as usize) < crate::constants::loss::EXPOSURE_PATCH_SIZE {
			return Err(ZeroDceError::InvalidParameter(format!(
				"Image size ({}) must be at least the exposure patch size ({})",
				self.image_size,
				crate::constants::loss::EXPOSURE_PATCH_SIZE
			)));
		}
		Ok(())
	}

	/// Checkpoint written after the 0-based `epoch`.
	pub fn snapshot_path(&self, epoch: usize) -> PathBuf {
		self.snapshots_folder.join(format!(
			"{}{}.{}",
			file::CHECKPOINT_PREFIX,
			epoch,
			file::CHECKPOINT_EXTENSION
		))
	}
}

#[derive(Default)]
pub struct TrainConfigBuilder {
	base: TrainConfig,
}

impl TrainConfigBuilder {
	pub fn lowlight_images_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.base.lowlight_images_path = path.into();
		self
	}

	pub fn val_images_path(mut self, path: Option<PathBuf>) -> Self {
		self.base.val_images_path = path;
		self
	}

	pub fn lr(mut self, lr: f64) -> Self {
		self.base.lr = lr;
		self
	}

	pub fn weight_decay(mut self, weight_decay: f64) -> Self {
		self.base.weight_decay = weight_decay;
		self
	}

	pub fn grad_clip_norm(mut self, norm: Option<f64>) -> Self {
		self.base.grad_clip_norm = norm;
		self
	}

	pub fn num_epochs(mut self, epochs: usize) -> Self {
		self.base.num_epochs = epochs;
		self
	}

	pub fn train_batch_size(mut self, size: usize) -> Self {
		self.base.train_batch_size = size;
		self
	}

	pub fn val_batch_size(mut self, size: usize) -> Self {
		self.base.val_batch_size = size;
		self
	}

	pub fn num_workers(mut self, workers: usize) -> Self {
		self.base.num_workers = workers;
		self
	}

	pub fn display_iter(mut self, iter: usize) -> Self {
		self.base.display_iter = iter;
		self
	}

	pub fn scale_factor(mut self, factor: usize) -> Self {
		self.base.scale_factor = factor;
		self
	}

	pub fn image_size(mut self, size: u32) -> Self {
		self.base.image_size = size;
		self
	}

	pub fn snapshots_folder(mut self, path: impl Into<PathBuf>) -> Self {
		self.base.snapshots_folder = path.into();
		self
	}

	pub fn load_pretrain(mut self, load: bool) -> Self {
		self.base.load_pretrain = load;
		self
	}

	pub fn pretrain_dir(mut self, path: impl Into<PathBuf>) -> Self {
		self.base.pretrain_dir = path.into();
		self
	}

	pub fn snapshot_epoch(mut self, epoch: usize) -> Self {
		self.base.snapshot_epoch = epoch;
		self
	}

	pub fn precision(mut self, precision: Precision) -> Self {
		self.base.precision = precision;
		self
	}

	pub fn device(mut self, device: DeviceKind) -> Self {
		self.base.device = device;
		self
	}

	pub fn seed(mut self, seed: Option<u64>) -> Self {
		self.base.seed = seed;
		self
	}

	pub fn quantise(mut self, quantise: bool) -> Self {
		self.base.quantise = quantise;
		self
	}

	pub fn build(self) -> TrainConfig {
		self.base
	}
}

/// Parses the loose boolean spellings accepted on the command line.
pub fn parse_bool(value: &str) -> Result<bool> {
	match value.to_lowercase().as_str() {
		"true" | "1" | "yes" | "y" | "on" => Ok(true),
		"false" | "0" | "no" | "n" | "off" => Ok(false),
		_ => Err(ZeroDceError::Parse(format!("Expected a boolean, got '{}'", value))),
	}
}
