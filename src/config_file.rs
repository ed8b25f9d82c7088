use crate::config::TrainConfig;
use crate::constants::{file, network, training};
use crate::device::{DeviceKind, Precision};
use crate::error::{Result, ZeroDceError};
use crate::utils::ParseErrorMapper;
use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Training configuration that can be loaded from a TOML or JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfigFile {
    /// Dataset locations and loading
    #[serde(default)]
    pub data: DataSection,

    /// Adam hyperparameters
    #[serde(default)]
    pub optimizer: OptimizerSection,

    /// Epoch and reporting cadence
    #[serde(default)]
    pub schedule: ScheduleSection,

    /// Network shape
    #[serde(default)]
    pub model: ModelSection,

    /// Checkpoint output and pretrained weights
    #[serde(default)]
    pub output: OutputSection,

    /// Device and precision
    #[serde(default)]
    pub runtime: RuntimeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Folder of low-light training images
    pub lowlight_images_path: String,

    /// Folder of validation images (optional)
    pub val_images_path: Option<String>,

    /// Side length training images are resized to (default: 512)
    pub image_size: u32,

    /// Training batch size (default: 8)
    pub train_batch_size: usize,

    /// Validation batch size (default: 8)
    pub val_batch_size: usize,

    /// Image decoding threads, 0 decodes on the training thread (default: 4)
    pub num_workers: usize,

    /// Shuffle seed (optional)
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSection {
    /// Learning rate (default: 0.0001)
    pub lr: f64,

    /// L2 weight decay (default: 0.0001)
    pub weight_decay: f64,

    /// Global gradient norm limit (default: no clipping)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grad_clip_norm: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub num_epochs: usize,
    pub display_iter: usize,
    pub snapshot_epoch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Curve estimation runs on images downsampled by this factor (default: 1)
    pub scale_factor: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub snapshots_folder: String,
    pub load_pretrain: bool,
    pub pretrain_dir: String,
    /// Zero the low mantissa bits of saved parameters for better compression
    pub quantise: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// "auto", "cpu" or "cuda"
    pub device: String,
    /// "f32", "f16" or "bf16"
    pub precision: String,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            lowlight_images_path: file::DEFAULT_TRAIN_PATH.to_string(),
            val_images_path: None,
            image_size: training::DEFAULT_IMAGE_SIZE,
            train_batch_size: training::DEFAULT_TRAIN_BATCH_SIZE,
            val_batch_size: training::DEFAULT_VAL_BATCH_SIZE,
            num_workers: training::DEFAULT_NUM_WORKERS,
            seed: None,
        }
    }
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            lr: training::DEFAULT_LEARNING_RATE,
            weight_decay: training::DEFAULT_WEIGHT_DECAY,
            grad_clip_norm: None,
        }
    }
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            num_epochs: training::DEFAULT_NUM_EPOCHS,
            display_iter: training::DEFAULT_DISPLAY_ITER,
            snapshot_epoch: training::DEFAULT_SNAPSHOT_EPOCH,
        }
    }
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            scale_factor: network::DEFAULT_SCALE_FACTOR,
        }
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            snapshots_folder: file::DEFAULT_SNAPSHOTS_FOLDER.to_string(),
            load_pretrain: false,
            pretrain_dir: file::DEFAULT_PRETRAIN_PATH.to_string(),
            quantise: false,
        }
    }
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            device: "auto".to_string(),
            precision: "f32".to_string(),
        }
    }
}

impl TrainConfigFile {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;

        toml::from_str(&contents).map_parse_err("Failed to parse TOML config")
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;

        serde_json::from_str(&contents).map_parse_err("Failed to parse JSON config")
    }

    /// Load by extension: `.json` is JSON, anything else TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ZeroDceError::FileNotFound(path.to_path_buf()));
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ZeroDceError::Serialization(format!("Failed to serialize to TOML: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ZeroDceError::Serialization(format!("Failed to serialize to JSON: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Convert to the runtime configuration. Device and precision strings are validated here.
    pub fn to_train_config(&self) -> Result<TrainConfig> {
        Ok(TrainConfig::builder()
            .lowlight_images_path(&self.data.lowlight_images_path)
            .val_images_path(self.data.val_images_path.as_ref().map(PathBuf::from))
            .image_size(self.data.image_size)
            .train_batch_size(self.data.train_batch_size)
            .val_batch_size(self.data.val_batch_size)
            .num_workers(self.data.num_workers)
            .seed(self.data.seed)
            .lr(self.optimizer.lr)
            .weight_decay(self.optimizer.weight_decay)
            .grad_clip_norm(self.optimizer.grad_clip_norm)
            .num_epochs(self.schedule.num_epochs)
            .display_iter(self.schedule.display_iter)
            .snapshot_epoch(self.schedule.snapshot_epoch)
            .scale_factor(self.model.scale_factor)
            .snapshots_folder(&self.output.snapshots_folder)
            .load_pretrain(self.output.load_pretrain)
            .pretrain_dir(&self.output.pretrain_dir)
            .quantise(self.output.quantise)
            .device(DeviceKind::from_str(&self.runtime.device)?)
            .precision(Precision::from_str(&self.runtime.precision)?)
            .build())
    }

    pub fn generate_default() -> Self {
        Self {
            data: DataSection::default(),
            optimizer: OptimizerSection::default(),
            schedule: ScheduleSection::default(),
            model: ModelSection::default(),
            output: OutputSection::default(),
            runtime: RuntimeSection::default(),
        }
    }

    /// Example configuration with comments
    pub fn create_example_toml() -> String {
        r#"# Zero-DCE++ Training Configuration File

[data]
# Folder of low-light training images (jpg, jpeg, png, bmp)
lowlight_images_path = "data/train_data/"

# Validation images, scored with SSIM at every snapshot (optional)
# val_images_path = "data/val_data/"

# Training images are resized to image_size x image_size
image_size = 512

train_batch_size = 8
val_batch_size = 8

# Image decoding threads, 0 decodes on the training thread
num_workers = 4

# Fix the shuffle order (optional)
# seed = 42

[optimizer]
lr = 0.0001
weight_decay = 0.0001

# Clip gradients to this global norm (optional, off by default)
# grad_clip_norm = 0.1

[schedule]
num_epochs = 100

# Log the batch loss every N iterations
display_iter = 10

# Save Epoch<N>.pth every N epochs
snapshot_epoch = 10

[model]
# Estimate curves on images downsampled by this factor
scale_factor = 1

[output]
snapshots_folder = "snapshots_Zero_DCE++/"

# Start from an existing checkpoint or PyTorch state_dict
load_pretrain = false
pretrain_dir = "snapshots_Zero_DCE++/Epoch99.pth"

quantise = false

[runtime]
# "auto", "cpu" or "cuda"
device = "auto"

# "f32", "f16" or "bf16"; half precision only applies on CUDA
precision = "f32"
"#
        .to_string()
    }
}
