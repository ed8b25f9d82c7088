pub mod network {
	pub const CHANNELS: usize = 3;
	pub const NUMBER_F: usize = 32;
	pub const CURVE_ITERATIONS: usize = 8;
	pub const DEFAULT_SCALE_FACTOR: usize = 1;
}

/// Fixed weights of the zero-reference loss terms.
pub mod loss {
	pub const TV_WEIGHT: f64 = 1600.0;
	pub const SPATIAL_WEIGHT: f64 = 1.0;
	pub const COLOR_WEIGHT: f64 = 5.0;
	pub const EXPOSURE_WEIGHT: f64 = 10.0;
	pub const EXPOSURE_TARGET: f64 = 0.6;
	pub const EXPOSURE_PATCH_SIZE: usize = 16;
	pub const SPATIAL_POOL_SIZE: usize = 4;
}

pub mod training {
	pub const DEFAULT_LEARNING_RATE: f64 = 1e-4;
	pub const DEFAULT_WEIGHT_DECAY: f64 = 1e-4;
	pub const DEFAULT_NUM_EPOCHS: usize = 100;
	pub const DEFAULT_TRAIN_BATCH_SIZE: usize = 8;
	pub const DEFAULT_VAL_BATCH_SIZE: usize = 8;
	pub const DEFAULT_NUM_WORKERS: usize = 4;
	pub const DEFAULT_DISPLAY_ITER: usize = 10;
	pub const DEFAULT_SNAPSHOT_EPOCH: usize = 10;
	pub const DEFAULT_IMAGE_SIZE: u32 = 512;
	pub const ADAM_BETA1: f64 = 0.9;
	pub const ADAM_BETA2: f64 = 0.999;
	pub const ADAM_EPS: f64 = 1e-8;
}

pub mod scheduler {
	pub const PATIENCE: usize = 5;
	pub const FACTOR: f64 = 0.1;
	pub const THRESHOLD: f64 = 1e-4;
	pub const MIN_LR: f64 = 0.0;
	pub const EPS: f64 = 1e-8;
}

pub mod grad_scaler {
	pub const INIT_SCALE: f64 = 65536.0;
	pub const GROWTH_FACTOR: f64 = 2.0;
	pub const BACKOFF_FACTOR: f64 = 0.5;
	pub const GROWTH_INTERVAL: usize = 2000;
}

pub mod ssim {
	pub const WINDOW_SIZE: usize = 7;
	pub const K1: f64 = 0.01;
	pub const K2: f64 = 0.03;
	pub const DATA_RANGE: f64 = 1.0;
}

pub mod quantization {
	pub const QUANTIZE_MASK_HIGH: u8 = 0xF0;
	pub const QUANTIZE_MASK_LOW: u8 = 0x00;
}

pub mod file {
	pub const CHECKPOINT_PREFIX: &str = "Epoch";
	pub const CHECKPOINT_EXTENSION: &str = "pth";
	pub const TRAINING_LOG: &str = "training_log.json";
	pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];
	pub const DEFAULT_TRAIN_PATH: &str = "data/train_data/";
	pub const DEFAULT_SNAPSHOTS_FOLDER: &str = "snapshots_Zero_DCE++/";
	pub const DEFAULT_PRETRAIN_PATH: &str = "snapshots_Zero_DCE++/Epoch99.pth";
	pub const XZ_LEVEL: u32 = 7;
}
