use crate::config::{parse_bool, TrainConfig};
use crate::config_file::TrainConfigFile;
use crate::device::{DeviceKind, Precision};
use crate::error::Result;
use crate::logging::OperationLogger;
use crate::parse_param;
use crate::training::{DataLoader, LowlightDataset, Trainer};
use crate::validation;
use clap::ArgMatches;
use log::info;
use std::path::PathBuf;

pub fn train(app_m: &ArgMatches) -> Result<()> {
	let config = parse_train_config(app_m)?;
	config.validate()?;
	print_training_info(&config);

	let mut op = OperationLogger::new("train");
	let result = run_training(config);
	match &result {
		Ok(epochs) => {
			op.add_metadata("epochs", epochs);
			op.complete();
		}
		Err(e) => op.log_error(e),
	}
	result.map(|_| ())
}

fn run_training(config: TrainConfig) -> Result<usize> {
	let device = config.device.resolve()?;
	validation::ensure_output_directory(&config.snapshots_folder)?;

	let dataset = LowlightDataset::from_folder(&config.lowlight_images_path, Some(config.image_size))?;
	let mut loader = DataLoader::new(
		dataset,
		config.train_batch_size,
		true,
		config.num_workers,
		config.seed,
		device.clone(),
	)?;

	let mut val_loader = match &config.val_images_path {
		Some(path) => {
			let dataset = LowlightDataset::from_folder(path, Some(config.image_size))?;
			Some(DataLoader::new(
				dataset,
				config.val_batch_size,
				false,
				config.num_workers,
				None,
				device.clone(),
			)?)
		}
		None => None,
	};

	let mut trainer = Trainer::new(config, &device)?;
	let summary = trainer.train(&mut loader, val_loader.as_mut())?;
	if let Some(loss) = summary.final_loss() {
		info!("Final average loss: {:.4}", loss);
	}
	Ok(summary.epochs.len())
}

/// Defaults, then the `--config` file, then individual flags.
pub fn parse_train_config(app_m: &ArgMatches) -> Result<TrainConfig> {
	let base = match app_m.value_of("CONFIG") {
		Some(path) => {
			info!("Loading configuration from {}", path);
			TrainConfigFile::from_file(path)?.to_train_config()?
		}
		None => TrainConfig::default(),
	};
	let mut builder = base.to_builder();

	if let Some(path) = app_m.value_of("LOWLIGHT_IMAGES_PATH") {
		builder = builder.lowlight_images_path(path);
	}
	if let Some(path) = app_m.value_of("VAL_IMAGES_PATH") {
		builder = builder.val_images_path(Some(PathBuf::from(path)));
	}
	if let Some(lr) = parse_param!(app_m, "LR", f64, "a positive number") {
		builder = builder.lr(lr);
	}
	if let Some(wd) = app_m.value_of("WEIGHT_DECAY") {
		builder = builder.weight_decay(validation::validate_non_negative_float(wd, "weight_decay")?);
	}
	if let Some(norm) = app_m.value_of("GRAD_CLIP_NORM") {
		builder = builder.grad_clip_norm(Some(validation::validate_non_negative_float(norm, "grad_clip_norm")?));
	}
	if let Some(epochs) = parse_param!(app_m, "NUM_EPOCHS", usize, "a positive integer") {
		builder = builder.num_epochs(epochs);
	}
	if let Some(size) = parse_param!(app_m, "TRAIN_BATCH_SIZE", usize, "a positive integer") {
		builder = builder.train_batch_size(size);
	}
	if let Some(size) = parse_param!(app_m, "VAL_BATCH_SIZE", usize, "a positive integer") {
		builder = builder.val_batch_size(size);
	}
	if let Some(workers) = parse_param!(app_m, "NUM_WORKERS", usize, "a non-negative integer") {
		builder = builder.num_workers(workers);
	}
	if let Some(iter) = parse_param!(app_m, "DISPLAY_ITER", usize, "a positive integer") {
		builder = builder.display_iter(iter);
	}
	if let Some(factor) = parse_param!(app_m, "SCALE_FACTOR", usize, "a positive integer") {
		builder = builder.scale_factor(factor);
	}
	if let Some(size) = parse_param!(app_m, "IMAGE_SIZE", u32, "a positive integer") {
		builder = builder.image_size(size);
	}
	if let Some(path) = app_m.value_of("SNAPSHOTS_FOLDER") {
		builder = builder.snapshots_folder(path);
	}
	if let Some(value) = app_m.value_of("LOAD_PRETRAIN") {
		builder = builder.load_pretrain(parse_bool(value)?);
	}
	if let Some(path) = app_m.value_of("PRETRAIN_DIR") {
		builder = builder.pretrain_dir(path);
	}
	if let Some(epoch) = parse_param!(app_m, "SNAPSHOT_EPOCH", usize, "a positive integer") {
		builder = builder.snapshot_epoch(epoch);
	}
	if let Some(precision) = app_m.value_of("PRECISION") {
		builder = builder.precision(Precision::from_str(precision)?);
	}
	if let Some(device) = app_m.value_of("DEVICE") {
		builder = builder.device(DeviceKind::from_str(device)?);
	}
	if let Some(seed) = parse_param!(app_m, "SEED", u64, "an integer") {
		builder = builder.seed(Some(seed));
	}
	if app_m.is_present("QUANTISE") {
		builder = builder.quantise(true);
	}

	Ok(builder.build())
}

fn print_training_info(config: &TrainConfig) {
	info!("Training with:");
	info!("  Images: {}", config.lowlight_images_path.display());
	if let Some(val) = &config.val_images_path {
		info!("  Validation images: {}", val.display());
	}
	info!("  Learning rate: {}", config.lr);
	info!("  Weight decay: {}", config.weight_decay);
	if let Some(norm) = config.grad_clip_norm {
		info!("  Gradient clip norm: {}", norm);
	}
	info!("  Epochs: {}", config.num_epochs);
	info!("  Batch size: {}", config.train_batch_size);
	info!("  Image size: {}", config.image_size);
	info!("  Scale factor: {}", config.scale_factor);
	info!("  Precision: {}", config.precision);
	info!("  Snapshots: every {} epochs to {}", config.snapshot_epoch, config.snapshots_folder.display());
	if config.load_pretrain {
		info!("  Pretrained weights: {}", config.pretrain_dir.display());
	}
}
