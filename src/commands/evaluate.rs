use crate::constants::network::DEFAULT_SCALE_FACTOR;
use crate::constants::training::{DEFAULT_IMAGE_SIZE, DEFAULT_NUM_WORKERS, DEFAULT_VAL_BATCH_SIZE};
use crate::device::{DeviceKind, Precision};
use crate::error::{Result, ZeroDceError};
use crate::network::EnhanceNet;
use crate::parse_param;
use crate::training::checkpoint::{assign_parameters, read_parameters};
use crate::training::{evaluate as evaluate_ssim, DataLoader, LowlightDataset};
use crate::validation::{validate_directory, validate_input_file, validate_positive_int};
use candle_core::Device;
use clap::ArgMatches;
use log::info;
use std::path::Path;

pub fn evaluate(app_m: &ArgMatches) -> Result<()> {
	let checkpoint = Path::new(app_m.value_of("CHECKPOINT").unwrap_or_default());
	let folder = Path::new(app_m.value_of("IMAGES_FOLDER").unwrap_or_default());
	validate_directory(folder)?;

	let image_size = parse_image_size(app_m)?;
	let batch_size = match app_m.value_of("VAL_BATCH_SIZE") {
		Some(v) => validate_positive_int(v, "val_batch_size")?,
		None => DEFAULT_VAL_BATCH_SIZE,
	};
	let num_workers = parse_param!(app_m, "NUM_WORKERS", usize, "a non-negative integer").unwrap_or(DEFAULT_NUM_WORKERS);

	let device = parse_device(app_m)?;
	let net = load_network(app_m, checkpoint, &device)?;

	let dataset = LowlightDataset::from_folder(folder, Some(image_size))?;
	let mut loader = DataLoader::new(dataset, batch_size, false, num_workers, None, device)?;
	let score = evaluate_ssim(&net, &mut loader)?;
	info!("Mean SSIM over {} images: {:.4}", loader.dataset().len(), score);
	Ok(())
}

fn parse_image_size(app_m: &ArgMatches) -> Result<u32> {
	match parse_param!(app_m, "IMAGE_SIZE", u32, "a positive integer") {
		Some(0) => Err(ZeroDceError::InvalidParameter("IMAGE_SIZE must be a positive integer".into())),
		Some(size) => Ok(size),
		None => Ok(DEFAULT_IMAGE_SIZE),
	}
}

pub(crate) fn parse_device(app_m: &ArgMatches) -> Result<Device> {
	DeviceKind::from_str(app_m.value_of("DEVICE").unwrap_or("auto"))?.resolve()
}

/// Builds the network from a checkpoint. `--scale_factor` wins over the value stored in the file.
pub(crate) fn load_network(app_m: &ArgMatches, checkpoint: &Path, device: &Device) -> Result<EnhanceNet> {
	validate_input_file(checkpoint)?;
	let (desc, tensors) = read_parameters(checkpoint)?;

	let scale_factor = match app_m.value_of("SCALE_FACTOR") {
		Some(v) => validate_positive_int(v, "scale_factor")?,
		None => desc
			.as_ref()
			.map(|d| d.scale_factor as usize)
			.unwrap_or(DEFAULT_SCALE_FACTOR),
	};
	let precision = Precision::from_str(app_m.value_of("PRECISION").unwrap_or("f32"))?.for_device(device);

	let (varmap, net) = EnhanceNet::build(scale_factor, device)?;
	assign_parameters(&varmap, &tensors)?;
	info!("Loaded {} (scale factor {})", checkpoint.display(), scale_factor);
	Ok(net.with_compute_dtype(precision.dtype()))
}
