use super::evaluate::{load_network, parse_device};
use crate::error::{Result, ZeroDceError};
use crate::image_io::ChwImage;
use crate::network::EnhanceNet;
use crate::training::LowlightDataset;
use crate::utils::progress_bar;
use crate::validation::ensure_output_directory;
use candle_core::Device;
use clap::ArgMatches;
use log::info;
use std::path::Path;

pub fn enhance(app_m: &ArgMatches) -> Result<()> {
	let checkpoint = Path::new(app_m.value_of("CHECKPOINT").unwrap_or_default());
	let input = Path::new(app_m.value_of("INPUT").unwrap_or_default());
	let output = Path::new(app_m.value_of("OUTPUT").unwrap_or_default());
	if !input.exists() {
		return Err(ZeroDceError::FileNotFound(input.to_path_buf()));
	}

	let device = parse_device(app_m)?;
	let net = load_network(app_m, checkpoint, &device)?;

	if input.is_dir() {
		ensure_output_directory(output)?;
		let dataset = LowlightDataset::from_folder(input, None)?;
		let pb = progress_bar(dataset.len(), "images");
		for file in dataset.files() {
			let name = file
				.file_stem()
				.ok_or_else(|| ZeroDceError::InvalidParameter(format!("No file name in {}", file.display())))?;
			let target = output.join(name).with_extension("png");
			enhance_file(&net, file, &target, &device)?;
			pb.inc(1);
		}
		pb.finish_and_clear();
		info!("Enhanced {} images into {}", dataset.len(), output.display());
	} else {
		enhance_file(&net, input, output, &device)?;
		info!("Wrote {}", output.display());
	}
	Ok(())
}

/// Enhances one image at its native resolution.
pub fn enhance_file(net: &EnhanceNet, input: &Path, output: &Path, device: &Device) -> Result<()> {
	let image = ChwImage::open(input, None)?;
	crate::enhance(&image, net, device)?.save(output)
}
