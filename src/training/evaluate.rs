use crate::error::{Result, ZeroDceError};
use crate::image_io::ChwImage;
use crate::network::EnhanceNet;
use crate::ssim::ssim_images;
use crate::training::data_loader::DataLoader;
use crate::utils::progress_bar;
use log::debug;
use std::path::PathBuf;

/// Mean SSIM between each enhanced image and its low-light input over one pass of `loader`.
pub fn evaluate(net: &EnhanceNet, loader: &mut DataLoader) -> Result<f64> {
	let total = loader.dataset().len();
	if total == 0 {
		return Err(ZeroDceError::EmptyDataset(PathBuf::new()));
	}

	let pb = progress_bar(total, "images");
	let mut ssim_sum = 0.0;
	let mut count = 0usize;
	for batch in loader.epoch() {
		let batch = batch?;
		let enhanced_batch = net.forward(&batch)?.enhanced.detach();
		for i in 0..batch.dim(0)? {
			let original = ChwImage::from_tensor(&batch.get(i)?)?;
			let enhanced = ChwImage::from_tensor(&enhanced_batch.get(i)?)?;
			ssim_sum += ssim_images(&enhanced, &original)?;
			count += 1;
			pb.inc(1);
		}
	}
	pb.finish_and_clear();

	debug!("Evaluated {} of {} images", count, total);
	Ok(ssim_sum / total as f64)
}
