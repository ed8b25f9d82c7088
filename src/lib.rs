pub mod cli;
pub mod commands;
pub mod config;
pub mod config_file;
pub mod constants;
pub mod device;
pub mod error;
pub mod image_io;
pub mod logging;
pub mod loss;
pub mod network;
pub mod ssim;
pub mod training;
pub mod utils;
pub mod validation;

use candle_core::Device;

pub use crate::config::TrainConfig;
pub use crate::error::{Result, ZeroDceError};
pub use crate::image_io::ChwImage;
pub use crate::network::{EnhanceNet, EnhanceOutput};
pub use crate::training::checkpoint::{network_from_bytes, network_to_bytes, NetworkDescription};
pub use crate::training::{Trainer, TrainingSummary};

/// Enhances a single image with `network` at its native resolution.
pub fn enhance(image: &ChwImage, network: &EnhanceNet, device: &Device) -> Result<ChwImage> {
	let output = network.forward(&image.to_tensor(device)?)?;
	ChwImage::from_tensor(&output.enhanced)
}
