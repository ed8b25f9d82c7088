//! Conversions between image files and `(C, H, W)` float data in `[0, 1]`.

use crate::error::{Result, ZeroDceError};
use candle_core::{Device, Tensor};
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgb};
use std::path::Path;

/// An RGB image as planar float data.
#[derive(Debug, Clone, PartialEq)]
pub struct ChwImage {
	pub width: usize,
	pub height: usize,
	/// Planar R, G, B values, each plane `height * width` long.
	pub data: Vec<f32>,
}

impl ChwImage {
	pub fn from_dynamic(image: &DynamicImage) -> Self {
		let rgb = image.to_rgb();
		let (width, height) = rgb.dimensions();
		let (width, height) = (width as usize, height as usize);
		let plane = width * height;
		let raw = rgb.into_raw();

		let mut data = vec![0.0f32; 3 * plane];
		for (i, pixel) in raw.chunks(3).enumerate() {
			for c in 0..3 {
				data[c * plane + i] = f32::from(pixel[c]) / 255.0;
			}
		}

		ChwImage { width, height, data }
	}

	/// Loads an image, optionally resizing it to `size x size`.
	pub fn open(path: &Path, size: Option<u32>) -> Result<Self> {
		let image = image::open(path).map_err(|e| ZeroDceError::Image(format!("{}: {}", path.display(), e)))?;
		let image = match size {
			Some(size) => image.resize_exact(size, size, FilterType::Triangle),
			None => image,
		};
		Ok(Self::from_dynamic(&image))
	}

	pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
		Ok(Tensor::from_slice(&self.data, (1, 3, self.height, self.width), device)?)
	}

	/// Takes a `(3, H, W)` or `(1, 3, H, W)` tensor.
	pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
		let tensor = if tensor.rank() == 4 { tensor.squeeze(0)? } else { tensor.clone() };
		let (channels, height, width) = tensor.dims3()?;
		if channels != 3 {
			return Err(ZeroDceError::InvalidParameter(format!(
				"Expected 3 channels, got {}",
				channels
			)));
		}
		let data = tensor
			.to_dtype(candle_core::DType::F32)?
			.flatten_all()?
			.to_vec1::<f32>()?;
		Ok(ChwImage { width, height, data })
	}

	/// Values are clamped to `[0, 1]` before quantising to bytes.
	pub fn save(&self, path: &Path) -> Result<()> {
		let plane = self.width * self.height;
		let mut raw = Vec::with_capacity(3 * plane);
		for i in 0..plane {
			for c in 0..3 {
				let value = self.data[c * plane + i].max(0.0).min(1.0);
				raw.push((value * 255.0).round() as u8);
			}
		}
		let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_raw(self.width as u32, self.height as u32, raw)
			.ok_or_else(|| ZeroDceError::Image("Image buffer size mismatch".into()))?;
		buffer
			.save(path)
			.map_err(|e| ZeroDceError::Image(format!("{}: {}", path.display(), e)))
	}
}

/// Stacks equally sized images into a `(B, 3, H, W)` tensor.
pub fn batch_to_tensor(images: &[ChwImage], device: &Device) -> Result<Tensor> {
	let first = images
		.first()
		.ok_or_else(|| ZeroDceError::InvalidParameter("Cannot build an empty batch".into()))?;
	let mut data = Vec::with_capacity(images.len() * first.data.len());
	for image in images {
		if image.width != first.width || image.height != first.height {
			return Err(ZeroDceError::InvalidParameter(format!(
				"Batch images must share a size: {}x{} vs {}x{}",
				image.width, image.height, first.width, first.height
			)));
		}
		data.extend_from_slice(&image.data);
	}
	Ok(Tensor::from_vec(data, (images.len(), 3, first.height, first.width), device)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn gradient_image(width: usize, height: usize) -> ChwImage {
		let plane = width * height;
		let mut data = vec![0.0; 3 * plane];
		for y in 0..height {
			for x in 0..width {
				let i = y * width + x;
				data[i] = x as f32 / width as f32;
				data[plane + i] = y as f32 / height as f32;
				data[2 * plane + i] = 0.5;
			}
		}
		ChwImage { width, height, data }
	}

	#[test]
	fn test_save_and_open_png() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("gradient.png");
		let image = gradient_image(8, 4);
		image.save(&path).unwrap();

		let loaded = ChwImage::open(&path, None).unwrap();
		assert_eq!((loaded.width, loaded.height), (8, 4));
		for (a, b) in image.data.iter().zip(loaded.data.iter()) {
			assert!((a - b).abs() <= 0.5 / 255.0 + 1e-6);
		}
	}

	#[test]
	fn test_open_resizes() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("gradient.png");
		gradient_image(20, 10).save(&path).unwrap();

		let loaded = ChwImage::open(&path, Some(16)).unwrap();
		assert_eq!((loaded.width, loaded.height), (16, 16));
		assert_eq!(loaded.data.len(), 3 * 16 * 16);
	}

	#[test]
	fn test_tensor_round_trip_keeps_layout() {
		let image = gradient_image(5, 3);
		let tensor = image.to_tensor(&Device::Cpu).unwrap();
		assert_eq!(tensor.dims(), &[1, 3, 3, 5]);
		assert_eq!(ChwImage::from_tensor(&tensor).unwrap(), image);
	}

	#[test]
	fn test_batch_rejects_mixed_sizes() {
		let images = vec![gradient_image(4, 4), gradient_image(4, 5)];
		assert!(batch_to_tensor(&images, &Device::Cpu).is_err());
		let batch = batch_to_tensor(&images[..1], &Device::Cpu).unwrap();
		assert_eq!(batch.dims(), &[1, 3, 4, 4]);
	}
}
