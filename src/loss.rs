//! Zero-reference losses.
//!
//! None of the terms needs a ground-truth image: they judge the enhanced image only
//! against itself, against the input, or against a fixed exposure level.

use crate::constants::loss::{
	COLOR_WEIGHT, EXPOSURE_PATCH_SIZE, EXPOSURE_TARGET, EXPOSURE_WEIGHT, SPATIAL_POOL_SIZE, SPATIAL_WEIGHT,
	TV_WEIGHT,
};
use crate::error::{Result, ZeroDceError};
use candle_core::{Device, Tensor};

/// Color constancy: penalises differences between the mean intensities of the R, G and B channels.
///
/// Returns one value per image, shape `(B, 1, 1, 1)`.
pub fn color_constancy(enhanced: &Tensor) -> Result<Tensor> {
	let means = enhanced.mean_keepdim(3)?.mean_keepdim(2)?;
	let mr = means.narrow(1, 0, 1)?;
	let mg = means.narrow(1, 1, 1)?;
	let mb = means.narrow(1, 2, 1)?;
	let d_rg = mr.sub(&mg)?.sqr()?;
	let d_rb = mr.sub(&mb)?.sqr()?;
	let d_gb = mb.sub(&mg)?.sqr()?;
	Ok(d_rg.sqr()?.add(&d_rb.sqr()?)?.add(&d_gb.sqr()?)?.sqrt()?)
}

/// Spatial consistency between the input and the enhanced image.
#[derive(Debug, Clone)]
pub struct SpatialConsistency {
	/// Left, right, up and down difference kernels stacked as `(4, 1, 3, 3)`.
	kernels: Tensor,
}

impl SpatialConsistency {
	pub fn new(device: &Device) -> Result<Self> {
		#[rustfmt::skip]
		let kernels: Vec<f32> = vec![
			// left
			0.0, 0.0, 0.0,
			-1.0, 1.0, 0.0,
			0.0, 0.0, 0.0,
			// right
			0.0, 0.0, 0.0,
			0.0, 1.0, -1.0,
			0.0, 0.0, 0.0,
			// up
			0.0, -1.0, 0.0,
			0.0, 1.0, 0.0,
			0.0, 0.0, 0.0,
			// down
			0.0, 0.0, 0.0,
			0.0, 1.0, 0.0,
			0.0, -1.0, 0.0,
		];
		Ok(Self {
			kernels: Tensor::from_vec(kernels, (4, 1, 3, 3), device)?,
		})
	}

	/// Left, right, up and down differences of the pooled channel mean, `(B, 4, H/4, W/4)`.
	fn directional_differences(&self, image: &Tensor) -> Result<Tensor> {
		let pooled = image.mean_keepdim(1)?.avg_pool2d(SPATIAL_POOL_SIZE)?;
		Ok(pooled.conv2d(&self.kernels, 1, 1, 1, 1)?)
	}

	/// Per-pixel sum over the four directions, shape `(B, 1, H/4, W/4)`.
	pub fn forward(&self, enhanced: &Tensor, original: &Tensor) -> Result<Tensor> {
		let d_org = self.directional_differences(original)?;
		let d_enh = self.directional_differences(enhanced)?;
		Ok(d_org.sub(&d_enh)?.sqr()?.sum_keepdim(1)?)
	}
}

/// Exposure control: mean squared distance of 16x16 patch brightness from `target`.
pub fn exposure(enhanced: &Tensor, target: f64) -> Result<Tensor> {
	let pooled = enhanced.mean_keepdim(1)?.avg_pool2d(EXPOSURE_PATCH_SIZE)?;
	Ok(pooled.affine(1.0, -target)?.sqr()?.mean_all()?)
}

/// Illumination smoothness of the curve map.
pub fn total_variation(curves: &Tensor) -> Result<Tensor> {
	let (batch, _, height, width) = curves.dims4()?;
	if height < 2 || width < 2 {
		return Err(ZeroDceError::InvalidParameter(format!(
			"Total variation needs at least 2x2 maps, got {}x{}",
			height, width
		)));
	}
	let count_h = ((height - 1) * width) as f64;
	let count_w = (height * (width - 1)) as f64;
	let h_tv = curves
		.narrow(2, 1, height - 1)?
		.sub(&curves.narrow(2, 0, height - 1)?)?
		.sqr()?
		.sum_all()?;
	let w_tv = curves
		.narrow(3, 1, width - 1)?
		.sub(&curves.narrow(3, 0, width - 1)?)?
		.sqr()?
		.sum_all()?;
	let tv = h_tv.affine(1.0 / count_h, 0.0)?.add(&w_tv.affine(1.0 / count_w, 0.0)?)?;
	Ok(tv.affine(2.0 / batch as f64, 0.0)?)
}

/// Weighted loss terms of one iteration.
#[derive(Debug, Clone)]
pub struct LossTerms {
	/// Differentiable weighted sum of the four terms.
	pub total: Tensor,
	pub total_variation: f32,
	pub spatial: f32,
	pub color: f32,
	pub exposure: f32,
}

impl LossTerms {
	pub fn total_value(&self) -> Result<f32> {
		Ok(self.total.to_dtype(candle_core::DType::F32)?.to_scalar::<f32>()?)
	}
}

/// The composite training objective with fixed weights.
#[derive(Debug, Clone)]
pub struct ZeroReferenceLoss {
	spatial: SpatialConsistency,
	exposure_target: f64,
}

impl ZeroReferenceLoss {
	pub fn new(device: &Device) -> Result<Self> {
		Ok(Self {
			spatial: SpatialConsistency::new(device)?,
			exposure_target: EXPOSURE_TARGET,
		})
	}

	/// `enhanced` and `original` are `(B, 3, H, W)`, `curves` is the curve map that produced `enhanced`.
	pub fn compute(&self, enhanced: &Tensor, original: &Tensor, curves: &Tensor) -> Result<LossTerms> {
		let loss_tv = total_variation(curves)?.affine(TV_WEIGHT, 0.0)?;
		let loss_spa = self.spatial.forward(enhanced, original)?.mean_all()?.affine(SPATIAL_WEIGHT, 0.0)?;
		let loss_col = color_constancy(enhanced)?.mean_all()?.affine(COLOR_WEIGHT, 0.0)?;
		let loss_exp = exposure(enhanced, self.exposure_target)?.affine(EXPOSURE_WEIGHT, 0.0)?;

		let total = loss_tv.add(&loss_spa)?.add(&loss_col)?.add(&loss_exp)?;

		Ok(LossTerms {
			total,
			total_variation: loss_tv.to_scalar::<f32>()?,
			spatial: loss_spa.to_scalar::<f32>()?,
			color: loss_col.to_scalar::<f32>()?,
			exposure: loss_exp.to_scalar::<f32>()?,
		})
	}
}
