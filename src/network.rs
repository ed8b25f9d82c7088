//! Curve estimation network.
//!
//! A stack of seven depthwise-separable convolutions predicts a per-pixel curve map
//! `A` in `[-1, 1]`, which brightens the input through repeated application of the
//! quadratic light-enhancement curve `x + A * (x^2 - x)`.

use crate::constants::network::{CHANNELS, CURVE_ITERATIONS, NUMBER_F};
use crate::error::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{Init, VarBuilder, VarMap};

/// A 3x3 depthwise convolution followed by a 1x1 pointwise convolution, both with bias.
#[derive(Debug, Clone)]
pub struct DepthwiseSeparableConv {
	depth_weight: Tensor,
	depth_bias: Tensor,
	point_weight: Tensor,
	point_bias: Tensor,
	in_channels: usize,
	out_channels: usize,
}

impl DepthwiseSeparableConv {
	pub fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
		let depth = vb.pp("depth_conv");
		let depth_init = fan_in_uniform(9);
		let depth_weight = depth.get_with_hints((in_channels, 1, 3, 3), "weight", depth_init)?;
		let depth_bias = depth.get_with_hints(in_channels, "bias", depth_init)?;

		let point = vb.pp("point_conv");
		let point_init = fan_in_uniform(in_channels);
		let point_weight = point.get_with_hints((out_channels, in_channels, 1, 1), "weight", point_init)?;
		let point_bias = point.get_with_hints(out_channels, "bias", point_init)?;

		Ok(Self {
			depth_weight,
			depth_bias,
			point_weight,
			point_bias,
			in_channels,
			out_channels,
		})
	}

	/// Runs in the dtype of `x`; parameters are cast on the fly.
	pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
		let dtype = x.dtype();
		let depth_weight = self.depth_weight.to_dtype(dtype)?;
		let depth_bias = self.depth_bias.to_dtype(dtype)?.reshape((1, self.in_channels, 1, 1))?;
		let point_weight = self.point_weight.to_dtype(dtype)?;
		let point_bias = self.point_bias.to_dtype(dtype)?.reshape((1, self.out_channels, 1, 1))?;

		let x = x.conv2d(&depth_weight, 1, 1, 1, self.in_channels)?.broadcast_add(&depth_bias)?;
		let x = x.conv2d(&point_weight, 0, 1, 1, 1)?.broadcast_add(&point_bias)?;
		Ok(x)
	}
}

/// Default convolution initialisation: uniform in `+-1/sqrt(fan_in)`.
fn fan_in_uniform(fan_in: usize) -> Init {
	let bound = 1.0 / (fan_in as f64).sqrt();
	Init::Uniform { lo: -bound, up: bound }
}

/// Output of one forward pass.
#[derive(Debug, Clone)]
pub struct EnhanceOutput {
	/// Enhanced image, same shape as the input.
	pub enhanced: Tensor,
	/// Curve map at input resolution, `(B, 3, H, W)` in `[-1, 1]`.
	pub curves: Tensor,
}

#[derive(Debug, Clone)]
pub struct EnhanceNet {
	layers: Vec<DepthwiseSeparableConv>,
	scale_factor: usize,
	compute_dtype: DType,
}

impl EnhanceNet {
	/// Parameters are registered under `e_conv{1..7}.{depth_conv,point_conv}.{weight,bias}`.
	pub fn new(vb: VarBuilder, scale_factor: usize) -> Result<Self> {
		let shapes = [
			(CHANNELS, NUMBER_F),
			(NUMBER_F, NUMBER_F),
			(NUMBER_F, NUMBER_F),
			(NUMBER_F, NUMBER_F),
			(NUMBER_F * 2, NUMBER_F),
			(NUMBER_F * 2, NUMBER_F),
			(NUMBER_F * 2, CHANNELS),
		];
		let layers = shapes
			.iter()
			.enumerate()
			.map(|(i, &(input, output))| DepthwiseSeparableConv::new(input, output, vb.pp(format!("e_conv{}", i + 1))))
			.collect::<Result<Vec<_>>>()?;

		Ok(Self {
			layers,
			scale_factor: scale_factor.max(1),
			compute_dtype: DType::F32,
		})
	}

	/// Creates a freshly initialised network together with the `VarMap` owning its parameters.
	pub fn build(scale_factor: usize, device: &Device) -> Result<(VarMap, Self)> {
		let varmap = VarMap::new();
		let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
		let net = Self::new(vb, scale_factor)?;
		Ok((varmap, net))
	}

	/// Runs the convolution stack in `dtype` (f16/bf16 for mixed precision).
	pub fn with_compute_dtype(mut self, dtype: DType) -> Self {
		self.compute_dtype = dtype;
		self
	}

	pub fn scale_factor(&self) -> usize {
		self.scale_factor
	}

	/// Predicts the curve map for an f32 `(B, 3, H, W)` batch, at input resolution.
	pub fn estimate_curves(&self, x: &Tensor) -> Result<Tensor> {
		let (_, _, height, width) = x.dims4()?;
		let x_down = if self.scale_factor == 1 {
			x.clone()
		} else {
			downsample_bilinear(x, self.scale_factor)?
		};
		let x_down = x_down.to_dtype(self.compute_dtype)?;

		let l = &self.layers;
		let x1 = l[0].forward(&x_down)?.relu()?;
		let x2 = l[1].forward(&x1)?.relu()?;
		let x3 = l[2].forward(&x2)?.relu()?;
		let x4 = l[3].forward(&x3)?.relu()?;
		let x5 = l[4].forward(&Tensor::cat(&[&x3, &x4], 1)?)?.relu()?;
		let x6 = l[5].forward(&Tensor::cat(&[&x2, &x5], 1)?)?.relu()?;
		let curves = l[6].forward(&Tensor::cat(&[&x1, &x6], 1)?)?.tanh()?;
		let curves = curves.to_dtype(DType::F32)?;

		if self.scale_factor == 1 {
			Ok(curves)
		} else {
			resize_bilinear(&curves, height, width, true)
		}
	}

	pub fn forward(&self, x: &Tensor) -> Result<EnhanceOutput> {
		let x = x.to_dtype(DType::F32)?;
		let curves = self.estimate_curves(&x)?;
		let enhanced = apply_curves(&x, &curves, CURVE_ITERATIONS)?;
		Ok(EnhanceOutput { enhanced, curves })
	}
}

/// Applies `x <- x + a * (x^2 - x)` `iterations` times.
pub fn apply_curves(x: &Tensor, curves: &Tensor, iterations: usize) -> Result<Tensor> {
	let mut x = x.clone();
	for _ in 0..iterations {
		let delta = curves.mul(&x.sqr()?.sub(&x)?)?;
		x = x.add(&delta)?;
	}
	Ok(x)
}

/// Bilinear resampling of a `(B, C, H, W)` tensor, differentiable through two matmuls.
///
/// With `align_corners` the corner pixels of input and output coincide; otherwise
/// pixel centres are aligned (half-pixel offsets, clamped at the border).
pub fn resize_bilinear(x: &Tensor, out_h: usize, out_w: usize, align_corners: bool) -> Result<Tensor> {
	let (_, _, height, width) = x.dims4()?;
	if (height, width) == (out_h, out_w) {
		return Ok(x.clone());
	}
	let mat_h = interpolation_matrix(height, out_h, align_corners);
	let mat_w = interpolation_matrix(width, out_w, align_corners);
	apply_resampling(x, mat_h, out_h, mat_w, out_w)
}

/// Shrinks a `(B, C, H, W)` tensor to `(H / factor, W / factor)`.
///
/// Source positions step by exactly `factor` pixels, so sizes that are not a multiple
/// of `factor` drop the trailing remainder instead of stretching the grid over it.
pub fn downsample_bilinear(x: &Tensor, factor: usize) -> Result<Tensor> {
	let (_, _, height, width) = x.dims4()?;
	if factor <= 1 {
		return Ok(x.clone());
	}
	let out_h = (height / factor).max(1);
	let out_w = (width / factor).max(1);
	let mat_h = downsample_matrix(height, out_h, factor);
	let mat_w = downsample_matrix(width, out_w, factor);
	apply_resampling(x, mat_h, out_h, mat_w, out_w)
}

fn apply_resampling(x: &Tensor, mat_h: Vec<f32>, out_h: usize, mat_w: Vec<f32>, out_w: usize) -> Result<Tensor> {
	let (batch, channels, height, width) = x.dims4()?;
	let device = x.device();
	let dtype = x.dtype();
	let mat_w = Tensor::from_vec(mat_w, (width, out_w), device)?.to_dtype(dtype)?;
	let mat_h = Tensor::from_vec(mat_h, (height, out_h), device)?.to_dtype(dtype)?;

	let x = x
		.contiguous()?
		.reshape((batch * channels * height, width))?
		.matmul(&mat_w)?
		.reshape((batch, channels, height, out_w))?
		.transpose(2, 3)?
		.contiguous()?
		.reshape((batch * channels * out_w, height))?
		.matmul(&mat_h)?
		.reshape((batch, channels, out_w, out_h))?
		.transpose(2, 3)?
		.contiguous()?;
	Ok(x)
}

/// Returns an `(input_len, output_len)` row-major matrix `M` such that `out = in . M`.
pub fn interpolation_matrix(input_len: usize, output_len: usize, align_corners: bool) -> Vec<f32> {
	if align_corners {
		sampling_matrix(input_len, output_len, |o| {
			if output_len > 1 {
				o as f64 * (input_len.saturating_sub(1)) as f64 / (output_len - 1) as f64
			} else {
				0.0
			}
		})
	} else {
		let ratio = input_len as f64 / output_len.max(1) as f64;
		sampling_matrix(input_len, output_len, |o| half_pixel_source(o, ratio))
	}
}

/// Like the half-pixel case of [`interpolation_matrix`], stepping by `factor` input pixels per output pixel.
pub fn downsample_matrix(input_len: usize, output_len: usize, factor: usize) -> Vec<f32> {
	sampling_matrix(input_len, output_len, |o| half_pixel_source(o, factor as f64))
}

fn half_pixel_source(o: usize, ratio: f64) -> f64 {
	((o as f64 + 0.5) * ratio - 0.5).max(0.0)
}

fn sampling_matrix<F: Fn(usize) -> f64>(input_len: usize, output_len: usize, source_of: F) -> Vec<f32> {
	let mut matrix = vec![0.0f32; input_len * output_len];
	if input_len == 0 {
		return matrix;
	}
	for o in 0..output_len {
		let source = source_of(o);
		let i0 = (source.floor() as usize).min(input_len - 1);
		let i1 = (i0 + 1).min(input_len - 1);
		let lambda = (source - i0 as f64).max(0.0).min(1.0) as f32;
		matrix[i0 * output_len + o] += 1.0 - lambda;
		matrix[i1 * output_len + o] += lambda;
	}
	matrix
}

/// Total number of scalar parameters held by `varmap`.
pub fn num_parameters(varmap: &VarMap) -> usize {
	varmap.all_vars().iter().map(|v| v.elem_count()).sum()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ramp(shape: (usize, usize, usize, usize)) -> Tensor {
		let n = shape.0 * shape.1 * shape.2 * shape.3;
		let data: Vec<f32> = (0..n).map(|i| (i % 17) as f32 / 17.0).collect();
		Tensor::from_vec(data, shape, &Device::Cpu).unwrap()
	}

	#[test]
	fn test_forward_shapes() {
		let (varmap, net) = EnhanceNet::build(1, &Device::Cpu).unwrap();
		let x = ramp((2, 3, 16, 16));
		let out = net.forward(&x).unwrap();
		assert_eq!(out.enhanced.dims(), &[2, 3, 16, 16]);
		assert_eq!(out.curves.dims(), &[2, 3, 16, 16]);
		assert_eq!(varmap.all_vars().len(), 28);
	}

	#[test]
	fn test_forward_with_scale_factor_restores_resolution() {
		let (_, net) = EnhanceNet::build(4, &Device::Cpu).unwrap();
		let x = ramp((1, 3, 16, 12));
		let out = net.forward(&x).unwrap();
		assert_eq!(out.curves.dims(), &[1, 3, 16, 12]);
		assert_eq!(out.enhanced.dims(), &[1, 3, 16, 12]);
	}

	#[test]
	fn test_curves_are_bounded() {
		let (_, net) = EnhanceNet::build(1, &Device::Cpu).unwrap();
		let curves = net.estimate_curves(&ramp((1, 3, 8, 8))).unwrap();
		let values = curves.flatten_all().unwrap().to_vec1::<f32>().unwrap();
		assert!(values.iter().all(|v| *v >= -1.0 && *v <= 1.0));
	}

	#[test]
	fn test_zero_curve_is_identity() {
		let x = ramp((1, 3, 4, 4));
		let zeros = x.zeros_like().unwrap();
		let y = apply_curves(&x, &zeros, CURVE_ITERATIONS).unwrap();
		let diff = y.sub(&x).unwrap().sqr().unwrap().sum_all().unwrap().to_scalar::<f32>().unwrap();
		assert_eq!(diff, 0.0);
	}

	#[test]
	fn test_negative_curve_brightens() {
		let x = Tensor::full(0.2f32, (1, 3, 2, 2), &Device::Cpu).unwrap();
		let curves = Tensor::full(-1.0f32, (1, 3, 2, 2), &Device::Cpu).unwrap();
		let y = apply_curves(&x, &curves, 1).unwrap();
		let value = y.flatten_all().unwrap().to_vec1::<f32>().unwrap()[0];
		// 0.2 - (0.04 - 0.2) = 0.36
		assert!((value - 0.36).abs() < 1e-6);
	}

	#[test]
	fn test_interpolation_matrix_identity() {
		let m = interpolation_matrix(3, 3, false);
		assert_eq!(m, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
	}

	#[test]
	fn test_interpolation_columns_sum_to_one() {
		for &align in &[true, false] {
			let m = interpolation_matrix(5, 11, align);
			for o in 0..11 {
				let total: f32 = (0..5).map(|i| m[i * 11 + o]).sum();
				assert!((total - 1.0).abs() < 1e-6);
			}
		}
	}

	#[test]
	fn test_resize_align_corners_keeps_corners() {
		let data: Vec<f32> = vec![0.0, 1.0, 2.0, 3.0];
		let x = Tensor::from_vec(data, (1, 1, 2, 2), &Device::Cpu).unwrap();
		let y = resize_bilinear(&x, 3, 3, true).unwrap();
		let values = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
		assert_eq!(values.len(), 9);
		assert!((values[0] - 0.0).abs() < 1e-6);
		assert!((values[2] - 1.0).abs() < 1e-6);
		assert!((values[4] - 1.5).abs() < 1e-6);
		assert!((values[8] - 3.0).abs() < 1e-6);
	}

	#[test]
	fn test_downsample_steps_by_factor() {
		// width 18 shrunk by 4 samples source positions 1.5, 5.5, 9.5 and 13.5
		let data: Vec<f32> = (0..18).map(|i| i as f32).collect();
		let x = Tensor::from_vec(data, (1, 1, 1, 18), &Device::Cpu).unwrap();
		let y = downsample_bilinear(&x, 4).unwrap();
		assert_eq!(y.dims(), &[1, 1, 1, 4]);
		let values = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
		for (value, expected) in values.iter().zip([1.5f32, 5.5, 9.5, 13.5].iter()) {
			assert!((value - expected).abs() < 1e-5, "{} != {}", value, expected);
		}
	}

	#[test]
	fn test_downsample_matches_resize_when_divisible() {
		assert_eq!(downsample_matrix(16, 4, 4), interpolation_matrix(16, 4, false));
	}

	#[test]
	fn test_downsample_of_constant_is_constant() {
		let x = Tensor::full(0.25f32, (1, 3, 8, 8), &Device::Cpu).unwrap();
		let y = resize_bilinear(&x, 2, 2, false).unwrap();
		let values = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
		assert!(values.iter().all(|v| (v - 0.25).abs() < 1e-6));
	}
}
