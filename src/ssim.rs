use crate::constants::ssim::{DATA_RANGE, K1, K2, WINDOW_SIZE};
use crate::error::{Result, ZeroDceError};
use crate::image_io::ChwImage;
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};

/// Mean structural similarity of two `(C, H, W)` images.
///
/// Each channel is scored with a 7x7 uniform window over every position where the
/// window fits entirely inside the image (sample covariance), then channels are averaged.
pub fn ssim(image1: ArrayView3<f32>, image2: ArrayView3<f32>) -> Result<f64> {
	if image1.shape() != image2.shape() {
		return Err(ZeroDceError::InvalidParameter(format!(
			"SSIM needs equally shaped images, got {:?} and {:?}",
			image1.shape(),
			image2.shape()
		)));
	}
	let channels = image1.shape()[0];
	if channels == 0 {
		return Err(ZeroDceError::InvalidParameter("SSIM needs at least one channel".into()));
	}

	let mut total = 0.0;
	for c in 0..channels {
		total += ssim_channel(image1.subview(Axis(0), c), image2.subview(Axis(0), c))?;
	}
	Ok(total / channels as f64)
}

pub fn ssim_images(image1: &ChwImage, image2: &ChwImage) -> Result<f64> {
	let view1 = ArrayView3::from_shape((3, image1.height, image1.width), &image1.data)
		.map_err(|e| ZeroDceError::InvalidParameter(format!("Bad image layout: {}", e)))?;
	let view2 = ArrayView3::from_shape((3, image2.height, image2.width), &image2.data)
		.map_err(|e| ZeroDceError::InvalidParameter(format!("Bad image layout: {}", e)))?;
	ssim(view1, view2)
}

pub fn ssim_channel(x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f64> {
	let (height, width) = x.dim();
	if height < WINDOW_SIZE || width < WINDOW_SIZE {
		return Err(ZeroDceError::InvalidParameter(format!(
			"SSIM needs images of at least {}x{}, got {}x{}",
			WINDOW_SIZE, WINDOW_SIZE, width, height
		)));
	}

	let sum_x = integral(&x, &x, |a, _| a);
	let sum_y = integral(&y, &y, |a, _| a);
	let sum_xx = integral(&x, &x, |a, b| a * b);
	let sum_yy = integral(&y, &y, |a, b| a * b);
	let sum_xy = integral(&x, &y, |a, b| a * b);

	let np = (WINDOW_SIZE * WINDOW_SIZE) as f64;
	let cov_norm = np / (np - 1.0);
	let c1 = (K1 * DATA_RANGE).powi(2);
	let c2 = (K2 * DATA_RANGE).powi(2);

	let mut total = 0.0;
	let mut count = 0usize;
	for top in 0..=(height - WINDOW_SIZE) {
		for left in 0..=(width - WINDOW_SIZE) {
			let ux = window_sum(&sum_x, top, left) / np;
			let uy = window_sum(&sum_y, top, left) / np;
			let uxx = window_sum(&sum_xx, top, left) / np;
			let uyy = window_sum(&sum_yy, top, left) / np;
			let uxy = window_sum(&sum_xy, top, left) / np;

			let vx = cov_norm * (uxx - ux * ux);
			let vy = cov_norm * (uyy - uy * uy);
			let vxy = cov_norm * (uxy - ux * uy);

			let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
			let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
			total += numerator / denominator;
			count += 1;
		}
	}

	Ok(total / count as f64)
}

/// Summed area table of `f(a, b)` with a zero first row and column.
fn integral<F>(a: &ArrayView2<f32>, b: &ArrayView2<f32>, f: F) -> Array2<f64>
where
	F: Fn(f64, f64) -> f64,
{
	let (height, width) = a.dim();
	let mut table = Array2::<f64>::zeros((height + 1, width + 1));
	for i in 0..height {
		let mut row = 0.0;
		for j in 0..width {
			row += f(f64::from(a[[i, j]]), f64::from(b[[i, j]]));
			table[[i + 1, j + 1]] = table[[i, j + 1]] + row;
		}
	}
	table
}

fn window_sum(table: &Array2<f64>, top: usize, left: usize) -> f64 {
	let bottom = top + WINDOW_SIZE;
	let right = left + WINDOW_SIZE;
	table[[bottom, right]] - table[[top, right]] - table[[bottom, left]] + table[[top, left]]
}
