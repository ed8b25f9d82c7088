use crate::constants::grad_scaler::{BACKOFF_FACTOR, GROWTH_FACTOR, GROWTH_INTERVAL, INIT_SCALE};
use crate::error::Result;
use candle_core::Tensor;

/// Dynamic loss scaling for half precision training.
///
/// The loss is multiplied by `scale` before backpropagation so small gradients survive
/// f16, and gradients are divided by it again before the optimizer step. A step whose
/// gradients overflowed is skipped and the scale backs off; after `growth_interval`
/// clean steps the scale grows. A disabled scaler is the identity and never skips.
#[derive(Debug, Clone)]
pub struct GradScaler {
	enabled: bool,
	scale: f64,
	growth_factor: f64,
	backoff_factor: f64,
	growth_interval: usize,
	growth_tracker: usize,
}

impl GradScaler {
	pub fn new(enabled: bool) -> Self {
		Self {
			enabled,
			scale: INIT_SCALE,
			growth_factor: GROWTH_FACTOR,
			backoff_factor: BACKOFF_FACTOR,
			growth_interval: GROWTH_INTERVAL,
			growth_tracker: 0,
		}
	}

	pub fn with_growth_interval(mut self, interval: usize) -> Self {
		self.growth_interval = interval.max(1);
		self
	}

	/// Current multiplier, 1 when disabled.
	pub fn scale(&self) -> f64 {
		if self.enabled {
			self.scale
		} else {
			1.0
		}
	}

	pub fn scale_loss(&self, loss: &Tensor) -> Result<Tensor> {
		if self.enabled {
			Ok(loss.affine(self.scale, 0.0)?)
		} else {
			Ok(loss.clone())
		}
	}

	/// Whether the optimizer should skip this step.
	pub fn should_skip(&self, grads_finite: bool) -> bool {
		self.enabled && !grads_finite
	}

	/// Adjusts the scale after a step. Returns true when the scale was lowered.
	pub fn update(&mut self, grads_finite: bool) -> bool {
		if !self.enabled {
			return false;
		}
		if grads_finite {
			self.growth_tracker += 1;
			if self.growth_tracker >= self.growth_interval {
				self.scale *= self.growth_factor;
				self.growth_tracker = 0;
			}
			false
		} else {
			self.scale *= self.backoff_factor;
			self.growth_tracker = 0;
			true
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use candle_core::Device;

	#[test]
	fn test_disabled_scaler_is_identity() {
		let mut scaler = GradScaler::new(false);
		assert_eq!(scaler.scale(), 1.0);
		assert!(!scaler.should_skip(false));
		assert!(!scaler.update(false));
		let loss = Tensor::new(3.0f32, &Device::Cpu).unwrap();
		let scaled = scaler.scale_loss(&loss).unwrap().to_scalar::<f32>().unwrap();
		assert_eq!(scaled, 3.0);
	}

	#[test]
	fn test_backoff_on_overflow() {
		let mut scaler = GradScaler::new(true);
		assert!(scaler.should_skip(false));
		assert!(scaler.update(false));
		assert_eq!(scaler.scale(), INIT_SCALE * BACKOFF_FACTOR);
	}

	#[test]
	fn test_growth_after_interval() {
		let mut scaler = GradScaler::new(true).with_growth_interval(3);
		scaler.update(true);
		scaler.update(true);
		assert_eq!(scaler.scale(), INIT_SCALE);
		scaler.update(true);
		assert_eq!(scaler.scale(), INIT_SCALE * GROWTH_FACTOR);
	}

	#[test]
	fn test_overflow_resets_growth_tracker() {
		let mut scaler = GradScaler::new(true).with_growth_interval(2);
		scaler.update(true);
		scaler.update(false);
		scaler.update(true);
		assert_eq!(scaler.scale(), INIT_SCALE * BACKOFF_FACTOR);
		scaler.update(true);
		assert_eq!(scaler.scale(), INIT_SCALE);
	}

	#[test]
	fn test_scale_loss() {
		let scaler = GradScaler::new(true);
		let loss = Tensor::new(0.5f32, &Device::Cpu).unwrap();
		let scaled = scaler.scale_loss(&loss).unwrap().to_scalar::<f32>().unwrap();
		assert_eq!(scaled as f64, 0.5 * INIT_SCALE);
	}
}
