use crate::constants::scheduler::{EPS, FACTOR, MIN_LR, PATIENCE, THRESHOLD};

/// Lowers the learning rate when a minimised metric stops improving.
///
/// An epoch counts as an improvement when `metric < best * (1 - threshold)`. Once more than
/// `patience` epochs in a row fail to improve, the rate is multiplied by `factor` (bounded
/// below by `min_lr`) and the count starts over.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
	lr: f64,
	factor: f64,
	patience: usize,
	threshold: f64,
	min_lr: f64,
	best: f64,
	num_bad_epochs: usize,
}

impl ReduceLrOnPlateau {
	pub fn new(initial_lr: f64) -> Self {
		Self::with_params(initial_lr, FACTOR, PATIENCE, THRESHOLD, MIN_LR)
	}

	pub fn with_params(initial_lr: f64, factor: f64, patience: usize, threshold: f64, min_lr: f64) -> Self {
		Self {
			lr: initial_lr,
			factor,
			patience,
			threshold,
			min_lr,
			best: f64::INFINITY,
			num_bad_epochs: 0,
		}
	}

	pub fn learning_rate(&self) -> f64 {
		self.lr
	}

	pub fn best(&self) -> f64 {
		self.best
	}

	pub fn num_bad_epochs(&self) -> usize {
		self.num_bad_epochs
	}

	/// Records one epoch's metric. Returns the new learning rate when it was reduced.
	///
	/// Non-finite metrics are ignored.
	pub fn step(&mut self, metric: f64) -> Option<f64> {
		if !metric.is_finite() {
			return None;
		}

		if metric < self.best * (1.0 - self.threshold) {
			self.best = metric;
			self.num_bad_epochs = 0;
		} else {
			self.num_bad_epochs += 1;
		}

		if self.num_bad_epochs > self.patience {
			self.num_bad_epochs = 0;
			let new_lr = (self.lr * self.factor).max(self.min_lr);
			if self.lr - new_lr > EPS {
				self.lr = new_lr;
				return Some(new_lr);
			}
		}
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_first_metric_is_an_improvement() {
		let mut scheduler = ReduceLrOnPlateau::new(1e-4);
		assert_eq!(scheduler.step(10.0), None);
		assert_eq!(scheduler.best(), 10.0);
		assert_eq!(scheduler.num_bad_epochs(), 0);
	}

	#[test]
	fn test_reduces_after_patience_exceeded() {
		let mut scheduler = ReduceLrOnPlateau::new(1e-2);
		scheduler.step(1.0);
		for _ in 0..PATIENCE {
			assert_eq!(scheduler.step(1.0), None);
		}
		let reduced = scheduler.step(1.0).unwrap();
		assert!((reduced - 1e-3).abs() < 1e-12);
		assert_eq!(scheduler.num_bad_epochs(), 0);
	}

	#[test]
	fn test_tiny_improvement_counts_as_plateau() {
		let mut scheduler = ReduceLrOnPlateau::with_params(1.0, 0.5, 0, 1e-4, 0.0);
		scheduler.step(1.0);
		// 1e-6 relative improvement is below the threshold
		assert_eq!(scheduler.step(1.0 - 1e-6), Some(0.5));
	}

	#[test]
	fn test_respects_min_lr() {
		let mut scheduler = ReduceLrOnPlateau::with_params(1e-3, 0.1, 0, 1e-4, 5e-4);
		scheduler.step(1.0);
		assert_eq!(scheduler.step(2.0), Some(5e-4));
		// already at the floor
		assert_eq!(scheduler.step(2.0), None);
		assert_eq!(scheduler.learning_rate(), 5e-4);
	}

	#[test]
	fn test_ignores_nan() {
		let mut scheduler = ReduceLrOnPlateau::with_params(1.0, 0.1, 0, 1e-4, 0.0);
		scheduler.step(1.0);
		assert_eq!(scheduler.step(f64::NAN), None);
		assert_eq!(scheduler.num_bad_epochs(), 0);
	}
}
