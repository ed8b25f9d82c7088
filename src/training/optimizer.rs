use crate::constants::training::{ADAM_BETA1, ADAM_BETA2, ADAM_EPS};
use crate::error::Result;
use crate::training::grad_scaler::GradScaler;
use candle_core::backprop::GradStore;
use candle_core::{DType, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};

/// Outcome of one optimizer step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
	/// Global L2 norm of the unscaled gradients, before clipping.
	pub grad_norm: f64,
	pub grads_finite: bool,
	pub clipped: bool,
	pub skipped: bool,
}

/// Adam with L2 weight decay added to the gradients and optional global norm clipping.
pub struct Adam {
	inner: AdamW,
	vars: Vec<Var>,
	weight_decay: f64,
	grad_clip_norm: Option<f64>,
}

impl Adam {
	/// Clipping is off when `grad_clip_norm` is `None` or 0.
	pub fn new(vars: Vec<Var>, lr: f64, weight_decay: f64, grad_clip_norm: Option<f64>) -> Result<Self> {
		let params = ParamsAdamW {
			lr,
			beta1: ADAM_BETA1,
			beta2: ADAM_BETA2,
			eps: ADAM_EPS,
			weight_decay: 0.0,
		};
		Ok(Self {
			inner: AdamW::new(vars.clone(), params)?,
			vars,
			weight_decay,
			grad_clip_norm: grad_clip_norm.filter(|norm| *norm > 0.0),
		})
	}

	pub fn learning_rate(&self) -> f64 {
		self.inner.learning_rate()
	}

	pub fn set_learning_rate(&mut self, lr: f64) {
		self.inner.set_learning_rate(lr)
	}

	/// Global L2 norm of the gradients held in `grads` for this optimizer's variables.
	pub fn grad_norm(&self, grads: &GradStore) -> Result<f64> {
		let mut total = 0.0f64;
		for var in &self.vars {
			if let Some(grad) = grads.get(var) {
				total += f64::from(grad.to_dtype(DType::F32)?.sqr()?.sum_all()?.to_scalar::<f32>()?);
			}
		}
		Ok(total.sqrt())
	}

	/// Updates the parameters from gradients of a loss that was scaled by `scaler`.
	///
	/// A step the scaler rejects (inf or NaN gradients under mixed precision) leaves the parameters untouched.
	pub fn step(&mut self, mut grads: GradStore, scaler: &GradScaler) -> Result<StepReport> {
		let loss_scale = scaler.scale();
		let grad_norm = self.grad_norm(&grads)? / loss_scale;
		let grads_finite = grad_norm.is_finite();
		if scaler.should_skip(grads_finite) {
			return Ok(StepReport {
				grad_norm,
				grads_finite,
				clipped: false,
				skipped: true,
			});
		}

		let mut coefficient = 1.0 / loss_scale;
		let mut clipped = false;
		if let Some(max_norm) = self.grad_clip_norm {
			let clip = max_norm / (grad_norm + 1e-6);
			if clip < 1.0 {
				coefficient *= clip;
				clipped = true;
			}
		}

		for var in &self.vars {
			let updated = match grads.get(var) {
				Some(grad) => {
					let grad = grad.affine(coefficient, 0.0)?;
					if self.weight_decay > 0.0 {
						grad.add(&var.as_tensor().affine(self.weight_decay, 0.0)?)?
					} else {
						grad
					}
				}
				None => continue,
			};
			grads.insert(var, updated);
		}

		self.inner.step(&grads)?;

		Ok(StepReport {
			grad_norm,
			grads_finite,
			clipped,
			skipped: false,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use candle_core::{Device, Tensor};

	fn quadratic_grads(var: &Var, scale: f64) -> GradStore {
		// d/dx of scale * sum(x^2)
		var.as_tensor().sqr().unwrap().sum_all().unwrap().affine(scale, 0.0).unwrap().backward().unwrap()
	}

	#[test]
	fn test_step_moves_against_gradient() {
		let var = Var::new(&[1.0f32, -2.0], &Device::Cpu).unwrap();
		let mut adam = Adam::new(vec![var.clone()], 0.1, 0.0, None).unwrap();
		let report = adam.step(quadratic_grads(&var, 1.0), &GradScaler::new(false)).unwrap();
		assert!(!report.skipped);
		assert!(!report.clipped);
		let values = var.as_tensor().to_vec1::<f32>().unwrap();
		// first Adam step moves each coordinate by lr towards zero
		assert!((values[0] - 0.9).abs() < 1e-4);
		assert!((values[1] + 1.9).abs() < 1e-4);
	}

	#[test]
	fn test_grad_norm_is_unscaled() {
		let var = Var::new(&[3.0f32, 4.0], &Device::Cpu).unwrap();
		let mut adam = Adam::new(vec![var.clone()], 0.1, 0.0, Some(1.0)).unwrap();
		let scaler = GradScaler::new(true);
		// gradient 2x = (6, 8), norm 10, computed from a scaled loss
		let report = adam.step(quadratic_grads(&var, scaler.scale()), &scaler).unwrap();
		assert!((report.grad_norm - 10.0).abs() < 1e-3);
		assert!(report.clipped);
	}

	#[test]
	fn test_non_finite_step_is_skipped() {
		let var = Var::new(&[1.0f32], &Device::Cpu).unwrap();
		let mut adam = Adam::new(vec![var.clone()], 0.1, 0.0, None).unwrap();
		let mut grads = quadratic_grads(&var, 1.0);
		grads.insert(&var, Tensor::new(&[f32::INFINITY], &Device::Cpu).unwrap());
		let report = adam.step(grads, &GradScaler::new(true)).unwrap();
		assert!(report.skipped);
		assert!(!report.grads_finite);
		assert_eq!(var.as_tensor().to_vec1::<f32>().unwrap(), vec![1.0]);
	}

	#[test]
	fn test_learning_rate_can_be_changed() {
		let var = Var::new(&[1.0f32], &Device::Cpu).unwrap();
		let mut adam = Adam::new(vec![var], 0.1, 1e-4, Some(0.1)).unwrap();
		adam.set_learning_rate(0.01);
		assert_eq!(adam.learning_rate(), 0.01);
	}
}
