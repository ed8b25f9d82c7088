use crate::error::{Result, ZeroDceError};
use candle_core::{DType, Device};
use std::fmt;
use tracing::{info, warn};

/// Where tensors live during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceKind {
	/// CUDA device 0 when compiled with the `cuda` feature and a GPU is present, CPU otherwise.
	Auto,
	Cpu,
	Cuda,
}

impl fmt::Display for DeviceKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			DeviceKind::Auto => write!(f, "auto"),
			DeviceKind::Cpu => write!(f, "cpu"),
			DeviceKind::Cuda => write!(f, "cuda"),
		}
	}
}

impl DeviceKind {
	pub fn from_str(s: &str) -> Result<Self> {
		match s.to_lowercase().as_str() {
			"auto" => Ok(DeviceKind::Auto),
			"cpu" | "none" => Ok(DeviceKind::Cpu),
			"cuda" | "gpu" => Ok(DeviceKind::Cuda),
			_ => Err(ZeroDceError::InvalidParameter(format!(
				"Unknown device: {}. Valid options: auto, cpu, cuda",
				s
			))),
		}
	}

	/// Resolves to a concrete device, always ordinal 0.
	pub fn resolve(&self) -> Result<Device> {
		let device = match self {
			DeviceKind::Cpu => Device::Cpu,
			DeviceKind::Auto => Device::cuda_if_available(0)?,
			DeviceKind::Cuda => Device::new_cuda(0)?,
		};
		if device.is_cuda() {
			info!("Using CUDA device 0");
		} else {
			info!("Using CPU device");
		}
		Ok(device)
	}
}

/// Numeric precision of the convolution stack. Curve application and losses stay in f32.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Precision {
	F32,
	F16,
	Bf16,
}

impl fmt::Display for Precision {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Precision::F32 => write!(f, "f32"),
			Precision::F16 => write!(f, "f16"),
			Precision::Bf16 => write!(f, "bf16"),
		}
	}
}

impl Precision {
	pub fn from_str(s: &str) -> Result<Self> {
		match s.to_lowercase().as_str() {
			"f32" | "full" => Ok(Precision::F32),
			"f16" | "half" | "mixed" => Ok(Precision::F16),
			"bf16" => Ok(Precision::Bf16),
			_ => Err(ZeroDceError::InvalidParameter(format!(
				"Unknown precision: {}. Valid options: f32, f16, bf16",
				s
			))),
		}
	}

	pub fn dtype(&self) -> DType {
		match self {
			Precision::F32 => DType::F32,
			Precision::F16 => DType::F16,
			Precision::Bf16 => DType::BF16,
		}
	}

	pub fn is_mixed(&self) -> bool {
		*self != Precision::F32
	}

	/// Half precision convolutions are only worthwhile on the GPU.
	pub fn for_device(self, device: &Device) -> Self {
		if self.is_mixed() && !device.is_cuda() {
			warn!("{} precision requested on CPU, falling back to f32", self);
			Precision::F32
		} else {
			self
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_device_kind_parsing() {
		assert_eq!(DeviceKind::from_str("CPU").unwrap(), DeviceKind::Cpu);
		assert_eq!(DeviceKind::from_str("gpu").unwrap(), DeviceKind::Cuda);
		assert!(DeviceKind::from_str("tpu").is_err());
	}

	#[test]
	fn test_precision_falls_back_on_cpu() {
		let precision = Precision::from_str("f16").unwrap();
		assert!(precision.is_mixed());
		assert_eq!(precision.for_device(&Device::Cpu), Precision::F32);
		assert_eq!(Precision::Bf16.dtype(), DType::BF16);
	}
}
