use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZeroDceError {
	#[error("IO error: {0}")]
	Io(#[from] io::Error),

	#[error("Image processing error: {0}")]
	Image(String),

	#[error("Tensor error: {0}")]
	Tensor(#[from] candle_core::Error),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("Invalid parameter: {0}")]
	InvalidParameter(String),

	#[error("File not found: {}", .0.display())]
	FileNotFound(PathBuf),

	#[error("No images found in {}", .0.display())]
	EmptyDataset(PathBuf),

	#[error("Checkpoint error: {0}")]
	Checkpoint(String),

	#[error("Serialization error: {0}")]
	Serialization(String),

	#[error("Training error: {0}")]
	Training(String),
}

impl From<image::ImageError> for ZeroDceError {
	fn from(err: image::ImageError) -> Self {
		ZeroDceError::Image(err.to_string())
	}
}

impl From<bincode::Error> for ZeroDceError {
	fn from(err: bincode::Error) -> Self {
		ZeroDceError::Serialization(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, ZeroDceError>;
