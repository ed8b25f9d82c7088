use crate::constants::file::IMAGE_EXTENSIONS;
use crate::error::{Result, ZeroDceError};
use std::fs;
use std::path::{Path, PathBuf};

/// Validates that a file exists and is readable
pub fn validate_input_file(path: &Path) -> Result<PathBuf> {
	if !path.exists() {
		return Err(ZeroDceError::FileNotFound(path.to_path_buf()));
	}

	if !path.is_file() {
		return Err(ZeroDceError::InvalidParameter(format!("{} is not a file", path.display())));
	}

	fs::metadata(path)?;

	Ok(path.to_path_buf())
}

/// Validates that a directory exists
pub fn validate_directory(path: &Path) -> Result<PathBuf> {
	if !path.exists() {
		return Err(ZeroDceError::FileNotFound(path.to_path_buf()));
	}

	if !path.is_dir() {
		return Err(ZeroDceError::InvalidParameter(format!("{} is not a directory", path.display())));
	}

	Ok(path.to_path_buf())
}

/// Creates the output directory if absent; an existing non-directory is an error
pub fn ensure_output_directory(path: &Path) -> Result<PathBuf> {
	if path.exists() && !path.is_dir() {
		return Err(ZeroDceError::InvalidParameter(format!(
			"{} exists but is not a directory",
			path.display()
		)));
	}
	fs::create_dir_all(path)?;
	Ok(path.to_path_buf())
}

/// True for files with one of the supported image extensions (case insensitive)
pub fn is_image_file(path: &Path) -> bool {
	path.is_file()
		&& path
			.extension()
			.and_then(|e| e.to_str())
			.map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
			.unwrap_or(false)
}

/// Validates a positive integer parameter
pub fn validate_positive_int(value: &str, param_name: &str) -> Result<usize> {
	let parsed = value
		.parse::<usize>()
		.map_err(|_| ZeroDceError::Parse(format!("{} must be a positive integer", param_name)))?;

	if parsed == 0 {
		return Err(ZeroDceError::InvalidParameter(format!("{} must be greater than 0", param_name)));
	}

	Ok(parsed)
}

/// Validates a non-negative float parameter
pub fn validate_non_negative_float(value: &str, param_name: &str) -> Result<f64> {
	let parsed = value
		.parse::<f64>()
		.map_err(|_| ZeroDceError::Parse(format!("{} must be a valid number", param_name)))?;

	if !parsed.is_finite() || parsed < 0.0 {
		return Err(ZeroDceError::InvalidParameter(format!(
			"{} must be a finite, non-negative number",
			param_name
		)));
	}

	Ok(parsed)
}
