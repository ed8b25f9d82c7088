//! Test helper functions for result-based assertions and generated image folders
//!
//! These helpers provide better error messages and more explicit error handling
//! compared to using .unwrap() directly in tests.
#![allow(dead_code)]

use image::{ImageBuffer, Rgb};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Assert that a Result is Ok and return the unwrapped value.
/// Provides a descriptive error message on failure.
pub fn assert_ok<T, E: Debug>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("Expected Ok result for {}, but got error: {:?}", context, err),
    }
}

/// Assert that a Result is Err and return the error.
/// Provides a descriptive error message on unexpected success.
pub fn assert_err<T: Debug, E>(result: Result<T, E>, context: &str) -> E {
    match result {
        Err(err) => err,
        Ok(val) => panic!("Expected Err result for {}, but got Ok: {:?}", context, val),
    }
}

/// Assert that a string contains a substring, with helpful error message.
pub fn assert_contains(haystack: &str, needle: &str, context: &str) {
    assert!(
        haystack.contains(needle),
        "{}: Expected to find '{}' in output, but got: '{}'",
        context,
        needle,
        haystack
    );
}

/// Writes a dim, smoothly varying RGB image; `seed` shifts the pattern.
pub fn write_lowlight_image(path: &Path, width: u32, height: u32, seed: u32) {
    let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        let r = ((x * 3 + seed * 7) % 40) as u8 + 10;
        let g = ((y * 2 + seed * 5) % 30) as u8 + 15;
        let b = (((x + y) + seed * 11) % 50) as u8 + 5;
        Rgb([r, g, b])
    });
    assert_ok(buffer.save(path), "writing test image");
}

/// Fills `dir` with `count` PNG images named `img_000.png`, ... and returns their paths.
pub fn write_lowlight_folder(dir: &Path, count: usize, size: u32) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("img_{:03}.png", i));
            write_lowlight_image(&path, size, size, i as u32);
            path
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_ok_success() {
        let result: Result<i32, String> = Ok(42);
        assert_eq!(assert_ok(result, "test operation"), 42);
    }

    #[test]
    #[should_panic(expected = "Expected Ok result for test operation")]
    fn test_assert_ok_failure() {
        let result: Result<i32, String> = Err("error".to_string());
        assert_ok(result, "test operation");
    }

    #[test]
    #[should_panic(expected = "Expected Err result for test operation")]
    fn test_assert_err_failure() {
        let result: Result<i32, String> = Ok(42);
        assert_err(result, "test operation");
    }
}
