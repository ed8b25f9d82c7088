use candle_core::Device;
use std::fs;
use tempfile::TempDir;
use zerodce::error::ZeroDceError;
use zerodce::training::{DataLoader, LowlightDataset};

#[path = "test_helpers.rs"]
mod test_helpers;
use test_helpers::{assert_err, assert_ok, write_lowlight_folder, write_lowlight_image};

#[test]
fn test_folder_listing_is_sorted_and_filtered() {
    let dir = TempDir::new().unwrap();
    write_lowlight_folder(dir.path(), 3, 16);
    fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();
    fs::create_dir(dir.path().join("nested.png")).unwrap();

    let dataset = assert_ok(LowlightDataset::from_folder(dir.path(), Some(16)), "list folder");
    assert_eq!(dataset.len(), 3);
    let names: Vec<_> = dataset
        .files()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["img_000.png", "img_001.png", "img_002.png"]);
}

#[test]
fn test_empty_folder_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("readme.md"), b"#").unwrap();
    let err = assert_err(LowlightDataset::from_folder(dir.path(), None), "empty folder");
    assert!(matches!(err, ZeroDceError::EmptyDataset(_)));
}

#[test]
fn test_missing_folder_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = assert_err(LowlightDataset::from_folder(&dir.path().join("missing"), None), "missing folder");
    assert!(matches!(err, ZeroDceError::FileNotFound(_)));
}

#[test]
fn test_samples_are_resized_and_normalised() {
    let dir = TempDir::new().unwrap();
    write_lowlight_image(&dir.path().join("wide.png"), 40, 20, 1);
    let dataset = LowlightDataset::from_folder(dir.path(), Some(16)).unwrap();
    let image = dataset.load(0).unwrap();
    assert_eq!((image.width, image.height), (16, 16));
    assert_eq!(image.data.len(), 3 * 16 * 16);
    assert!(image.data.iter().all(|v| *v >= 0.0 && *v <= 1.0));
    assert!(dataset.load(1).is_err());
}

#[test]
fn test_batches_cover_every_sample_once() {
    let dir = TempDir::new().unwrap();
    write_lowlight_folder(dir.path(), 5, 16);
    let dataset = LowlightDataset::from_folder(dir.path(), Some(16)).unwrap();
    let mut loader = DataLoader::new(dataset, 2, true, 2, Some(3), Device::Cpu).unwrap();
    assert_eq!(loader.num_batches(), 3);

    let mut epoch = loader.epoch();
    let mut order = epoch.order().to_vec();
    let sizes: Vec<usize> = epoch
        .by_ref()
        .map(|batch| {
            let batch = batch.unwrap();
            assert_eq!(&batch.dims()[1..], &[3, 16, 16]);
            batch.dims()[0]
        })
        .collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    order.sort();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_seeded_shuffle_is_reproducible() {
    let dir = TempDir::new().unwrap();
    write_lowlight_folder(dir.path(), 8, 16);
    let dataset = LowlightDataset::from_folder(dir.path(), Some(16)).unwrap();

    let mut a = DataLoader::new(dataset.clone(), 4, true, 0, Some(42), Device::Cpu).unwrap();
    let mut b = DataLoader::new(dataset.clone(), 4, true, 0, Some(42), Device::Cpu).unwrap();
    let first_a = a.epoch().order().to_vec();
    let first_b = b.epoch().order().to_vec();
    assert_eq!(first_a, first_b);

    let mut plain = DataLoader::new(dataset, 4, false, 0, None, Device::Cpu).unwrap();
    assert_eq!(plain.epoch().order(), &[0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_lowlight_folder(dir.path(), 1, 16);
    let dataset = LowlightDataset::from_folder(dir.path(), None).unwrap();
    assert!(DataLoader::new(dataset, 0, false, 0, None, Device::Cpu).is_err());
}
