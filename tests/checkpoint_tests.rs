use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zerodce::constants::network::NUMBER_F;
use zerodce::error::ZeroDceError;
use zerodce::network::EnhanceNet;
use zerodce::training::checkpoint::{
    assign_parameters, load_parameters, network_from_bytes, network_to_bytes, read_parameters, shuffle, unshuffle,
    CheckpointManager, NetworkDescription,
};

#[path = "test_helpers.rs"]
mod test_helpers;
use test_helpers::{assert_err, assert_ok};

fn flat_params(desc: &NetworkDescription) -> Vec<(String, Vec<f32>)> {
    desc.parameters
        .iter()
        .map(|p| (p.name.clone(), p.value.iter().cloned().collect()))
        .collect()
}

#[test]
fn test_shuffle_inverse() {
    for len in 0..20 {
        let data: Vec<u8> = (0..len as u8).collect();
        assert_eq!(unshuffle(&shuffle(&data, 4), 4), data);
    }
}

#[test]
fn test_save_then_load_restores_parameters() {
    let dir = TempDir::new().unwrap();
    let (source_map, _) = assert_ok(EnhanceNet::build(1, &Device::Cpu), "build source");
    let source = assert_ok(NetworkDescription::from_varmap(&source_map, 1, NUMBER_F), "describe");
    assert_eq!(source.parameters.len(), 28);

    let manager = CheckpointManager::new(dir.path().join("snapshots"), 10, false);
    let path = assert_ok(manager.save(9, source.clone()), "save");
    assert_eq!(path, dir.path().join("snapshots").join("Epoch9.pth"));
    assert!(path.is_file());

    let (target_map, _) = assert_ok(EnhanceNet::build(1, &Device::Cpu), "build target");
    assert_ok(load_parameters(&target_map, &path, 1), "load");
    let restored = assert_ok(NetworkDescription::from_varmap(&target_map, 1, NUMBER_F), "describe");
    assert_eq!(flat_params(&restored), flat_params(&source));
}

#[test]
fn test_description_header_survives() {
    let (varmap, _) = EnhanceNet::build(12, &Device::Cpu).unwrap();
    let desc = NetworkDescription::from_varmap(&varmap, 12, NUMBER_F).unwrap();
    let bytes = network_to_bytes(desc.clone(), false).unwrap();
    let decoded = network_from_bytes(&bytes).unwrap();
    assert_eq!(decoded.scale_factor, 12);
    assert_eq!(decoded.number_f, NUMBER_F as u32);
    assert_eq!(decoded, desc);
}

#[test]
fn test_quantised_checkpoint_is_smaller_and_close() {
    let (varmap, _) = EnhanceNet::build(1, &Device::Cpu).unwrap();
    let desc = NetworkDescription::from_varmap(&varmap, 1, NUMBER_F).unwrap();
    let full = network_to_bytes(desc.clone(), false).unwrap();
    let quantised = network_to_bytes(desc.clone(), true).unwrap();
    assert!(quantised.len() < full.len());

    let decoded = network_from_bytes(&quantised).unwrap();
    for ((_, a), (_, b)) in flat_params(&decoded).iter().zip(flat_params(&desc).iter()) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() <= y.abs() * 1e-3 + 1e-12);
        }
    }
}

#[test]
fn test_missing_file() {
    let (varmap, _) = EnhanceNet::build(1, &Device::Cpu).unwrap();
    let err = assert_err(load_parameters(&varmap, "nope/Epoch99.pth".as_ref(), 1), "missing checkpoint");
    assert!(matches!(err, ZeroDceError::FileNotFound(_)));
}

#[test]
fn test_corrupt_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Epoch0.pth");
    fs::write(&path, b"this is not a checkpoint").unwrap();
    assert!(read_parameters(&path).is_err());
}

#[test]
fn test_missing_parameter_is_reported() {
    let (varmap, _) = EnhanceNet::build(1, &Device::Cpu).unwrap();
    let mut tensors = HashMap::new();
    tensors.insert(
        "e_conv1.depth_conv.weight".to_string(),
        Tensor::zeros((3, 1, 3, 3), candle_core::DType::F32, &Device::Cpu).unwrap(),
    );
    let err = assert_err(assign_parameters(&varmap, &tensors), "partial state");
    assert!(matches!(err, ZeroDceError::Checkpoint(_)));
}

#[test]
fn test_shape_mismatch_is_reported() {
    let (varmap, _) = EnhanceNet::build(1, &Device::Cpu).unwrap();
    let desc = NetworkDescription::from_varmap(&varmap, 1, NUMBER_F).unwrap();
    let mut tensors = HashMap::new();
    for param in &desc.parameters {
        let values: Vec<f32> = param.value.iter().cloned().collect();
        tensors.insert(
            param.name.clone(),
            Tensor::from_vec(values, param.value.shape(), &Device::Cpu).unwrap(),
        );
    }
    tensors.insert(
        "e_conv7.point_conv.bias".to_string(),
        Tensor::zeros(4, candle_core::DType::F32, &Device::Cpu).unwrap(),
    );
    let err = assert_err(assign_parameters(&varmap, &tensors), "wrong shape");
    assert!(err.to_string().contains("e_conv7.point_conv.bias"));
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

#[test]
fn test_pytorch_state_dict_strips_data_parallel_prefix() {
    let (desc, tensors) = assert_ok(read_parameters(&fixture("state_dict.pth")), "read state_dict");
    assert!(desc.is_none());
    assert_eq!(tensors.len(), 28);
    assert!(tensors.keys().all(|name| name.starts_with("e_conv")));
    assert_eq!(tensors["e_conv5.depth_conv.weight"].dims(), &[64, 1, 3, 3]);
}

#[test]
fn test_pytorch_state_dict_fills_varmap() {
    let (varmap, _) = assert_ok(EnhanceNet::build(1, &Device::Cpu), "build");
    assert_ok(load_parameters(&varmap, &fixture("state_dict.pth"), 1), "load state_dict");
    let loaded = assert_ok(NetworkDescription::from_varmap(&varmap, 1, NUMBER_F), "describe");

    // element i of e_conv<L>.<part>.<kind> holds L (+0.1 point_conv) (+0.01 bias) + 0.001 * i
    for (name, values) in flat_params(&loaded) {
        let layer: f32 = name["e_conv".len()..name.find('.').unwrap()].parse().unwrap();
        let mut base = layer;
        if name.contains("point_conv") {
            base += 0.1;
        }
        if name.ends_with("bias") {
            base += 0.01;
        }
        for (i, value) in values.iter().enumerate() {
            let expected = base + 0.001 * i as f32;
            assert!((value - expected).abs() < 1e-4, "{}[{}] = {}, expected {}", name, i, value, expected);
        }
    }
}

#[test]
fn test_pytorch_state_dict_with_wrong_shape_is_rejected() {
    let (varmap, _) = EnhanceNet::build(1, &Device::Cpu).unwrap();
    let err = assert_err(
        load_parameters(&varmap, &fixture("state_dict_bad_shape.pth"), 1),
        "mis-shaped state_dict",
    );
    assert!(matches!(err, ZeroDceError::Checkpoint(_)));
    assert!(err.to_string().contains("e_conv7.point_conv.bias"));
}
