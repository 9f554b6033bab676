#![cfg(not(target_arch = "wasm32"))]

use std::fs;

use door_viewer::{
    LoadProgress,
    resources::{load_binary_with_progress, load_model_gltf},
};

use crate::common::test_utils::{door_bin, door_glb, door_json};

mod common;

fn asset_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("models")).unwrap();
    dir
}

#[tokio::test]
async fn should_report_progress_up_to_the_file_size() {
    let dir = asset_dir();
    // Large enough to arrive in several chunks.
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(dir.path().join("models/blob.bin"), &payload).unwrap();

    let mut reports: Vec<LoadProgress> = Vec::new();
    let root = dir.path().to_str().unwrap();
    let data = load_binary_with_progress(root, "/models/blob.bin", |p| reports.push(p))
        .await
        .unwrap();

    assert_eq!(data, payload);
    assert!(reports.len() > 1);
    assert!(reports.windows(2).all(|w| w[0].loaded < w[1].loaded));
    let last = reports.last().unwrap();
    assert_eq!(last.loaded, payload.len() as u64);
    assert_eq!(last.total, Some(payload.len() as u64));
    assert_eq!(last.percent(), Some(100.0));
}

#[tokio::test]
async fn should_load_a_glb_from_the_asset_root() {
    let dir = asset_dir();
    fs::write(dir.path().join("models/door.glb"), door_glb()).unwrap();

    let mut reported = 0;
    let data = load_model_gltf(dir.path().to_str().unwrap(), "models/door.glb", |_| {
        reported += 1
    })
    .await
    .unwrap();

    assert!(reported >= 1);
    assert_eq!(data.meshes.len(), 1);
    assert_eq!(data.animations[0].name, "opening");
}

#[tokio::test]
async fn should_resolve_external_buffers_next_to_the_model() {
    let dir = asset_dir();
    fs::write(
        dir.path().join("models/door.gltf"),
        door_json(Some("door.bin")),
    )
    .unwrap();
    fs::write(dir.path().join("models/door.bin"), door_bin()).unwrap();

    let data = load_model_gltf(dir.path().to_str().unwrap(), "models/door.gltf", |_| ())
        .await
        .unwrap();

    assert_eq!(data.meshes[0].indices, vec![0, 1, 2]);
    assert_eq!(data.graph.len(), 2);
}

#[tokio::test]
async fn should_decode_percent_encoded_buffer_uris() {
    let dir = asset_dir();
    fs::write(
        dir.path().join("models/door.gltf"),
        door_json(Some("door%20data.bin")),
    )
    .unwrap();
    fs::write(dir.path().join("models/door data.bin"), door_bin()).unwrap();

    let data = load_model_gltf(dir.path().to_str().unwrap(), "models/door.gltf", |_| ())
        .await
        .unwrap();

    assert_eq!(data.meshes[0].vertices.len(), 3);
}

#[tokio::test]
async fn should_fail_for_missing_assets() {
    let dir = asset_dir();
    let root = dir.path().to_str().unwrap();

    let err = load_model_gltf(root, "models/door.glb", |_| ()).await.unwrap_err();
    assert!(format!("{err:#}").contains("door.glb"));

    fs::write(dir.path().join("models/door.gltf"), door_json(Some("gone.bin"))).unwrap();
    assert!(load_model_gltf(root, "models/door.gltf", |_| ()).await.is_err());
}
