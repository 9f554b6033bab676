/**
 * This module contains all logic for loading models from external files and
 * turning them into GPU resources.
 */
use std::collections::HashMap;

use anyhow::Context as _;
use wgpu::util::DeviceExt;

use crate::data_structures::model::{MaterialData, Mesh, Model};

pub mod import;
pub mod texture;

pub use import::{ModelData, parse_gltf};

/// Bytes received so far while fetching an asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    /// `None` when the size is not known up front.
    pub total: Option<u64>,
}

impl LoadProgress {
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some(self.loaded as f64 / total as f64 * 100.0),
            None => None,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
const CHUNK_SIZE: usize = 64 * 1024;

/// File system location of an asset.
///
/// A leading `/` means "relative to the asset root", mirroring how a web page
/// resolves `/models/door.glb` against its origin.
#[cfg(not(target_arch = "wasm32"))]
pub fn resolve_asset_path(root: &str, file_name: &str) -> std::path::PathBuf {
    std::path::Path::new(root).join(file_name.trim_start_matches('/'))
}

/// URL of an asset below `root` on the page origin.
///
/// Absolute `http(s)` URLs are returned as they are. A leading `/` is relative
/// to `root`, as on the file system.
pub fn resolve_asset_url(origin: &str, root: &str, file_name: &str) -> String {
    if file_name.starts_with("http://") || file_name.starts_with("https://") {
        return file_name.to_string();
    }
    let origin = origin.trim_end_matches('/');
    let file_name = file_name.trim_start_matches('/');
    let root = root.trim_matches('/');
    if root.is_empty() {
        format!("{origin}/{file_name}")
    } else {
        format!("{origin}/{root}/{file_name}")
    }
}

/// `uri` interpreted relative to the directory containing `asset_path`.
pub fn sibling_path(asset_path: &str, uri: &str) -> String {
    match asset_path.rfind('/') {
        Some(idx) => format!("{}{}", &asset_path[..=idx], uri),
        None => uri.to_string(),
    }
}

/// Asset path of a file `uri` references from the model at `asset_path`.
///
/// glTF URIs are percent-encoded. Files on disk carry the decoded name, URLs
/// keep the encoded form.
pub fn referenced_path(asset_path: &str, uri: &str) -> anyhow::Result<String> {
    #[cfg(not(target_arch = "wasm32"))]
    let uri = urlencoding::decode(uri)
        .with_context(|| format!("{uri} is not a valid percent-encoded URI"))?;
    Ok(sibling_path(asset_path, &uri))
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no browser window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("could not read page origin: {e:?}"))?;
    let url = resolve_asset_url(&origin, root, file_name);
    reqwest::Url::parse(&url).with_context(|| format!("invalid asset url {url}"))
}

/// Fetch an asset, calling `on_progress` as bytes arrive.
///
/// Natively the file is read in chunks through tokio, on the web it is fetched
/// in one request and progress is reported once.
pub async fn load_binary_with_progress(
    root: &str,
    file_name: &str,
    mut on_progress: impl FnMut(LoadProgress),
) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(root, file_name)?;
        let response = reqwest::get(url.clone())
            .await
            .with_context(|| format!("could not fetch {url}"))?
            .error_for_status()?;
        let total = response.content_length();
        let data = response.bytes().await?.to_vec();
        on_progress(LoadProgress {
            loaded: data.len() as u64,
            total: total.or(Some(data.len() as u64)),
        });
        data
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        use tokio::io::AsyncReadExt;

        let path = resolve_asset_path(root, file_name);
        let mut file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("could not open {}", path.display()))?;
        let total = file.metadata().await.ok().map(|meta| meta.len());
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let read = file
                .read(&mut chunk)
                .await
                .with_context(|| format!("could not read {}", path.display()))?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
            on_progress(LoadProgress {
                loaded: data.len() as u64,
                total,
            });
        }
        data
    };

    Ok(data)
}

pub async fn load_binary(root: &str, file_name: &str) -> anyhow::Result<Vec<u8>> {
    load_binary_with_progress(root, file_name, |_| ()).await
}

/// Fetch and import a glTF or GLB file including the buffers and images it
/// references next to itself.
pub async fn load_model_gltf(
    root: &str,
    asset_path: &str,
    on_progress: impl FnMut(LoadProgress),
) -> anyhow::Result<ModelData> {
    let bytes = load_binary_with_progress(root, asset_path, on_progress).await?;
    let gltf = gltf::Gltf::from_slice(&bytes)
        .with_context(|| format!("{asset_path} is not a valid glTF/GLB file"))?;

    let mut external = HashMap::new();
    for reference in import::external_refs(&gltf)? {
        let uri = match &reference {
            import::ExternalRef::Buffer { uri, .. } | import::ExternalRef::Image { uri, .. } => uri,
        };
        let data = load_binary(root, &referenced_path(asset_path, uri)?)
            .await
            .with_context(|| format!("could not load {uri} referenced by {asset_path}"))?;
        external.insert(reference, data);
    }

    import::build_model_data(&gltf, &external)
        .with_context(|| format!("could not import {asset_path}"))
}

/// Upload the meshes and materials of `data`.
///
/// Primitives without a material use a white default material that is
/// appended after the file's own materials.
pub fn upload_model(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &ModelData,
    tint: Option<[f32; 3]>,
    layout: &wgpu::BindGroupLayout,
) -> Model {
    let mut materials: Vec<_> = data
        .materials
        .iter()
        .map(|material| texture::load_material(device, queue, material, tint, layout))
        .collect();
    let default_material = materials.len();
    materials.push(texture::load_material(
        device,
        queue,
        &MaterialData::default(),
        tint,
        layout,
    ));

    let meshes = data
        .meshes
        .iter()
        .map(|mesh| {
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Vertex Buffer", mesh.name)),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Index Buffer", mesh.name)),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            Mesh {
                name: mesh.name.clone(),
                vertex_buffer,
                index_buffer,
                num_elements: mesh.indices.len() as u32,
                material: mesh
                    .material
                    .filter(|&idx| idx < default_material)
                    .unwrap_or(default_material),
            }
        })
        .collect();

    Model {
        meshes,
        materials,
        mesh_primitives: data.mesh_primitives.clone(),
    }
}
