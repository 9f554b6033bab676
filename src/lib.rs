//! door-viewer
//!
//! A small glTF model viewer for native windows and the web. A viewer loads
//! one model asynchronously, frames the camera on it, prepares its `opening`
//! and `closing` animations and renders it with an ambient and a directional
//! light until it is unmounted.
//!
//! High-level modules
//! - `animation`: keyframe clips, the animation mixer and the frame clock
//! - `camera`: perspective camera, uniforms and auto-framing
//! - `config`: viewer configuration and colour parsing
//! - `context`: GPU and window context that owns device, queue and pipeline
//! - `data_structures`: meshes, materials, textures, instances and the scene graph
//! - `pipelines`: the model render pipeline and the light uniform
//! - `resources`: asset loading and glTF import
//! - `scene`: a loaded model attached to a viewer
//! - `viewer`: viewer lifecycle and the winit application
//!

pub mod animation;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod viewer;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::ViewerConfig;
pub use resources::{LoadProgress, ModelData, parse_gltf};
pub use viewer::{ViewerPhase, run};
