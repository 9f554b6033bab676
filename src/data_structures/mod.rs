//! Viewer data structures: transforms, bounds, meshes, textures and the scene graph.
//!
//! - `bounds` holds the axis aligned boxes used for camera framing
//! - `instance` holds per-node transforms and their GPU layout
//! - `model` contains mesh and material definitions, GPU resources for 3D models
//! - `scene_graph` is the node hierarchy animated by the mixer
//! - `texture` contains GPU texture wrapper and creation utilities

pub mod bounds;
pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
