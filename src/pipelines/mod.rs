//! Render pipelines and the resources bound to them.

pub mod basic;
pub mod light;
