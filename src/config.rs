//! Viewer configuration.
//!
//! Defaults reproduce the door widget: a 75 degree camera, a transparent
//! background, one ambient and one directional light and the `opening` /
//! `closing` clips prepared as one-shot actions.

use anyhow::{Context as _, bail};
use cgmath::Deg;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightConfig {
    pub colour: [f32; 3],
    pub intensity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLightConfig {
    pub colour: [f32; 3],
    pub intensity: f32,
    /// The light shines from this point towards the origin.
    pub position: [f32; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub asset_path: String,
    /// Directory (native) or URL prefix below the page origin (web) that `asset_path` is relative to.
    pub asset_root: String,
    /// Id of the DOM element the canvas is appended to.
    pub mount_id: String,
    /// RGB tint multiplied into every material of the model.
    pub color: Option<[f32; 3]>,
    pub fov_y: Deg<f32>,
    pub z_near: f32,
    pub z_far: f32,
    pub clear_colour: wgpu::Color,
    /// Distance multiplier applied after fitting the model into the view.
    pub framing_padding: f32,
    pub ambient: LightConfig,
    pub directional: DirectionalLightConfig,
    pub opening_clip: String,
    pub closing_clip: String,
    /// Clip to play once as soon as the model is attached.
    pub autoplay: Option<String>,
    /// Unmount after this many rendered frames.
    pub max_frames: Option<u64>,
    pub title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_path: "models/door.glb".to_string(),
            asset_root: "assets".to_string(),
            mount_id: "root".to_string(),
            color: None,
            fov_y: Deg(75.0),
            z_near: 0.1,
            z_far: 1000.0,
            clear_colour: wgpu::Color::TRANSPARENT,
            framing_padding: 1.5,
            ambient: LightConfig {
                colour: [1.0, 1.0, 1.0],
                intensity: 0.5,
            },
            directional: DirectionalLightConfig {
                colour: [1.0, 1.0, 1.0],
                intensity: 1.0,
                position: [5.0, 10.0, 7.5],
            },
            opening_clip: "opening".to_string(),
            closing_clip: "closing".to_string(),
            autoplay: None,
            max_frames: None,
            title: "door-viewer".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn new(asset_path: impl Into<String>) -> Self {
        Self {
            asset_path: asset_path.into(),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = Some(color);
        self
    }

    /// Accepts `#rrggbb`, `rrggbb`, `#rgb` or `rgb`.
    pub fn with_hex_color(self, hex: &str) -> anyhow::Result<Self> {
        Ok(self.with_color(parse_hex_colour(hex)?))
    }

    pub fn with_asset_root(mut self, root: impl Into<String>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_mount_id(mut self, mount_id: impl Into<String>) -> Self {
        self.mount_id = mount_id.into();
        self
    }

    pub fn with_autoplay(mut self, clip: impl Into<String>) -> Self {
        self.autoplay = Some(clip.into());
        self
    }

    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    pub fn with_clear_colour(mut self, colour: wgpu::Color) -> Self {
        self.clear_colour = colour;
        self
    }
}

/// Parse a CSS style hex colour into RGB components in `0.0..=1.0`.
pub fn parse_hex_colour(hex: &str) -> anyhow::Result<[f32; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("{hex:?} is not a hex colour");
    }
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        n => bail!("{hex:?} has {n} hex digits, expected 3 or 6"),
    };
    let channel = |i: usize| -> anyhow::Result<f32> {
        let byte = u8::from_str_radix(&expanded[i * 2..i * 2 + 2], 16)
            .with_context(|| format!("invalid colour channel in {hex:?}"))?;
        Ok(byte as f32 / 255.0)
    };
    Ok([channel(0)?, channel(1)?, channel(2)?])
}
