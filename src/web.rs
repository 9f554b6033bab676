//! Browser glue: the JavaScript entry point and the canvas the viewer draws to.

use anyhow::{Context as _, anyhow};
use wasm_bindgen::{JsCast, prelude::*};

use crate::config::ViewerConfig;

/// Mount a viewer for `asset_path` into the element with id `mount_id`.
///
/// `color` is an optional CSS hex colour tinting the model. All viewers of a
/// page share one event loop, so this can only be called once per page; mount
/// several viewers at once through [`crate::run`].
#[wasm_bindgen]
pub fn mount_viewer(mount_id: &str, asset_path: &str, color: Option<String>) -> Result<(), JsValue> {
    let mut config = ViewerConfig::new(asset_path)
        .with_mount_id(mount_id)
        .with_asset_root("");
    if let Some(color) = color {
        config = config
            .with_hex_color(&color)
            .map_err(|e| JsValue::from_str(&format!("{e:#}")))?;
    }
    crate::run(vec![config]).map_err(|e| JsValue::from_str(&format!("{e:#}")))
}

/// Create a canvas filling the element `mount_id` and append it there.
pub(crate) fn create_canvas(mount_id: &str) -> anyhow::Result<web_sys::HtmlCanvasElement> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .context("no document to mount into")?;
    let mount = document
        .get_element_by_id(mount_id)
        .with_context(|| format!("no element with id {mount_id:?}"))?;
    let canvas: web_sys::HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(|e| anyhow!("could not create canvas: {e:?}"))?
        .dyn_into()
        .map_err(|_| anyhow!("created element is not a canvas"))?;
    canvas
        .set_attribute("style", "width: 100%; height: 100%; display: block;")
        .map_err(|e| anyhow!("could not style canvas: {e:?}"))?;
    mount
        .append_child(&canvas)
        .map_err(|e| anyhow!("could not append canvas to {mount_id:?}: {e:?}"))?;
    Ok(canvas)
}

/// Detach the canvas from its parent. A canvas without a parent is an error.
pub(crate) fn remove_canvas(canvas: &web_sys::HtmlCanvasElement) -> anyhow::Result<()> {
    let parent = canvas
        .parent_node()
        .context("canvas is not attached to the page")?;
    parent
        .remove_child(canvas)
        .map_err(|e| anyhow!("could not remove canvas: {e:?}"))?;
    Ok(())
}
