use log::warn;

use crate::data_structures::{
    model::{self, MaterialData, MaterialUniform},
    texture::Texture,
};

/// Layout of a material bind group: base colour texture, its sampler and the
/// (tinted) base colour factor.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("Model material_bind_group_layout"),
    })
}

/// Create the GPU material for `data`, multiplying `tint` into its base colour.
///
/// A texture that cannot be uploaded is replaced by plain white so the model
/// still renders with its base colour.
pub fn load_material(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &MaterialData,
    tint: Option<[f32; 3]>,
    layout: &wgpu::BindGroupLayout,
) -> model::Material {
    let texture = data
        .base_colour_texture
        .as_ref()
        .and_then(|img| match Texture::from_image(device, queue, img, Some(&data.name)) {
            Ok(texture) => Some(texture),
            Err(e) => {
                warn!("Texture of material {} could not be uploaded: {e:#}", data.name);
                None
            }
        })
        .unwrap_or_else(|| Texture::create_solid(device, queue, [255; 4], &data.name));

    let uniform = MaterialUniform::new(data, tint);
    model::Material::new(device, &data.name, texture, uniform, layout)
}
