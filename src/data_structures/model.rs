//! Meshes, materials and the draw helpers for them.
//!
//! The `*Data` types are plain CPU data produced by the glTF importer; the
//! other types own the GPU buffers created from them.

use std::ops::Range;

use wgpu::util::DeviceExt;

use crate::data_structures::{bounds::Aabb, texture::Texture};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// One glTF primitive as parsed from the file.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
    pub bounds: Aabb,
}

/// How the alpha channel of a material's colour is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum AlphaMode {
    /// Alpha is ignored and the surface is fully opaque.
    #[default]
    Opaque,
    /// Fragments below `cutoff` are discarded, the rest are opaque.
    Mask { cutoff: f32 },
    Blend,
}

impl From<&gltf::Material<'_>> for AlphaMode {
    fn from(material: &gltf::Material<'_>) -> Self {
        match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask {
                cutoff: material.alpha_cutoff().unwrap_or(0.5),
            },
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        }
    }
}

/// Base colour of a material, optionally textured.
#[derive(Clone, Debug)]
pub struct MaterialData {
    pub name: String,
    pub base_colour: [f32; 4],
    pub base_colour_texture: Option<image::DynamicImage>,
    pub alpha_mode: AlphaMode,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_colour: [1.0, 1.0, 1.0, 1.0],
            base_colour_texture: None,
            alpha_mode: AlphaMode::Opaque,
        }
    }
}

const ALPHA_OPAQUE: u32 = 0;
const ALPHA_MASK: u32 = 1;
const ALPHA_BLEND: u32 = 2;

/**
 * Matches `Material` in model.wgsl: the shader forces alpha to one unless
 * `alpha_mode` is blend and discards masked fragments below `alpha_cutoff`.
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub base_colour: [f32; 4],
    pub alpha_cutoff: f32,
    pub alpha_mode: u32,
    _padding: [f32; 2],
}

impl MaterialUniform {
    pub fn new(data: &MaterialData, tint: Option<[f32; 3]>) -> Self {
        let (alpha_mode, alpha_cutoff) = match data.alpha_mode {
            AlphaMode::Opaque => (ALPHA_OPAQUE, 0.0),
            AlphaMode::Mask { cutoff } => (ALPHA_MASK, cutoff),
            AlphaMode::Blend => (ALPHA_BLEND, 0.0),
        };
        Self {
            base_colour: tinted(data.base_colour, tint),
            alpha_cutoff,
            alpha_mode,
            _padding: [0.0; 2],
        }
    }
}

/// Multiplies an RGBA colour with an optional RGB tint, keeping alpha.
pub fn tinted(base_colour: [f32; 4], tint: Option<[f32; 3]>) -> [f32; 4] {
    match tint {
        Some([r, g, b]) => [
            base_colour[0] * r,
            base_colour[1] * g,
            base_colour[2] * b,
            base_colour[3],
        ],
        None => base_colour,
    }
}

#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub diffuse_texture: Texture,
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        diffuse_texture: Texture,
        uniform: MaterialUniform,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Material Buffer")),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let sampler = diffuse_texture
            .sampler
            .clone()
            .unwrap_or_else(|| crate::data_structures::texture::create_default_sampler(device));
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
            label: Some(name),
        });

        Self {
            name: name.to_string(),
            diffuse_texture,
            uniform_buffer,
            bind_group,
        }
    }

    pub fn destroy(&self) {
        self.uniform_buffer.destroy();
        self.diffuse_texture.texture.destroy();
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material: usize,
}

impl Mesh {
    pub fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}

/// GPU side of an imported model.
///
/// `meshes` holds one entry per glTF primitive. `mesh_primitives[m]` is the
/// range of `meshes` that belongs to glTF mesh `m`.
#[derive(Debug)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub mesh_primitives: Vec<Range<usize>>,
}

impl Model {
    pub fn primitives(&self, mesh: usize) -> &[Mesh] {
        self.mesh_primitives
            .get(mesh)
            .and_then(|range| self.meshes.get(range.clone()))
            .unwrap_or(&[])
    }

    /// Frees every buffer and texture owned by the model.
    pub fn destroy(&self) {
        self.meshes.iter().for_each(Mesh::destroy);
        self.materials.iter().for_each(Material::destroy);
    }
}

pub trait DrawModel<'a> {
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'a Mesh,
        material: &'a Material,
        instances: Range<u32>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    );
}

impl<'a, 'b> DrawModel<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh_instanced(
        &mut self,
        mesh: &'b Mesh,
        material: &'b Material,
        instances: Range<u32>,
        camera_bind_group: &'b wgpu::BindGroup,
        light_bind_group: &'b wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, &material.bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, light_bind_group, &[]);
        self.draw_indexed(0..mesh.num_elements, 0, instances);
    }
}
