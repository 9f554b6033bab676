//! glTF / GLB import into plain CPU data.
//!
//! Buffers and images referenced by URI are fetched by the caller first (see
//! [`super::load_model_gltf`]); everything here is synchronous so it can be
//! tested without a GPU or a file system.

use std::{collections::HashMap, ops::Range};

use anyhow::{Context, bail};
use cgmath::{InnerSpace, Point3, Quaternion, Vector3};
use log::{debug, warn};

use crate::{
    animation::{AnimationClip, Channel, Interpolation, Keyframes},
    data_structures::{
        bounds::Aabb,
        instance::Instance,
        model::{AlphaMode, MaterialData, MeshData, ModelVertex},
        scene_graph::{SceneGraph, SceneNode},
    },
};

/// Everything the viewer needs from a model file.
#[derive(Clone, Debug, Default)]
pub struct ModelData {
    /// One entry per glTF primitive.
    pub meshes: Vec<MeshData>,
    /// `mesh_primitives[m]` is the range of `meshes` belonging to glTF mesh `m`.
    pub mesh_primitives: Vec<Range<usize>>,
    pub materials: Vec<MaterialData>,
    pub graph: SceneGraph,
    pub animations: Vec<AnimationClip>,
}

impl ModelData {
    /// Local bounds per glTF mesh.
    pub fn mesh_bounds(&self) -> Vec<Aabb> {
        self.mesh_primitives
            .iter()
            .map(|range| {
                self.meshes[range.clone()]
                    .iter()
                    .fold(Aabb::empty(), |acc, mesh| acc.union(&mesh.bounds))
            })
            .collect()
    }

    /// World-space bounds of the whole model in its current pose.
    pub fn bounds(&self) -> Aabb {
        self.graph.bounds(&self.mesh_bounds())
    }
}

/// Where the bytes of a buffer or image come from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExternalRef {
    Buffer { index: usize, uri: String },
    Image { index: usize, uri: String },
}

/// Buffers and images that live next to the model file and must be fetched.
pub fn external_refs(gltf: &gltf::Gltf) -> anyhow::Result<Vec<ExternalRef>> {
    let mut refs = Vec::new();
    for buffer in gltf.buffers() {
        if let gltf::buffer::Source::Uri(uri) = buffer.source() {
            ensure_not_data_uri(uri)?;
            refs.push(ExternalRef::Buffer {
                index: buffer.index(),
                uri: uri.to_string(),
            });
        }
    }
    for image in gltf.images() {
        if let gltf::image::Source::Uri { uri, .. } = image.source() {
            ensure_not_data_uri(uri)?;
            refs.push(ExternalRef::Image {
                index: image.index(),
                uri: uri.to_string(),
            });
        }
    }
    Ok(refs)
}

fn ensure_not_data_uri(uri: &str) -> anyhow::Result<()> {
    if uri.starts_with("data:") {
        bail!("embedded data URIs are not supported, export the model as .glb instead");
    }
    Ok(())
}

/// Parse a self-contained model (GLB, or glTF without external references).
pub fn parse_gltf(bytes: &[u8]) -> anyhow::Result<ModelData> {
    let gltf = gltf::Gltf::from_slice(bytes).context("not a valid glTF/GLB file")?;
    let refs = external_refs(&gltf)?;
    if let Some(first) = refs.first() {
        bail!("model references external data ({:?}) that was not provided", first);
    }
    build_model_data(&gltf, &HashMap::new())
}

/// Turn a parsed document into [`ModelData`].
///
/// `external` maps every [`ExternalRef`] of the document to its fetched bytes.
pub fn build_model_data(
    gltf: &gltf::Gltf,
    external: &HashMap<ExternalRef, Vec<u8>>,
) -> anyhow::Result<ModelData> {
    let mut buffers: Vec<&[u8]> = Vec::new();
    for buffer in gltf.buffers() {
        let data: &[u8] = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .as_deref()
                .context("GLB references its binary chunk but has none")?,
            gltf::buffer::Source::Uri(uri) => external
                .get(&ExternalRef::Buffer {
                    index: buffer.index(),
                    uri: uri.to_string(),
                })
                .map(Vec::as_slice)
                .with_context(|| format!("buffer {uri} was not loaded"))?,
        };
        if data.len() < buffer.length() {
            bail!(
                "buffer {} holds {} bytes but declares {}",
                buffer.index(),
                data.len(),
                buffer.length()
            );
        }
        buffers.push(data);
    }

    let materials = read_materials(gltf, &buffers, external);
    let (meshes, mesh_primitives) = read_meshes(gltf, &buffers)?;
    let graph = read_scene_graph(gltf);
    let animations = read_animations(gltf, &buffers, graph.len());

    debug!(
        "Imported {} nodes, {} primitives, {} materials, {} animations",
        graph.len(),
        meshes.len(),
        materials.len(),
        animations.len()
    );

    Ok(ModelData {
        meshes,
        mesh_primitives,
        materials,
        graph,
        animations,
    })
}

fn read_materials(
    gltf: &gltf::Gltf,
    buffers: &[&[u8]],
    external: &HashMap<ExternalRef, Vec<u8>>,
) -> Vec<MaterialData> {
    gltf.materials()
        .enumerate()
        .map(|(idx, material)| {
            let name = material
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material_{idx}"));
            let pbr = material.pbr_metallic_roughness();
            let base_colour_texture = pbr.base_color_texture().and_then(|info| {
                let image = info.texture().source();
                let decoded = image_bytes(&image, buffers, external)
                    .and_then(|(bytes, mime)| decode_image(bytes, mime));
                match decoded {
                    Ok(img) => Some(img),
                    Err(e) => {
                        warn!("Base colour texture of {name} could not be decoded: {e:#}");
                        None
                    }
                }
            });
            MaterialData {
                name,
                base_colour: pbr.base_color_factor(),
                base_colour_texture,
                alpha_mode: AlphaMode::from(&material),
            }
        })
        .collect()
}

fn image_bytes<'a>(
    image: &gltf::Image<'_>,
    buffers: &[&'a [u8]],
    external: &'a HashMap<ExternalRef, Vec<u8>>,
) -> anyhow::Result<(&'a [u8], Option<String>)> {
    match image.source() {
        gltf::image::Source::View { view, mime_type } => {
            let buffer: &'a [u8] = *buffers
                .get(view.buffer().index())
                .context("image view points at a missing buffer")?;
            let range = view.offset()..view.offset() + view.length();
            let bytes = buffer
                .get(range)
                .context("image view is out of bounds of its buffer")?;
            Ok((bytes, Some(mime_type.to_string())))
        }
        gltf::image::Source::Uri { uri, mime_type } => {
            let bytes = external
                .get(&ExternalRef::Image {
                    index: image.index(),
                    uri: uri.to_string(),
                })
                .with_context(|| format!("image {uri} was not loaded"))?;
            Ok((bytes.as_slice(), mime_type.map(str::to_string)))
        }
    }
}

fn decode_image(bytes: &[u8], mime_type: Option<String>) -> anyhow::Result<image::DynamicImage> {
    let format = mime_type.as_deref().and_then(image::ImageFormat::from_mime_type);
    let img = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes)?,
    };
    Ok(img)
}

fn read_meshes(
    gltf: &gltf::Gltf,
    buffers: &[&[u8]],
) -> anyhow::Result<(Vec<MeshData>, Vec<Range<usize>>)> {
    let mut meshes = Vec::new();
    let mut mesh_primitives = Vec::new();
    for mesh in gltf.meshes() {
        let start = meshes.len();
        let mesh_name = mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(
                    "Skipping primitive {} of {}: {:?} is not supported",
                    primitive.index(),
                    mesh_name,
                    primitive.mode()
                );
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).copied());

            let Some(positions) = reader.read_positions() else {
                warn!(
                    "Skipping primitive {} of {}: no positions",
                    primitive.index(),
                    mesh_name
                );
                continue;
            };
            let mut vertices: Vec<ModelVertex> = positions
                .map(|position| ModelVertex {
                    position,
                    ..Default::default()
                })
                .collect();

            if let Some(tex_coords) = reader.read_tex_coords(0).map(|t| t.into_f32()) {
                vertices
                    .iter_mut()
                    .zip(tex_coords)
                    .for_each(|(vertex, uv)| vertex.tex_coords = uv);
            }

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                bail!(
                    "primitive {} of {} references vertex {} but has {}",
                    primitive.index(),
                    mesh_name,
                    bad,
                    vertices.len()
                );
            }

            match reader.read_normals() {
                Some(normals) => vertices
                    .iter_mut()
                    .zip(normals)
                    .for_each(|(vertex, normal)| vertex.normal = normal),
                None => compute_normals(&mut vertices, &indices),
            }

            let bounds = Aabb::from_points(vertices.iter().map(|v| Point3::from(v.position)));
            meshes.push(MeshData {
                name: mesh_name.clone(),
                vertices,
                indices,
                material: primitive.material().index(),
                bounds,
            });
        }
        mesh_primitives.push(start..meshes.len());
    }
    Ok((meshes, mesh_primitives))
}

/// Area weighted vertex normals for primitives that ship without them.
pub(crate) fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut sums = vec![Vector3::new(0.0_f32, 0.0, 0.0); vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p0: Vector3<f32> = vertices[a].position.into();
        let p1: Vector3<f32> = vertices[b].position.into();
        let p2: Vector3<f32> = vertices[c].position.into();
        let face = (p1 - p0).cross(p2 - p0);
        sums[a] += face;
        sums[b] += face;
        sums[c] += face;
    }
    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        vertex.normal = if sum.magnitude2() > 0.0 {
            sum.normalize().into()
        } else {
            [0.0, 1.0, 0.0]
        };
    }
}

fn read_scene_graph(gltf: &gltf::Gltf) -> SceneGraph {
    let nodes = gltf
        .nodes()
        .map(|node| {
            let name = node
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("node_{}", node.index()));
            SceneNode {
                mesh: node.mesh().map(|mesh| mesh.index()),
                children: node.children().map(|child| child.index()).collect(),
                ..SceneNode::new(name, Instance::from(node.transform()))
            }
        })
        .collect();
    let roots = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .map(|scene| scene.nodes().map(|node| node.index()).collect())
        .unwrap_or_default();
    SceneGraph::new(nodes, roots)
}

fn read_animations(gltf: &gltf::Gltf, buffers: &[&[u8]], node_count: usize) -> Vec<AnimationClip> {
    gltf.animations()
        .map(|animation| {
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation_{}", animation.index()));
            let channels = animation
                .channels()
                .enumerate()
                .filter_map(|(channel_idx, channel)| {
                    let target_node = channel.target().node().index();
                    if target_node >= node_count {
                        warn!("Animation {name} targets missing node {target_node}");
                        return None;
                    }
                    let reader = channel.reader(|buffer| buffers.get(buffer.index()).copied());
                    let timestamps: Vec<f32> = match reader.read_inputs() {
                        Some(inputs) => inputs.collect(),
                        None => {
                            warn!("No keyframe times in channel {channel_idx} of {name}");
                            return None;
                        }
                    };
                    let keyframes = match reader.read_outputs() {
                        Some(gltf::animation::util::ReadOutputs::Translations(t)) => {
                            Keyframes::Translation(t.map(Vector3::from).collect())
                        }
                        Some(gltf::animation::util::ReadOutputs::Rotations(r)) => {
                            Keyframes::Rotation(
                                r.into_f32()
                                    .map(|[x, y, z, w]| Quaternion::new(w, x, y, z))
                                    .collect(),
                            )
                        }
                        Some(gltf::animation::util::ReadOutputs::Scales(s)) => {
                            Keyframes::Scale(s.map(Vector3::from).collect())
                        }
                        Some(gltf::animation::util::ReadOutputs::MorphTargetWeights(_)) => {
                            debug!("Morph target channel in {name} is not played");
                            Keyframes::Other
                        }
                        None => {
                            warn!("No keyframe values in channel {channel_idx} of {name}");
                            return None;
                        }
                    };
                    Some(Channel {
                        target_node,
                        interpolation: Interpolation::from(channel.sampler().interpolation()),
                        timestamps,
                        keyframes,
                    })
                })
                .collect();
            AnimationClip::new(name, channels)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_normals_face_out_of_a_ccw_triangle() {
        let mut vertices = vec![
            ModelVertex {
                position: [0.0, 0.0, 0.0],
                ..Default::default()
            },
            ModelVertex {
                position: [1.0, 0.0, 0.0],
                ..Default::default()
            },
            ModelVertex {
                position: [0.0, 1.0, 0.0],
                ..Default::default()
            },
        ];
        compute_normals(&mut vertices, &[0, 1, 2]);
        for vertex in vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn unreferenced_vertices_get_an_up_normal() {
        let mut vertices = vec![ModelVertex::default()];
        compute_normals(&mut vertices, &[]);
        assert_eq!(vertices[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_gltf(b"definitely not a model").is_err());
    }

    #[test]
    fn data_uris_are_rejected_with_a_hint() {
        let json = br#"{
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 4, "uri": "data:application/octet-stream;base64,AAAAAA=="}]
        }"#;
        let err = parse_gltf(json).unwrap_err();
        assert!(format!("{err:#}").contains(".glb"));
    }

    #[test]
    fn external_buffers_must_be_provided() {
        let json = br#"{
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 4, "uri": "door.bin"}]
        }"#;
        assert!(parse_gltf(json).is_err());

        let gltf = gltf::Gltf::from_slice(json).unwrap();
        let refs = external_refs(&gltf).unwrap();
        assert_eq!(
            refs,
            vec![ExternalRef::Buffer {
                index: 0,
                uri: "door.bin".to_string()
            }]
        );
        let mut external = HashMap::new();
        external.insert(refs[0].clone(), vec![0u8; 4]);
        let data = build_model_data(&gltf, &external).unwrap();
        assert!(data.meshes.is_empty());
        assert!(data.graph.is_empty());
    }
}
