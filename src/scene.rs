//! A model attached to a viewer: GPU buffers, scene graph and animation state.

use instant::Duration;
use log::{debug, info, warn};
use wgpu::util::DeviceExt;

use crate::{
    animation::{
        AnimationClip,
        mixer::{ActionId, AnimationMixer, LoopMode, MixerEvent},
    },
    camera::{Framing, fit_camera_to_bounds},
    config::ViewerConfig,
    context::Context,
    data_structures::{
        instance::InstanceRaw,
        model::{DrawModel, Model},
        scene_graph::SceneGraph,
    },
    resources::{self, ModelData},
};

/// A node that draws a mesh. Its index in `LoadedScene::drawn` is its slot in
/// the instance buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DrawnNode {
    node: usize,
    mesh: usize,
}

#[derive(Debug)]
pub struct LoadedScene {
    pub model: Model,
    pub graph: SceneGraph,
    /// `None` once the scene has been torn down.
    pub mixer: Option<AnimationMixer>,
    pub animations: Vec<AnimationClip>,
    pub opening: Option<ActionId>,
    pub closing: Option<ActionId>,
    pub framing: Option<Framing>,
    drawn: Vec<DrawnNode>,
    instance_buffer: Option<wgpu::Buffer>,
}

impl LoadedScene {
    /// Upload `data`, frame the camera on it and prepare the door actions.
    pub fn attach(ctx: &mut Context, data: ModelData, config: &ViewerConfig) -> Self {
        let model = resources::upload_model(
            &ctx.device,
            &ctx.queue,
            &data,
            config.color,
            &ctx.material_layout,
        );
        let bounds = data.bounds();
        let ModelData {
            graph, animations, ..
        } = data;

        let framing = fit_camera_to_bounds(
            &mut ctx.camera.camera,
            &mut ctx.projection,
            &bounds,
            config.framing_padding,
        );
        if let Some(framing) = framing {
            info!(
                "Framed model: center {:?}, size {:?}, camera distance {:.3}",
                framing.center, framing.size, framing.distance
            );
        }
        ctx.camera.write(&ctx.queue, &ctx.projection);

        let mut mixer = AnimationMixer::new(&graph);
        if animations.is_empty() {
            info!("Model has no animations");
        }
        let opening = prepare_action(&mut mixer, &animations, &config.opening_clip);
        let closing = prepare_action(&mut mixer, &animations, &config.closing_clip);
        if let Some(name) = &config.autoplay {
            match AnimationClip::find_by_name(&animations, name) {
                Some(clip) => {
                    let id = mixer.clip_action(clip);
                    if let Some(action) = mixer.action_mut(id) {
                        action.play();
                    }
                    info!("Playing animation {name}");
                }
                None => warn!("Cannot autoplay {name:?}: no such animation"),
            }
        }

        let mut drawn = Vec::new();
        graph.traverse(|node, scene_node| {
            if let Some(mesh) = scene_node.mesh {
                drawn.push(DrawnNode { node, mesh });
            }
        });

        let instance_buffer = (!drawn.is_empty()).then(|| {
            let raw = instance_data(&graph, &drawn);
            ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Model Instance Buffer"),
                contents: bytemuck::cast_slice(&raw),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            })
        });

        Self {
            model,
            graph,
            mixer: Some(mixer),
            animations,
            opening,
            closing,
            framing,
            drawn,
            instance_buffer,
        }
    }

    /// Advance the animations by `dt`.
    pub fn update(&mut self, dt: Duration) -> Vec<MixerEvent> {
        match self.mixer.as_mut() {
            Some(mixer) => mixer.update(dt, &mut self.graph),
            None => Vec::new(),
        }
    }

    /// Push the current world transforms to the instance buffer.
    pub fn write_instances(&self, queue: &wgpu::Queue) {
        if let Some(buffer) = &self.instance_buffer {
            let raw = instance_data(&self.graph, &self.drawn);
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&raw));
        }
    }

    pub fn draw<'a>(
        &'a self,
        render_pass: &mut wgpu::RenderPass<'a>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    ) {
        let Some(instance_buffer) = &self.instance_buffer else {
            return;
        };
        render_pass.set_vertex_buffer(1, instance_buffer.slice(..));
        for (slot, drawn) in self.drawn.iter().enumerate() {
            let slot = slot as u32;
            for mesh in self.model.primitives(drawn.mesh) {
                if mesh.num_elements == 0 {
                    continue;
                }
                let Some(material) = self.model.materials.get(mesh.material) else {
                    continue;
                };
                render_pass.draw_mesh_instanced(
                    mesh,
                    material,
                    slot..slot + 1,
                    camera_bind_group,
                    light_bind_group,
                );
            }
        }
    }

    /// Stop and drop the mixer and its actions.
    pub fn release_animations(&mut self) {
        if let Some(mut mixer) = self.mixer.take() {
            mixer.stop_all_actions();
            self.opening = None;
            self.closing = None;
            debug!("Released {} animation clips", self.animations.len());
        }
    }

    /// Destroy every GPU resource of the model.
    pub fn destroy(&mut self) {
        self.release_animations();
        if let Some(buffer) = self.instance_buffer.take() {
            buffer.destroy();
        }
        self.model.destroy();
    }
}

/// The `LoopOnce` action for `name`, or `None` with a warning when the model
/// has no such clip.
fn prepare_action(
    mixer: &mut AnimationMixer,
    animations: &[AnimationClip],
    name: &str,
) -> Option<ActionId> {
    if animations.is_empty() {
        return None;
    }
    let Some(clip) = AnimationClip::find_by_name(animations, name) else {
        warn!("Animation {name:?} not found in model");
        return None;
    };
    let id = mixer.clip_action(clip);
    if let Some(action) = mixer.action_mut(id) {
        action.set_loop(LoopMode::Once);
    }
    debug!("Prepared animation {name:?} ({:.2}s)", clip.duration);
    Some(id)
}

fn instance_data(graph: &SceneGraph, drawn: &[DrawnNode]) -> Vec<InstanceRaw> {
    drawn
        .iter()
        .map(|drawn| {
            graph
                .node(drawn.node)
                .map(|node| InstanceRaw::from_matrix(&node.world))
                .unwrap_or_default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use cgmath::{Quaternion, Vector3};

    use super::*;
    use crate::{
        animation::{Channel, Interpolation, Keyframes},
        data_structures::{instance::Instance, scene_graph::SceneNode},
    };

    fn door() -> (SceneGraph, Vec<AnimationClip>) {
        let graph = SceneGraph::new(
            vec![
                SceneNode::new("frame", Instance::new()).with_mesh(0),
                SceneNode::new("leaf", Instance::from(Vector3::new(1.0, 0.0, 0.0))).with_mesh(1),
            ],
            vec![0, 1],
        );
        let opening = AnimationClip::new(
            "opening",
            vec![Channel {
                target_node: 1,
                interpolation: Interpolation::Linear,
                timestamps: vec![0.0, 1.0],
                keyframes: Keyframes::Rotation(vec![
                    Quaternion::new(1.0, 0.0, 0.0, 0.0),
                    Quaternion::new(0.0, 0.0, 1.0, 0.0),
                ]),
            }],
        );
        (graph, vec![opening])
    }

    #[test]
    fn door_actions_are_prepared_once_and_idle() {
        let (graph, animations) = door();
        let mut mixer = AnimationMixer::new(&graph);
        let opening = prepare_action(&mut mixer, &animations, "opening").unwrap();
        let action = mixer.action(opening).unwrap();
        assert_eq!(action.loop_mode, LoopMode::Once);
        assert!(!action.is_running());
    }

    #[test]
    fn missing_clip_yields_no_action() {
        let (graph, animations) = door();
        let mut mixer = AnimationMixer::new(&graph);
        assert!(prepare_action(&mut mixer, &animations, "closing").is_none());
        assert!(prepare_action(&mut mixer, &[], "opening").is_none());
    }

    #[test]
    fn instance_data_follows_drawn_nodes() {
        let (graph, _) = door();
        let drawn = [DrawnNode { node: 1, mesh: 1 }, DrawnNode { node: 7, mesh: 0 }];
        let raw = instance_data(&graph, &drawn);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].model[3][0], 1.0);
        assert_eq!(raw[1], InstanceRaw::default());
    }
}
