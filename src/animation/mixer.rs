//! Animation playback.
//!
//! The mixer keeps one [`AnimationAction`] per clip. Every frame
//! [`AnimationMixer::update`] advances the active actions and writes the
//! blended pose of every animated node into the scene graph. Nodes that are no
//! longer driven by any action fall back to the rest pose captured when the
//! mixer was created.

use std::{collections::BTreeSet, sync::Arc};

use cgmath::InnerSpace;
use instant::Duration;

use crate::{
    animation::{AnimationClip, Sample},
    data_structures::{instance::Instance, scene_graph::SceneGraph},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play to the end once, then stop (or hold the last frame when clamped).
    Once,
    #[default]
    Repeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionState {
    Stopped,
    Playing,
    /// Held on its last frame after a clamped `Once` run, or paused by the caller.
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MixerEvent {
    Finished(ActionId),
    Loop(ActionId),
}

enum Progress {
    Finished,
    Looped,
}

#[derive(Debug)]
pub struct AnimationAction {
    clip: Arc<AnimationClip>,
    time: f32,
    state: ActionState,
    finished: bool,
    pub loop_mode: LoopMode,
    pub clamp_when_finished: bool,
    pub time_scale: f32,
    pub weight: f32,
}

impl AnimationAction {
    fn new(clip: Arc<AnimationClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            state: ActionState::Stopped,
            finished: false,
            loop_mode: LoopMode::default(),
            clamp_when_finished: false,
            time_scale: 1.0,
            weight: 1.0,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn set_loop(&mut self, loop_mode: LoopMode) -> &mut Self {
        self.loop_mode = loop_mode;
        self
    }

    /// Start playback. A `Once` action that already ran to its end starts over.
    pub fn play(&mut self) -> &mut Self {
        if self.finished {
            self.rewind();
        }
        self.state = ActionState::Playing;
        self
    }

    pub fn pause(&mut self) -> &mut Self {
        if self.state == ActionState::Playing {
            self.state = ActionState::Paused;
        }
        self
    }

    /// Stop and rewind; animated nodes return to the rest pose on the next update.
    pub fn stop(&mut self) -> &mut Self {
        self.state = ActionState::Stopped;
        self.rewind();
        self
    }

    /// Rewind to the start, resuming playback if the action was held.
    pub fn reset(&mut self) -> &mut Self {
        self.rewind();
        if self.state == ActionState::Paused {
            self.state = ActionState::Playing;
        }
        self
    }

    pub fn is_running(&self) -> bool {
        self.state == ActionState::Playing && self.time_scale != 0.0
    }

    fn is_active(&self) -> bool {
        self.state != ActionState::Stopped && self.weight > 0.0
    }

    fn rewind(&mut self) {
        self.finished = false;
        self.time = if self.time_scale < 0.0 {
            self.clip.duration
        } else {
            0.0
        };
    }

    fn advance(&mut self, dt: f32) -> Option<Progress> {
        if !self.is_running() {
            return None;
        }
        let duration = self.clip.duration;
        self.time += dt * self.time_scale;
        match self.loop_mode {
            LoopMode::Once => {
                let done = if self.time_scale > 0.0 {
                    self.time >= duration
                } else {
                    self.time <= 0.0
                };
                if !done {
                    return None;
                }
                self.time = self.time.clamp(0.0, duration);
                self.finished = true;
                self.state = if self.clamp_when_finished {
                    ActionState::Paused
                } else {
                    ActionState::Stopped
                };
                Some(Progress::Finished)
            }
            LoopMode::Repeat => {
                if duration <= 0.0 {
                    self.time = 0.0;
                    return None;
                }
                if self.time >= duration || self.time < 0.0 {
                    self.time = self.time.rem_euclid(duration);
                    return Some(Progress::Looped);
                }
                None
            }
        }
    }
}

#[derive(Debug)]
pub struct AnimationMixer {
    actions: Vec<AnimationAction>,
    rest_pose: Vec<Instance>,
    driven: BTreeSet<usize>,
}

impl AnimationMixer {
    /// Capture the current local transforms of `graph` as the rest pose.
    pub fn new(graph: &SceneGraph) -> Self {
        Self {
            actions: Vec::new(),
            rest_pose: graph.local_transforms(),
            driven: BTreeSet::new(),
        }
    }

    /// The action for `clip`; repeated calls with the same clip name return the same action.
    pub fn clip_action(&mut self, clip: &AnimationClip) -> ActionId {
        if let Some(idx) = self
            .actions
            .iter()
            .position(|action| action.clip.name == clip.name)
        {
            return ActionId(idx);
        }
        self.actions.push(AnimationAction::new(Arc::new(clip.clone())));
        ActionId(self.actions.len() - 1)
    }

    pub fn action(&self, id: ActionId) -> Option<&AnimationAction> {
        self.actions.get(id.0)
    }

    pub fn action_mut(&mut self, id: ActionId) -> Option<&mut AnimationAction> {
        self.actions.get_mut(id.0)
    }

    pub fn stop_all_actions(&mut self) {
        self.actions.iter_mut().for_each(|action| {
            action.stop();
        });
    }

    /// Advance all actions by `dt` and pose the graph.
    pub fn update(&mut self, dt: Duration, graph: &mut SceneGraph) -> Vec<MixerEvent> {
        let dt = dt.as_secs_f32();
        let events = self
            .actions
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, action)| {
                action.advance(dt).map(|progress| match progress {
                    Progress::Finished => MixerEvent::Finished(ActionId(idx)),
                    Progress::Looped => MixerEvent::Loop(ActionId(idx)),
                })
            })
            .collect();

        let driven: BTreeSet<usize> = self
            .actions
            .iter()
            .filter(|action| action.is_active())
            .flat_map(|action| action.clip.target_nodes())
            .filter(|&node| node < self.rest_pose.len())
            .collect();

        let released: Vec<usize> = self.driven.difference(&driven).copied().collect();
        for &node in &released {
            graph.set_local_transform(node, self.rest_pose[node]);
        }

        for &node in &driven {
            let mut pose = self.rest_pose[node];
            for action in self.actions.iter().filter(|action| action.is_active()) {
                let weight = action.weight.min(1.0);
                for channel in action
                    .clip
                    .channels
                    .iter()
                    .filter(|channel| channel.target_node == node)
                {
                    if let Some(sample) = channel.sample(action.time) {
                        apply_sample(&mut pose, sample, weight);
                    }
                }
            }
            graph.set_local_transform(node, pose);
        }

        if !driven.is_empty() || !released.is_empty() {
            graph.update_world_transforms();
        }
        self.driven = driven;
        events
    }
}

fn apply_sample(pose: &mut Instance, sample: Sample, weight: f32) {
    use cgmath::VectorSpace;
    let full = weight >= 1.0;
    match sample {
        Sample::Translation(v) if full => pose.position = v,
        Sample::Translation(v) => pose.position = pose.position.lerp(v, weight),
        Sample::Rotation(q) if full => pose.rotation = q,
        Sample::Rotation(q) => pose.rotation = pose.rotation.slerp(q, weight).normalize(),
        Sample::Scale(v) if full => pose.scale = v,
        Sample::Scale(v) => pose.scale = pose.scale.lerp(v, weight),
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::{
        animation::{Channel, Interpolation, Keyframes},
        data_structures::scene_graph::SceneNode,
    };

    fn door_graph() -> SceneGraph {
        let frame = SceneNode {
            children: vec![1],
            ..SceneNode::new("frame", Instance::default())
        };
        let panel = SceneNode::new("panel", Instance::from(Vector3::new(0.5, 0.0, 0.0)));
        SceneGraph::new(vec![frame, panel], vec![0])
    }

    fn slide(name: &str, to: f32) -> AnimationClip {
        AnimationClip::new(
            name,
            vec![Channel {
                target_node: 1,
                interpolation: Interpolation::Linear,
                timestamps: vec![0.0, 1.0],
                keyframes: Keyframes::Translation(vec![
                    Vector3::new(0.5, 0.0, 0.0),
                    Vector3::new(to, 0.0, 0.0),
                ]),
            }],
        )
    }

    fn panel_x(graph: &SceneGraph) -> f32 {
        graph.nodes[1].local.position.x
    }

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn clip_action_is_cached_by_name() {
        let graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let a = mixer.clip_action(&slide("opening", 2.0));
        let b = mixer.clip_action(&slide("opening", 2.0));
        let c = mixer.clip_action(&slide("closing", 0.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn actions_do_nothing_until_played() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        mixer.clip_action(&slide("opening", 2.0));
        let events = mixer.update(secs(0.5), &mut graph);
        assert!(events.is_empty());
        assert_eq!(panel_x(&graph), 0.5);
    }

    #[test]
    fn playing_action_moves_node_and_world_transform() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.5));
        mixer.action_mut(id).unwrap().play();
        mixer.update(secs(0.5), &mut graph);
        assert!((panel_x(&graph) - 1.5).abs() < 1e-5);
        assert!((graph.nodes[1].world_position().x - 1.5).abs() < 1e-5);
    }

    #[test]
    fn once_without_clamp_finishes_and_restores_rest_pose() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.0));
        mixer.action_mut(id).unwrap().set_loop(LoopMode::Once).play();

        mixer.update(secs(0.5), &mut graph);
        let events = mixer.update(secs(0.75), &mut graph);

        assert_eq!(events, vec![MixerEvent::Finished(id)]);
        let action = mixer.action(id).unwrap();
        assert_eq!(action.state(), ActionState::Stopped);
        assert!(!action.is_running());
        assert_eq!(panel_x(&graph), 0.5);
    }

    #[test]
    fn once_with_clamp_holds_last_frame() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.0));
        let action = mixer.action_mut(id).unwrap();
        action.set_loop(LoopMode::Once).play();
        action.clamp_when_finished = true;

        let events = mixer.update(secs(3.0), &mut graph);
        assert_eq!(events, vec![MixerEvent::Finished(id)]);
        assert_eq!(mixer.action(id).unwrap().state(), ActionState::Paused);
        assert_eq!(panel_x(&graph), 2.0);

        // still held on later frames
        assert!(mixer.update(secs(1.0), &mut graph).is_empty());
        assert_eq!(panel_x(&graph), 2.0);
    }

    #[test]
    fn finished_once_action_replays_from_start() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.0));
        mixer.action_mut(id).unwrap().set_loop(LoopMode::Once).play();
        mixer.update(secs(2.0), &mut graph);

        mixer.action_mut(id).unwrap().play();
        mixer.update(secs(0.25), &mut graph);
        assert!((panel_x(&graph) - 0.875).abs() < 1e-5);
    }

    #[test]
    fn repeat_wraps_time_and_reports_loop() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.0));
        mixer.action_mut(id).unwrap().play();
        let events = mixer.update(secs(1.25), &mut graph);
        assert_eq!(events, vec![MixerEvent::Loop(id)]);
        assert!((mixer.action(id).unwrap().time() - 0.25).abs() < 1e-5);
    }

    #[test]
    fn stop_returns_node_to_rest_pose() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.0));
        mixer.action_mut(id).unwrap().play();
        mixer.update(secs(0.5), &mut graph);
        mixer.stop_all_actions();
        mixer.update(secs(0.5), &mut graph);
        assert_eq!(panel_x(&graph), 0.5);
        assert_eq!(mixer.action(id).unwrap().time(), 0.0);
    }

    #[test]
    fn half_weight_blends_with_rest_pose() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.5));
        let action = mixer.action_mut(id).unwrap();
        action.weight = 0.5;
        action.play();
        mixer.update(secs(0.5), &mut graph);
        // rest 0.5, sampled 1.5 at t=0.5 -> halfway is 1.0
        assert!((panel_x(&graph) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn channels_pointing_past_the_graph_are_ignored() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let mut clip = slide("opening", 2.0);
        clip.channels[0].target_node = 42;
        let id = mixer.clip_action(&clip);
        mixer.action_mut(id).unwrap().play();
        mixer.update(secs(0.5), &mut graph);
        assert_eq!(panel_x(&graph), 0.5);
    }

    #[test]
    fn pause_holds_pose_until_played_again() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.0));
        mixer.action_mut(id).unwrap().set_loop(LoopMode::Once).play();
        mixer.update(secs(0.25), &mut graph);
        assert!((panel_x(&graph) - 0.875).abs() < 1e-5);

        mixer.action_mut(id).unwrap().pause();
        assert!(mixer.update(secs(0.5), &mut graph).is_empty());
        let action = mixer.action(id).unwrap();
        assert_eq!(action.state(), ActionState::Paused);
        assert!((action.time() - 0.25).abs() < 1e-5);
        assert!((panel_x(&graph) - 0.875).abs() < 1e-5);

        mixer.action_mut(id).unwrap().play();
        mixer.update(secs(0.25), &mut graph);
        assert!((panel_x(&graph) - 1.25).abs() < 1e-5);
    }

    #[test]
    fn reset_rewinds_and_resumes_a_held_action() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.0));
        let action = mixer.action_mut(id).unwrap();
        action.set_loop(LoopMode::Once).play();
        action.clamp_when_finished = true;
        mixer.update(secs(2.0), &mut graph);
        assert_eq!(mixer.action(id).unwrap().state(), ActionState::Paused);

        mixer.action_mut(id).unwrap().reset();
        let action = mixer.action(id).unwrap();
        assert_eq!(action.state(), ActionState::Playing);
        assert_eq!(action.time(), 0.0);
        mixer.update(secs(0.5), &mut graph);
        assert!((panel_x(&graph) - 1.25).abs() < 1e-5);
    }

    #[test]
    fn reset_leaves_a_stopped_action_stopped() {
        let graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("opening", 2.0));
        mixer.action_mut(id).unwrap().reset();
        assert_eq!(mixer.action(id).unwrap().state(), ActionState::Stopped);
    }

    #[test]
    fn negative_time_scale_plays_once_backwards() {
        let mut graph = door_graph();
        let mut mixer = AnimationMixer::new(&graph);
        let id = mixer.clip_action(&slide("closing", 2.0));
        let action = mixer.action_mut(id).unwrap();
        action.time_scale = -1.0;
        action.set_loop(LoopMode::Once).reset().play();
        assert_eq!(mixer.action(id).unwrap().time(), 1.0);

        assert!(mixer.update(secs(0.25), &mut graph).is_empty());
        assert!((panel_x(&graph) - 1.625).abs() < 1e-5);

        let events = mixer.update(secs(1.0), &mut graph);
        assert_eq!(events, vec![MixerEvent::Finished(id)]);
        let action = mixer.action(id).unwrap();
        assert_eq!(action.state(), ActionState::Stopped);
        assert_eq!(action.time(), 0.0);
        assert_eq!(panel_x(&graph), 0.5);

        // replaying a finished reversed action starts from the end again
        mixer.action_mut(id).unwrap().play();
        assert_eq!(mixer.action(id).unwrap().time(), 1.0);
    }
}
