use cgmath::{Deg, Point3, Vector3};
use door_viewer::{
    animation::{
        AnimationClip,
        mixer::{AnimationMixer, LoopMode, MixerEvent},
    },
    camera::{Camera, Projection, fit_camera_to_bounds},
    data_structures::model::AlphaMode,
    parse_gltf,
};
use instant::Duration;

use crate::common::test_utils::{LEAF_NODE, LEAF_OFFSET, door_bin, door_glb, door_json, glb};

mod common;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn should_import_geometry_and_material() {
    let data = parse_gltf(&door_glb()).unwrap();

    assert_eq!(data.meshes.len(), 1);
    assert_eq!(data.mesh_primitives, vec![0..1]);
    let mesh = &data.meshes[0];
    assert_eq!(mesh.vertices.len(), 3);
    assert_eq!(mesh.indices, vec![0, 1, 2]);
    assert_eq!(mesh.material, Some(0));
    // No normals in the file, they are generated from the winding.
    for vertex in &mesh.vertices {
        assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
    }

    assert_eq!(data.materials.len(), 1);
    assert_eq!(data.materials[0].name, "wood");
    assert_eq!(data.materials[0].base_colour, [0.5, 0.25, 0.125, 1.0]);
    assert!(data.materials[0].base_colour_texture.is_none());
    assert_eq!(data.materials[0].alpha_mode, AlphaMode::Opaque);
}

#[test]
fn should_import_material_alpha_modes() {
    let masked = door_json(None).replace(
        r#""name": "wood","#,
        r#""name": "wood", "alphaMode": "MASK", "alphaCutoff": 0.25,"#,
    );
    let data = parse_gltf(&glb(&masked, &door_bin())).unwrap();
    assert_eq!(data.materials[0].alpha_mode, AlphaMode::Mask { cutoff: 0.25 });

    let default_cutoff = door_json(None).replace(
        r#""name": "wood","#,
        r#""name": "wood", "alphaMode": "MASK","#,
    );
    let data = parse_gltf(&glb(&default_cutoff, &door_bin())).unwrap();
    assert_eq!(data.materials[0].alpha_mode, AlphaMode::Mask { cutoff: 0.5 });

    let blended = door_json(None).replace(
        r#""name": "wood","#,
        r#""name": "wood", "alphaMode": "BLEND","#,
    );
    let data = parse_gltf(&glb(&blended, &door_bin())).unwrap();
    assert_eq!(data.materials[0].alpha_mode, AlphaMode::Blend);
}

#[test]
fn should_import_hierarchy_and_world_bounds() {
    let data = parse_gltf(&door_glb()).unwrap();

    assert_eq!(data.graph.len(), 2);
    assert_eq!(data.graph.roots, vec![0]);
    let leaf = data.graph.node(LEAF_NODE).unwrap();
    assert_eq!(leaf.name, "leaf");
    assert_eq!(leaf.mesh, Some(0));
    assert_eq!(leaf.world_position(), Vector3::from(LEAF_OFFSET));

    let bounds = data.bounds();
    assert_eq!(bounds.min, Point3::new(1.0, 0.0, 0.0));
    assert_eq!(bounds.max, Point3::new(2.0, 1.0, 0.0));
}

#[test]
fn should_frame_the_imported_model() {
    let data = parse_gltf(&door_glb()).unwrap();
    let mut camera = Camera::default();
    let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);

    let framing =
        fit_camera_to_bounds(&mut camera, &mut projection, &data.bounds(), 1.5).unwrap();

    let expected = (0.5 / (37.5f32).to_radians().tan()).abs() * 1.5;
    assert!(close(framing.distance, expected));
    assert_eq!(camera.target, Point3::new(1.5, 0.5, 0.0));
    assert!(close(camera.position.z, expected));
}

#[test]
fn should_play_the_opening_animation_once() {
    let mut data = parse_gltf(&door_glb()).unwrap();
    assert_eq!(data.animations.len(), 1);
    let clip = AnimationClip::find_by_name(&data.animations, "opening").unwrap();
    assert!(close(clip.duration, 1.0));
    assert!(AnimationClip::find_by_name(&data.animations, "closing").is_none());

    let mut mixer = AnimationMixer::new(&data.graph);
    let opening = mixer.clip_action(clip);
    mixer.action_mut(opening).unwrap().set_loop(LoopMode::Once).play();

    let events = mixer.update(Duration::from_millis(500), &mut data.graph);
    assert!(events.is_empty());
    let rotation = data.graph.node(LEAF_NODE).unwrap().local.rotation;
    // Halfway through a half turn around y.
    let half = std::f32::consts::FRAC_1_SQRT_2;
    assert!(close(rotation.s, half));
    assert!(close(rotation.v.y, half));
    assert_eq!(
        data.graph.node(LEAF_NODE).unwrap().local.position,
        Vector3::from(LEAF_OFFSET)
    );

    let events = mixer.update(Duration::from_millis(600), &mut data.graph);
    assert_eq!(events, vec![MixerEvent::Finished(opening)]);
    assert!(!mixer.action(opening).unwrap().is_running());
    // Without clamping the leaf returns to its rest pose.
    let rotation = data.graph.node(LEAF_NODE).unwrap().local.rotation;
    assert!(close(rotation.s, 1.0));
}

#[test]
fn should_reject_truncated_files() {
    let glb = door_glb();
    assert!(parse_gltf(&glb[..glb.len() / 2]).is_err());
}
