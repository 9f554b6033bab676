//! In-memory model files for the integration tests.
//!
//! The door is a root `frame` node with one child `leaf` that carries a single
//! triangle and is rotated by the `opening` animation from identity to a half
//! turn around y over one second.

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

pub const LEAF_NODE: usize = 1;
pub const LEAF_OFFSET: [f32; 3] = [1.0, 0.0, 0.0];

/// Binary payload shared by the GLB and the `.gltf` + `.bin` variants.
pub fn door_bin() -> Vec<u8> {
    let mut bin = Vec::new();
    // positions, offset 0, 36 bytes
    for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        v.iter().for_each(|c| bin.extend_from_slice(&c.to_le_bytes()));
    }
    // indices, offset 36, 6 bytes + 2 padding
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);
    // keyframe times, offset 44, 8 bytes
    for t in [0.0f32, 1.0] {
        bin.extend_from_slice(&t.to_le_bytes());
    }
    // rotations (x, y, z, w), offset 52, 32 bytes
    for q in [[0.0f32, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0]] {
        q.iter().for_each(|c| bin.extend_from_slice(&c.to_le_bytes()));
    }
    bin
}

/// glTF JSON for the door. `buffer_uri` is `None` for the GLB binary chunk.
pub fn door_json(buffer_uri: Option<&str>) -> String {
    let uri = buffer_uri
        .map(|uri| format!(r#", "uri": "{uri}""#))
        .unwrap_or_default();
    format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "frame", "children": [1] }},
    {{ "name": "leaf", "mesh": 0, "translation": [1.0, 0.0, 0.0] }}
  ],
  "meshes": [{{
    "name": "door",
    "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }}]
  }}],
  "materials": [{{
    "name": "wood",
    "pbrMetallicRoughness": {{ "baseColorFactor": [0.5, 0.25, 0.125, 1.0] }}
  }}],
  "animations": [{{
    "name": "opening",
    "channels": [{{ "sampler": 0, "target": {{ "node": 1, "path": "rotation" }} }}],
    "samplers": [{{ "input": 2, "output": 3, "interpolation": "LINEAR" }}]
  }}],
  "buffers": [{{ "byteLength": 84{uri} }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }},
    {{ "buffer": 0, "byteOffset": 44, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 52, "byteLength": 32 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR",
       "min": [0.0], "max": [1.0] }},
    {{ "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC4" }}
  ]
}}"#
    )
}

/// Wrap a JSON document and a binary chunk into a GLB container.
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}

pub fn door_glb() -> Vec<u8> {
    glb(&door_json(None), &door_bin())
}
