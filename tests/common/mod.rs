// Common test utilities: synthetic container builders.
//
// Every integration test decodes buffers built here, so the layout logic
// lives in one place. Builders emit tables back to back after the header,
// in declaration order, with all offsets filled in.
#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::Path;

pub const NO_TEXTURE: u32 = 0xFFFF_FFFF;

pub fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_f32s(buf: &mut Vec<u8>, vs: &[f32]) {
    for &v in vs {
        put_f32(buf, v);
    }
}

pub fn put_name(buf: &mut Vec<u8>, name: &str, width: usize) {
    assert!(name.len() <= width, "name '{}' too long", name);
    buf.extend_from_slice(name.as_bytes());
    buf.resize(buf.len() + (width - name.len()), 0);
}

/// Builder for synthetic PM2 buffers.
pub struct Pm2Builder {
    prim_type: u32,
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    uvs: Option<Vec<[f32; 2]>>,
    colors: Option<Vec<[u8; 4]>>,
    indices: Vec<u16>,
    weights: Option<Vec<Vec<(u16, f32)>>>,
    shape_keys: Vec<(String, Vec<(u32, [f32; 3])>)>,
    tex_offset: u32,
}

impl Pm2Builder {
    pub fn new(positions: &[[f32; 3]]) -> Pm2Builder {
        Pm2Builder {
            prim_type: 0,
            positions: positions.to_vec(),
            normals: None,
            uvs: None,
            colors: None,
            indices: Vec::new(),
            weights: None,
            shape_keys: Vec::new(),
            tex_offset: NO_TEXTURE,
        }
    }

    /// A minimal valid part: a single triangle strip over three vertices.
    pub fn triangle() -> Pm2Builder {
        let mut builder =
            Pm2Builder::new(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        builder.indices = vec![0, 1, 2];
        builder
    }

    pub fn prim_type(mut self, prim_type: u32) -> Pm2Builder {
        self.prim_type = prim_type;
        self
    }

    pub fn indices(mut self, indices: &[u16]) -> Pm2Builder {
        self.indices = indices.to_vec();
        self
    }

    pub fn normals(mut self, normals: &[[f32; 3]]) -> Pm2Builder {
        self.normals = Some(normals.to_vec());
        self
    }

    pub fn uvs(mut self, uvs: &[[f32; 2]]) -> Pm2Builder {
        self.uvs = Some(uvs.to_vec());
        self
    }

    pub fn colors(mut self, colors: &[[u8; 4]]) -> Pm2Builder {
        self.colors = Some(colors.to_vec());
        self
    }

    /// Per-vertex `(bone, weight)` influence lists, one list per vertex.
    pub fn weights(mut self, weights: &[&[(u16, f32)]]) -> Pm2Builder {
        self.weights = Some(weights.iter().map(|w| w.to_vec()).collect());
        self
    }

    pub fn shape_key(mut self, name: &str, deltas: &[(u32, [f32; 3])]) -> Pm2Builder {
        self.shape_keys.push((name.to_string(), deltas.to_vec()));
        self
    }

    pub fn texture(mut self, tex_offset: u32) -> Pm2Builder {
        self.tex_offset = tex_offset;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let n = self.positions.len() as u32;
        let mut at = 52u32;

        let vertex_off = at;
        at += n * 12;
        let normal_off = self.normals.as_ref().map_or(0, |_| {
            let off = at;
            at += n * 12;
            off
        });
        let uv_off = self.uvs.as_ref().map_or(0, |_| {
            let off = at;
            at += n * 8;
            off
        });
        let color_off = self.colors.as_ref().map_or(0, |_| {
            let off = at;
            at += n * 4;
            off
        });
        let index_off = at;
        at += self.indices.len() as u32 * 2;
        let weight_off = self.weights.as_ref().map_or(0, |weights| {
            let off = at;
            at += weights.iter().map(|w| 4 + w.len() as u32 * 8).sum::<u32>();
            off
        });
        let shapekey_off = if self.shape_keys.is_empty() {
            0
        } else {
            let off = at;
            at += self.shape_keys.len() as u32 * 40;
            off
        };
        let mut delta_offs = Vec::new();
        for (_, deltas) in &self.shape_keys {
            delta_offs.push(at);
            at += deltas.len() as u32 * 16;
        }

        let mut buf = Vec::with_capacity(at as usize);
        buf.extend_from_slice(b"PM2\0");
        for field in [
            self.prim_type,
            n,
            vertex_off,
            normal_off,
            uv_off,
            color_off,
            self.indices.len() as u32,
            index_off,
            weight_off,
            self.shape_keys.len() as u32,
            shapekey_off,
            self.tex_offset,
        ] {
            put_u32(&mut buf, field);
        }

        for pos in &self.positions {
            put_f32s(&mut buf, pos);
        }
        if let Some(normals) = &self.normals {
            for normal in normals {
                put_f32s(&mut buf, normal);
            }
        }
        if let Some(uvs) = &self.uvs {
            for uv in uvs {
                put_f32s(&mut buf, uv);
            }
        }
        if let Some(colors) = &self.colors {
            for color in colors {
                buf.extend_from_slice(color);
            }
        }
        for &index in &self.indices {
            put_u16(&mut buf, index);
        }
        if let Some(weights) = &self.weights {
            for vertex in weights {
                put_u32(&mut buf, vertex.len() as u32);
                for &(bone, weight) in vertex {
                    put_u16(&mut buf, bone);
                    put_u16(&mut buf, 0);
                    put_f32(&mut buf, weight);
                }
            }
        }
        for ((name, deltas), delta_off) in self.shape_keys.iter().zip(&delta_offs) {
            put_name(&mut buf, name, 32);
            put_u32(&mut buf, deltas.len() as u32);
            put_u32(&mut buf, *delta_off);
        }
        for (_, deltas) in &self.shape_keys {
            for &(vertex, delta) in deltas {
                put_u32(&mut buf, vertex);
                put_f32s(&mut buf, &delta);
            }
        }

        assert_eq!(buf.len() as u32, at, "builder layout drifted");
        buf
    }

    pub fn write(&self, dir: &Path, name: &str) -> io::Result<()> {
        fs::write(dir.join(format!("{}.pm2", name)), self.build())
    }
}

/// Animation channel shape for [`GhsBuilder`].
pub enum ChannelSpec {
    Bone {
        bone: u32,
        interp: u8,
        keys: Vec<(u16, [f32; 3], [f32; 3])>,
    },
    ShapeKey {
        index: u32,
        interp: u8,
        keys: Vec<(u16, f32)>,
    },
}

impl ChannelSpec {
    fn record_target(&self) -> (u8, u32, u32) {
        match self {
            ChannelSpec::Bone { bone, keys, .. } => (0, *bone, keys.len() as u32),
            ChannelSpec::ShapeKey { index, keys, .. } => (1, *index, keys.len() as u32),
        }
    }

    fn interp(&self) -> u8 {
        match self {
            ChannelSpec::Bone { interp, .. } | ChannelSpec::ShapeKey { interp, .. } => *interp,
        }
    }

    fn blob_size(&self) -> u32 {
        match self {
            ChannelSpec::Bone { keys, .. } => keys.len() as u32 * 28,
            ChannelSpec::ShapeKey { keys, .. } => keys.len() as u32 * 8,
        }
    }

    fn emit_keys(&self, blob: &mut Vec<u8>) {
        match self {
            ChannelSpec::Bone { keys, .. } => {
                for &(frame, pos, rot) in keys {
                    put_u16(blob, frame);
                    put_u16(blob, 0);
                    put_f32s(blob, &pos);
                    put_f32s(blob, &rot);
                }
            }
            ChannelSpec::ShapeKey { keys, .. } => {
                for &(frame, weight) in keys {
                    put_u16(blob, frame);
                    put_u16(blob, 0);
                    put_f32(blob, weight);
                }
            }
        }
    }
}

pub struct ClipSpec {
    pub frame_rate: f32,
    pub channels: Vec<ChannelSpec>,
}

/// Builder for synthetic GHS containers. Layout after the 36-byte header:
/// part table, bone table, clip headers, channel tables, keyframe blob.
pub struct GhsBuilder {
    parts: Vec<(String, u32)>,
    bones: Vec<(i32, [f32; 3], [f32; 3])>,
    clips: Vec<ClipSpec>,
}

impl GhsBuilder {
    pub fn new() -> GhsBuilder {
        GhsBuilder {
            parts: Vec::new(),
            bones: Vec::new(),
            clips: Vec::new(),
        }
    }

    pub fn part(mut self, name: &str, bone: u32) -> GhsBuilder {
        self.parts.push((name.to_string(), bone));
        self
    }

    pub fn bone(mut self, parent: i32, pos: [f32; 3], rot: [f32; 3]) -> GhsBuilder {
        self.bones.push((parent, pos, rot));
        self
    }

    pub fn clip(mut self, clip: ClipSpec) -> GhsBuilder {
        self.clips.push(clip);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let part_off = 36u32;
        let bone_off = part_off + self.parts.len() as u32 * 36;
        let clip_off = bone_off + self.bones.len() as u32 * 28;
        let channel_base = clip_off + self.clips.len() as u32 * 16;

        let mut channel_offs = Vec::new();
        let mut at = channel_base;
        for clip in &self.clips {
            channel_offs.push(at);
            at += clip.channels.len() as u32 * 16;
        }
        let blob_off = at;

        // Keyframe offsets are blob-relative.
        let mut key_offs: Vec<Vec<u32>> = Vec::new();
        let mut blob_at = 0u32;
        for clip in &self.clips {
            let mut offs = Vec::new();
            for channel in &clip.channels {
                offs.push(blob_at);
                blob_at += channel.blob_size();
            }
            key_offs.push(offs);
        }

        let mut buf = Vec::new();
        buf.extend_from_slice(b"GHS\0");
        put_u32(&mut buf, self.parts.len() as u32);
        put_u32(&mut buf, part_off);
        put_u32(&mut buf, self.bones.len() as u32);
        put_u32(&mut buf, bone_off);
        put_u32(&mut buf, self.clips.len() as u32);
        put_u32(&mut buf, clip_off);
        put_u32(&mut buf, blob_off);
        put_u32(&mut buf, blob_at);

        for (name, bone) in &self.parts {
            put_name(&mut buf, name, 32);
            put_u32(&mut buf, *bone);
        }
        for &(parent, pos, rot) in &self.bones {
            put_i32(&mut buf, parent);
            put_f32s(&mut buf, &pos);
            put_f32s(&mut buf, &rot);
        }
        for (clip, channel_off) in self.clips.iter().zip(&channel_offs) {
            put_f32(&mut buf, clip.frame_rate);
            put_u32(&mut buf, clip.channels.len() as u32);
            put_u32(&mut buf, *channel_off);
            put_u32(&mut buf, 0);
        }
        for (clip, offs) in self.clips.iter().zip(&key_offs) {
            for (channel, key_off) in clip.channels.iter().zip(offs) {
                let (target, target_index, key_num) = channel.record_target();
                buf.push(target);
                buf.push(channel.interp());
                put_u16(&mut buf, 0);
                put_u32(&mut buf, target_index);
                put_u32(&mut buf, key_num);
                put_u32(&mut buf, *key_off);
            }
        }
        for clip in &self.clips {
            for channel in &clip.channels {
                channel.emit_keys(&mut buf);
            }
        }

        assert_eq!(buf.len() as u32, blob_off + blob_at, "builder layout drifted");
        buf
    }
}

/// Builder for synthetic MAP-PM2 room containers. Embedded payloads are laid
/// out back to back after the descriptor table.
pub struct MapBuilder {
    parts: Vec<(Vec<u8>, [f32; 3], [f32; 3], f32)>,
}

impl MapBuilder {
    pub fn new() -> MapBuilder {
        MapBuilder { parts: Vec::new() }
    }

    pub fn part(mut self, payload: Vec<u8>, pos: [f32; 3], rot: [f32; 3], scale: f32) -> MapBuilder {
        self.parts.push((payload, pos, rot, scale));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let part_off = 12u32;
        let mut at = part_off + self.parts.len() as u32 * 36;
        let offsets: Vec<u32> = self
            .parts
            .iter()
            .map(|(payload, ..)| {
                let off = at;
                at += payload.len() as u32;
                off
            })
            .collect();

        let mut buf = Vec::with_capacity(at as usize);
        buf.extend_from_slice(b"MAP\0");
        put_u32(&mut buf, self.parts.len() as u32);
        put_u32(&mut buf, part_off);
        for ((payload, pos, rot, scale), offset) in self.parts.iter().zip(&offsets) {
            put_u32(&mut buf, *offset);
            put_u32(&mut buf, payload.len() as u32);
            put_f32s(&mut buf, pos);
            put_f32s(&mut buf, rot);
            put_f32(&mut buf, *scale);
        }
        for (payload, ..) in &self.parts {
            buf.extend_from_slice(payload);
        }
        buf
    }
}
