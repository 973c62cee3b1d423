//! MAP-PM2 room container decoding.
//!
//! A room file embeds whole PM2 parts as byte ranges and places each one in
//! the room:
//! ```text
//! [0x00] magic     "MAP\0"
//! [0x04] part_num  u32
//! [0x08] part_off  u32   part_num × 36-byte descriptors
//! ```
//! Descriptor: `offset u32, length u32` (a self-contained PM2 sub-range;
//! its internal offsets are relative to the sub-range, never to the room
//! file), `pos f32×3, rot f32×3` (euler ZXY), `scale f32`. Rooms carry no
//! skeleton and no animation.

use binrw::binrw;
use cgmath::Matrix4;

use crate::cursor::Cursor;
use crate::error::{DecodeError, DecodeWarning, Result};
use crate::math::{compose_transform, GhsEuler, GhsVector3};
use crate::pm2::{decode_pm2, MeshPart};

pub const MAP_MAGIC: [u8; 4] = *b"MAP\0";

#[binrw]
#[derive(Debug, Clone, Copy)]
#[br(little)]
pub struct PartDescriptor {
    pub offset: u32,
    pub length: u32,
    pub pos: GhsVector3,
    pub rot: GhsEuler,
    pub scale: f32,
}

/// Static placement of one embedded part within the room.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub translation: GhsVector3,
    pub rotation: GhsEuler,
    pub scale: f32,
}

impl Placement {
    /// Room-space transform: translate, rotate (ZXY), then uniform scale.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        compose_transform(&self.translation, &self.rotation) * Matrix4::from_scale(self.scale)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapPart {
    pub mesh: MeshPart,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapFile {
    pub parts: Vec<MapPart>,
}

/// Decode a MAP-PM2 room container. Each descriptor's sub-range is sliced
/// out and decoded as an independent PM2 buffer.
pub fn decode_map(buf: &[u8], warnings: &mut Vec<DecodeWarning>) -> Result<MapFile> {
    let mut cur = Cursor::new(buf);

    let magic = cur.read_bytes(4).map_err(|_| DecodeError::MalformedContainer {
        offset: 0,
        message: "buffer too short for MAP signature".to_string(),
    })?;
    if magic != MAP_MAGIC {
        return Err(DecodeError::MalformedContainer {
            offset: 0,
            message: format!("bad MAP signature {:02x?}", magic),
        });
    }

    let part_num = cur.read_u32()?;
    let part_off = cur.read_u32()?;
    if part_off as u64 + part_num as u64 * 36 > buf.len() as u64 {
        return Err(DecodeError::MalformedContainer {
            offset: part_off as usize,
            message: "descriptor table runs past end of buffer".to_string(),
        });
    }

    cur.seek(part_off as usize)?;
    let mut descriptors = Vec::with_capacity(part_num as usize);
    for _ in 0..part_num {
        descriptors.push(cur.read_record::<PartDescriptor>()?);
    }

    let mut parts = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let range = cur
            .slice(descriptor.offset as usize, descriptor.length as usize)
            .map_err(|_| DecodeError::MalformedContainer {
                offset: descriptor.offset as usize,
                message: "embedded part runs past end of buffer".to_string(),
            })?;
        let mesh = decode_pm2(range, warnings)?;
        parts.push(MapPart {
            mesh,
            placement: Placement {
                translation: descriptor.pos,
                rotation: descriptor.rot,
                scale: descriptor.scale,
            },
        });
    }
    Ok(MapFile { parts })
}
