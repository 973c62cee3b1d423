//! GHS character/prop container decoding.
//!
//! A GHS file is a manifest: it carries the skeleton, the animation clips
//! and a part table, while the mesh data itself lives in sibling
//! `<name>.pm2` files next to the container.
//!
//! ```text
//! [0x00] magic     "GHS\0"
//! [0x04] part_num  u32
//! [0x08] part_off  u32   part_num × 36-byte part records
//! [0x0C] bone_num  u32
//! [0x10] bone_off  u32   bone_num × 28-byte bone records
//! [0x14] clip_num  u32
//! [0x18] clip_off  u32   clip_num × 16-byte clip headers
//! [0x1C] blob_off  u32   keyframe blob
//! [0x20] blob_len  u32
//! ```
//!
//! Part record: `name [u8;32]` (NUL-padded), `bone u32` (attachment root in
//! the skeleton). A sibling that is missing or fails to decode only costs
//! that part: the failure is recorded as a `MissingDependency` warning and
//! the rest of the bundle is still produced.

use std::fs;
use std::path::Path;

use binrw::binrw;
use log::warn;

use crate::anim::{read_clips, AnimationClip};
use crate::cursor::Cursor;
use crate::error::{DecodeError, DecodeWarning, Result};
use crate::pm2::{decode_pm2, MeshPart};
use crate::skeleton::Skeleton;

pub const GHS_MAGIC: [u8; 4] = *b"GHS\0";

const PART_NAME_LEN: usize = 32;
const PART_RECORD_SIZE: u64 = 36;
const BONE_RECORD_SIZE: u64 = 28;
const CLIP_RECORD_SIZE: u64 = 16;

#[binrw]
#[derive(Debug, Clone, Copy)]
#[br(little)]
pub struct GhsHeader {
    pub part_num: u32,
    pub part_off: u32,
    pub bone_num: u32,
    pub bone_off: u32,
    pub clip_num: u32,
    pub clip_off: u32,
    pub blob_off: u32,
    pub blob_len: u32,
}

/// One mesh part resolved from its sibling file.
#[derive(Debug, Clone, PartialEq)]
pub struct GhsPart {
    pub name: String,
    /// Skeleton index the part hangs from.
    pub bone: u32,
    pub mesh: MeshPart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GhsFile {
    pub parts: Vec<GhsPart>,
    pub skeleton: Skeleton,
    pub clips: Vec<AnimationClip>,
}

/// Decode a GHS container. `part_dir` is the directory holding the sibling
/// `.pm2` files, normally the container's own directory.
pub fn decode_ghs(
    buf: &[u8],
    part_dir: &Path,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<GhsFile> {
    let mut cur = Cursor::new(buf);

    let magic = cur.read_bytes(4).map_err(|_| DecodeError::MalformedContainer {
        offset: 0,
        message: "buffer too short for GHS signature".to_string(),
    })?;
    if magic != GHS_MAGIC {
        return Err(DecodeError::MalformedContainer {
            offset: 0,
            message: format!("bad GHS signature {:02x?}", magic),
        });
    }

    let header: GhsHeader = cur.read_record()?;
    validate_header(&cur, &header)?;

    let skeleton = Skeleton::read(&mut cur, header.bone_off, header.bone_num as usize)?;

    let blob = cur
        .slice(header.blob_off as usize, header.blob_len as usize)
        .map_err(|_| DecodeError::MalformedContainer {
            offset: header.blob_off as usize,
            message: "keyframe blob runs past end of buffer".to_string(),
        })?;
    let clips = read_clips(
        &mut cur,
        header.clip_off,
        header.clip_num as usize,
        blob,
        warnings,
    )?;

    let parts = read_parts(&mut cur, &header, &skeleton, part_dir, warnings)?;

    Ok(GhsFile {
        parts,
        skeleton,
        clips,
    })
}

fn validate_header(cur: &Cursor, header: &GhsHeader) -> Result<()> {
    let check = |off: u32, bytes: u64, what: &str| -> Result<()> {
        if off as u64 + bytes > cur.len() as u64 {
            return Err(DecodeError::MalformedContainer {
                offset: off as usize,
                message: format!("{} table runs past end of buffer", what),
            });
        }
        Ok(())
    };
    check(header.part_off, header.part_num as u64 * PART_RECORD_SIZE, "part")?;
    check(header.bone_off, header.bone_num as u64 * BONE_RECORD_SIZE, "bone")?;
    check(header.clip_off, header.clip_num as u64 * CLIP_RECORD_SIZE, "clip")?;
    Ok(())
}

fn read_parts(
    cur: &mut Cursor,
    header: &GhsHeader,
    skeleton: &Skeleton,
    part_dir: &Path,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Vec<GhsPart>> {
    cur.seek(header.part_off as usize)?;
    let mut records = Vec::with_capacity(header.part_num as usize);
    for _ in 0..header.part_num {
        let name = cur.read_fixed_string(PART_NAME_LEN)?;
        let bone = cur.read_u32()?;
        records.push((name, bone));
    }

    let mut parts = Vec::with_capacity(records.len());
    for (name, bone) in records {
        if !skeleton.is_empty() && bone as usize >= skeleton.len() {
            return Err(DecodeError::MalformedContainer {
                offset: header.part_off as usize,
                message: format!(
                    "part '{}' attaches to bone {} of {}",
                    name,
                    bone,
                    skeleton.len()
                ),
            });
        }

        let path = part_dir.join(format!("{}.pm2", name));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("sibling {} unavailable: {}", path.display(), err);
                warnings.push(DecodeWarning::MissingDependency {
                    part: name,
                    detail: err.to_string(),
                });
                continue;
            }
        };
        match decode_pm2(&bytes, warnings) {
            Ok(mesh) => parts.push(GhsPart { name, bone, mesh }),
            Err(err) => {
                warn!("sibling {} undecodable: {}", path.display(), err);
                warnings.push(DecodeWarning::MissingDependency {
                    part: name,
                    detail: err.to_string(),
                });
            }
        }
    }
    Ok(parts)
}
