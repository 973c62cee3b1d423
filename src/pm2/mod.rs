//! PM2 file parser — one self-contained mesh part (geometry, skinning,
//! shape keys, texture reference).
//!
//! Binary layout (all offsets relative to the start of the PM2 buffer, so an
//! embedded sub-range decodes without seeing its surroundings):
//! ```text
//! [4 bytes]  magic "PM2\0"
//! [48 bytes] header:
//!     prim_type(4)    — 0=tristrip (0xFFFF restart), 1=trilist
//!     vertex_num(4)
//!     vertex_off(4)   — vertex_num × 12 (pos f32×3)
//!     normal_off(4)   — vertex_num × 12, 0 = absent
//!     uv_off(4)       — vertex_num × 8, 0 = absent
//!     color_off(4)    — vertex_num × 4 (RGBA bytes), 0 = absent
//!     index_num(4)
//!     index_off(4)    — index_num × u16 strip/list entries
//!     weight_off(4)   — variable per-vertex influence records, 0 = unskinned
//!     shapekey_num(4)
//!     shapekey_off(4) — shapekey_num × 40-byte descriptors
//!     tex_offset(4)   — texture-offset hint, 0xFFFFFFFF = untextured
//! ```
//!
//! Weight records, one per vertex in vertex order:
//! `influence_num(4)` then influence_num × `{ bone(2) pad(2) weight(4) }`.
//!
//! Shape-key descriptor: `name(32, NUL-padded) delta_num(4) delta_off(4)`;
//! deltas are sparse `{ vertex(4) dx dy dz (f32×3) }` records.

use binrw::binrw;
use log::{debug, warn};

use crate::cursor::Cursor;
use crate::error::{DecodeError, DecodeWarning, Result};
use crate::math::{GhsVector2, GhsVector3};
use crate::texture::TextureRef;

pub const PM2_MAGIC: [u8; 4] = *b"PM2\0";

pub const PRIM_TYPE_TRISTRIP: u32 = 0;
pub const PRIM_TYPE_TRILIST: u32 = 1;

/// Strip entry that ends the current strip and begins a new one.
pub const STRIP_RESTART: u16 = 0xFFFF;

/// Fixed maximum bone influences per vertex.
pub const MAX_BONE_INFLUENCES: usize = 4;

/// Tolerance for per-vertex weight sums before renormalization kicks in.
pub const WEIGHT_EPSILON: f32 = 1e-4;

/// Sentinel for an untextured part.
pub const NO_TEXTURE: u32 = 0xFFFF_FFFF;

const SHAPE_KEY_NAME_LEN: usize = 32;
const SHAPE_KEY_DESC_SIZE: u32 = 40;
const SHAPE_DELTA_SIZE: u32 = 16;

// Influence counts beyond this are structural garbage, not lenience material.
const INFLUENCE_SANITY_LIMIT: u32 = 64;

#[binrw]
#[derive(Debug, Clone)]
#[br(little)]
pub struct Pm2Header {
    pub prim_type: u32,
    pub vertex_num: u32,
    pub vertex_off: u32,
    pub normal_off: u32,
    pub uv_off: u32,
    pub color_off: u32,
    pub index_num: u32,
    pub index_off: u32,
    pub weight_off: u32,
    pub shapekey_num: u32,
    pub shapekey_off: u32,
    pub tex_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneInfluence {
    pub bone: u16,
    pub weight: f32,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct ShapeDelta {
    pub vertex: u32,
    pub delta: GhsVector3,
}

/// One named morph target: sparse position offsets relative to the base mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeKey {
    pub name: String,
    pub deltas: Vec<ShapeDelta>,
}

/// Decoded mesh part. Fully populated by [`decode_pm2`], immutable after.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPart {
    pub positions: Vec<GhsVector3>,
    /// Empty when the container carries no normal table.
    pub normals: Vec<GhsVector3>,
    /// Empty when the container carries no UV table.
    pub uvs: Vec<GhsVector2>,
    /// Raw RGBA bytes; empty when the container carries no color table.
    pub colors: Vec<[u8; 4]>,
    /// Per-vertex bone influences; empty when the part is unskinned.
    pub influences: Vec<Vec<BoneInfluence>>,
    pub triangles: Vec<[u32; 3]>,
    pub shape_keys: Vec<ShapeKey>,
    pub texture: Option<TextureRef>,
}

impl MeshPart {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Vertex color as 0.0–1.0 floats. Alpha uses the PS2 convention where
    /// 0x80 is fully opaque.
    pub fn color_f32(&self, vertex: usize) -> Option<[f32; 4]> {
        let [r, g, b, a] = *self.colors.get(vertex)?;
        Some([
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            (a as f32 / 128.0).min(1.0),
        ])
    }
}

/// Decode a PM2 container from `buf` (a whole file or an embedded sub-range).
///
/// Lenient corrections (weight renormalization, degenerate strip
/// suppression, influence clamping) are recorded in `warnings`; structural
/// problems are fatal.
pub fn decode_pm2(buf: &[u8], warnings: &mut Vec<DecodeWarning>) -> Result<MeshPart> {
    let mut cur = Cursor::new(buf);

    let magic = cur.read_bytes(4).map_err(|_| DecodeError::MalformedContainer {
        offset: 0,
        message: "buffer too short for PM2 signature".to_string(),
    })?;
    if magic != PM2_MAGIC {
        return Err(DecodeError::MalformedContainer {
            offset: 0,
            message: format!("bad PM2 signature {:02x?}", magic),
        });
    }

    let header: Pm2Header = cur.read_record()?;
    validate_header(&cur, &header)?;
    let vertex_num = header.vertex_num as usize;

    let positions = read_vec3_table(&mut cur, header.vertex_off, vertex_num)?;
    let normals = if header.normal_off != 0 {
        read_vec3_table(&mut cur, header.normal_off, vertex_num)?
    } else {
        Vec::new()
    };
    let uvs = if header.uv_off != 0 {
        read_uv_table(&mut cur, header.uv_off, vertex_num)?
    } else {
        Vec::new()
    };
    let colors = if header.color_off != 0 {
        read_color_table(&mut cur, header.color_off, vertex_num)?
    } else {
        Vec::new()
    };

    let entries = read_index_entries(&mut cur, &header)?;
    let triangles = match header.prim_type {
        PRIM_TYPE_TRISTRIP => expand_strips(&entries, warnings),
        PRIM_TYPE_TRILIST => expand_list(&entries, &header)?,
        other => return Err(DecodeError::UnsupportedTopology { prim_type: other }),
    };

    let influences = if header.weight_off != 0 {
        read_weight_table(&mut cur, &header, warnings)?
    } else {
        Vec::new()
    };

    let shape_keys = read_shape_keys(&mut cur, &header)?;

    let texture = if header.tex_offset != NO_TEXTURE {
        Some(TextureRef::new(header.tex_offset))
    } else {
        None
    };

    Ok(MeshPart {
        positions,
        normals,
        uvs,
        colors,
        influences,
        triangles,
        shape_keys,
        texture,
    })
}

fn table_in_bounds(cur: &Cursor, off: u32, bytes: u64, what: &str) -> Result<()> {
    if off as u64 + bytes > cur.len() as u64 {
        return Err(DecodeError::MalformedContainer {
            offset: off as usize,
            message: format!("{} table runs past end of buffer", what),
        });
    }
    Ok(())
}

fn validate_header(cur: &Cursor, header: &Pm2Header) -> Result<()> {
    let vn = header.vertex_num as u64;
    if vn > 0 && header.vertex_off == 0 {
        return Err(DecodeError::MalformedContainer {
            offset: 0,
            message: "vertex_num nonzero but vertex table offset is 0".to_string(),
        });
    }
    if header.index_num > 0 && header.index_off == 0 {
        return Err(DecodeError::MalformedContainer {
            offset: 0,
            message: "index_num nonzero but index table offset is 0".to_string(),
        });
    }
    table_in_bounds(cur, header.vertex_off, vn * 12, "vertex")?;
    if header.normal_off != 0 {
        table_in_bounds(cur, header.normal_off, vn * 12, "normal")?;
    }
    if header.uv_off != 0 {
        table_in_bounds(cur, header.uv_off, vn * 8, "uv")?;
    }
    if header.color_off != 0 {
        table_in_bounds(cur, header.color_off, vn * 4, "color")?;
    }
    table_in_bounds(cur, header.index_off, header.index_num as u64 * 2, "index")?;
    if header.shapekey_num > 0 {
        table_in_bounds(
            cur,
            header.shapekey_off,
            header.shapekey_num as u64 * SHAPE_KEY_DESC_SIZE as u64,
            "shape-key",
        )?;
    }
    Ok(())
}

fn read_vec3_table(cur: &mut Cursor, off: u32, count: usize) -> Result<Vec<GhsVector3>> {
    cur.seek(off as usize)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(cur.read_record::<GhsVector3>()?);
    }
    Ok(out)
}

fn read_uv_table(cur: &mut Cursor, off: u32, count: usize) -> Result<Vec<GhsVector2>> {
    cur.seek(off as usize)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(cur.read_record::<GhsVector2>()?);
    }
    Ok(out)
}

fn read_color_table(cur: &mut Cursor, off: u32, count: usize) -> Result<Vec<[u8; 4]>> {
    cur.seek(off as usize)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let b = cur.read_bytes(4)?;
        out.push([b[0], b[1], b[2], b[3]]);
    }
    Ok(out)
}

fn read_index_entries(cur: &mut Cursor, header: &Pm2Header) -> Result<Vec<u16>> {
    cur.seek(header.index_off as usize)?;
    let mut entries = Vec::with_capacity(header.index_num as usize);
    for _ in 0..header.index_num {
        let entry = cur.read_u16()?;
        if entry != STRIP_RESTART && entry as u32 >= header.vertex_num {
            return Err(DecodeError::MalformedContainer {
                offset: header.index_off as usize,
                message: format!(
                    "index entry {} exceeds vertex count {}",
                    entry, header.vertex_num
                ),
            });
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Expand restart-marked tristrips into a flat triangle list.
///
/// Winding alternates by position within the strip: candidate i emits
/// (e[i+1], e[i], e[i+2]) when i is even and (e[i], e[i+1], e[i+2]) when
/// odd. Candidates with a repeated index are degenerate restarts and are
/// suppressed; the suppression is recorded, never silent.
fn expand_strips(entries: &[u16], warnings: &mut Vec<DecodeWarning>) -> Vec<[u32; 3]> {
    let mut triangles = Vec::new();
    let mut degenerate = 0usize;

    for strip in entries.split(|&e| e == STRIP_RESTART) {
        if strip.len() < 3 {
            continue;
        }
        for i in 0..strip.len() - 2 {
            let (a, b, c) = (strip[i] as u32, strip[i + 1] as u32, strip[i + 2] as u32);
            if a == b || b == c || a == c {
                degenerate += 1;
                continue;
            }
            if i % 2 == 0 {
                triangles.push([b, a, c]);
            } else {
                triangles.push([a, b, c]);
            }
        }
    }

    if degenerate > 0 {
        debug!("suppressed {} degenerate strip triangle(s)", degenerate);
        warnings.push(DecodeWarning::DegenerateStrip {
            triangles: degenerate,
        });
    }
    triangles
}

fn expand_list(entries: &[u16], header: &Pm2Header) -> Result<Vec<[u32; 3]>> {
    if entries.len() % 3 != 0 {
        return Err(DecodeError::MalformedContainer {
            offset: header.index_off as usize,
            message: format!("trilist of {} entries has a partial triangle", entries.len()),
        });
    }
    Ok(entries
        .chunks_exact(3)
        .map(|t| [t[0] as u32, t[1] as u32, t[2] as u32])
        .collect())
}

fn read_weight_table(
    cur: &mut Cursor,
    header: &Pm2Header,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Vec<Vec<BoneInfluence>>> {
    cur.seek(header.weight_off as usize)?;
    let mut per_vertex = Vec::with_capacity(header.vertex_num as usize);

    for vertex in 0..header.vertex_num as usize {
        let influence_num = cur.read_u32()?;
        if influence_num > INFLUENCE_SANITY_LIMIT {
            return Err(DecodeError::MalformedContainer {
                offset: cur.position(),
                message: format!("vertex {} declares {} influences", vertex, influence_num),
            });
        }

        let mut influences = Vec::with_capacity(influence_num.min(8) as usize);
        for _ in 0..influence_num {
            let bone = cur.read_u16()?;
            let _pad = cur.read_u16()?;
            let weight = cur.read_f32()?;
            influences.push(BoneInfluence { bone, weight });
        }

        if influences.len() > MAX_BONE_INFLUENCES {
            warn!(
                "vertex {} has {} influences, clamping to {}",
                vertex,
                influences.len(),
                MAX_BONE_INFLUENCES
            );
            warnings.push(DecodeWarning::WeightOverflow {
                vertex,
                influences: influences.len(),
            });
            influences.sort_by(|a, b| b.weight.total_cmp(&a.weight));
            influences.truncate(MAX_BONE_INFLUENCES);
        }

        if !influences.is_empty() {
            normalize_weights(vertex, &mut influences, cur.position(), warnings)?;
        }
        per_vertex.push(influences);
    }
    Ok(per_vertex)
}

fn normalize_weights(
    vertex: usize,
    influences: &mut [BoneInfluence],
    offset: usize,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<()> {
    let sum: f32 = influences.iter().map(|i| i.weight).sum();
    if !(sum > 0.0) {
        return Err(DecodeError::MalformedContainer {
            offset,
            message: format!("vertex {} weights sum to {}", vertex, sum),
        });
    }
    if (sum - 1.0).abs() > WEIGHT_EPSILON {
        debug!("vertex {} weights sum to {}, renormalizing", vertex, sum);
        for influence in influences.iter_mut() {
            influence.weight /= sum;
        }
        warnings.push(DecodeWarning::WeightsRenormalized { vertex, sum });
    }
    Ok(())
}

fn read_shape_keys(cur: &mut Cursor, header: &Pm2Header) -> Result<Vec<ShapeKey>> {
    if header.shapekey_num == 0 {
        return Ok(Vec::new());
    }

    cur.seek(header.shapekey_off as usize)?;
    let mut descriptors = Vec::with_capacity(header.shapekey_num as usize);
    for _ in 0..header.shapekey_num {
        let name = cur.read_fixed_string(SHAPE_KEY_NAME_LEN)?;
        let delta_num = cur.read_u32()?;
        let delta_off = cur.read_u32()?;
        table_in_bounds(cur, delta_off, delta_num as u64 * SHAPE_DELTA_SIZE as u64, "shape-delta")?;
        descriptors.push((name, delta_num, delta_off));
    }

    let mut keys = Vec::with_capacity(descriptors.len());
    for (name, delta_num, delta_off) in descriptors {
        cur.seek(delta_off as usize)?;
        let mut deltas = Vec::with_capacity(delta_num as usize);
        for _ in 0..delta_num {
            let delta: ShapeDelta = cur.read_record()?;
            if delta.vertex >= header.vertex_num {
                return Err(DecodeError::MalformedContainer {
                    offset: delta_off as usize,
                    message: format!(
                        "shape key '{}' delta targets vertex {} of {}",
                        name, delta.vertex, header.vertex_num
                    ),
                });
            }
            deltas.push(delta);
        }
        keys.push(ShapeKey { name, deltas });
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_only_pm2(entries: &[u16]) -> Vec<u8> {
        // Four dummy vertices at offset 52, indices right after.
        let vertex_num = 4u32;
        let vertex_off = 52u32;
        let index_off = vertex_off + vertex_num * 12;

        let mut buf = Vec::new();
        buf.extend_from_slice(&PM2_MAGIC);
        for field in [
            PRIM_TYPE_TRISTRIP,
            vertex_num,
            vertex_off,
            0, // normal_off
            0, // uv_off
            0, // color_off
            entries.len() as u32,
            index_off,
            0, // weight_off
            0, // shapekey_num
            0, // shapekey_off
            NO_TEXTURE,
        ] {
            buf.extend_from_slice(&field.to_le_bytes());
        }
        for v in 0..vertex_num {
            for f in [v as f32, 0.0, 0.0] {
                buf.extend_from_slice(&f.to_le_bytes());
            }
        }
        for e in entries {
            buf.extend_from_slice(&e.to_le_bytes());
        }
        buf
    }

    #[test]
    fn strip_winding_alternates() {
        let mut warnings = Vec::new();
        let part = decode_pm2(&strip_only_pm2(&[0, 1, 2, 3]), &mut warnings).unwrap();
        assert_eq!(part.triangles, vec![[1, 0, 2], [1, 2, 3]]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn duplicated_leading_entry_restarts_degenerately() {
        let mut warnings = Vec::new();
        let part = decode_pm2(&strip_only_pm2(&[0, 0, 1, 2, 3]), &mut warnings).unwrap();
        // (0,0,1) is suppressed; (0,1,2) odd-parity and (1,2,3) even-parity remain.
        assert_eq!(part.triangles, vec![[0, 1, 2], [2, 1, 3]]);
        assert_eq!(warnings, vec![DecodeWarning::DegenerateStrip { triangles: 1 }]);
    }

    #[test]
    fn restart_marker_splits_strips() {
        let mut warnings = Vec::new();
        let part =
            decode_pm2(&strip_only_pm2(&[0, 1, 2, STRIP_RESTART, 1, 2, 3]), &mut warnings)
                .unwrap();
        assert_eq!(part.triangles, vec![[1, 0, 2], [2, 1, 3]]);
    }

    #[test]
    fn short_strip_emits_nothing() {
        let mut warnings = Vec::new();
        let part = decode_pm2(&strip_only_pm2(&[0, 1]), &mut warnings).unwrap();
        assert!(part.triangles.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn index_out_of_range_is_fatal() {
        let mut warnings = Vec::new();
        let err = decode_pm2(&strip_only_pm2(&[0, 1, 9]), &mut warnings).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedContainer { .. }));
    }

    #[test]
    fn bad_signature_is_fatal() {
        let mut buf = strip_only_pm2(&[0, 1, 2]);
        buf[0] = b'X';
        let mut warnings = Vec::new();
        assert!(matches!(
            decode_pm2(&buf, &mut warnings),
            Err(DecodeError::MalformedContainer { offset: 0, .. })
        ));
    }

    #[test]
    fn zero_index_offset_with_entries_is_fatal() {
        let mut buf = strip_only_pm2(&[0, 1, 2]);
        buf[32..36].copy_from_slice(&0u32.to_le_bytes());
        let mut warnings = Vec::new();
        assert!(matches!(
            decode_pm2(&buf, &mut warnings),
            Err(DecodeError::MalformedContainer { .. })
        ));
    }

    #[test]
    fn unsupported_prim_type_is_fatal() {
        let mut buf = strip_only_pm2(&[0, 1, 2]);
        buf[4..8].copy_from_slice(&7u32.to_le_bytes());
        let mut warnings = Vec::new();
        assert!(matches!(
            decode_pm2(&buf, &mut warnings),
            Err(DecodeError::UnsupportedTopology { prim_type: 7 })
        ));
    }

    #[test]
    fn ps2_alpha_convention() {
        let part = MeshPart {
            positions: vec![GhsVector3::zero()],
            normals: Vec::new(),
            uvs: Vec::new(),
            colors: vec![[255, 0, 0, 0x80]],
            influences: Vec::new(),
            triangles: Vec::new(),
            shape_keys: Vec::new(),
            texture: None,
        };
        assert_eq!(part.color_f32(0), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(part.color_f32(1), None);
    }
}

