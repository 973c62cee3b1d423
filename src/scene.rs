//! Container sniffing and top-level scene assembly.
//!
//! Callers hand over bytes or a path; the first four bytes pick the decoder
//! and everything converges on a [`SceneBundle`]. Recoverable oddities found
//! on the way ride along in `bundle.warnings`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;

use crate::anim::AnimationClip;
use crate::error::{DecodeError, DecodeWarning, Result};
use crate::ghs::{decode_ghs, GHS_MAGIC};
use crate::mappm2::{decode_map, Placement, MAP_MAGIC};
use crate::pm2::{decode_pm2, MeshPart, PM2_MAGIC};
use crate::skeleton::Skeleton;
use crate::texture::TextureCache;

/// The three container formats this crate understands. Closed set: anything
/// else in the leading bytes is malformed, not a fourth kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Ghs,
    MapPm2,
    Pm2,
}

impl ContainerKind {
    pub fn sniff(buf: &[u8]) -> Result<ContainerKind> {
        let magic: [u8; 4] = buf
            .get(..4)
            .and_then(|m| m.try_into().ok())
            .ok_or_else(|| DecodeError::MalformedContainer {
                offset: 0,
                message: "buffer too short for a signature".to_string(),
            })?;
        match magic {
            GHS_MAGIC => Ok(ContainerKind::Ghs),
            MAP_MAGIC => Ok(ContainerKind::MapPm2),
            PM2_MAGIC => Ok(ContainerKind::Pm2),
            other => Err(DecodeError::MalformedContainer {
                offset: 0,
                message: format!("unknown signature {:02x?}", other),
            }),
        }
    }
}

/// One mesh part in its scene context. Placement is set for room parts,
/// attachment for character parts; a lone PM2 has neither.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePart {
    pub name: String,
    pub mesh: MeshPart,
    pub placement: Option<Placement>,
    pub attach_bone: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneBundle {
    pub kind: ContainerKind,
    pub parts: Vec<ScenePart>,
    pub skeleton: Option<Skeleton>,
    pub clips: Vec<AnimationClip>,
    pub warnings: Vec<DecodeWarning>,
}

impl SceneBundle {
    pub fn vertex_count(&self) -> usize {
        self.parts.iter().map(|p| p.mesh.vertex_count()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.mesh.triangle_count()).sum()
    }

    /// Resolve each part's texture hint against `cache`, in part order.
    /// Unresolved hints and untextured parts yield `None`.
    pub fn resolve_textures(&self, cache: &TextureCache) -> Vec<Option<PathBuf>> {
        self.parts
            .iter()
            .map(|part| {
                part.mesh
                    .texture
                    .as_ref()
                    .and_then(|t| cache.resolve(t))
                    .map(Path::to_path_buf)
            })
            .collect()
    }
}

/// Decode any supported container from memory. `part_dir` is where GHS
/// sibling `.pm2` files are looked up; room and lone-part containers never
/// touch it.
pub fn decode_buffer(buf: &[u8], part_dir: &Path) -> Result<SceneBundle> {
    let kind = ContainerKind::sniff(buf)?;
    let mut warnings = Vec::new();

    let bundle = match kind {
        ContainerKind::Ghs => {
            let file = decode_ghs(buf, part_dir, &mut warnings)?;
            let has_skeleton = !file.skeleton.is_empty();
            SceneBundle {
                kind,
                parts: file
                    .parts
                    .into_iter()
                    .map(|part| ScenePart {
                        name: part.name,
                        mesh: part.mesh,
                        placement: None,
                        attach_bone: has_skeleton.then_some(part.bone as usize),
                    })
                    .collect(),
                skeleton: has_skeleton.then_some(file.skeleton),
                clips: file.clips,
                warnings,
            }
        }
        ContainerKind::MapPm2 => {
            let file = decode_map(buf, &mut warnings)?;
            SceneBundle {
                kind,
                parts: file
                    .parts
                    .into_iter()
                    .enumerate()
                    .map(|(index, part)| ScenePart {
                        name: format!("{:03x}", index),
                        mesh: part.mesh,
                        placement: Some(part.placement),
                        attach_bone: None,
                    })
                    .collect(),
                skeleton: None,
                clips: Vec::new(),
                warnings,
            }
        }
        ContainerKind::Pm2 => {
            let mesh = decode_pm2(buf, &mut warnings)?;
            SceneBundle {
                kind,
                parts: vec![ScenePart {
                    name: "000".to_string(),
                    mesh,
                    placement: None,
                    attach_bone: None,
                }],
                skeleton: None,
                clips: Vec::new(),
                warnings,
            }
        }
    };
    Ok(bundle)
}

/// Load and decode a container file. GHS siblings are looked up next to the
/// file; a lone PM2 part takes the file's stem as its name.
pub fn decode_file(path: &Path) -> anyhow::Result<SceneBundle> {
    let buf = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let part_dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut bundle = decode_buffer(&buf, part_dir.unwrap_or_else(|| Path::new(".")))
        .with_context(|| format!("decoding {}", path.display()))?;

    if bundle.kind == ContainerKind::Pm2 {
        if let (Some(stem), Some(part)) = (
            path.file_stem().and_then(|s| s.to_str()),
            bundle.parts.first_mut(),
        ) {
            part.name = stem.to_string();
        }
    }

    info!(
        "decoded {}: {} part(s), {} vertices, {} triangles, {} warning(s)",
        path.display(),
        bundle.parts.len(),
        bundle.vertex_count(),
        bundle.triangle_count(),
        bundle.warnings.len()
    );
    Ok(bundle)
}
