//! Texture-offset hints and their resolution against a texture directory.
//!
//! Containers never embed texture payloads, only a `tex_offset` hint. The
//! companion dumps name their textures so the stem ends with the hint's last
//! three lowercase hex digits, which is the only matching rule the format
//! gives us.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

/// Texture reference carried by a mesh part. The offset is an opaque hint
/// into the original texture archive, not a byte offset in the mesh file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRef {
    pub offset: u32,
}

impl TextureRef {
    pub fn new(offset: u32) -> TextureRef {
        TextureRef { offset }
    }

    /// Last three hex digits of the offset, the portion a dump's file stem
    /// is expected to end with.
    pub fn hint(&self) -> String {
        format!("{:03x}", self.offset & 0xFFF)
    }
}

/// Directory scan memoized across decode calls. Built once by the caller and
/// passed explicitly into decoding; there is no process-wide cache.
#[derive(Debug, Clone, Default)]
pub struct TextureCache {
    by_hint: HashMap<String, PathBuf>,
}

impl TextureCache {
    /// Scan `dir` for `.png` files and index them by the last three
    /// characters of their lowercase stem. Later files win on collision,
    /// matching directory iteration being the only order the format defines.
    pub fn scan(dir: &Path) -> io::Result<TextureCache> {
        let mut by_hint = HashMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let stem = stem.to_ascii_lowercase();
            // Cut on a char boundary; stems shorter than three chars (or
            // with multi-byte chars straddling the suffix) cannot match a
            // three-hex-digit hint anyway.
            let Some((cut, _)) = stem.char_indices().rev().nth(2) else {
                continue;
            };
            if !stem[cut..].bytes().all(|b| b.is_ascii_hexdigit()) {
                continue;
            }
            by_hint.insert(stem[cut..].to_string(), path);
        }
        debug!("texture scan indexed {} hint(s)", by_hint.len());
        Ok(TextureCache { by_hint })
    }

    pub fn is_empty(&self) -> bool {
        self.by_hint.is_empty()
    }

    /// Resolve a hint to a texture path. A miss is not an error; untextured
    /// rendering is the normal fallback.
    pub fn resolve(&self, texture: &TextureRef) -> Option<&Path> {
        self.by_hint.get(&texture.hint()).map(PathBuf::as_path)
    }
}
