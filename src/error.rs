use std::io;

use serde::Serialize;

/// Fatal decode error types.
///
/// Cursor-level and structural errors abort the decode of the current
/// container. Recoverable conditions are reported through [`DecodeWarning`]
/// instead and never abort a decode.
#[derive(Debug)]
pub enum DecodeError {
    /// A read would run past the end of the buffer. The cursor offset is
    /// left unchanged by the failing read.
    OutOfBounds {
        offset: usize,
        requested: usize,
        available: usize,
    },

    /// A seek or slice target lies outside the buffer.
    InvalidOffset { offset: usize, len: usize },

    /// Bad signature or a structural field (count, table offset) that
    /// contradicts the buffer.
    MalformedContainer { offset: usize, message: String },

    /// Unrecognized strip/primitive type in a PM2 index table.
    UnsupportedTopology { prim_type: u32 },

    /// A bone record references a parent at or after its own index.
    CyclicSkeleton { bone: usize, parent: i32 },

    /// Keyframe times within one channel are not strictly increasing.
    /// Fatal to that channel only; clip assembly downgrades it to a warning.
    NonMonotonicKeyframes { channel: usize, frame: u16 },

    /// IO error while loading a container or sibling file
    Io(io::Error),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::OutOfBounds {
                offset,
                requested,
                available,
            } => write!(
                f,
                "out of bounds read at offset {:#x}: {} byte(s) requested, {} available",
                offset, requested, available
            ),
            DecodeError::InvalidOffset { offset, len } => {
                write!(f, "invalid offset {:#x} in buffer of {} bytes", offset, len)
            }
            DecodeError::MalformedContainer { offset, message } => {
                write!(f, "malformed container at offset {:#x}: {}", offset, message)
            }
            DecodeError::UnsupportedTopology { prim_type } => {
                write!(f, "unsupported primitive topology {:#x}", prim_type)
            }
            DecodeError::CyclicSkeleton { bone, parent } => write!(
                f,
                "bone {} references parent {} (parents must be declared first)",
                bone, parent
            ),
            DecodeError::NonMonotonicKeyframes { channel, frame } => write!(
                f,
                "channel {} keyframe times not strictly increasing at frame {}",
                channel, frame
            ),
            DecodeError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        DecodeError::Io(err)
    }
}

/// Recoverable decode conditions, collected alongside the decoded data.
///
/// These record lenient transformations (weight renormalization, degenerate
/// strip suppression) and non-fatal omissions (missing sibling parts, bad
/// animation channels) so callers can surface them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    /// Vertex weights did not sum to 1.0 within tolerance and were
    /// renormalized. Accepted lenience; game data is occasionally imprecise.
    WeightsRenormalized { vertex: usize, sum: f32 },

    /// A vertex carried more bone influences than the fixed maximum; it was
    /// clamped to the highest-weight subset.
    WeightOverflow { vertex: usize, influences: usize },

    /// A referenced sibling part could not be loaded; the part was omitted
    /// from the bundle.
    MissingDependency { part: String, detail: String },

    /// An animation channel had non-monotonic keyframe times and was omitted
    /// from its clip.
    NonMonotonicKeyframes { clip: usize, channel: usize },

    /// Degenerate triangles produced at strip boundaries were suppressed.
    DegenerateStrip { triangles: usize },
}

impl std::fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeWarning::WeightsRenormalized { vertex, sum } => write!(
                f,
                "vertex {} weights summed to {}, renormalized to 1.0",
                vertex, sum
            ),
            DecodeWarning::WeightOverflow { vertex, influences } => write!(
                f,
                "vertex {} has {} bone influences, clamped to the highest-weight {}",
                vertex,
                influences,
                crate::pm2::MAX_BONE_INFLUENCES
            ),
            DecodeWarning::MissingDependency { part, detail } => {
                write!(f, "part '{}' omitted: {}", part, detail)
            }
            DecodeWarning::NonMonotonicKeyframes { clip, channel } => {
                write!(f, "clip {} channel {} omitted: non-monotonic keyframes", clip, channel)
            }
            DecodeWarning::DegenerateStrip { triangles } => {
                write!(f, "suppressed {} degenerate strip triangle(s)", triangles)
            }
        }
    }
}

/// Result type for decode operations
pub type Result<T> = std::result::Result<T, DecodeError>;
