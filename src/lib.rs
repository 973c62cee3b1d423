//! Decoders for the PS2-era GHS scene formats: PM2 mesh parts, GHS
//! character/prop containers and MAP-PM2 room containers.
//!
//! The usual entry point is [`scene::decode_file`], which sniffs the
//! container kind from the leading bytes and returns a [`scene::SceneBundle`]
//! with the decoded parts, the skeleton and clips where the format carries
//! them, and any recoverable decode warnings. The per-format decoders
//! ([`pm2::decode_pm2`], [`ghs::decode_ghs`], [`mappm2::decode_map`]) are
//! public for callers that already hold bytes.
//!
//! Decoding is strict about structure (bad offsets and signatures are
//! errors) and lenient about data the original game shipped sloppy: weight
//! sums drift, strips restart through duplicated indices, keyframes
//! occasionally go backwards. Lenient corrections are never silent; each one
//! lands in the bundle's warning list.

pub mod anim;
pub mod cursor;
pub mod error;
pub mod ghs;
pub mod mappm2;
pub mod math;
pub mod pm2;
pub mod scene;
pub mod skeleton;
pub mod texture;

pub use error::{DecodeError, DecodeWarning, Result};
pub use scene::{decode_buffer, decode_file, ContainerKind, SceneBundle, ScenePart};
