//! Animation clip, channel and keyframe decoding.
//!
//! Clip headers are 16 bytes: `frame_rate(f32) channel_num(u32)
//! channel_off(u32) reserved(u32)`. Each channel table entry is 16 bytes:
//! ```text
//! target(u8)        0 = bone transform, 1 = shape-key weight
//! interp(u8)        0 = step, 1 = linear, anything else preserved raw
//! pad(u16)
//! target_index(u32)
//! key_num(u32)
//! key_off(u32)      relative to the keyframe blob, not the file
//! ```
//! Bone keys are 28 bytes (`frame u16, pad u16, pos f32×3, rot f32×3`),
//! shape-key keys 8 bytes (`frame u16, pad u16, weight f32`). Frame indices
//! convert to seconds through the clip's frame rate.
//!
//! A channel whose frames fail to strictly increase is dropped with a
//! warning; its siblings still decode.

use binrw::binrw;
use log::warn;

use crate::cursor::Cursor;
use crate::error::{DecodeError, DecodeWarning, Result};
use crate::math::{GhsEuler, GhsVector3};

pub const TARGET_BONE: u8 = 0;
pub const TARGET_SHAPE_KEY: u8 = 1;

pub const INTERP_STEP: u8 = 0;
pub const INTERP_LINEAR: u8 = 1;

#[binrw]
#[derive(Debug, Clone, Copy)]
#[br(little)]
pub struct ClipRecord {
    pub frame_rate: f32,
    pub channel_num: u32,
    pub channel_off: u32,
    pub reserved: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
#[br(little)]
pub struct ChannelRecord {
    pub target: u8,
    pub interp: u8,
    pub pad: u16,
    pub target_index: u32,
    pub key_num: u32,
    pub key_off: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
#[br(little)]
struct TransformKeyRecord {
    frame: u16,
    _pad: u16,
    pos: GhsVector3,
    rot: GhsEuler,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
#[br(little)]
struct WeightKeyRecord {
    frame: u16,
    _pad: u16,
    weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
    /// Unrecognized mode, carried through untouched for downstream tools.
    Other(u8),
}

impl Interpolation {
    pub fn from_raw(raw: u8) -> Interpolation {
        match raw {
            INTERP_STEP => Interpolation::Step,
            INTERP_LINEAR => Interpolation::Linear,
            other => Interpolation::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTarget {
    /// Index into the skeleton's bone table.
    Bone(u32),
    /// Index into the owning part's shape-key list.
    ShapeKey(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformKey {
    pub frame: u16,
    /// Seconds, `frame / frame_rate`.
    pub time: f32,
    pub translation: GhsVector3,
    pub rotation: GhsEuler,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightKey {
    pub frame: u16,
    pub time: f32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelKeys {
    Transform(Vec<TransformKey>),
    Weight(Vec<WeightKey>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTrack {
    pub target: ChannelTarget,
    pub interpolation: Interpolation,
    pub keys: ChannelKeys,
}

impl ChannelTrack {
    pub fn key_count(&self) -> usize {
        match &self.keys {
            ChannelKeys::Transform(keys) => keys.len(),
            ChannelKeys::Weight(keys) => keys.len(),
        }
    }

    pub fn end_time(&self) -> f32 {
        match &self.keys {
            ChannelKeys::Transform(keys) => keys.last().map_or(0.0, |k| k.time),
            ChannelKeys::Weight(keys) => keys.last().map_or(0.0, |k| k.time),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub frame_rate: f32,
    pub channels: Vec<ChannelTrack>,
}

impl AnimationClip {
    /// Clip length in seconds: the latest keyframe across all channels.
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .map(ChannelTrack::end_time)
            .fold(0.0, f32::max)
    }
}

/// Read `clip_num` clip headers at `clip_off` and decode their channels.
/// Keyframe offsets resolve against `blob`, not the container buffer.
pub fn read_clips(
    cur: &mut Cursor,
    clip_off: u32,
    clip_num: usize,
    blob: &[u8],
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Vec<AnimationClip>> {
    cur.seek(clip_off as usize)?;
    let mut records = Vec::with_capacity(clip_num);
    for _ in 0..clip_num {
        records.push(cur.read_record::<ClipRecord>()?);
    }

    let mut clips = Vec::with_capacity(records.len());
    for (clip_index, record) in records.iter().enumerate() {
        if !(record.frame_rate > 0.0 && record.frame_rate.is_finite()) {
            return Err(DecodeError::MalformedContainer {
                offset: clip_off as usize,
                message: format!("clip {} has frame rate {}", clip_index, record.frame_rate),
            });
        }

        if record.channel_off as u64 + record.channel_num as u64 * 16 > cur.len() as u64 {
            return Err(DecodeError::MalformedContainer {
                offset: record.channel_off as usize,
                message: format!("clip {} channel table runs past end of buffer", clip_index),
            });
        }

        cur.seek(record.channel_off as usize)?;
        let mut channel_records = Vec::with_capacity(record.channel_num as usize);
        for _ in 0..record.channel_num {
            channel_records.push(cur.read_record::<ChannelRecord>()?);
        }

        let mut channels = Vec::with_capacity(channel_records.len());
        for (channel_index, channel) in channel_records.iter().enumerate() {
            match decode_channel(channel, channel_index, blob, record.frame_rate) {
                Ok(track) => channels.push(track),
                Err(DecodeError::NonMonotonicKeyframes { frame, .. }) => {
                    warn!(
                        "clip {} channel {}: frame {} does not increase, dropping channel",
                        clip_index, channel_index, frame
                    );
                    warnings.push(DecodeWarning::NonMonotonicKeyframes {
                        clip: clip_index,
                        channel: channel_index,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        clips.push(AnimationClip {
            frame_rate: record.frame_rate,
            channels,
        });
    }
    Ok(clips)
}

fn decode_channel(
    channel: &ChannelRecord,
    channel_index: usize,
    blob: &[u8],
    frame_rate: f32,
) -> Result<ChannelTrack> {
    let (target, record_size) = match channel.target {
        TARGET_BONE => (ChannelTarget::Bone(channel.target_index), 28u64),
        TARGET_SHAPE_KEY => (ChannelTarget::ShapeKey(channel.target_index), 8u64),
        other => {
            return Err(DecodeError::MalformedContainer {
                offset: channel.key_off as usize,
                message: format!("channel {} has unknown target {}", channel_index, other),
            })
        }
    };
    if channel.key_off as u64 + channel.key_num as u64 * record_size > blob.len() as u64 {
        return Err(DecodeError::MalformedContainer {
            offset: channel.key_off as usize,
            message: format!("channel {} keyframes run past end of blob", channel_index),
        });
    }

    let mut keys = Cursor::new(blob);
    keys.seek(channel.key_off as usize)?;

    let mut last_frame: Option<u16> = None;
    let mut check = |frame: u16| -> Result<()> {
        if last_frame.is_some_and(|last| frame <= last) {
            return Err(DecodeError::NonMonotonicKeyframes {
                channel: channel_index,
                frame,
            });
        }
        last_frame = Some(frame);
        Ok(())
    };

    let tracks = match target {
        ChannelTarget::Bone(_) => {
            let mut out = Vec::with_capacity(channel.key_num as usize);
            for _ in 0..channel.key_num {
                let key: TransformKeyRecord = keys.read_record()?;
                check(key.frame)?;
                out.push(TransformKey {
                    frame: key.frame,
                    time: key.frame as f32 / frame_rate,
                    translation: key.pos,
                    rotation: key.rot,
                });
            }
            ChannelKeys::Transform(out)
        }
        ChannelTarget::ShapeKey(_) => {
            let mut out = Vec::with_capacity(channel.key_num as usize);
            for _ in 0..channel.key_num {
                let key: WeightKeyRecord = keys.read_record()?;
                check(key.frame)?;
                out.push(WeightKey {
                    frame: key.frame,
                    time: key.frame as f32 / frame_rate,
                    weight: key.weight,
                });
            }
            ChannelKeys::Weight(out)
        }
    };

    Ok(ChannelTrack {
        target,
        interpolation: Interpolation::from_raw(channel.interp),
        keys: tracks,
    })
}
