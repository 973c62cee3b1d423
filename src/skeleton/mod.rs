//! Skeleton table decoding and hierarchy building.
//!
//! Bone records are 28 bytes each:
//! ```text
//! parent(i32)  -1 = root, otherwise an earlier bone's index
//! pos(f32×3)   rest-pose translation, parent-relative
//! rot(f32×3)   rest-pose euler radians, ZXY application order
//! ```
//!
//! The canonical form is a flat `Vec<Bone>` in file order. Parents always
//! precede children, which the reader enforces, so a single forward pass
//! composes world transforms.

use binrw::binrw;
use cgmath::Matrix4;

use crate::cursor::Cursor;
use crate::error::{DecodeError, Result};
use crate::math::{compose_transform, GhsEuler, GhsVector3};

pub const NO_PARENT: i32 = -1;

#[binrw]
#[derive(Debug, Clone, Copy)]
#[br(little)]
pub struct BoneRecord {
    pub parent: i32,
    pub pos: GhsVector3,
    pub rot: GhsEuler,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bone {
    pub parent: Option<usize>,
    pub translation: GhsVector3,
    pub rotation: GhsEuler,
}

impl Bone {
    /// Parent-relative rest-pose transform (translation, then ZXY rotation).
    pub fn local_transform(&self) -> Matrix4<f32> {
        compose_transform(&self.translation, &self.rotation)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
    children: Vec<Vec<usize>>,
}

impl Skeleton {
    /// Read `count` bone records at `off` and build the hierarchy.
    pub fn read(cur: &mut Cursor, off: u32, count: usize) -> Result<Skeleton> {
        cur.seek(off as usize)?;
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(cur.read_record::<BoneRecord>()?);
        }
        Skeleton::from_records(&records)
    }

    /// Validate parent ordering and build the parent→children adjacency.
    /// Any parent reference that is not `-1` or a strictly earlier index
    /// would admit a cycle and is rejected.
    pub fn from_records(records: &[BoneRecord]) -> Result<Skeleton> {
        let mut bones = Vec::with_capacity(records.len());
        let mut children = vec![Vec::new(); records.len()];

        for (index, record) in records.iter().enumerate() {
            let parent = if record.parent == NO_PARENT {
                None
            } else if record.parent >= 0 && (record.parent as usize) < index {
                let parent = record.parent as usize;
                children[parent].push(index);
                Some(parent)
            } else {
                return Err(DecodeError::CyclicSkeleton {
                    bone: index,
                    parent: record.parent,
                });
            };
            bones.push(Bone {
                parent,
                translation: record.pos,
                rotation: record.rot,
            });
        }
        Ok(Skeleton { bones, children })
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn children(&self, bone: usize) -> &[usize] {
        &self.children[bone]
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent.is_none())
            .map(|(i, _)| i)
    }

    /// World-space rest-pose transforms, file order. Parent ordering makes a
    /// single forward pass sufficient.
    pub fn world_transforms(&self) -> Vec<Matrix4<f32>> {
        let mut world: Vec<Matrix4<f32>> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let local = bone.local_transform();
            let transform = match bone.parent {
                Some(parent) => world[parent] * local,
                None => local,
            };
            world.push(transform);
        }
        world
    }
}
