use binrw::binrw;
use cgmath::{Matrix3, Matrix4, Rad, Vector2, Vector3};
use serde::Serialize;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct GhsVector3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

impl GhsVector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        GhsVector3(Vector3::new(x, y, z))
    }

    pub fn zero() -> Self {
        GhsVector3(Vector3::new(0.0, 0.0, 0.0))
    }

    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct GhsVector2(
    #[br(map = |raw: [f32; 2]| Vector2::new(raw[0], raw[1]))]
    #[bw(map = |v: &Vector2<f32>| [v.x, v.y])]
    pub Vector2<f32>,
);

impl GhsVector2 {
    pub fn new(x: f32, y: f32) -> Self {
        GhsVector2(Vector2::new(x, y))
    }

    pub fn to_slice(&self) -> [f32; 2] {
        let v = &self.0;
        [v.x, v.y]
    }

    /// UV with the t axis flipped, matching the importer convention the
    /// game's texture coordinates expect.
    pub fn flipped_t(&self) -> GhsVector2 {
        GhsVector2(Vector2::new(self.0.x, 1.0 - self.0.y))
    }
}

impl Default for GhsVector2 {
    fn default() -> Self {
        Self(Vector2::new(0.0, 0.0))
    }
}

/// Euler rotation in radians with ZXY application order.
///
/// Bone rest poses and animation keys store rotations this way in the source
/// data; the order is a format convention and must not be rebaked.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[br(little)]
pub struct GhsEuler(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

impl GhsEuler {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        GhsEuler(Vector3::new(x, y, z))
    }

    pub fn zero() -> Self {
        GhsEuler(Vector3::new(0.0, 0.0, 0.0))
    }

    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }

    /// Rotation matrix for the ZXY euler, R = Rz * Rx * Ry.
    pub fn to_matrix3(&self) -> Matrix3<f32> {
        Matrix3::from_angle_z(Rad(self.0.z))
            * Matrix3::from_angle_x(Rad(self.0.x))
            * Matrix3::from_angle_y(Rad(self.0.y))
    }
}

/// Local transform composed translation-then-rotation: T * Rz * Rx * Ry.
pub fn compose_transform(translation: &GhsVector3, rotation: &GhsEuler) -> Matrix4<f32> {
    Matrix4::from_translation(translation.0) * Matrix4::from(rotation.to_matrix3())
}
