//! Constant buffer layouts. These must match the `cbuffer` declarations in
//! `Object2D.*.hlsl` and `Object3D.*.hlsl` byte for byte.

use bytemuck::{Pod, Zeroable};
use geometry::{Matrix4x4, Vector2, Vector3, Vector4};

use crate::Color;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Material {
    pub color: Vector4,
    /// Nonzero to apply the directional light. Sprites leave this at 0.
    pub enable_lighting: i32,
    // HLSL starts the matrix on a fresh 16-byte register.
    pub padding: [f32; 3],
    pub uv_transform: Matrix4x4,
}

impl Material {
    #[must_use]
    pub fn new(color: Color, enable_lighting: bool) -> Self {
        Self {
            color: Vector4::new(color.r, color.g, color.b, color.a),
            enable_lighting: i32::from(enable_lighting),
            padding: [0.0; 3],
            uv_transform: Matrix4x4::IDENTITY,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TransformationMatrix {
    pub wvp: Matrix4x4,
    pub world: Matrix4x4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DirectionalLight {
    pub color: Vector4,
    /// Unit vector pointing from the light into the scene.
    pub direction: Vector3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vector4::new(1.0, 1.0, 1.0, 1.0),
            direction: Vector3::new(0.0, -1.0, 0.0),
            intensity: 1.0,
        }
    }
}

/// 2D texture coordinate transform: scale, then rotate about z, then
/// translate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvTransform {
    pub scale: Vector2,
    pub rotate: f32,
    pub translate: Vector2,
}

impl Default for UvTransform {
    fn default() -> Self {
        Self {
            scale: Vector2::new(1.0, 1.0),
            rotate: 0.0,
            translate: Vector2::ZERO,
        }
    }
}

impl UvTransform {
    #[must_use]
    pub fn matrix(&self) -> Matrix4x4 {
        Matrix4x4::scale(Vector3::new(self.scale.x, self.scale.y, 1.0))
            * Matrix4x4::rotate_z(self.rotate)
            * Matrix4x4::translate(Vector3::new(self.translate.x, self.translate.y, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use super::*;

    #[test]
    fn layouts() {
        assert_eq!(size_of::<Material>(), 96);
        assert_eq!(size_of::<TransformationMatrix>(), 128);
        assert_eq!(size_of::<DirectionalLight>(), 32);

        let material = Material::new(Color::WHITE, true);
        let bytes = bytemuck::bytes_of(&material);
        assert_eq!(&bytes[16..20], 1i32.to_ne_bytes());
    }

    #[test]
    fn uv_transform() {
        assert_eq!(UvTransform::default().matrix(), Matrix4x4::IDENTITY);

        let uv = UvTransform {
            scale: Vector2::new(2.0, 2.0),
            rotate: 0.0,
            translate: Vector2::new(0.5, 0.0),
        };
        let p = uv.matrix().transform_point(Vector3::new(1.0, 1.0, 0.0));
        assert_eq!(p, Vector3::new(2.5, 2.0, 0.0));
    }
}
