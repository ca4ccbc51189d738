use crate::{Matrix4x4, Vector3};

/// Scale, Euler rotation (radians) and translation of an object, composed in
/// that order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub scale: Vector3,
    pub rotate: Vector3,
    pub translate: Vector3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: Vector3::ONE,
            rotate: Vector3::ZERO,
            translate: Vector3::ZERO,
        }
    }
}

impl Transform {
    #[must_use]
    pub fn matrix(&self) -> Matrix4x4 {
        Matrix4x4::affine(self.scale, self.rotate, self.translate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        assert_eq!(Transform::default().matrix(), Matrix4x4::IDENTITY);
    }
}
