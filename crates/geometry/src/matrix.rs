use std::ops::{Add, Mul, MulAssign, Sub};

use bytemuck::{Pod, Zeroable};

use crate::{Vector3, Vector4};

/// A row-major 4x4 matrix for row vectors (`v * M`). Translation lives in
/// row 3, and the memory layout is exactly what HLSL expects for a
/// `float4x4` declared `row_major`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Matrix4x4 {
    pub m: [[f32; 4]; 4],
}

impl Default for Matrix4x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix4x4 {
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub const ZERO: Self = Self { m: [[0.0; 4]; 4] };

    #[must_use]
    pub const fn from_rows(m: [[f32; 4]; 4]) -> Self {
        Self { m }
    }

    #[must_use]
    pub fn scale(scale: Vector3) -> Self {
        Self::from_rows([
            [scale.x, 0.0, 0.0, 0.0],
            [0.0, scale.y, 0.0, 0.0],
            [0.0, 0.0, scale.z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    #[must_use]
    pub fn translate(translate: Vector3) -> Self {
        Self::from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [translate.x, translate.y, translate.z, 1.0],
        ])
    }

    #[must_use]
    pub fn rotate_x(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, cos, sin, 0.0],
            [0.0, -sin, cos, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    #[must_use]
    pub fn rotate_y(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::from_rows([
            [cos, 0.0, -sin, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [sin, 0.0, cos, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    #[must_use]
    pub fn rotate_z(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::from_rows([
            [cos, sin, 0.0, 0.0],
            [-sin, cos, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Euler rotation applied X first, then Y, then Z.
    #[must_use]
    pub fn rotate(radians: Vector3) -> Self {
        Self::rotate_x(radians.x) * (Self::rotate_y(radians.y) * Self::rotate_z(radians.z))
    }

    /// `scale * rotate * translate`.
    #[must_use]
    pub fn affine(scale: Vector3, rotate: Vector3, translate: Vector3) -> Self {
        Self::scale(scale) * Self::rotate(rotate) * Self::translate(translate)
    }

    /// Left-handed perspective projection onto a `[0, 1]` depth range.
    ///
    /// `fov_y` is the full vertical field of view in radians.
    #[must_use]
    pub fn perspective_fov(fov_y: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        let y_scale = 1.0 / (fov_y / 2.0).tan();
        let x_scale = y_scale / aspect_ratio;
        let depth = far / (far - near);

        Self::from_rows([
            [x_scale, 0.0, 0.0, 0.0],
            [0.0, y_scale, 0.0, 0.0],
            [0.0, 0.0, depth, 1.0],
            [0.0, 0.0, -near * depth, 0.0],
        ])
    }

    /// Orthographic projection from a screen-space box onto clip space with a
    /// `[0, 1]` depth range. With `top < bottom` (as in window coordinates),
    /// the y axis is flipped so that `top` maps to +1.
    #[must_use]
    pub fn orthographic(left: f32, top: f32, right: f32, bottom: f32, near: f32, far: f32) -> Self {
        Self::from_rows([
            [2.0 / (right - left), 0.0, 0.0, 0.0],
            [0.0, 2.0 / (top - bottom), 0.0, 0.0],
            [0.0, 0.0, 1.0 / (far - near), 0.0],
            [
                (left + right) / (left - right),
                (top + bottom) / (bottom - top),
                near / (near - far),
                1.0,
            ],
        ])
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut out = Self::ZERO;
        for row in 0..4 {
            for col in 0..4 {
                out.m[col][row] = self.m[row][col];
            }
        }
        out
    }

    /// Cofactor of the element at `(row, col)`.
    fn cofactor(&self, row: usize, col: usize) -> f32 {
        let mut minor = [[0.0; 3]; 3];

        for (dst_row, src_row) in (0..4).filter(|r| *r != row).enumerate() {
            for (dst_col, src_col) in (0..4).filter(|c| *c != col).enumerate() {
                minor[dst_row][dst_col] = self.m[src_row][src_col];
            }
        }

        let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
        sign * determinant3x3(minor)
    }

    #[must_use]
    pub fn determinant(&self) -> f32 {
        (0..4).map(|col| self.m[0][col] * self.cofactor(0, col)).sum()
    }

    /// Inverse by cofactor expansion. A singular matrix has no inverse and
    /// yields [`Matrix4x4::ZERO`].
    #[must_use]
    pub fn inverse(&self) -> Self {
        let mut cofactors = Self::ZERO;
        for row in 0..4 {
            for col in 0..4 {
                cofactors.m[row][col] = self.cofactor(row, col);
            }
        }

        let determinant: f32 = (0..4).map(|col| self.m[0][col] * cofactors.m[0][col]).sum();
        if determinant == 0.0 {
            return Self::ZERO;
        }

        // adjugate / determinant
        cofactors.transpose() * (1.0 / determinant)
    }

    #[must_use]
    pub fn transform(&self, v: Vector4) -> Vector4 {
        let m = &self.m;
        Vector4::new(
            v.x * m[0][0] + v.y * m[1][0] + v.z * m[2][0] + v.w * m[3][0],
            v.x * m[0][1] + v.y * m[1][1] + v.z * m[2][1] + v.w * m[3][1],
            v.x * m[0][2] + v.y * m[1][2] + v.z * m[2][2] + v.w * m[3][2],
            v.x * m[0][3] + v.y * m[1][3] + v.z * m[2][3] + v.w * m[3][3],
        )
    }

    /// Transforms a point (w = 1) and performs the perspective divide.
    #[must_use]
    pub fn transform_point(&self, point: Vector3) -> Vector3 {
        let v = self.transform(point.extend(1.0));
        if v.w == 0.0 {
            v.truncate()
        } else {
            v.truncate() / v.w
        }
    }

    /// Transforms a direction (w = 0); translation is ignored.
    #[must_use]
    pub fn transform_normal(&self, normal: Vector3) -> Vector3 {
        self.transform(normal.extend(0.0)).truncate()
    }
}

#[must_use]
pub fn determinant3x3(m: [[f32; 3]; 3]) -> f32 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

impl Add for Matrix4x4 {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        for (lhs, rhs) in self.m.iter_mut().flatten().zip(rhs.m.iter().flatten()) {
            *lhs += rhs;
        }
        self
    }
}

impl Sub for Matrix4x4 {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        for (lhs, rhs) in self.m.iter_mut().flatten().zip(rhs.m.iter().flatten()) {
            *lhs -= rhs;
        }
        self
    }
}

impl Mul for Matrix4x4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut out = Self::ZERO;
        for row in 0..4 {
            for col in 0..4 {
                out.m[row][col] = (0..4).map(|k| self.m[row][k] * rhs.m[k][col]).sum();
            }
        }
        out
    }
}

impl MulAssign for Matrix4x4 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Mul<f32> for Matrix4x4 {
    type Output = Self;

    fn mul(mut self, rhs: f32) -> Self {
        for value in self.m.iter_mut().flatten() {
            *value *= rhs;
        }
        self
    }
}

impl Mul<Matrix4x4> for f32 {
    type Output = Matrix4x4;

    fn mul(self, rhs: Matrix4x4) -> Matrix4x4 {
        rhs * self
    }
}

impl MulAssign<f32> for Matrix4x4 {
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_abs_diff_eq;

    use super::*;

    fn assert_matrix_eq(a: &Matrix4x4, b: &Matrix4x4) {
        for (x, y) in a.m.iter().flatten().zip(b.m.iter().flatten()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-4);
        }
    }

    fn sample_matrices() -> Vec<Matrix4x4> {
        vec![
            Matrix4x4::affine(
                Vector3::new(1.0, 2.0, 0.5),
                Vector3::new(0.3, -1.2, 2.0),
                Vector3::new(4.0, -5.0, 6.0),
            ),
            Matrix4x4::perspective_fov(0.45, 1280.0 / 720.0, 0.1, 100.0),
            Matrix4x4::orthographic(0.0, 0.0, 1280.0, 720.0, 0.0, 100.0),
            Matrix4x4::from_rows([
                [3.2, 0.7, 9.8, 0.0],
                [1.1, -0.2, 1.5, 2.0],
                [0.0, 4.0, 2.5, 6.6],
                [1.0, 1.0, 1.0, 1.0],
            ]),
        ]
    }

    #[test]
    fn identity() {
        for m in sample_matrices() {
            assert_eq!(m * Matrix4x4::IDENTITY, m);
            assert_eq!(Matrix4x4::IDENTITY * m, m);
        }

        let v = Vector4::new(1.0, -2.0, 3.5, 1.0);
        assert_eq!(Matrix4x4::IDENTITY.transform(v), v);
    }

    #[test]
    fn inverse() {
        for m in sample_matrices() {
            assert_matrix_eq(&(m * m.inverse()), &Matrix4x4::IDENTITY);
            assert_matrix_eq(&(m.inverse() * m), &Matrix4x4::IDENTITY);
        }
    }

    #[test]
    fn singular_inverse_is_zero() {
        let singular = Matrix4x4::scale(Vector3::new(1.0, 0.0, 1.0));
        assert_eq!(singular.determinant(), 0.0);
        assert_eq!(singular.inverse(), Matrix4x4::ZERO);
    }

    #[test]
    fn perspective_depth_range() {
        for (near, far) in [(0.1, 100.0), (1.0, 2.0), (0.5, 1000.0)] {
            let m = Matrix4x4::perspective_fov(0.45, 16.0 / 9.0, near, far);

            let at_near = m.transform_point(Vector3::new(0.0, 0.0, near));
            let at_far = m.transform_point(Vector3::new(0.0, 0.0, far));

            assert_abs_diff_eq!(at_near.z, 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(at_far.z, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn orthographic_depth_range() {
        for (near, far) in [(0.1, 100.0), (0.0, 1.0), (-10.0, 10.0)] {
            let m = Matrix4x4::orthographic(0.0, 0.0, 1280.0, 720.0, near, far);

            assert_abs_diff_eq!(
                m.transform_point(Vector3::new(0.0, 0.0, near)).z,
                0.0,
                epsilon = 1e-6
            );
            assert_abs_diff_eq!(
                m.transform_point(Vector3::new(0.0, 0.0, far)).z,
                1.0,
                epsilon = 1e-6
            );
        }

        let m = Matrix4x4::orthographic(0.0, 0.0, 1280.0, 720.0, 0.1, 100.0);
        let top_left = m.transform_point(Vector3::new(0.0, 0.0, 0.1));
        let bottom_right = m.transform_point(Vector3::new(1280.0, 720.0, 0.1));
        assert_abs_diff_eq!(top_left.x, -1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(top_left.y, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(bottom_right.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(bottom_right.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn rotations() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 1.0, 0.0);
        let z = Vector3::new(0.0, 0.0, 1.0);

        let check = |a: Vector3, b: Vector3| {
            assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-6);
            assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-6);
            assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-6);
        };

        check(Matrix4x4::rotate_x(FRAC_PI_2).transform_normal(y), z);
        check(Matrix4x4::rotate_y(FRAC_PI_2).transform_normal(z), x);
        check(Matrix4x4::rotate_z(FRAC_PI_2).transform_normal(x), y);
    }

    #[test]
    fn affine_order() {
        let scale = Vector3::new(2.0, 2.0, 2.0);
        let rotate = Vector3::new(0.0, 0.0, FRAC_PI_2);
        let translate = Vector3::new(10.0, 0.0, 0.0);

        let m = Matrix4x4::affine(scale, rotate, translate);
        // scaled to (2, 0, 0), rotated to (0, 2, 0), then translated
        let p = m.transform_point(Vector3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(p.x, 10.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-5);

        // directions ignore translation
        let n = m.transform_normal(Vector3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(n.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(n.y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn element_wise() {
        let a = Matrix4x4::IDENTITY;
        assert_eq!(a + a, a * 2.0);
        assert_eq!((a + a) - a, a);
        assert_eq!(0.5 * (a + a), a);

        let mut b = Matrix4x4::translate(Vector3::new(1.0, 2.0, 3.0));
        b *= Matrix4x4::translate(Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(b.m[3], [2.0, 3.0, 4.0, 1.0]);
    }
}
