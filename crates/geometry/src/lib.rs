//! Geometry primitives shared by the graphics core and the shell.
//!
//! Integer window-space quantities (window sizes, cursor positions) come from
//! `euclid`. Everything that ends up in a constant buffer uses the plain
//! `#[repr(C)]` types in this crate, which follow a row-vector convention:
//! a point is transformed as `v * M`, and matrices compose left to right
//! (`scale * rotate * translate`).

mod matrix;
mod transform;
mod vector;

pub use euclid::default::{Point2D as Point, Size2D as Extent, Vector2D as Offset};

pub use matrix::{determinant3x3, Matrix4x4};
pub use transform::Transform;
pub use vector::{Vector2, Vector3, Vector4};

