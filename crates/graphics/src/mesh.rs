use std::f32::consts::{FRAC_PI_2, PI, TAU};

use bytemuck::{Pod, Zeroable};
use geometry::{Vector2, Vector3, Vector4};

use crate::{Backend, Frame, Graphics, Result};

/// The vertex format shared by sprites and meshes. Sprites ignore the normal.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VertexData {
    pub position: Vector4,
    pub texcoord: Vector2,
    pub normal: Vector3,
}

impl VertexData {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;
}

/// Vertices and 32-bit indices of a triangle list, in CPU memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<VertexData>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// A unit quad spanning (0, 0) to (1, 1), facing -z.
    #[must_use]
    pub fn quad() -> Self {
        let normal = Vector3::new(0.0, 0.0, -1.0);
        let vertex = |x: f32, y: f32| VertexData {
            position: Vector4::new(x, y, 0.0, 1.0),
            texcoord: Vector2::new(x, y),
            normal,
        };

        Self {
            vertices: vec![
                vertex(0.0, 1.0),
                vertex(0.0, 0.0),
                vertex(1.0, 1.0),
                vertex(1.0, 0.0),
            ],
            indices: vec![0, 1, 2, 1, 3, 2],
        }
    }

    /// A unit UV sphere with `subdivision` slices in both latitude and
    /// longitude. The seam and the poles have duplicated vertices so every
    /// vertex has a single texture coordinate.
    #[must_use]
    pub fn sphere(subdivision: u32) -> Self {
        let subdivision = subdivision.max(3);
        #[allow(clippy::cast_precision_loss)]
        let (lon_every, lat_every) = (TAU / subdivision as f32, PI / subdivision as f32);

        let mut vertices = Vec::with_capacity(((subdivision + 1) * (subdivision + 1)) as usize);
        for lat_index in 0..=subdivision {
            #[allow(clippy::cast_precision_loss)]
            let lat = -FRAC_PI_2 + lat_every * lat_index as f32;

            for lon_index in 0..=subdivision {
                #[allow(clippy::cast_precision_loss)]
                let lon = lon_every * lon_index as f32;
                let position = Vector3::new(lat.cos() * lon.cos(), lat.sin(), lat.cos() * lon.sin());

                vertices.push(VertexData {
                    position: position.extend(1.0),
                    texcoord: Vector2::new(lon / TAU, 1.0 - (lat + FRAC_PI_2) / PI),
                    normal: position.normalize(),
                });
            }
        }

        let row = subdivision + 1;
        let mut indices = Vec::with_capacity((subdivision * subdivision * 6) as usize);
        for lat_index in 0..subdivision {
            for lon_index in 0..subdivision {
                let bottom_left = lon_index + lat_index * row;
                let top_left = lon_index + (lat_index + 1) * row;
                let bottom_right = bottom_left + 1;
                let top_right = top_left + 1;

                indices.extend([
                    top_right,
                    bottom_left,
                    top_left,
                    bottom_right,
                    bottom_left,
                    top_right,
                ]);
            }
        }

        Self { vertices, indices }
    }
}

/// Vertex and index buffers ready to draw.
pub struct Mesh<B: Backend> {
    vertices: B::Buffer,
    indices: B::Buffer,
    vertex_bytes: u32,
    index_count: u32,
}

impl<B: Backend> Mesh<B> {
    pub fn upload(graphics: &mut Graphics<B>, data: &MeshData) -> Result<Self> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&data.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&data.indices);

        let backend = graphics.backend_mut();
        let mut vertices = backend.create_upload_buffer(vertex_bytes.len())?;
        backend.write_buffer(&mut vertices, 0, vertex_bytes)?;
        let mut indices = backend.create_upload_buffer(index_bytes.len())?;
        backend.write_buffer(&mut indices, 0, index_bytes)?;

        #[allow(clippy::cast_possible_truncation)]
        let (vertex_bytes, index_count) = (vertex_bytes.len() as u32, data.indices.len() as u32);

        Ok(Self {
            vertices,
            indices,
            vertex_bytes,
            index_count,
        })
    }

    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn draw(&self, frame: &mut Frame<B>) {
        frame.set_vertex_buffer(&self.vertices, VertexData::STRIDE, self.vertex_bytes);
        frame.set_index_buffer(&self.indices, self.index_count * 4);
        frame.draw_indexed(self.index_count, 1);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn vertex_layout() {
        assert_eq!(VertexData::STRIDE, 36);
        assert_eq!(VertexData::STRIDE, crate::InputLayout::object_3d().size());
    }

    #[test]
    fn sphere() {
        let sphere = MeshData::sphere(16);
        assert_eq!(sphere.vertices.len(), 17 * 17);
        assert_eq!(sphere.indices.len(), 16 * 16 * 6);
        assert!(sphere.indices.iter().all(|&i| (i as usize) < sphere.vertices.len()));

        for vertex in &sphere.vertices {
            assert_relative_eq!(vertex.normal.length(), 1.0, epsilon = 1e-5);
            assert!((0.0..=1.0).contains(&vertex.texcoord.x));
            assert!((0.0..=1.0).contains(&vertex.texcoord.y));
        }

        // South pole first, north pole last.
        assert_relative_eq!(sphere.vertices[0].position.y, -1.0, epsilon = 1e-6);
        assert_relative_eq!(sphere.vertices[0].texcoord.y, 1.0);
        assert_relative_eq!(sphere.vertices.last().unwrap().position.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn quad() {
        let quad = MeshData::quad();
        assert_eq!(quad.indices, [0, 1, 2, 1, 3, 2]);
        assert_eq!(quad.vertices[3].position, Vector4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(quad.vertices[0].texcoord, Vector2::new(0.0, 1.0));
    }
}
