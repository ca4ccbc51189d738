use std::marker::PhantomData;

use bytemuck::Pod;

use crate::{
    backend::{next_multiple_of, Backend},
    Graphics, Result,
};

/// Constant buffer views must be 256-byte aligned in size and placement.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// A persistently mapped upload buffer holding one `T`.
///
/// Writes go straight to memory the GPU reads from. That is only safe because
/// [`Frame::end`](crate::Frame::end) waits for the GPU, so a write made
/// between frames never races a draw.
pub struct ConstantBuffer<T: Pod, B: Backend> {
    buffer: B::Buffer,
    _value: PhantomData<T>,
}

impl<T: Pod, B: Backend> ConstantBuffer<T, B> {
    pub fn new(graphics: &mut Graphics<B>, value: &T) -> Result<Self> {
        let size = next_multiple_of(std::mem::size_of::<T>() as u64, CONSTANT_BUFFER_ALIGNMENT);
        #[allow(clippy::cast_possible_truncation)]
        let buffer = graphics.backend_mut().create_upload_buffer(size as usize)?;

        let mut this = Self {
            buffer,
            _value: PhantomData,
        };
        this.write(graphics, value)?;
        Ok(this)
    }

    pub fn write(&mut self, graphics: &Graphics<B>, value: &T) -> Result<()> {
        graphics
            .backend()
            .write_buffer(&mut self.buffer, 0, bytemuck::bytes_of(value))
    }

    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::headless, material::TransformationMatrix, GraphicsConfig};
    use geometry::Matrix4x4;

    #[test]
    fn sizes_are_aligned() {
        let mut graphics = Graphics::<headless::Headless>::new(
            &GraphicsConfig::default(),
            &headless::surface(32, 32),
        )
        .unwrap();

        let value = TransformationMatrix {
            wvp: Matrix4x4::scale(geometry::Vector3::new(2.0, 2.0, 2.0)),
            world: Matrix4x4::IDENTITY,
        };
        let buffer = ConstantBuffer::new(&mut graphics, &value).unwrap();

        let data = buffer.buffer().data();
        assert_eq!(data.len(), 256);
        assert_eq!(&data[..128], bytemuck::bytes_of(&value));

        let small = ConstantBuffer::new(&mut graphics, &1.0f32).unwrap();
        assert_eq!(small.buffer().data().len(), 256);
    }
}
