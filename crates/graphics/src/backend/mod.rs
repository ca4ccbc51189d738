//! The seam between the frame protocol and the graphics API.
//!
//! A backend owns every API object: device, queue, the single command
//! allocator and list, swapchain, descriptor heaps and fence. It exposes them
//! as small imperative steps; [`Graphics`](crate::Graphics) decides the order
//! those steps run in and owns the fence counter.

use geometry::Extent;
use raw_window_handle::RawWindowHandle;

use crate::{
    Color, CpuDescriptor, DescriptorHeapLayout, GpuDescriptor, GraphicsConfig, PipelineDesc,
    PixelBuffer, PixelFormat, Result, ShaderBytecode,
};

#[cfg(target_os = "windows")]
pub mod dx12;
pub mod headless;

/// Number of swapchain images.
pub const BACK_BUFFER_COUNT: u32 = 2;

/// The window to present to.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceTarget {
    pub window: RawWindowHandle,
    /// Client area in physical pixels.
    pub extent: Extent<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackBufferState {
    Present,
    RenderTarget,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: PixelFormat,
}

pub trait Backend: Sized {
    type Buffer;
    type Texture;
    type Pipeline;

    /// Runs the full initialization sequence. Each stage is logged and a
    /// failure is reported as [`Error::Init`](crate::Error::Init).
    fn create(config: &GraphicsConfig, target: &SurfaceTarget) -> Result<Self>;

    fn back_buffer_count(&self) -> u32;

    /// Queried from the swapchain, never derived from a frame counter.
    fn current_back_buffer_index(&self) -> u32;

    fn extent(&self) -> Extent<u32>;

    fn srv_heap_layout(&self) -> DescriptorHeapLayout;

    // ---- per-frame commands ----

    fn transition_back_buffer(&mut self, index: u32, from: BackBufferState, to: BackBufferState);

    /// Binds the back buffer and depth buffer, clears both, and sets the
    /// viewport, scissor rectangle and SRV heap.
    fn bind_and_clear(&mut self, index: u32, color: Color, depth: f32);

    fn close_and_execute(&mut self) -> Result<()>;

    fn present(&mut self, sync_interval: u32) -> Result<()>;

    /// Resets the command allocator and reopens the command list. Only valid
    /// once the GPU has finished with everything recorded since the last
    /// reset.
    fn reset_commands(&mut self) -> Result<()>;

    // ---- fence ----

    fn signal(&mut self, value: u64) -> Result<()>;

    fn completed_value(&self) -> u64;

    /// Blocks until the fence reaches `value`. There is no timeout.
    fn wait_for(&mut self, value: u64) -> Result<()>;

    // ---- resources ----

    /// Creates a GPU-resident texture in the copy destination state.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture>;

    /// Records a copy of every mip level through a new upload buffer, then a
    /// transition to the shader resource state. The returned upload buffer
    /// must outlive the GPU copy.
    fn upload_texture(
        &mut self,
        texture: &Self::Texture,
        mips: &[PixelBuffer],
    ) -> Result<Self::Buffer>;

    fn create_texture_view(&mut self, texture: &Self::Texture, desc: &TextureDesc, at: CpuDescriptor);

    /// Creates a persistently mapped, CPU-writable buffer.
    fn create_upload_buffer(&mut self, size: usize) -> Result<Self::Buffer>;

    fn write_buffer(&self, buffer: &mut Self::Buffer, offset: usize, data: &[u8]) -> Result<()>;

    fn buffer_address(&self, buffer: &Self::Buffer) -> u64;

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
        vertex_shader: &ShaderBytecode,
        pixel_shader: &ShaderBytecode,
    ) -> Result<Self::Pipeline>;

    // ---- draw commands ----

    fn set_pipeline(&mut self, pipeline: &Self::Pipeline);

    fn set_vertex_buffer(&mut self, buffer: &Self::Buffer, stride: u32, size: u32);

    /// Indices are 32-bit.
    fn set_index_buffer(&mut self, buffer: &Self::Buffer, size: u32);

    fn set_constant_buffer(&mut self, root_index: u32, buffer: &Self::Buffer);

    fn set_descriptor_table(&mut self, root_index: u32, table: GpuDescriptor);

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32);
}

/// Rounds `value` up to the next multiple of `multiple`.
#[must_use]
pub(crate) fn next_multiple_of(value: u64, multiple: u64) -> u64 {
    match value % multiple {
        0 => value,
        r => value + (multiple - r),
    }
}
