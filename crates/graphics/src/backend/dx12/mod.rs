//! The D3D12 backend.
//!
//! One direct queue, one command allocator and one command list. The list is
//! open between resets, so resource uploads recorded outside of a frame ride
//! along with the next one.

mod device;
mod dxc;
mod pipeline;
mod queue;
mod resources;
mod surface;

use geometry::Extent;
use raw_window_handle::RawWindowHandle;
use windows::Win32::{
    Foundation::{HWND, RECT},
    Graphics::{Direct3D::D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST, Direct3D12::*, Dxgi::Common::*},
};

use self::{
    device::Interfaces,
    queue::{Fence, Queue},
    resources::SrvHeap,
    surface::{DepthBuffer, Surface},
};
use super::{BackBufferState, Backend, SurfaceTarget, TextureDesc};
use crate::{
    adapter::FeatureLevel,
    error::init_stage, Color, CpuDescriptor, DescriptorHeapLayout, Error, GpuDescriptor,
    GraphicsConfig, InitStage, PipelineDesc, PixelBuffer, Result, ShaderBytecode,
};

pub use self::{
    dxc::Dxc,
    pipeline::Pipeline,
    resources::{Buffer, Texture},
};

// Fields drop in declaration order; the device goes last.
pub struct Dx12 {
    surface: Surface,
    depth: DepthBuffer,
    srv_heap: SrvHeap,
    fence: Fence,
    queue: Queue,
    dx: Interfaces,
}

impl Dx12 {
    /// For libraries that record into the frame directly, such as a debug
    /// UI renderer.
    pub fn device(&self) -> &ID3D12Device {
        &self.dx.device
    }

    pub fn command_list(&self) -> &ID3D12GraphicsCommandList {
        &self.queue.commands
    }

    pub fn srv_heap(&self) -> &ID3D12DescriptorHeap {
        &self.srv_heap.heap
    }

    #[must_use]
    pub fn feature_level(&self) -> FeatureLevel {
        self.dx.feature_level
    }

    #[must_use]
    pub fn render_target_format(&self) -> DXGI_FORMAT {
        surface::RTV_FORMAT
    }

    #[must_use]
    pub fn depth_stencil_format(&self) -> DXGI_FORMAT {
        surface::DEPTH_FORMAT
    }
}

impl Backend for Dx12 {
    type Buffer = Buffer;
    type Texture = Texture;
    type Pipeline = Pipeline;

    fn create(config: &GraphicsConfig, target: &SurfaceTarget) -> Result<Self> {
        let dx = Interfaces::new(config)?;

        let queue = init_stage(InitStage::Commands, || Queue::new(&dx))?;

        let surface = init_stage(InitStage::Swapchain, || {
            let window = match target.window {
                RawWindowHandle::Win32(handle) => HWND(handle.hwnd as isize),
                _ => return Err(Error::Unsupported("non-Win32 windows")),
            };
            Surface::new(&dx, &queue.queue, window, target.extent)
        })?;

        let (srv_heap, depth) = init_stage(InitStage::Heaps, || {
            Ok((
                SrvHeap::new(&dx, config.max_srv_count)?,
                DepthBuffer::new(&dx, target.extent)?,
            ))
        })?;

        let fence = init_stage(InitStage::SyncObjects, || Fence::new(&dx))?;

        Ok(Self {
            surface,
            depth,
            srv_heap,
            fence,
            queue,
            dx,
        })
    }

    fn back_buffer_count(&self) -> u32 {
        super::BACK_BUFFER_COUNT
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.surface.current_index()
    }

    fn extent(&self) -> Extent<u32> {
        self.surface.extent()
    }

    fn srv_heap_layout(&self) -> DescriptorHeapLayout {
        self.srv_heap.layout()
    }

    fn transition_back_buffer(&mut self, index: u32, from: BackBufferState, to: BackBufferState) {
        let barrier = transition_barrier(
            self.surface.back_buffer(index),
            resource_state(from),
            resource_state(to),
        );
        unsafe { self.queue.commands.ResourceBarrier(&[barrier]) };
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn bind_and_clear(&mut self, index: u32, color: Color, depth: f32) {
        let rtv = self.surface.rtv(index);
        let dsv = self.depth.dsv();
        let extent = self.surface.extent();
        let commands = &self.queue.commands;

        unsafe {
            commands.OMSetRenderTargets(1, Some(&rtv), false, Some(&dsv));
            commands.ClearRenderTargetView(rtv, color.to_array().as_ptr(), &[]);
            commands.ClearDepthStencilView(dsv, D3D12_CLEAR_FLAG_DEPTH, depth, 0, &[]);

            commands.RSSetViewports(&[D3D12_VIEWPORT {
                TopLeftX: 0.0,
                TopLeftY: 0.0,
                Width: extent.width as f32,
                Height: extent.height as f32,
                MinDepth: 0.0,
                MaxDepth: 1.0,
            }]);
            commands.RSSetScissorRects(&[RECT {
                left: 0,
                top: 0,
                right: extent.width as i32,
                bottom: extent.height as i32,
            }]);

            commands.SetDescriptorHeaps(&[Some(self.srv_heap.heap.clone())]);
        }
    }

    fn close_and_execute(&mut self) -> Result<()> {
        self.queue.submit()
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        self.surface.present(sync_interval)
    }

    fn reset_commands(&mut self) -> Result<()> {
        self.queue.reset()
    }

    fn signal(&mut self, value: u64) -> Result<()> {
        self.fence.signal(&self.queue.queue, value)
    }

    fn completed_value(&self) -> u64 {
        self.fence.completed_value()
    }

    fn wait_for(&mut self, value: u64) -> Result<()> {
        self.fence.wait_for(value)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture> {
        resources::create_texture(&self.dx, desc)
    }

    fn upload_texture(
        &mut self,
        texture: &Self::Texture,
        mips: &[PixelBuffer],
    ) -> Result<Self::Buffer> {
        resources::upload_texture(&self.dx, &self.queue.commands, texture, mips)
    }

    fn create_texture_view(&mut self, texture: &Self::Texture, desc: &TextureDesc, at: CpuDescriptor) {
        resources::create_texture_view(&self.dx, texture, desc, at);
    }

    fn create_upload_buffer(&mut self, size: usize) -> Result<Self::Buffer> {
        resources::create_upload_buffer(&self.dx, size)
    }

    fn write_buffer(&self, buffer: &mut Self::Buffer, offset: usize, data: &[u8]) -> Result<()> {
        buffer.write(offset, data)
    }

    fn buffer_address(&self, buffer: &Self::Buffer) -> u64 {
        buffer.address()
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
        vertex_shader: &ShaderBytecode,
        pixel_shader: &ShaderBytecode,
    ) -> Result<Self::Pipeline> {
        pipeline::create(&self.dx, desc, vertex_shader, pixel_shader)
    }

    fn set_pipeline(&mut self, pipeline: &Self::Pipeline) {
        let commands = &self.queue.commands;
        unsafe {
            commands.SetGraphicsRootSignature(&pipeline.root_signature);
            commands.SetPipelineState(&pipeline.state);
            commands.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
        }
    }

    fn set_vertex_buffer(&mut self, buffer: &Self::Buffer, stride: u32, size: u32) {
        let view = D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: buffer.address(),
            SizeInBytes: size,
            StrideInBytes: stride,
        };
        unsafe { self.queue.commands.IASetVertexBuffers(0, Some(&[view])) };
    }

    fn set_index_buffer(&mut self, buffer: &Self::Buffer, size: u32) {
        let view = D3D12_INDEX_BUFFER_VIEW {
            BufferLocation: buffer.address(),
            SizeInBytes: size,
            Format: DXGI_FORMAT_R32_UINT,
        };
        unsafe { self.queue.commands.IASetIndexBuffer(Some(&view)) };
    }

    fn set_constant_buffer(&mut self, root_index: u32, buffer: &Self::Buffer) {
        unsafe {
            self.queue
                .commands
                .SetGraphicsRootConstantBufferView(root_index, buffer.address());
        }
    }

    fn set_descriptor_table(&mut self, root_index: u32, table: GpuDescriptor) {
        unsafe {
            self.queue.commands.SetGraphicsRootDescriptorTable(
                root_index,
                D3D12_GPU_DESCRIPTOR_HANDLE { ptr: table.0 },
            );
        }
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        unsafe {
            self.queue
                .commands
                .DrawIndexedInstanced(index_count, instance_count, 0, 0, 0);
        }
    }
}

fn resource_state(state: BackBufferState) -> D3D12_RESOURCE_STATES {
    match state {
        BackBufferState::Present => D3D12_RESOURCE_STATE_PRESENT,
        BackBufferState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
    }
}

fn transition_barrier(
    resource: &ID3D12Resource,
    state_before: D3D12_RESOURCE_STATES,
    state_after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: std::mem::ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                StateBefore: state_before,
                StateAfter: state_after,
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
            }),
        },
    }
}
