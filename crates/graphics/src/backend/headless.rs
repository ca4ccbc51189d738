//! A backend without a GPU.
//!
//! Every call is recorded in a command log instead of being sent to a device.
//! The simulated GPU only makes progress when it is waited on, so a caller
//! that forgets to wait before reusing the command allocator is caught. Calls
//! made in the wrong order fail the way the debug layer would flag them.

use geometry::Extent;
use raw_window_handle::{RawWindowHandle, WebWindowHandle};
use tracing::debug;

use super::{BackBufferState, Backend, SurfaceTarget, TextureDesc, BACK_BUFFER_COUNT};
use crate::{
    error::init_stage, Color, CpuDescriptor, DescriptorHeapLayout, Error, GpuDescriptor,
    GraphicsConfig, InitStage, PipelineDesc, PixelBuffer, Result, ShaderBytecode,
};

const BUFFER_ADDRESS_BASE: u64 = 0x1_0000_0000;
const DESCRIPTOR_INCREMENT: u32 = 32;

/// A surface target that does not refer to any window.
#[must_use]
pub fn surface(width: u32, height: u32) -> SurfaceTarget {
    SurfaceTarget {
        window: RawWindowHandle::Web(WebWindowHandle::empty()),
        extent: Extent::new(width, height),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Transition {
        index: u32,
        from: BackBufferState,
        to: BackBufferState,
    },
    BindAndClear {
        index: u32,
        color: Color,
        depth: f32,
    },
    Execute,
    Present {
        index: u32,
        sync_interval: u32,
    },
    Signal(u64),
    Wait(u64),
    Reset,
    UploadTexture {
        texture: u32,
        mip_levels: u32,
    },
    CreateView {
        texture: u32,
        at: CpuDescriptor,
    },
    SetPipeline(&'static str),
    SetVertexBuffer {
        buffer: u32,
        stride: u32,
        size: u32,
    },
    SetIndexBuffer {
        buffer: u32,
        size: u32,
    },
    SetConstantBuffer {
        root_index: u32,
        buffer: u32,
    },
    SetDescriptorTable {
        root_index: u32,
        table: GpuDescriptor,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
}

#[derive(Debug)]
pub struct Buffer {
    id: u32,
    address: u64,
    data: Vec<u8>,
}

impl Buffer {
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug)]
pub struct Texture {
    id: u32,
    desc: TextureDesc,
}

impl Texture {
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }
}

#[derive(Debug)]
pub struct Pipeline {
    name: &'static str,
}

impl Pipeline {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

pub struct Headless {
    extent: Extent<u32>,
    srv_heap: DescriptorHeapLayout,

    current_back_buffer: u32,
    back_buffer_states: [BackBufferState; BACK_BUFFER_COUNT as usize],

    recording: bool,
    /// Recorded problems with the open command list. Reported on execute,
    /// like a command list that fails to close.
    list_error: Option<String>,

    signaled: u64,
    completed: u64,
    gpu_lags: bool,

    next_buffer_address: u64,
    next_id: u32,
    commands: Vec<Command>,
}

impl Headless {
    /// Runs initialization, failing at `stage` if one is given.
    pub fn create_failing(
        config: &GraphicsConfig,
        target: &SurfaceTarget,
        fail_at: Option<InitStage>,
    ) -> Result<Self> {
        let run = |stage: InitStage| {
            init_stage(stage, || {
                if fail_at == Some(stage) {
                    Err(Error::Backend(format!("simulated {stage} failure")))
                } else {
                    Ok(())
                }
            })
        };

        if config.is_debug() {
            run(InitStage::DebugLayer)?;
        }
        run(InitStage::Factory)?;
        run(InitStage::Adapter)?;
        run(InitStage::Device)?;
        run(InitStage::Commands)?;
        run(InitStage::Swapchain)?;
        run(InitStage::Heaps)?;
        run(InitStage::SyncObjects)?;

        Ok(Self {
            extent: target.extent,
            srv_heap: DescriptorHeapLayout {
                cpu_start: CpuDescriptor(0x10_0000),
                gpu_start: GpuDescriptor(0x20_0000),
                increment: DESCRIPTOR_INCREMENT,
                capacity: config.max_srv_count,
            },
            current_back_buffer: 0,
            back_buffer_states: [BackBufferState::Present; BACK_BUFFER_COUNT as usize],
            // Command lists are created open.
            recording: true,
            list_error: None,
            signaled: 0,
            completed: 0,
            gpu_lags: true,
            next_buffer_address: BUFFER_ADDRESS_BASE,
            next_id: 0,
            commands: Vec::new(),
        })
    }

    /// When disabled, the simulated GPU finishes work as soon as it is
    /// signaled and waits are never needed.
    pub fn set_gpu_lags(&mut self, lags: bool) {
        self.gpu_lags = lags;
    }

    /// Makes the swapchain report an arbitrary image index.
    pub fn set_current_back_buffer_index(&mut self, index: u32) {
        self.current_back_buffer = index;
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    #[must_use]
    pub fn signaled_value(&self) -> u64 {
        self.signaled
    }

    #[must_use]
    pub fn back_buffer_state(&self, index: u32) -> BackBufferState {
        self.back_buffer_states[index as usize]
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Keeps the first problem found in the open command list.
    fn fail(&mut self, message: impl FnOnce() -> String) {
        if self.list_error.is_none() {
            self.list_error = Some(message());
        }
    }

    /// Appends a command to the open list.
    fn record(&mut self, command: Command) {
        if !self.recording {
            self.fail(|| format!("{command:?} recorded into a closed command list"));
        }
        self.commands.push(command);
    }
}

impl Backend for Headless {
    type Buffer = Buffer;
    type Texture = Texture;
    type Pipeline = Pipeline;

    fn create(config: &GraphicsConfig, target: &SurfaceTarget) -> Result<Self> {
        Self::create_failing(config, target, None)
    }

    fn back_buffer_count(&self) -> u32 {
        BACK_BUFFER_COUNT
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.current_back_buffer
    }

    fn extent(&self) -> Extent<u32> {
        self.extent
    }

    fn srv_heap_layout(&self) -> DescriptorHeapLayout {
        self.srv_heap
    }

    fn transition_back_buffer(&mut self, index: u32, from: BackBufferState, to: BackBufferState) {
        match self.back_buffer_states.get_mut(index as usize) {
            Some(state) if *state == from => *state = to,
            Some(state) => {
                let actual = *state;
                self.fail(|| format!("back buffer {index} is in {actual:?}, not {from:?}"));
            }
            None => self.fail(|| format!("back buffer {index} does not exist")),
        }
        self.record(Command::Transition { index, from, to });
    }

    fn bind_and_clear(&mut self, index: u32, color: Color, depth: f32) {
        if self.back_buffer_states.get(index as usize) != Some(&BackBufferState::RenderTarget) {
            self.fail(|| format!("back buffer {index} is not a render target"));
        }
        self.record(Command::BindAndClear {
            index,
            color,
            depth,
        });
    }

    fn close_and_execute(&mut self) -> Result<()> {
        if !self.recording {
            return Err(Error::Backend("the command list is already closed".into()));
        }
        self.recording = false;

        if let Some(error) = self.list_error.take() {
            return Err(Error::Backend(error));
        }

        self.commands.push(Command::Execute);
        Ok(())
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        let index = self.current_back_buffer;
        if self.back_buffer_states.get(index as usize) != Some(&BackBufferState::Present) {
            return Err(Error::Backend(format!(
                "back buffer {index} presented while not in the present state"
            )));
        }

        self.commands.push(Command::Present {
            index,
            sync_interval,
        });
        self.current_back_buffer = (index + 1) % BACK_BUFFER_COUNT;
        Ok(())
    }

    fn reset_commands(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::Backend(
                "the command allocator was reset while its list is open".into(),
            ));
        }
        if self.completed < self.signaled {
            return Err(Error::Backend(format!(
                "the command allocator was reset while the GPU is busy ({} < {})",
                self.completed, self.signaled
            )));
        }

        self.recording = true;
        self.commands.push(Command::Reset);
        Ok(())
    }

    fn signal(&mut self, value: u64) -> Result<()> {
        if value <= self.signaled {
            return Err(Error::Backend(format!(
                "fence values must increase ({value} <= {})",
                self.signaled
            )));
        }

        self.signaled = value;
        if !self.gpu_lags {
            self.completed = value;
        }
        self.commands.push(Command::Signal(value));
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        self.completed
    }

    fn wait_for(&mut self, value: u64) -> Result<()> {
        if value > self.signaled {
            // A real wait would never return.
            return Err(Error::Backend(format!(
                "waited for fence value {value} which was never signaled"
            )));
        }

        debug!("waiting for fence value {value}");
        self.completed = self.completed.max(value);
        self.commands.push(Command::Wait(value));
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Self::Texture> {
        Ok(Texture {
            id: self.next_id(),
            desc: *desc,
        })
    }

    fn upload_texture(
        &mut self,
        texture: &Self::Texture,
        mips: &[PixelBuffer],
    ) -> Result<Self::Buffer> {
        if mips.len() != texture.desc.mip_levels as usize {
            return Err(Error::Backend(format!(
                "texture has {} mip levels but {} were uploaded",
                texture.desc.mip_levels,
                mips.len()
            )));
        }

        let data: Vec<u8> = mips.iter().flat_map(|mip| mip.bytes().iter().copied()).collect();
        let mut intermediate = self.create_upload_buffer(data.len())?;
        intermediate.data = data;

        self.record(Command::UploadTexture {
            texture: texture.id,
            mip_levels: texture.desc.mip_levels,
        });
        Ok(intermediate)
    }

    fn create_texture_view(&mut self, texture: &Self::Texture, _: &TextureDesc, at: CpuDescriptor) {
        // Views are written straight into the heap, not recorded.
        self.commands.push(Command::CreateView {
            texture: texture.id,
            at,
        });
    }

    fn create_upload_buffer(&mut self, size: usize) -> Result<Self::Buffer> {
        let address = self.next_buffer_address;
        self.next_buffer_address += super::next_multiple_of(size.max(1) as u64, 256);

        Ok(Buffer {
            id: self.next_id(),
            address,
            data: vec![0; size],
        })
    }

    fn write_buffer(&self, buffer: &mut Self::Buffer, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset + data.len();
        let len = buffer.data.len();
        let dst = buffer.data.get_mut(offset..end).ok_or_else(|| {
            Error::Backend(format!("write of {offset}..{end} overflows a {len} byte buffer"))
        })?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn buffer_address(&self, buffer: &Self::Buffer) -> u64 {
        buffer.address
    }

    fn create_pipeline(
        &mut self,
        desc: &PipelineDesc,
        vertex_shader: &ShaderBytecode,
        pixel_shader: &ShaderBytecode,
    ) -> Result<Self::Pipeline> {
        if vertex_shader.is_empty() || pixel_shader.is_empty() {
            return Err(Error::Backend(format!("{}: empty shader bytecode", desc.name)));
        }
        Ok(Pipeline { name: desc.name })
    }

    fn set_pipeline(&mut self, pipeline: &Self::Pipeline) {
        self.record(Command::SetPipeline(pipeline.name));
    }

    fn set_vertex_buffer(&mut self, buffer: &Self::Buffer, stride: u32, size: u32) {
        self.record(Command::SetVertexBuffer {
            buffer: buffer.id,
            stride,
            size,
        });
    }

    fn set_index_buffer(&mut self, buffer: &Self::Buffer, size: u32) {
        self.record(Command::SetIndexBuffer {
            buffer: buffer.id,
            size,
        });
    }

    fn set_constant_buffer(&mut self, root_index: u32, buffer: &Self::Buffer) {
        self.record(Command::SetConstantBuffer {
            root_index,
            buffer: buffer.id,
        });
    }

    fn set_descriptor_table(&mut self, root_index: u32, table: GpuDescriptor) {
        self.record(Command::SetDescriptorTable { root_index, table });
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.record(Command::DrawIndexed {
            index_count,
            instance_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> Headless {
        Headless::create(&GraphicsConfig::default(), &surface(64, 64)).unwrap()
    }

    #[test]
    fn reset_requires_idle_gpu() {
        let mut backend = backend();

        backend.close_and_execute().unwrap();
        backend.signal(1).unwrap();
        assert!(backend.reset_commands().is_err());

        backend.wait_for(1).unwrap();
        backend.reset_commands().unwrap();
        assert!(backend.is_recording());
    }

    #[test]
    fn barrier_states_are_checked() {
        let mut backend = backend();

        backend.transition_back_buffer(
            0,
            BackBufferState::RenderTarget,
            BackBufferState::Present,
        );
        assert!(backend.close_and_execute().is_err());
    }

    #[test]
    fn present_flips_back_buffers() {
        let mut backend = backend();

        for expected in [0, 1, 0, 1] {
            assert_eq!(backend.current_back_buffer_index(), expected);
            backend.present(1).unwrap();
        }
    }

    #[test]
    fn fence_values_increase() {
        let mut backend = backend();
        backend.signal(2).unwrap();
        assert!(backend.signal(2).is_err());
        assert!(backend.wait_for(3).is_err());
        assert_eq!(backend.completed_value(), 0);
    }

    #[test]
    fn buffer_writes_are_bounds_checked() {
        let mut backend = backend();
        let mut buffer = backend.create_upload_buffer(8).unwrap();

        backend.write_buffer(&mut buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.data(), [0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(backend.write_buffer(&mut buffer, 6, &[1, 2, 3]).is_err());

        let other = backend.create_upload_buffer(8).unwrap();
        assert_eq!(backend.buffer_address(&other) % 256, 0);
        assert_ne!(backend.buffer_address(&other), backend.buffer_address(&buffer));
    }
}
