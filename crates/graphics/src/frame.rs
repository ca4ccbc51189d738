use geometry::Extent;
use tracing::{error, info, warn};

use crate::{
    backend::{BackBufferState, Backend, SurfaceTarget},
    Color, DescriptorAllocator, Error, GpuDescriptor, GraphicsConfig, Result,
};

/// The graphics context.
///
/// Owns the backend and the fence counter. All GPU work is submitted through
/// one queue with one command allocator, so the allocator may only be reset
/// once the GPU has caught up with the CPU. [`Frame::end`] enforces this by
/// waiting at the end of every frame.
pub struct Graphics<B: Backend> {
    srv: DescriptorAllocator,
    /// The last value signaled on the queue. Only ever increases.
    fence_value: u64,
    frame_count: u64,
    clear_color: Color,
    sync_interval: u32,
    /// True once the GPU is known to be idle with nothing left to submit.
    drained: bool,
    backend: B,
}

impl<B: Backend> Graphics<B> {
    pub fn new(config: &GraphicsConfig, target: &SurfaceTarget) -> Result<Self> {
        let backend = B::create(config, target)?;
        Self::with_backend(config, backend)
    }

    /// Wraps a backend that has already been initialized.
    pub fn with_backend(config: &GraphicsConfig, backend: B) -> Result<Self> {
        let layout = backend.srv_heap_layout();
        let srv = DescriptorAllocator::new(layout, config.reserved_srv_count)?;

        let extent = backend.extent();
        info!(
            "graphics ready: {}x{}, {} back buffers, {} SRV slots",
            extent.width,
            extent.height,
            backend.back_buffer_count(),
            layout.capacity
        );

        Ok(Self {
            srv,
            fence_value: 0,
            frame_count: 0,
            clear_color: config.clear_color,
            sync_interval: config.sync_interval,
            drained: false,
            backend,
        })
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    #[must_use]
    pub fn srv_allocator(&self) -> &DescriptorAllocator {
        &self.srv
    }

    #[inline]
    pub fn srv_allocator_mut(&mut self) -> &mut DescriptorAllocator {
        &mut self.srv
    }

    #[must_use]
    pub fn extent(&self) -> Extent<u32> {
        self.backend.extent()
    }

    /// The last fence value signaled on the queue.
    #[must_use]
    pub fn fence_value(&self) -> u64 {
        self.fence_value
    }

    #[must_use]
    pub fn completed_fence_value(&self) -> u64 {
        self.backend.completed_value()
    }

    /// Number of frames ended so far. Anything recorded before the count
    /// last changed has finished executing on the GPU.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn begin_frame(&mut self) -> Result<Frame<'_, B>> {
        self.begin_frame_with(self.clear_color)
    }

    /// Starts recording a frame into the current back buffer, cleared to
    /// `clear_color` with depth 1.0.
    pub fn begin_frame_with(&mut self, clear_color: Color) -> Result<Frame<'_, B>> {
        let index = self.backend.current_back_buffer_index();
        let count = self.backend.back_buffer_count();
        if index >= count {
            return Err(Error::Backend(format!(
                "swapchain reported back buffer {index} of {count}"
            )));
        }

        self.backend.transition_back_buffer(
            index,
            BackBufferState::Present,
            BackBufferState::RenderTarget,
        );
        self.backend.bind_and_clear(index, clear_color, 1.0);
        self.drained = false;

        Ok(Frame {
            graphics: self,
            back_buffer: index,
            ended: false,
        })
    }

    fn end_frame(&mut self, back_buffer: u32) -> Result<u64> {
        self.backend.transition_back_buffer(
            back_buffer,
            BackBufferState::RenderTarget,
            BackBufferState::Present,
        );
        self.backend.close_and_execute()?;
        self.backend.present(self.sync_interval)?;

        self.fence_value += 1;
        self.backend.signal(self.fence_value)?;

        if self.backend.completed_value() < self.fence_value {
            self.backend.wait_for(self.fence_value)?;
        }

        self.backend.reset_commands()?;
        self.frame_count += 1;
        Ok(self.fence_value)
    }

    /// Blocks until the GPU has finished all submitted work. Commands
    /// recorded outside a frame are not submitted.
    pub fn wait_gpu(&mut self) -> Result<()> {
        self.fence_value += 1;
        self.backend.signal(self.fence_value)?;
        if self.backend.completed_value() < self.fence_value {
            self.backend.wait_for(self.fence_value)?;
        }
        self.drained = true;
        Ok(())
    }

    /// Waits for the GPU and releases every API object.
    pub fn shutdown(mut self) -> Result<()> {
        self.wait_gpu()?;
        info!("graphics shut down after {} frames", self.frame_count);
        Ok(())
    }
}

impl<B: Backend> Drop for Graphics<B> {
    fn drop(&mut self) {
        if !self.drained {
            if let Err(e) = self.wait_gpu() {
                error!("failed to wait for the GPU before releasing it: {e}");
            }
        }
    }
}

/// A frame being recorded. Obtained from [`Graphics::begin_frame`].
///
/// Dropping a frame without calling [`Frame::end`] still submits and presents
/// it, but any error is only logged.
pub struct Frame<'a, B: Backend> {
    graphics: &'a mut Graphics<B>,
    back_buffer: u32,
    ended: bool,
}

impl<'a, B: Backend> Frame<'a, B> {
    #[must_use]
    pub fn back_buffer_index(&self) -> u32 {
        self.back_buffer
    }

    #[must_use]
    pub fn graphics(&self) -> &Graphics<B> {
        &*self.graphics
    }

    /// For recording commands the frame has no wrapper for.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.graphics.backend
    }

    pub fn set_pipeline(&mut self, pipeline: &B::Pipeline) {
        self.graphics.backend.set_pipeline(pipeline);
    }

    pub fn set_vertex_buffer(&mut self, buffer: &B::Buffer, stride: u32, size: u32) {
        self.graphics.backend.set_vertex_buffer(buffer, stride, size);
    }

    pub fn set_index_buffer(&mut self, buffer: &B::Buffer, size: u32) {
        self.graphics.backend.set_index_buffer(buffer, size);
    }

    pub fn set_constant_buffer(&mut self, root_index: u32, buffer: &B::Buffer) {
        self.graphics.backend.set_constant_buffer(root_index, buffer);
    }

    pub fn set_descriptor_table(&mut self, root_index: u32, table: GpuDescriptor) {
        self.graphics.backend.set_descriptor_table(root_index, table);
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.graphics
            .backend
            .draw_indexed(index_count, instance_count);
    }

    /// Submits the frame, presents it and waits for the GPU to finish it.
    /// Returns the fence value signaled for this frame.
    pub fn end(mut self) -> Result<u64> {
        self.ended = true;
        self.graphics.end_frame(self.back_buffer)
    }
}

impl<'a, B: Backend> Drop for Frame<'a, B> {
    fn drop(&mut self) {
        if !self.ended {
            warn!("frame dropped without being ended");
            if let Err(e) = self.graphics.end_frame(self.back_buffer) {
                error!("failed to end frame: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::headless::{self, Command, Headless},
        InitStage,
    };

    fn graphics() -> Graphics<Headless> {
        Graphics::new(&GraphicsConfig::default(), &headless::surface(1280, 720)).unwrap()
    }

    #[test]
    fn sixty_frames() {
        let mut graphics = graphics();

        for i in 1..=60u64 {
            let frame = graphics.begin_frame().unwrap();
            assert_eq!(u64::from(frame.back_buffer_index()), (i - 1) % 2);

            let signaled = frame.end().unwrap();
            assert_eq!(signaled, i);
            assert!(graphics.completed_fence_value() >= signaled);
            assert!(graphics.backend().is_recording());
        }

        assert_eq!(graphics.fence_value(), 60);
        assert_eq!(graphics.frame_count(), 60);

        graphics.wait_gpu().unwrap();
        assert_eq!(graphics.fence_value(), 61);
        assert_eq!(graphics.completed_fence_value(), 61);
        graphics.shutdown().unwrap();
    }

    #[test]
    fn frame_protocol() {
        let mut graphics = graphics();
        let clear = Color::new(0.1, 0.25, 0.5, 1.0);

        graphics.begin_frame().unwrap().end().unwrap();

        assert_eq!(
            graphics.backend_mut().take_commands(),
            [
                Command::Transition {
                    index: 0,
                    from: BackBufferState::Present,
                    to: BackBufferState::RenderTarget
                },
                Command::BindAndClear {
                    index: 0,
                    color: clear,
                    depth: 1.0
                },
                Command::Transition {
                    index: 0,
                    from: BackBufferState::RenderTarget,
                    to: BackBufferState::Present
                },
                Command::Execute,
                Command::Present {
                    index: 0,
                    sync_interval: 1
                },
                Command::Signal(1),
                Command::Wait(1),
                Command::Reset,
            ]
        );
    }

    #[test]
    fn no_wait_when_gpu_is_ahead() {
        let mut graphics = graphics();
        graphics.backend_mut().set_gpu_lags(false);

        for _ in 0..3 {
            graphics.begin_frame().unwrap().end().unwrap();
        }

        assert_eq!(graphics.fence_value(), 3);
        assert!(!graphics
            .backend()
            .commands()
            .iter()
            .any(|c| matches!(c, Command::Wait(_))));
    }

    #[test]
    fn dropped_frame_is_submitted() {
        let mut graphics = graphics();
        {
            let _frame = graphics.begin_frame().unwrap();
        }

        assert_eq!(graphics.fence_value(), 1);
        assert_eq!(graphics.backend().back_buffer_state(0), BackBufferState::Present);
        graphics.begin_frame().unwrap().end().unwrap();
        assert_eq!(graphics.fence_value(), 2);
    }

    #[test]
    fn bad_back_buffer_index() {
        let mut graphics = graphics();
        graphics.backend_mut().set_current_back_buffer_index(2);

        assert!(graphics.begin_frame().is_err());
        assert_eq!(graphics.fence_value(), 0);
    }

    #[test]
    fn init_failures_name_the_stage() {
        let config = GraphicsConfig {
            debug_mode: Some(true),
            ..GraphicsConfig::default()
        };

        for stage in InitStage::ALL {
            let result = Headless::create_failing(&config, &headless::surface(8, 8), Some(stage));
            match result {
                Err(Error::Init { stage: failed, .. }) => assert_eq!(failed, stage),
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("{stage} did not fail"),
            }
        }
    }

    #[test]
    fn reserved_slots_must_fit() {
        let config = GraphicsConfig {
            max_srv_count: 4,
            reserved_srv_count: 5,
            ..GraphicsConfig::default()
        };
        let result = Graphics::<Headless>::new(&config, &headless::surface(8, 8));
        assert!(matches!(
            result,
            Err(Error::DescriptorHeapExhausted {
                used: 5,
                capacity: 4
            })
        ));
    }
}
