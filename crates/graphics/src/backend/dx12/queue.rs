use windows::{
    core::ComInterface,
    w,
    Win32::{
        Foundation::{CloseHandle, HANDLE},
        Graphics::Direct3D12::*,
        System::Threading::{CreateEventW, WaitForSingleObject, INFINITE},
    },
};

use tracing::warn;

use super::device::Interfaces;
use crate::{Error, Result};

/// The direct queue with its single allocator and command list.
pub struct Queue {
    pub queue: ID3D12CommandQueue,
    pub allocator: ID3D12CommandAllocator,
    pub commands: ID3D12GraphicsCommandList,
    recording: bool,
}

impl Queue {
    pub fn new(dx: &Interfaces) -> Result<Self> {
        let queue: ID3D12CommandQueue = unsafe {
            dx.device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                ..Default::default()
            })
        }?;

        let allocator: ID3D12CommandAllocator =
            unsafe { dx.device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }?;

        // Command lists are created open.
        let commands: ID3D12GraphicsCommandList = unsafe {
            dx.device
                .CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &allocator, None)
        }?;

        if dx.is_debug {
            unsafe {
                queue.SetName(w!("Graphics Queue"))?;
                allocator.SetName(w!("Graphics Command Allocator"))?;
            }
        }

        Ok(Self {
            queue,
            allocator,
            commands,
            recording: true,
        })
    }

    pub fn submit(&mut self) -> Result<()> {
        if !self.recording {
            return Err(Error::Backend("the command list is already closed".into()));
        }

        unsafe { self.commands.Close() }?;
        self.recording = false;

        let list: ID3D12CommandList = self.commands.cast()?;
        unsafe { self.queue.ExecuteCommandLists(&[Some(list)]) };
        Ok(())
    }

    /// The caller must ensure that the GPU has finished everything recorded
    /// since the last reset.
    pub fn reset(&mut self) -> Result<()> {
        unsafe {
            self.allocator.Reset()?;
            self.commands.Reset(&self.allocator, None)?;
        }
        self.recording = true;
        Ok(())
    }
}

pub struct Fence {
    fence: ID3D12Fence,
    event: HANDLE,
}

impl Fence {
    pub fn new(dx: &Interfaces) -> Result<Self> {
        let fence: ID3D12Fence = unsafe { dx.device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }?;
        let event = unsafe { CreateEventW(None, false, false, None) }?;

        if dx.is_debug {
            unsafe { fence.SetName(w!("Graphics Fence")) }?;
        }

        Ok(Self { fence, event })
    }

    pub fn signal(&self, queue: &ID3D12CommandQueue, value: u64) -> Result<()> {
        unsafe { queue.Signal(&self.fence, value) }?;
        Ok(())
    }

    pub fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    pub fn wait_for(&self, value: u64) -> Result<()> {
        if self.completed_value() < value {
            unsafe {
                self.fence.SetEventOnCompletion(value, self.event)?;
                WaitForSingleObject(self.event, INFINITE).ok()?;
            }
        }
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseHandle(self.event) }.ok() {
            warn!("failed to close the fence event: {e}");
        }
    }
}
