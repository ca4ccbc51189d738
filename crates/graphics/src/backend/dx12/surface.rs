use windows::{
    core::ComInterface,
    w,
    Win32::{
        Foundation::HWND,
        Graphics::{
            Direct3D12::*,
            Dxgi::{Common::*, *},
        },
    },
};

use geometry::Extent;

use super::device::Interfaces;
use crate::{backend::BACK_BUFFER_COUNT, Result};

/// Storage format of the back buffers. Render target views reinterpret them
/// as [`RTV_FORMAT`] so that shader output is gamma encoded on write.
pub const SWAPCHAIN_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;
pub const RTV_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM_SRGB;
pub const DEPTH_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D24_UNORM_S8_UINT;

/// The swapchain and its render target views.
pub struct Surface {
    pub swapchain: IDXGISwapChain4,
    back_buffers: [ID3D12Resource; BACK_BUFFER_COUNT as usize],
    rtv_heap: ID3D12DescriptorHeap,
    rtv_increment: usize,
    extent: Extent<u32>,
}

impl Surface {
    pub fn new(
        dx: &Interfaces,
        queue: &ID3D12CommandQueue,
        window: HWND,
        extent: Extent<u32>,
    ) -> Result<Self> {
        let swapchain: IDXGISwapChain4 = unsafe {
            dx.factory.CreateSwapChainForHwnd(
                queue,
                window,
                &DXGI_SWAP_CHAIN_DESC1 {
                    Width: extent.width,
                    Height: extent.height,
                    Format: SWAPCHAIN_FORMAT,
                    Stereo: false.into(),
                    SampleDesc: DXGI_SAMPLE_DESC {
                        Count: 1,
                        Quality: 0,
                    },
                    BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                    BufferCount: BACK_BUFFER_COUNT,
                    Scaling: DXGI_SCALING_STRETCH,
                    SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
                    AlphaMode: DXGI_ALPHA_MODE_UNSPECIFIED,
                    Flags: 0,
                },
                None,
                None,
            )
        }?
        .cast()?;

        // Disable fullscreen transitions
        unsafe { dx.factory.MakeWindowAssociation(window, DXGI_MWA_NO_ALT_ENTER) }?;

        let rtv_heap: ID3D12DescriptorHeap = unsafe {
            dx.device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                NumDescriptors: BACK_BUFFER_COUNT,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                NodeMask: 0,
            })
        }?;

        let rtv_increment = unsafe {
            dx.device
                .GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV)
        } as usize;

        let back_buffers = [
            unsafe { swapchain.GetBuffer::<ID3D12Resource>(0) }?,
            unsafe { swapchain.GetBuffer::<ID3D12Resource>(1) }?,
        ];

        let rtv_desc = D3D12_RENDER_TARGET_VIEW_DESC {
            Format: RTV_FORMAT,
            ViewDimension: D3D12_RTV_DIMENSION_TEXTURE2D,
            ..Default::default()
        };

        let heap_start = unsafe { rtv_heap.GetCPUDescriptorHandleForHeapStart() };
        for (i, buffer) in back_buffers.iter().enumerate() {
            let handle = D3D12_CPU_DESCRIPTOR_HANDLE {
                ptr: heap_start.ptr + i * rtv_increment,
            };
            unsafe { dx.device.CreateRenderTargetView(buffer, Some(&rtv_desc), handle) };
        }

        if dx.is_debug {
            unsafe {
                back_buffers[0].SetName(w!("Swapchain Buffer 0"))?;
                back_buffers[1].SetName(w!("Swapchain Buffer 1"))?;
            }
        }

        Ok(Self {
            swapchain,
            back_buffers,
            rtv_heap,
            rtv_increment,
            extent,
        })
    }

    pub fn extent(&self) -> Extent<u32> {
        self.extent
    }

    pub fn current_index(&self) -> u32 {
        unsafe { self.swapchain.GetCurrentBackBufferIndex() }
    }

    pub fn back_buffer(&self, index: u32) -> &ID3D12Resource {
        &self.back_buffers[index as usize]
    }

    pub fn rtv(&self, index: u32) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        let start = unsafe { self.rtv_heap.GetCPUDescriptorHandleForHeapStart() };
        D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: start.ptr + index as usize * self.rtv_increment,
        }
    }

    pub fn present(&self, sync_interval: u32) -> Result<()> {
        unsafe { self.swapchain.Present(sync_interval, 0) }.ok()?;
        Ok(())
    }
}

/// A depth buffer the size of the window, with a view in its own heap.
pub struct DepthBuffer {
    _resource: ID3D12Resource,
    dsv_heap: ID3D12DescriptorHeap,
}

impl DepthBuffer {
    pub fn new(dx: &Interfaces, extent: Extent<u32>) -> Result<Self> {
        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            dx.device.CreateCommittedResource(
                &D3D12_HEAP_PROPERTIES {
                    Type: D3D12_HEAP_TYPE_DEFAULT,
                    ..Default::default()
                },
                D3D12_HEAP_FLAG_NONE,
                &D3D12_RESOURCE_DESC {
                    Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
                    Alignment: 0,
                    Width: u64::from(extent.width),
                    Height: extent.height,
                    DepthOrArraySize: 1,
                    MipLevels: 1,
                    Format: DEPTH_FORMAT,
                    SampleDesc: DXGI_SAMPLE_DESC {
                        Count: 1,
                        Quality: 0,
                    },
                    Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
                    Flags: D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
                },
                D3D12_RESOURCE_STATE_DEPTH_WRITE,
                Some(&D3D12_CLEAR_VALUE {
                    Format: DEPTH_FORMAT,
                    Anonymous: D3D12_CLEAR_VALUE_0 {
                        DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                            Depth: 1.0,
                            Stencil: 0,
                        },
                    },
                }),
                &mut resource,
            )
        }?;
        let resource = resource.ok_or_else(|| {
            crate::Error::Backend("CreateCommittedResource returned no depth buffer".into())
        })?;

        let dsv_heap: ID3D12DescriptorHeap = unsafe {
            dx.device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
                NumDescriptors: 1,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                NodeMask: 0,
            })
        }?;

        unsafe {
            dx.device.CreateDepthStencilView(
                &resource,
                Some(&D3D12_DEPTH_STENCIL_VIEW_DESC {
                    Format: DEPTH_FORMAT,
                    ViewDimension: D3D12_DSV_DIMENSION_TEXTURE2D,
                    Flags: D3D12_DSV_FLAG_NONE,
                    ..Default::default()
                }),
                dsv_heap.GetCPUDescriptorHandleForHeapStart(),
            );
        }

        if dx.is_debug {
            unsafe { resource.SetName(w!("Depth Buffer")) }?;
        }

        Ok(Self {
            _resource: resource,
            dsv_heap,
        })
    }

    pub fn dsv(&self) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        unsafe { self.dsv_heap.GetCPUDescriptorHandleForHeapStart() }
    }
}
