use windows::{
    w,
    Win32::Graphics::{Direct3D12::*, Dxgi::Common::*},
};

use super::{device::Interfaces, transition_barrier};
use crate::{
    backend::TextureDesc, CpuDescriptor, DescriptorHeapLayout, Error, GpuDescriptor, PixelBuffer,
    PixelFormat, Result,
};

/// A committed buffer on the upload heap, mapped for its whole lifetime.
pub struct Buffer {
    pub(super) resource: ID3D12Resource,
    mapped: *mut u8,
    size: usize,
}

impl Buffer {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn address(&self) -> u64 {
        unsafe { self.resource.GetGPUVirtualAddress() }
    }

    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if offset + data.len() > self.size {
            return Err(Error::Backend(format!(
                "write of {} bytes at {offset} overflows a buffer of {} bytes",
                data.len(),
                self.size
            )));
        }

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped.add(offset), data.len());
        }
        Ok(())
    }
}

pub struct Texture {
    pub(super) resource: ID3D12Resource,
}

pub fn create_upload_buffer(dx: &Interfaces, size: usize) -> Result<Buffer> {
    let mut resource: Option<ID3D12Resource> = None;
    unsafe {
        dx.device.CreateCommittedResource(
            &D3D12_HEAP_PROPERTIES {
                Type: D3D12_HEAP_TYPE_UPLOAD,
                CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
                MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
                CreationNodeMask: 0,
                VisibleNodeMask: 0,
            },
            D3D12_HEAP_FLAG_NONE,
            &D3D12_RESOURCE_DESC {
                Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
                Alignment: 0,
                Width: size as u64,
                Height: 1,
                DepthOrArraySize: 1,
                MipLevels: 1,
                Format: DXGI_FORMAT_UNKNOWN,
                SampleDesc: DXGI_SAMPLE_DESC {
                    Count: 1,
                    Quality: 0,
                },
                Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
                Flags: D3D12_RESOURCE_FLAG_NONE,
            },
            D3D12_RESOURCE_STATE_GENERIC_READ,
            None,
            &mut resource,
        )
    }?;
    let resource =
        resource.ok_or_else(|| Error::Backend("CreateCommittedResource returned no buffer".into()))?;

    let mapped = {
        let mut ptr = std::ptr::null_mut();
        unsafe { resource.Map(0, None, Some(&mut ptr)) }?;
        ptr.cast()
    };

    Ok(Buffer {
        resource,
        mapped,
        size,
    })
}

fn texture_format(format: PixelFormat) -> DXGI_FORMAT {
    // Images are authored in sRGB; sampling through an sRGB format returns
    // linear values to the shader.
    match format {
        PixelFormat::Rgba8 => DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
    }
}

fn texture_resource_desc(desc: &TextureDesc) -> Result<D3D12_RESOURCE_DESC> {
    let mip_levels = u16::try_from(desc.mip_levels)
        .map_err(|_| Error::Backend(format!("too many mip levels: {}", desc.mip_levels)))?;

    Ok(D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
        Alignment: 0,
        Width: u64::from(desc.width),
        Height: desc.height,
        DepthOrArraySize: 1,
        MipLevels: mip_levels,
        Format: texture_format(desc.format),
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
        Flags: D3D12_RESOURCE_FLAG_NONE,
    })
}

pub fn create_texture(dx: &Interfaces, desc: &TextureDesc) -> Result<Texture> {
    let mut resource: Option<ID3D12Resource> = None;
    unsafe {
        dx.device.CreateCommittedResource(
            &D3D12_HEAP_PROPERTIES {
                Type: D3D12_HEAP_TYPE_DEFAULT,
                CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
                MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
                CreationNodeMask: 0,
                VisibleNodeMask: 0,
            },
            D3D12_HEAP_FLAG_NONE,
            &texture_resource_desc(desc)?,
            D3D12_RESOURCE_STATE_COPY_DEST,
            None,
            &mut resource,
        )
    }?;

    let resource =
        resource.ok_or_else(|| Error::Backend("CreateCommittedResource returned no texture".into()))?;
    Ok(Texture { resource })
}

/// Copies every mip into a new upload buffer laid out the way the copy
/// engine expects, then records the copies and the transition to the pixel
/// shader resource state.
pub fn upload_texture(
    dx: &Interfaces,
    commands: &ID3D12GraphicsCommandList,
    texture: &Texture,
    mips: &[PixelBuffer],
) -> Result<Buffer> {
    let desc = unsafe { texture.resource.GetDesc() };
    if mips.len() != usize::from(desc.MipLevels) {
        return Err(Error::Backend(format!(
            "texture has {} mips but {} were provided",
            desc.MipLevels,
            mips.len()
        )));
    }

    let count = mips.len();
    let mut footprints = vec![D3D12_PLACED_SUBRESOURCE_FOOTPRINT::default(); count];
    let mut row_counts = vec![0u32; count];
    let mut row_sizes = vec![0u64; count];
    let mut total_size = 0u64;

    unsafe {
        dx.device.GetCopyableFootprints(
            &desc,
            0,
            count as u32,
            0,
            Some(footprints.as_mut_ptr()),
            Some(row_counts.as_mut_ptr()),
            Some(row_sizes.as_mut_ptr()),
            Some(&mut total_size),
        );
    }

    let mut intermediate = create_upload_buffer(dx, total_size as usize)?;

    for (((mip, footprint), rows), row_size) in
        mips.iter().zip(&footprints).zip(&row_counts).zip(&row_sizes)
    {
        let src_pitch = mip.row_size();
        let dst_pitch = footprint.Footprint.RowPitch as usize;
        let copy_size = (*row_size as usize).min(src_pitch);

        for (row, src) in mip.bytes().chunks_exact(src_pitch).take(*rows as usize).enumerate() {
            let offset = footprint.Offset as usize + row * dst_pitch;
            intermediate.write(offset, &src[..copy_size])?;
        }
    }

    for (index, footprint) in footprints.iter().enumerate() {
        let dst = D3D12_TEXTURE_COPY_LOCATION {
            pResource: unsafe { std::mem::transmute_copy(&texture.resource) },
            Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                SubresourceIndex: index as u32,
            },
        };
        let src = D3D12_TEXTURE_COPY_LOCATION {
            pResource: unsafe { std::mem::transmute_copy(&intermediate.resource) },
            Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                PlacedFootprint: *footprint,
            },
        };

        unsafe { commands.CopyTextureRegion(&dst, 0, 0, 0, &src, None) };
    }

    let barrier = transition_barrier(
        &texture.resource,
        D3D12_RESOURCE_STATE_COPY_DEST,
        D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
    );
    unsafe { commands.ResourceBarrier(&[barrier]) };

    Ok(intermediate)
}

pub fn create_texture_view(
    dx: &Interfaces,
    texture: &Texture,
    desc: &TextureDesc,
    at: CpuDescriptor,
) {
    let view = D3D12_SHADER_RESOURCE_VIEW_DESC {
        Format: texture_format(desc.format),
        ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
        Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
        Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
            Texture2D: D3D12_TEX2D_SRV {
                MostDetailedMip: 0,
                MipLevels: desc.mip_levels,
                PlaneSlice: 0,
                ResourceMinLODClamp: 0.0,
            },
        },
    };

    unsafe {
        dx.device.CreateShaderResourceView(
            &texture.resource,
            Some(&view),
            D3D12_CPU_DESCRIPTOR_HANDLE { ptr: at.0 },
        );
    }
}

/// The shader-visible heap that texture views are written into.
pub struct SrvHeap {
    pub heap: ID3D12DescriptorHeap,
    layout: DescriptorHeapLayout,
}

impl SrvHeap {
    pub fn new(dx: &Interfaces, capacity: u32) -> Result<Self> {
        let heap: ID3D12DescriptorHeap = unsafe {
            dx.device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
                NumDescriptors: capacity,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
                NodeMask: 0,
            })
        }?;

        if dx.is_debug {
            unsafe { heap.SetName(w!("SRV Heap")) }?;
        }

        let layout = unsafe {
            DescriptorHeapLayout {
                cpu_start: CpuDescriptor(heap.GetCPUDescriptorHandleForHeapStart().ptr),
                gpu_start: GpuDescriptor(heap.GetGPUDescriptorHandleForHeapStart().ptr),
                increment: dx
                    .device
                    .GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV),
                capacity,
            }
        };

        Ok(Self { heap, layout })
    }

    pub fn layout(&self) -> DescriptorHeapLayout {
        self.layout
    }
}

