//! Translation of [`PipelineDesc`] into D3D12 root signatures and pipeline
//! state objects.

use std::ffi::CString;

use windows::{
    core::PCSTR,
    Win32::Graphics::{
        Direct3D::ID3DBlob,
        Direct3D12::*,
        Dxgi::Common::*,
    },
};

use super::{
    device::Interfaces,
    surface::{DEPTH_FORMAT, RTV_FORMAT},
};
use crate::{
    BlendMode, CullMode, DepthFormat, Error, InputLayout, PipelineDesc, RenderTargetFormat,
    Result, RootParameter, RootSignatureDesc, ShaderBytecode, ShaderVisibility, VertexFormat,
};

pub struct Pipeline {
    pub(super) name: &'static str,
    pub(super) root_signature: ID3D12RootSignature,
    pub(super) state: ID3D12PipelineState,
}

impl Pipeline {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

pub fn create(
    dx: &Interfaces,
    desc: &PipelineDesc,
    vs: &ShaderBytecode,
    ps: &ShaderBytecode,
) -> Result<Pipeline> {
    if vs.is_empty() || ps.is_empty() {
        return Err(Error::Backend(format!("{}: empty shader bytecode", desc.name)));
    }

    let root_signature = create_root_signature(dx, &desc.root_signature)?;

    // The element descriptions point into these, so they must outlive
    // CreateGraphicsPipelineState.
    let semantics = semantic_names(&desc.input_layout)?;
    let input_elements = input_elements(&desc.input_layout, &semantics);

    let mut blend_targets = [D3D12_RENDER_TARGET_BLEND_DESC::default(); 8];
    blend_targets[0] = blend_target(desc.blend);

    let mut render_target_formats = [DXGI_FORMAT_UNKNOWN; 8];
    render_target_formats[0] = match desc.render_target_format {
        RenderTargetFormat::Rgba8Srgb => RTV_FORMAT,
    };

    let info = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
        pRootSignature: unsafe { std::mem::transmute_copy(&root_signature) },
        VS: bytecode(vs),
        PS: bytecode(ps),
        BlendState: D3D12_BLEND_DESC {
            AlphaToCoverageEnable: false.into(),
            IndependentBlendEnable: false.into(),
            RenderTarget: blend_targets,
        },
        SampleMask: u32::MAX,
        RasterizerState: D3D12_RASTERIZER_DESC {
            FillMode: D3D12_FILL_MODE_SOLID,
            CullMode: match desc.cull {
                CullMode::None => D3D12_CULL_MODE_NONE,
                CullMode::Back => D3D12_CULL_MODE_BACK,
            },
            FrontCounterClockwise: false.into(),
            DepthBias: 0,
            DepthBiasClamp: 0.0,
            SlopeScaledDepthBias: 0.0,
            DepthClipEnable: true.into(),
            MultisampleEnable: false.into(),
            AntialiasedLineEnable: false.into(),
            ForcedSampleCount: 0,
            ConservativeRaster: D3D12_CONSERVATIVE_RASTERIZATION_MODE_OFF,
        },
        DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: desc.depth.enabled.into(),
            DepthWriteMask: if desc.depth.write {
                D3D12_DEPTH_WRITE_MASK_ALL
            } else {
                D3D12_DEPTH_WRITE_MASK_ZERO
            },
            DepthFunc: D3D12_COMPARISON_FUNC_LESS_EQUAL,
            StencilEnable: false.into(),
            ..Default::default()
        },
        InputLayout: D3D12_INPUT_LAYOUT_DESC {
            pInputElementDescs: input_elements.as_ptr(),
            NumElements: input_elements.len() as u32,
        },
        PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
        NumRenderTargets: 1,
        RTVFormats: render_target_formats,
        DSVFormat: match desc.depth_format {
            DepthFormat::D24UnormS8Uint => DEPTH_FORMAT,
        },
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        NodeMask: 0,
        Flags: D3D12_PIPELINE_STATE_FLAG_NONE,
        ..Default::default()
    };

    let state: ID3D12PipelineState = unsafe { dx.device.CreateGraphicsPipelineState(&info) }?;

    Ok(Pipeline {
        name: desc.name,
        root_signature,
        state,
    })
}

fn create_root_signature(dx: &Interfaces, desc: &RootSignatureDesc) -> Result<ID3D12RootSignature> {
    // Each table parameter points at its own slice of ranges.
    let ranges: Vec<Vec<D3D12_DESCRIPTOR_RANGE>> = desc
        .parameters
        .iter()
        .map(|parameter| match parameter {
            RootParameter::ConstantBuffer { .. } => Vec::new(),
            RootParameter::DescriptorTable { ranges, .. } => ranges
                .iter()
                .map(|range| D3D12_DESCRIPTOR_RANGE {
                    RangeType: D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
                    NumDescriptors: range.count,
                    BaseShaderRegister: range.base_register,
                    RegisterSpace: 0,
                    OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
                })
                .collect(),
        })
        .collect();

    let parameters: Vec<D3D12_ROOT_PARAMETER> = desc
        .parameters
        .iter()
        .zip(&ranges)
        .map(|(parameter, ranges)| match parameter {
            RootParameter::ConstantBuffer {
                register,
                visibility,
            } => D3D12_ROOT_PARAMETER {
                ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
                Anonymous: D3D12_ROOT_PARAMETER_0 {
                    Descriptor: D3D12_ROOT_DESCRIPTOR {
                        ShaderRegister: *register,
                        RegisterSpace: 0,
                    },
                },
                ShaderVisibility: shader_visibility(*visibility),
            },
            RootParameter::DescriptorTable { visibility, .. } => D3D12_ROOT_PARAMETER {
                ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
                Anonymous: D3D12_ROOT_PARAMETER_0 {
                    DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                        NumDescriptorRanges: ranges.len() as u32,
                        pDescriptorRanges: ranges.as_ptr(),
                    },
                },
                ShaderVisibility: shader_visibility(*visibility),
            },
        })
        .collect();

    let samplers: Vec<D3D12_STATIC_SAMPLER_DESC> = desc
        .samplers
        .iter()
        .map(|sampler| D3D12_STATIC_SAMPLER_DESC {
            Filter: D3D12_FILTER_MIN_MAG_MIP_LINEAR,
            AddressU: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
            AddressV: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
            AddressW: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
            MipLODBias: 0.0,
            MaxAnisotropy: 0,
            ComparisonFunc: D3D12_COMPARISON_FUNC_NEVER,
            BorderColor: D3D12_STATIC_BORDER_COLOR_TRANSPARENT_BLACK,
            MinLOD: 0.0,
            MaxLOD: sampler.max_lod,
            ShaderRegister: sampler.register,
            RegisterSpace: 0,
            ShaderVisibility: shader_visibility(sampler.visibility),
        })
        .collect();

    let flags = if desc.allow_input_layout {
        D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT
    } else {
        D3D12_ROOT_SIGNATURE_FLAG_NONE
    };

    let root_desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: parameters.len() as u32,
        pParameters: parameters.as_ptr(),
        NumStaticSamplers: samplers.len() as u32,
        pStaticSamplers: samplers.as_ptr(),
        Flags: flags,
    };

    let mut blob: Option<ID3DBlob> = None;
    let mut error: Option<ID3DBlob> = None;
    let serialized = unsafe {
        D3D12SerializeRootSignature(
            &root_desc,
            D3D_ROOT_SIGNATURE_VERSION_1,
            &mut blob,
            Some(&mut error),
        )
    };

    if let Err(e) = serialized {
        let message = error.as_ref().map_or_else(|| e.to_string(), |e| blob_to_string(e));
        return Err(Error::Backend(format!(
            "could not serialize root signature: {message}"
        )));
    }

    let blob = blob.ok_or_else(|| Error::Backend("root signature serialized to nothing".into()))?;
    let root_signature = unsafe { dx.device.CreateRootSignature(0, blob_bytes(&blob)) }?;
    Ok(root_signature)
}

fn semantic_names(layout: &InputLayout) -> Result<Vec<CString>> {
    layout
        .elements()
        .iter()
        .map(|element| {
            CString::new(element.semantic)
                .map_err(|_| Error::Backend(format!("invalid semantic {:?}", element.semantic)))
        })
        .collect()
}

fn input_elements(layout: &InputLayout, semantics: &[CString]) -> Vec<D3D12_INPUT_ELEMENT_DESC> {
    layout
        .elements()
        .iter()
        .zip(semantics)
        .map(|(element, semantic)| D3D12_INPUT_ELEMENT_DESC {
            SemanticName: PCSTR(semantic.as_ptr().cast()),
            SemanticIndex: 0,
            Format: match element.format {
                VertexFormat::Float2 => DXGI_FORMAT_R32G32_FLOAT,
                VertexFormat::Float3 => DXGI_FORMAT_R32G32B32_FLOAT,
                VertexFormat::Float4 => DXGI_FORMAT_R32G32B32A32_FLOAT,
            },
            InputSlot: 0,
            AlignedByteOffset: element.offset,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        })
        .collect()
}

fn blend_target(mode: BlendMode) -> D3D12_RENDER_TARGET_BLEND_DESC {
    let enabled = mode == BlendMode::Alpha;
    D3D12_RENDER_TARGET_BLEND_DESC {
        BlendEnable: enabled.into(),
        LogicOpEnable: false.into(),
        SrcBlend: if enabled {
            D3D12_BLEND_SRC_ALPHA
        } else {
            D3D12_BLEND_ONE
        },
        DestBlend: if enabled {
            D3D12_BLEND_INV_SRC_ALPHA
        } else {
            D3D12_BLEND_ZERO
        },
        BlendOp: D3D12_BLEND_OP_ADD,
        SrcBlendAlpha: D3D12_BLEND_ONE,
        DestBlendAlpha: D3D12_BLEND_ZERO,
        BlendOpAlpha: D3D12_BLEND_OP_ADD,
        LogicOp: D3D12_LOGIC_OP_NOOP,
        RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
    }
}

fn shader_visibility(visibility: ShaderVisibility) -> D3D12_SHADER_VISIBILITY {
    match visibility {
        ShaderVisibility::All => D3D12_SHADER_VISIBILITY_ALL,
        ShaderVisibility::Vertex => D3D12_SHADER_VISIBILITY_VERTEX,
        ShaderVisibility::Pixel => D3D12_SHADER_VISIBILITY_PIXEL,
    }
}

fn bytecode(shader: &ShaderBytecode) -> D3D12_SHADER_BYTECODE {
    D3D12_SHADER_BYTECODE {
        pShaderBytecode: shader.as_bytes().as_ptr().cast(),
        BytecodeLength: shader.len(),
    }
}

pub(super) fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer().cast(), blob.GetBufferSize()) }
}

fn blob_to_string(blob: &ID3DBlob) -> String {
    String::from_utf8_lossy(blob_bytes(blob))
        .trim_end_matches('\0')
        .to_owned()
}
