//! Backend-agnostic descriptions of the shader binding layout and the fixed
//! function state. These are plain data, built once at startup and handed to
//! [`Backend::create_pipeline`](crate::Backend::create_pipeline).

use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderVisibility {
    All,
    Vertex,
    Pixel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorRange {
    /// First `t` register of the range.
    pub base_register: u32,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootParameter {
    /// Root constant buffer view bound to register `b{register}`.
    ConstantBuffer {
        register: u32,
        visibility: ShaderVisibility,
    },
    /// Table of shader resource views.
    DescriptorTable {
        ranges: SmallVec<[DescriptorRange; 1]>,
        visibility: ShaderVisibility,
    },
}

/// A bilinear, wrapping sampler over all mip levels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticSampler {
    pub register: u32,
    pub visibility: ShaderVisibility,
    pub max_lod: f32,
}

impl Default for StaticSampler {
    fn default() -> Self {
        Self {
            register: 0,
            visibility: ShaderVisibility::Pixel,
            max_lod: f32::MAX,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RootSignatureDesc {
    pub parameters: Vec<RootParameter>,
    pub samplers: Vec<StaticSampler>,
    pub allow_input_layout: bool,
}

impl RootSignatureDesc {
    /// Root index of the material constant buffer (`b0`, pixel).
    pub const MATERIAL: u32 = 0;
    /// Root index of the transformation matrices (`b0`, vertex).
    pub const TRANSFORM: u32 = 1;
    /// Root index of the texture descriptor table (`t0`, pixel).
    pub const TEXTURE: u32 = 2;
    /// Root index of the directional light (`b1`, pixel). Meshes only.
    pub const LIGHT: u32 = 3;

    /// Layout shared by sprites and meshes: material, transform, texture.
    #[must_use]
    pub fn sprite() -> Self {
        Self {
            parameters: vec![
                RootParameter::ConstantBuffer {
                    register: 0,
                    visibility: ShaderVisibility::Pixel,
                },
                RootParameter::ConstantBuffer {
                    register: 0,
                    visibility: ShaderVisibility::Vertex,
                },
                RootParameter::DescriptorTable {
                    ranges: smallvec::smallvec![DescriptorRange {
                        base_register: 0,
                        count: 1,
                    }],
                    visibility: ShaderVisibility::Pixel,
                },
            ],
            samplers: vec![StaticSampler::default()],
            allow_input_layout: true,
        }
    }

    /// [`RootSignatureDesc::sprite`] plus a directional light.
    #[must_use]
    pub fn object_3d() -> Self {
        let mut desc = Self::sprite();
        desc.parameters.push(RootParameter::ConstantBuffer {
            register: 1,
            visibility: ShaderVisibility::Pixel,
        });
        desc
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexFormat {
    Float2,
    Float3,
    Float4,
}

impl VertexFormat {
    #[must_use]
    pub fn size(self) -> u32 {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputElement {
    pub semantic: &'static str,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputLayout {
    elements: SmallVec<[InputElement; 4]>,
}

impl InputLayout {
    /// Packs the elements back to back, as `D3D12_APPEND_ALIGNED_ELEMENT`
    /// would.
    #[must_use]
    pub fn packed(elements: &[(&'static str, VertexFormat)]) -> Self {
        let mut offset = 0;
        let elements = elements
            .iter()
            .map(|&(semantic, format)| {
                let element = InputElement {
                    semantic,
                    format,
                    offset,
                };
                offset += format.size();
                element
            })
            .collect();

        Self { elements }
    }

    #[must_use]
    pub fn object_3d() -> Self {
        Self::packed(&[
            ("POSITION", VertexFormat::Float4),
            ("TEXCOORD", VertexFormat::Float2),
            ("NORMAL", VertexFormat::Float3),
        ])
    }

    #[must_use]
    pub fn sprite() -> Self {
        Self::packed(&[
            ("POSITION", VertexFormat::Float4),
            ("TEXCOORD", VertexFormat::Float2),
        ])
    }

    #[must_use]
    pub fn elements(&self) -> &[InputElement] {
        &self.elements
    }

    /// Size of the elements this layout reads. Vertex buffers may use a
    /// larger stride.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.elements
            .last()
            .map_or(0, |last| last.offset + last.format.size())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// `src * src.a + dst * (1 - src.a)` for color; alpha is written as is.
    Alpha,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    None,
    #[default]
    Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthState {
    pub enabled: bool,
    pub write: bool,
}

impl Default for DepthState {
    /// Depth test enabled with `LESS_EQUAL`, writes enabled.
    fn default() -> Self {
        Self {
            enabled: true,
            write: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderTargetFormat {
    /// 8-bit RGBA written through an sRGB view.
    #[default]
    Rgba8Srgb,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DepthFormat {
    #[default]
    D24UnormS8Uint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineDesc {
    pub name: &'static str,
    pub root_signature: RootSignatureDesc,
    pub input_layout: InputLayout,
    pub blend: BlendMode,
    pub cull: CullMode,
    pub depth: DepthState,
    pub render_target_format: RenderTargetFormat,
    pub depth_format: DepthFormat,
}

impl PipelineDesc {
    #[must_use]
    pub fn sprite() -> Self {
        Self {
            name: "Object2D",
            root_signature: RootSignatureDesc::sprite(),
            input_layout: InputLayout::sprite(),
            blend: BlendMode::Alpha,
            cull: CullMode::None,
            depth: DepthState::default(),
            render_target_format: RenderTargetFormat::default(),
            depth_format: DepthFormat::default(),
        }
    }

    #[must_use]
    pub fn object_3d() -> Self {
        Self {
            name: "Object3D",
            root_signature: RootSignatureDesc::object_3d(),
            input_layout: InputLayout::object_3d(),
            blend: BlendMode::Opaque,
            cull: CullMode::Back,
            depth: DepthState::default(),
            render_target_format: RenderTargetFormat::default(),
            depth_format: DepthFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_layouts() {
        let layout = InputLayout::object_3d();
        let offsets: Vec<_> = layout
            .elements()
            .iter()
            .map(|e| (e.semantic, e.offset))
            .collect();
        assert_eq!(offsets, [("POSITION", 0), ("TEXCOORD", 16), ("NORMAL", 24)]);
        assert_eq!(layout.size(), 36);

        let layout = InputLayout::sprite();
        assert_eq!(layout.elements().len(), 2);
        assert_eq!(layout.size(), 24);
    }

    #[test]
    fn root_signatures() {
        let sprite = RootSignatureDesc::sprite();
        assert_eq!(sprite.parameters.len(), 3);
        assert!(sprite.allow_input_layout);
        assert_eq!(sprite.samplers.len(), 1);

        assert_eq!(
            sprite.parameters[RootSignatureDesc::MATERIAL as usize],
            RootParameter::ConstantBuffer {
                register: 0,
                visibility: ShaderVisibility::Pixel
            }
        );
        assert_eq!(
            sprite.parameters[RootSignatureDesc::TRANSFORM as usize],
            RootParameter::ConstantBuffer {
                register: 0,
                visibility: ShaderVisibility::Vertex
            }
        );
        assert!(matches!(
            &sprite.parameters[RootSignatureDesc::TEXTURE as usize],
            RootParameter::DescriptorTable { ranges, visibility: ShaderVisibility::Pixel }
                if ranges.len() == 1 && ranges[0].count == 1
        ));

        let object = RootSignatureDesc::object_3d();
        assert_eq!(object.parameters.len(), 4);
        assert_eq!(
            object.parameters[RootSignatureDesc::LIGHT as usize],
            RootParameter::ConstantBuffer {
                register: 1,
                visibility: ShaderVisibility::Pixel
            }
        );
    }

    #[test]
    fn pipelines() {
        let sprite = PipelineDesc::sprite();
        assert_eq!(sprite.blend, BlendMode::Alpha);
        assert_eq!(sprite.cull, CullMode::None);

        let object = PipelineDesc::object_3d();
        assert_eq!(object.cull, CullMode::Back);
        assert!(object.depth.enabled && object.depth.write);
        assert_eq!(object.depth_format, DepthFormat::D24UnormS8Uint);
    }
}
