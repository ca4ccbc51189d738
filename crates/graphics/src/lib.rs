//! Graphics!
//!
//! A single-queue, double-buffered frame manager over D3D12, plus the handful
//! of helpers needed to get textured sprites and meshes on screen.
//!
//! ## Goals
//!
//! - One owned [`Graphics`] context. Everything that touches the GPU borrows
//!   it; there is no global device.
//! - A begin/end frame contract with all CPU/GPU synchronization hidden in
//!   [`Frame::end`]. Exactly one frame is in flight at any time, so constant
//!   buffers can be rewritten every frame without versioning.
//! - Failures are values. Initialization reports which stage failed; the
//!   application decides to log and exit.
//!
//! ## Thoughts & Rationale
//!
//! - Why a [`Backend`] trait when only D3D12 is supported?
//!  - The frame protocol (fence counter, barrier ordering, allocator resets)
//!    is where the bugs live, and it cannot be unit tested against a real
//!    device. The [`backend::headless`] backend simulates a lagging GPU and
//!    rejects out-of-order calls so the protocol can be tested anywhere.
//! - Why not keep several frames in flight?
//!  - The demo scene is tiny. Waiting for the GPU at the end of every frame
//!    costs overlap but removes every per-frame resource hazard.
//!
//! ## Development Timeline
//!
//!  A timeline of significant events in the development of this crate.
//!
//! - 2022-12-19: Work begins after a few false starts.
//! - 2023-05-02: Reworked around a single direct queue and a fence counter
//!   owned by the frame manager.
//! - 2023-05-20: Texture manager, runtime shader compilation and the sprite
//!   and mesh helpers.

pub mod adapter;
pub mod backend;
mod buffer;
mod descriptor;
mod error;
mod frame;
mod material;
mod mesh;
mod object;
mod pipeline;
mod pixel_buffer;
mod shader;
mod sprite;
mod texture;

pub use backend::{Backend, SurfaceTarget};
pub use buffer::ConstantBuffer;
pub use descriptor::{
    CpuDescriptor, DescriptorAllocator, DescriptorHeapLayout, DescriptorIndex, GpuDescriptor,
};
pub use error::{Error, InitStage, Result};
pub use frame::{Frame, Graphics};
pub use mesh::{Mesh, MeshData, VertexData};
pub use material::{DirectionalLight, Material, TransformationMatrix, UvTransform};
pub use object::{Light, Object3d, ObjectCommon};
pub use pipeline::{
    BlendMode, CullMode, DepthFormat, DepthState, DescriptorRange, InputElement, InputLayout,
    PipelineDesc, RenderTargetFormat, RootParameter, RootSignatureDesc, ShaderVisibility,
    StaticSampler, VertexFormat,
};
pub use pixel_buffer::{mip_level_count, ColorSpace, PixelBuffer, PixelFormat};
pub use shader::{
    compile_arguments, CompileOutput, DiagnosticPolicy, PlatformToolchain, ShaderBytecode,
    ShaderCompiler, ShaderToolchain,
};
pub use sprite::{Sprite, SpriteCommon};
pub use texture::{TextureId, TextureManager, TextureMetadata};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PowerPreference {
    DontCare,
    LowPower,
    #[default]
    HighPerformance,
}

/// Options for configuring the graphics context on initialization. Once set,
/// these options cannot be changed without recreating the graphics context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphicsConfig {
    /// Enables the API validation layer, GPU-based validation and forwarding
    /// of validation messages to the log.
    ///
    /// Default: enabled in debug builds only.
    pub debug_mode: Option<bool>,

    /// Which adapter to prefer when more than one is available.
    ///
    /// Default: `HighPerformance`.
    pub power_preference: PowerPreference,

    /// Capacity of the shader-visible SRV heap. Loading more distinct
    /// textures than this is an error.
    ///
    /// Default: 4096.
    pub max_srv_count: u32,

    /// Number of SRV slots at the start of the heap that the texture manager
    /// will never hand out. Slot 0 holds the debug UI's font atlas.
    ///
    /// Default: 1.
    pub reserved_srv_count: u32,

    /// Color the back buffer is cleared to at the start of every frame.
    pub clear_color: Color,

    /// Vertical blanks to wait for on present. 1 caps the frame rate to the
    /// display refresh rate.
    ///
    /// Default: 1.
    pub sync_interval: u32,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            debug_mode: None,
            power_preference: PowerPreference::HighPerformance,
            max_srv_count: 4096,
            reserved_srv_count: 1,
            clear_color: Color::new(0.1, 0.25, 0.5, 1.0),
            sync_interval: 1,
        }
    }
}

impl GraphicsConfig {
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug_mode.unwrap_or(cfg!(debug_assertions))
    }
}
