//! Screen-space textured quads.
//!
//! Sprites are positioned in window pixels with the origin at the top-left
//! corner, and drawn with alpha blending and no culling.

use std::path::Path;

use geometry::{Matrix4x4, Vector2, Vector3};
use tracing::info;

use crate::{
    Backend, Color, ConstantBuffer, Frame, Graphics, Material, Mesh, MeshData, PipelineDesc,
    Result, RootSignatureDesc, ShaderBytecode, ShaderCompiler, ShaderToolchain, TextureId,
    TextureManager, TransformationMatrix, UvTransform,
};

/// Pipeline state shared by every sprite.
pub struct SpriteCommon<B: Backend> {
    pipeline: B::Pipeline,
}

impl<B: Backend> SpriteCommon<B> {
    /// Compiles `Object2D.VS.hlsl` and `Object2D.PS.hlsl` from `shader_dir`.
    pub fn new<T: ShaderToolchain>(
        graphics: &mut Graphics<B>,
        compiler: &ShaderCompiler<T>,
        shader_dir: &Path,
    ) -> Result<Self> {
        let vs = compiler.compile(&shader_dir.join("Object2D.VS.hlsl"), "vs_6_0")?;
        let ps = compiler.compile(&shader_dir.join("Object2D.PS.hlsl"), "ps_6_0")?;
        Self::from_bytecode(graphics, &vs, &ps)
    }

    pub fn from_bytecode(
        graphics: &mut Graphics<B>,
        vs: &ShaderBytecode,
        ps: &ShaderBytecode,
    ) -> Result<Self> {
        let desc = PipelineDesc::sprite();
        let pipeline = graphics.backend_mut().create_pipeline(&desc, vs, ps)?;
        info!("{} pipeline created", desc.name);
        Ok(Self { pipeline })
    }

    /// Binds the sprite pipeline. Call once before drawing any sprites.
    pub fn bind(&self, frame: &mut Frame<B>) {
        frame.set_pipeline(&self.pipeline);
    }
}

pub struct Sprite<B: Backend> {
    /// Top-left corner, in pixels.
    pub position: Vector2,
    /// Rotation about the top-left corner, in radians.
    pub rotation: f32,
    /// Size in pixels.
    pub size: Vector2,
    pub color: Color,
    pub uv_transform: UvTransform,
    pub texture: TextureId,

    mesh: Mesh<B>,
    material: ConstantBuffer<Material, B>,
    transform: ConstantBuffer<TransformationMatrix, B>,
}

impl<B: Backend> Sprite<B> {
    pub fn new(graphics: &mut Graphics<B>, texture: TextureId) -> Result<Self> {
        let mesh = Mesh::upload(graphics, &MeshData::quad())?;
        let material = ConstantBuffer::new(graphics, &Material::new(Color::WHITE, false))?;
        let transform = ConstantBuffer::new(
            graphics,
            &TransformationMatrix {
                wvp: Matrix4x4::IDENTITY,
                world: Matrix4x4::IDENTITY,
            },
        )?;

        Ok(Self {
            position: Vector2::ZERO,
            rotation: 0.0,
            size: Vector2::new(360.0, 360.0),
            color: Color::WHITE,
            uv_transform: UvTransform::default(),
            texture,
            mesh,
            material,
            transform,
        })
    }

    #[must_use]
    pub fn world_matrix(&self) -> Matrix4x4 {
        Matrix4x4::affine(
            Vector3::new(self.size.x, self.size.y, 1.0),
            Vector3::new(0.0, 0.0, self.rotation),
            Vector3::new(self.position.x, self.position.y, 0.0),
        )
    }

    /// Writes the sprite's current state into its constant buffers. Must not
    /// be called while a frame is being recorded.
    pub fn update(&mut self, graphics: &Graphics<B>) -> Result<()> {
        let extent = graphics.extent();
        #[allow(clippy::cast_precision_loss)]
        let projection = Matrix4x4::orthographic(
            0.0,
            0.0,
            extent.width as f32,
            extent.height as f32,
            0.1,
            100.0,
        );

        let world = self.world_matrix();
        self.transform.write(
            graphics,
            &TransformationMatrix {
                wvp: world * Matrix4x4::IDENTITY * projection,
                world,
            },
        )?;

        let mut material = Material::new(self.color, false);
        material.uv_transform = self.uv_transform.matrix();
        self.material.write(graphics, &material)
    }

    pub fn draw(&self, frame: &mut Frame<B>, textures: &TextureManager<B>) -> Result<()> {
        let texture = textures.gpu_handle(self.texture)?;

        frame.set_constant_buffer(RootSignatureDesc::MATERIAL, self.material.buffer());
        frame.set_constant_buffer(RootSignatureDesc::TRANSFORM, self.transform.buffer());
        frame.set_descriptor_table(RootSignatureDesc::TEXTURE, texture);
        self.mesh.draw(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geometry::Vector4;

    use super::*;
    use crate::{
        backend::headless::{self, Command, Headless},
        ColorSpace, GraphicsConfig, PixelBuffer, PixelFormat,
    };

    #[test]
    fn draw_sprite() {
        let mut graphics =
            Graphics::<Headless>::new(&GraphicsConfig::default(), &headless::surface(1280, 720))
                .unwrap();
        let mut textures = TextureManager::new();
        let pixels = PixelBuffer::from_colors(
            &[Color::RED; 4],
            2,
            PixelFormat::Rgba8,
            ColorSpace::Srgb,
        );
        let texture = textures
            .load_pixels(&mut graphics, "red", &pixels)
            .unwrap();

        let bytecode = ShaderBytecode::new(vec![1, 2, 3]);
        let common = SpriteCommon::from_bytecode(&mut graphics, &bytecode, &bytecode).unwrap();

        let mut sprite = Sprite::new(&mut graphics, texture).unwrap();
        sprite.size = Vector2::new(1280.0, 720.0);
        sprite.update(&graphics).unwrap();

        // The far corner of the quad lands on the bottom-right of the screen.
        let matrices: TransformationMatrix =
            bytemuck::pod_read_unaligned(&sprite.transform.buffer().data()[..128]);
        let corner = matrices.wvp.transform(Vector4::new(1.0, 1.0, 0.0, 1.0));
        assert_relative_eq!(corner.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(corner.y, -1.0, epsilon = 1e-6);

        graphics.backend_mut().take_commands();
        let mut frame = graphics.begin_frame().unwrap();
        common.bind(&mut frame);
        sprite.draw(&mut frame, &textures).unwrap();
        frame.end().unwrap();

        let commands = graphics.backend_mut().take_commands();
        let texture_handle = textures.gpu_handle(texture).unwrap();
        for expected in [
            Command::SetPipeline("Object2D"),
            Command::SetDescriptorTable {
                root_index: RootSignatureDesc::TEXTURE,
                table: texture_handle,
            },
            Command::DrawIndexed {
                index_count: 6,
                instance_count: 1,
            },
        ] {
            assert!(commands.contains(&expected), "missing {expected:?}");
        }
    }

    #[test]
    fn unknown_texture() {
        let mut graphics =
            Graphics::<Headless>::new(&GraphicsConfig::default(), &headless::surface(64, 64))
                .unwrap();
        let textures = TextureManager::new();
        let sprite = Sprite::new(&mut graphics, TextureId(3)).unwrap();

        let mut frame = graphics.begin_frame().unwrap();
        assert!(sprite.draw(&mut frame, &textures).is_err());
        frame.end().unwrap();
    }
}
