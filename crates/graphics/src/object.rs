//! Lit, textured meshes in world space.

use std::path::Path;

use geometry::{Matrix4x4, Transform};
use tracing::info;

use crate::{
    Backend, Color, ConstantBuffer, DirectionalLight, Frame, Graphics, Material, Mesh, MeshData,
    PipelineDesc, Result, RootSignatureDesc, ShaderBytecode, ShaderCompiler, ShaderToolchain,
    TextureId, TextureManager, TransformationMatrix, UvTransform,
};

/// Vertical field of view of the scene camera, in radians.
pub const FOV_Y: f32 = 0.45;
pub const NEAR_CLIP: f32 = 0.1;
pub const FAR_CLIP: f32 = 100.0;

/// Pipeline state shared by every 3D object.
pub struct ObjectCommon<B: Backend> {
    pipeline: B::Pipeline,
}

impl<B: Backend> ObjectCommon<B> {
    /// Compiles `Object3D.VS.hlsl` and `Object3D.PS.hlsl` from `shader_dir`.
    pub fn new<T: ShaderToolchain>(
        graphics: &mut Graphics<B>,
        compiler: &ShaderCompiler<T>,
        shader_dir: &Path,
    ) -> Result<Self> {
        let vs = compiler.compile(&shader_dir.join("Object3D.VS.hlsl"), "vs_6_0")?;
        let ps = compiler.compile(&shader_dir.join("Object3D.PS.hlsl"), "ps_6_0")?;
        Self::from_bytecode(graphics, &vs, &ps)
    }

    pub fn from_bytecode(
        graphics: &mut Graphics<B>,
        vs: &ShaderBytecode,
        ps: &ShaderBytecode,
    ) -> Result<Self> {
        let desc = PipelineDesc::object_3d();
        let pipeline = graphics.backend_mut().create_pipeline(&desc, vs, ps)?;
        info!("{} pipeline created", desc.name);
        Ok(Self { pipeline })
    }

    pub fn bind(&self, frame: &mut Frame<B>) {
        frame.set_pipeline(&self.pipeline);
    }
}

/// A directional light and the constant buffer it is uploaded to.
pub struct Light<B: Backend> {
    pub light: DirectionalLight,
    buffer: ConstantBuffer<DirectionalLight, B>,
}

impl<B: Backend> Light<B> {
    pub fn new(graphics: &mut Graphics<B>, light: DirectionalLight) -> Result<Self> {
        let mut this = Self {
            light,
            buffer: ConstantBuffer::new(graphics, &light)?,
        };
        this.update(graphics)?;
        Ok(this)
    }

    /// Uploads the light with its direction normalized.
    pub fn update(&mut self, graphics: &Graphics<B>) -> Result<()> {
        let light = DirectionalLight {
            direction: self.light.direction.normalize(),
            ..self.light
        };
        self.buffer.write(graphics, &light)
    }

    pub fn buffer(&self) -> &B::Buffer {
        self.buffer.buffer()
    }
}

pub struct Object3d<B: Backend> {
    pub transform: Transform,
    pub color: Color,
    pub enable_lighting: bool,
    pub uv_transform: UvTransform,
    pub texture: TextureId,

    mesh: Mesh<B>,
    material: ConstantBuffer<Material, B>,
    matrices: ConstantBuffer<TransformationMatrix, B>,
}

impl<B: Backend> Object3d<B> {
    pub fn new(graphics: &mut Graphics<B>, mesh: &MeshData, texture: TextureId) -> Result<Self> {
        let mesh = Mesh::upload(graphics, mesh)?;
        let material = ConstantBuffer::new(graphics, &Material::new(Color::WHITE, true))?;
        let matrices = ConstantBuffer::new(graphics, &TransformationMatrix::default())?;

        Ok(Self {
            transform: Transform::default(),
            color: Color::WHITE,
            enable_lighting: true,
            uv_transform: UvTransform::default(),
            texture,
            mesh,
            material,
            matrices,
        })
    }

    /// Writes the object's state into its constant buffers, viewed through
    /// `view`. Must not be called while a frame is being recorded.
    pub fn update(&mut self, graphics: &Graphics<B>, view: &Matrix4x4) -> Result<()> {
        let extent = graphics.extent();
        #[allow(clippy::cast_precision_loss)]
        let aspect_ratio = extent.width as f32 / extent.height.max(1) as f32;
        let projection = Matrix4x4::perspective_fov(FOV_Y, aspect_ratio, NEAR_CLIP, FAR_CLIP);

        let world = self.transform.matrix();
        self.matrices.write(
            graphics,
            &TransformationMatrix {
                wvp: world * *view * projection,
                world,
            },
        )?;

        let mut material = Material::new(self.color, self.enable_lighting);
        material.uv_transform = self.uv_transform.matrix();
        self.material.write(graphics, &material)
    }

    pub fn draw(
        &self,
        frame: &mut Frame<B>,
        textures: &TextureManager<B>,
        light: &Light<B>,
    ) -> Result<()> {
        let texture = textures.gpu_handle(self.texture)?;

        frame.set_constant_buffer(RootSignatureDesc::MATERIAL, self.material.buffer());
        frame.set_constant_buffer(RootSignatureDesc::TRANSFORM, self.matrices.buffer());
        frame.set_descriptor_table(RootSignatureDesc::TEXTURE, texture);
        frame.set_constant_buffer(RootSignatureDesc::LIGHT, light.buffer());
        self.mesh.draw(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geometry::{Vector3, Vector4};

    use super::*;
    use crate::{
        backend::headless::{self, Command, Headless},
        ColorSpace, GraphicsConfig, PixelBuffer, PixelFormat,
    };

    fn setup() -> (Graphics<Headless>, TextureManager<Headless>, TextureId) {
        let mut graphics =
            Graphics::new(&GraphicsConfig::default(), &headless::surface(1280, 720)).unwrap();
        let mut textures = TextureManager::new();
        let pixels =
            PixelBuffer::from_colors(&[Color::WHITE; 4], 2, PixelFormat::Rgba8, ColorSpace::Srgb);
        let texture = textures
            .load_pixels(&mut graphics, "white", &pixels)
            .unwrap();
        (graphics, textures, texture)
    }

    #[test]
    fn projection() {
        let (mut graphics, _, texture) = setup();
        let mut object = Object3d::new(&mut graphics, &MeshData::sphere(16), texture).unwrap();

        // Camera 10 units behind the origin, looking down +z.
        let view = Matrix4x4::translate(Vector3::new(0.0, 0.0, -10.0)).inverse();
        object.update(&graphics, &view).unwrap();

        let matrices: TransformationMatrix =
            bytemuck::pod_read_unaligned(&object.matrices.buffer().data()[..128]);
        assert_eq!(matrices.world, Matrix4x4::IDENTITY);

        let clip = matrices.wvp.transform(Vector4::new(0.0, 0.0, 0.0, 1.0));
        assert_relative_eq!(clip.w, 10.0, epsilon = 1e-5);
        let depth = clip.z / clip.w;
        assert!(depth > 0.0 && depth < 1.0);
    }

    #[test]
    fn light_is_normalized() {
        let (mut graphics, _, _) = setup();
        let light = Light::new(
            &mut graphics,
            DirectionalLight {
                direction: Vector3::new(3.0, 0.0, 4.0),
                ..DirectionalLight::default()
            },
        )
        .unwrap();

        let uploaded: DirectionalLight = bytemuck::pod_read_unaligned(&light.buffer().data()[..32]);
        assert_relative_eq!(uploaded.direction.x, 0.6, epsilon = 1e-6);
        assert_relative_eq!(uploaded.direction.z, 0.8, epsilon = 1e-6);
        assert_eq!(light.light.direction, Vector3::new(3.0, 0.0, 4.0));
    }

    #[test]
    fn draw_object() {
        let (mut graphics, textures, texture) = setup();
        let bytecode = ShaderBytecode::new(vec![0xAA]);
        let common = ObjectCommon::from_bytecode(&mut graphics, &bytecode, &bytecode).unwrap();
        let object = Object3d::new(&mut graphics, &MeshData::sphere(16), texture).unwrap();
        let light = Light::new(&mut graphics, DirectionalLight::default()).unwrap();

        let mut frame = graphics.begin_frame().unwrap();
        common.bind(&mut frame);
        object.draw(&mut frame, &textures, &light).unwrap();
        frame.end().unwrap();

        let commands = graphics.backend().commands();
        assert!(commands.contains(&Command::SetPipeline("Object3D")));
        assert!(commands.contains(&Command::SetConstantBuffer {
            root_index: RootSignatureDesc::LIGHT,
            buffer: light.buffer().id(),
        }));
        assert!(commands.contains(&Command::DrawIndexed {
            index_count: 16 * 16 * 6,
            instance_count: 1,
        }));
    }
}
