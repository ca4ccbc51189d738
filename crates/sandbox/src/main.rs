//! A small scene for exercising the renderer: one textured sprite and one lit
//! sphere, viewed through a fly camera.
//!
//! Right-drag turns the camera, WASD moves it and Space toggles lighting on
//! the sphere.

mod camera;
mod config;
mod logging;

use anyhow::Context;
use geometry::{Vector2, Vector3};
use graphics::{
    DirectionalLight, Graphics, Light, MeshData, Object3d, ObjectCommon,
    PlatformToolchain, ShaderCompiler, Sprite, SpriteCommon, SurfaceTarget, TextureManager,
};
use shell::{Flow, Input, Key, WindowDesc, WindowHandler, WindowInfo};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use crate::camera::DebugCamera;

#[cfg(target_os = "windows")]
type Renderer = graphics::backend::dx12::Dx12;

#[cfg(not(target_os = "windows"))]
type Renderer = graphics::backend::headless::Headless;

struct Scene {
    textures: TextureManager<Renderer>,
    sprite_common: SpriteCommon<Renderer>,
    sprite: Sprite<Renderer>,
    object_common: ObjectCommon<Renderer>,
    sphere: Object3d<Renderer>,
    light: Light<Renderer>,
}

impl Scene {
    fn new(
        graphics: &mut Graphics<Renderer>,
        compiler: &ShaderCompiler<PlatformToolchain>,
    ) -> anyhow::Result<Self> {
        let shader_dir = config::shader_dir();

        let mut textures = TextureManager::new();
        let checker = textures
            .load(graphics, config::checker_texture())
            .context("could not load the checker texture")?;

        let sprite_common = SpriteCommon::new(graphics, compiler, shader_dir)?;
        let mut sprite = Sprite::new(graphics, checker)?;
        sprite.position = Vector2::new(100.0, 100.0);
        sprite.size = Vector2::new(256.0, 256.0);

        let object_common = ObjectCommon::new(graphics, compiler, shader_dir)?;
        let sphere = Object3d::new(graphics, &MeshData::sphere(16), checker)?;

        let light = Light::new(
            graphics,
            DirectionalLight {
                direction: Vector3::new(1.0, 0.0, 0.0),
                ..DirectionalLight::default()
            },
        )?;

        Ok(Self {
            textures,
            sprite_common,
            sprite,
            object_common,
            sphere,
            light,
        })
    }
}

struct Sandbox {
    // The scene holds GPU resources and must be dropped before the context.
    scene: Option<Scene>,
    graphics: Option<Graphics<Renderer>>,
    camera: DebugCamera,
    // Dropped last so that everything logged during shutdown is flushed.
    _log_guard: WorkerGuard,
}

impl Sandbox {
    fn new(window: WindowInfo, log_guard: WorkerGuard) -> anyhow::Result<Self> {
        let compiler = ShaderCompiler::platform(config::SHADER_DIAGNOSTICS)
            .context("could not create the shader compiler")?;

        let mut graphics = Graphics::new(
            &config::graphics(),
            &SurfaceTarget {
                window: window.handle,
                extent: window.extent,
            },
        )
        .context("could not initialize graphics")?;

        let scene = Scene::new(&mut graphics, &compiler)?;
        info!("scene loaded with {} textures", scene.textures.len());

        Ok(Self {
            scene: Some(scene),
            graphics: Some(graphics),
            camera: DebugCamera::default(),
            _log_guard: log_guard,
        })
    }

    fn frame(&mut self, input: &Input) -> anyhow::Result<()> {
        let (Some(graphics), Some(scene)) = (self.graphics.as_mut(), self.scene.as_mut()) else {
            return Ok(());
        };

        self.camera.update(input);

        if input.keyboard.is_pressed(Key::Space) {
            scene.sphere.enable_lighting = !scene.sphere.enable_lighting;
        }
        scene.sphere.transform.rotate.y += 0.01;

        scene.sprite.update(graphics)?;
        scene.sphere.update(graphics, self.camera.view())?;
        scene.light.update(graphics)?;

        let mut frame = graphics.begin_frame()?;

        scene.object_common.bind(&mut frame);
        scene.sphere.draw(&mut frame, &scene.textures, &scene.light)?;

        scene.sprite_common.bind(&mut frame);
        scene.sprite.draw(&mut frame, &scene.textures)?;

        frame.end()?;

        scene.textures.release_intermediates(graphics);
        Ok(())
    }
}

impl WindowHandler for Sandbox {
    fn on_update(&mut self, input: &Input) -> Flow {
        match self.frame(input) {
            Ok(()) => Flow::Continue,
            Err(e) => {
                error!("{e:#}");
                Flow::Fail
            }
        }
    }

    fn on_destroy(&mut self) {
        let Some(mut graphics) = self.graphics.take() else {
            return;
        };

        if let Err(e) = graphics.wait_gpu() {
            error!("failed to wait for the GPU: {e}");
        }
        self.scene = None;

        if let Err(e) = graphics.shutdown() {
            error!("graphics shutdown failed: {e}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    let log_guard = logging::init()?;
    logging::install_panic_hook();

    let result = shell::run(
        WindowDesc {
            title: config::WINDOW_TITLE,
            size: config::window_size(),
            resizable: false,
        },
        |window| Sandbox::new(window, log_guard),
    );

    // Only reached if startup failed; the guard has already been dropped, so
    // report on stderr as well.
    if let Err(e) = &result {
        eprintln!("{e:#}");
    }
    result
}
