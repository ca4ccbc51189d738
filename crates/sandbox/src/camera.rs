use geometry::{Matrix4x4, Vector3};
use shell::{Input, Key, MouseButton};

/// A fly camera. Dragging with the right mouse button turns it, WASD moves it
/// along its own axes and the wheel dollies it forward and back.
pub struct DebugCamera {
    pub rotation: Vector3,
    pub translation: Vector3,
    pub move_speed: f32,
    /// Radians per pixel of mouse motion.
    pub rotate_speed: f32,
    /// Distance moved per wheel line.
    pub zoom_speed: f32,
    view: Matrix4x4,
}

impl Default for DebugCamera {
    fn default() -> Self {
        let mut camera = Self {
            rotation: Vector3::ZERO,
            translation: Vector3::new(0.0, 0.0, -50.0),
            move_speed: 0.5,
            rotate_speed: 0.01,
            zoom_speed: 2.0,
            view: Matrix4x4::IDENTITY,
        };
        camera.update_view();
        camera
    }
}

impl DebugCamera {
    pub fn update(&mut self, input: &Input) {
        if input.mouse.is_down(MouseButton::Right) {
            let (dx, dy) = input.mouse.delta();
            self.rotation.y += dx * self.rotate_speed;
            self.rotation.x += dy * self.rotate_speed;
        }

        let keyboard = &input.keyboard;
        let mut direction = Vector3::ZERO;
        for (key, step) in [
            (Key::W, Vector3::new(0.0, 0.0, 1.0)),
            (Key::S, Vector3::new(0.0, 0.0, -1.0)),
            (Key::D, Vector3::new(1.0, 0.0, 0.0)),
            (Key::A, Vector3::new(-1.0, 0.0, 0.0)),
        ] {
            if keyboard.is_down(key) {
                direction += step;
            }
        }

        let rotation = Matrix4x4::rotate(self.rotation);
        self.translation += rotation.transform_normal(direction) * self.move_speed;

        let wheel = input.mouse.wheel();
        if wheel != 0.0 {
            let forward = rotation.transform_normal(Vector3::new(0.0, 0.0, 1.0));
            self.translation += forward * (wheel * self.zoom_speed);
        }

        self.update_view();
    }

    fn update_view(&mut self) {
        self.view = Matrix4x4::affine(Vector3::ONE, self.rotation, self.translation).inverse();
    }

    #[must_use]
    pub fn view(&self) -> &Matrix4x4 {
        &self.view
    }
}
