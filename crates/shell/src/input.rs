//! Keyboard and mouse state, sampled once per frame.
//!
//! Events update the current state as they arrive. [`Input::end_frame`]
//! snapshots it, so that edge queries (`is_pressed`, `is_released`) compare
//! this frame against the last one.

/// Mouse buttons (e.g. left, right, middle, etc.)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        self as usize
    }
}

/// The symbolic (read: English) name for a key on the keyboard.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,

    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,

    Left,
    Right,
    Up,
    Down,

    Space,
    Tab,
    Enter,
    Escape,
    Backspace,
    LShift,
    RShift,
    LControl,
    RControl,

    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl Key {
    pub const COUNT: usize = Self::F12 as usize + 1;

    /// Keys the shell does not track map to `None`.
    #[must_use]
    pub fn from_winit(key: winit::event::VirtualKeyCode) -> Option<Self> {
        use winit::event::VirtualKeyCode as W;

        Some(match key {
            W::Key0 => Self::Key0,
            W::Key1 => Self::Key1,
            W::Key2 => Self::Key2,
            W::Key3 => Self::Key3,
            W::Key4 => Self::Key4,
            W::Key5 => Self::Key5,
            W::Key6 => Self::Key6,
            W::Key7 => Self::Key7,
            W::Key8 => Self::Key8,
            W::Key9 => Self::Key9,
            W::A => Self::A,
            W::B => Self::B,
            W::C => Self::C,
            W::D => Self::D,
            W::E => Self::E,
            W::F => Self::F,
            W::G => Self::G,
            W::H => Self::H,
            W::I => Self::I,
            W::J => Self::J,
            W::K => Self::K,
            W::L => Self::L,
            W::M => Self::M,
            W::N => Self::N,
            W::O => Self::O,
            W::P => Self::P,
            W::Q => Self::Q,
            W::R => Self::R,
            W::S => Self::S,
            W::T => Self::T,
            W::U => Self::U,
            W::V => Self::V,
            W::W => Self::W,
            W::X => Self::X,
            W::Y => Self::Y,
            W::Z => Self::Z,
            W::Left => Self::Left,
            W::Right => Self::Right,
            W::Up => Self::Up,
            W::Down => Self::Down,
            W::Space => Self::Space,
            W::Tab => Self::Tab,
            W::Return => Self::Enter,
            W::Escape => Self::Escape,
            W::Back => Self::Backspace,
            W::LShift => Self::LShift,
            W::RShift => Self::RShift,
            W::LControl => Self::LControl,
            W::RControl => Self::RControl,
            W::F1 => Self::F1,
            W::F2 => Self::F2,
            W::F3 => Self::F3,
            W::F4 => Self::F4,
            W::F5 => Self::F5,
            W::F6 => Self::F6,
            W::F7 => Self::F7,
            W::F8 => Self::F8,
            W::F9 => Self::F9,
            W::F10 => Self::F10,
            W::F11 => Self::F11,
            W::F12 => Self::F12,
            _ => return None,
        })
    }
}

/// Current and previous-frame state of every tracked key.
#[derive(Clone, Debug)]
pub struct Keyboard {
    current: [bool; Key::COUNT],
    previous: [bool; Key::COUNT],
}

impl Default for Keyboard {
    fn default() -> Self {
        Self {
            current: [false; Key::COUNT],
            previous: [false; Key::COUNT],
        }
    }
}

impl Keyboard {
    pub fn set(&mut self, key: Key, down: bool) {
        self.current[key as usize] = down;
    }

    #[must_use]
    pub fn is_down(&self, key: Key) -> bool {
        self.current[key as usize]
    }

    /// Down this frame but not the last.
    #[must_use]
    pub fn is_pressed(&self, key: Key) -> bool {
        self.current[key as usize] && !self.previous[key as usize]
    }

    /// Down last frame but not this one.
    #[must_use]
    pub fn is_released(&self, key: Key) -> bool {
        !self.current[key as usize] && self.previous[key as usize]
    }

    pub fn end_frame(&mut self) {
        self.previous = self.current;
    }

    /// Releases every key, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.current = [false; Key::COUNT];
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mouse {
    buttons: [bool; MouseButton::COUNT],
    delta: (f32, f32),
    wheel: f32,
}

impl Mouse {
    pub fn set_button(&mut self, button: MouseButton, down: bool) {
        self.buttons[button.index()] = down;
    }

    /// Accumulates raw device motion, unaffected by cursor acceleration or
    /// the window edge.
    pub fn add_motion(&mut self, dx: f32, dy: f32) {
        self.delta.0 += dx;
        self.delta.1 += dy;
    }

    pub fn add_wheel(&mut self, lines: f32) {
        self.wheel += lines;
    }

    #[must_use]
    pub fn is_down(&self, button: MouseButton) -> bool {
        self.buttons[button.index()]
    }

    /// Motion since the last frame.
    #[must_use]
    pub fn delta(&self) -> (f32, f32) {
        self.delta
    }

    /// Wheel lines scrolled since the last frame, positive away from the
    /// user.
    #[must_use]
    pub fn wheel(&self) -> f32 {
        self.wheel
    }

    pub fn end_frame(&mut self) {
        self.delta = (0.0, 0.0);
        self.wheel = 0.0;
    }
}

#[derive(Clone, Debug, Default)]
pub struct Input {
    pub keyboard: Keyboard,
    pub mouse: Mouse,
}

impl Input {
    pub fn end_frame(&mut self) {
        self.keyboard.end_frame();
        self.mouse.end_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_edges() {
        let mut keyboard = Keyboard::default();

        keyboard.set(Key::W, true);
        assert!(keyboard.is_down(Key::W));
        assert!(keyboard.is_pressed(Key::W));
        assert!(!keyboard.is_released(Key::W));

        // Held: down, but no longer a fresh press.
        keyboard.end_frame();
        assert!(keyboard.is_down(Key::W));
        assert!(!keyboard.is_pressed(Key::W));

        keyboard.set(Key::W, false);
        assert!(!keyboard.is_down(Key::W));
        assert!(keyboard.is_released(Key::W));

        keyboard.end_frame();
        assert!(!keyboard.is_released(Key::W));
        assert!(!keyboard.is_down(Key::A));
    }

    #[test]
    fn key_mapping() {
        use winit::event::VirtualKeyCode as W;

        assert_eq!(Key::from_winit(W::W), Some(Key::W));
        assert_eq!(Key::from_winit(W::Return), Some(Key::Enter));
        assert_eq!(Key::from_winit(W::F12), Some(Key::F12));
        assert_eq!(Key::from_winit(W::Numpad0), None);
        assert_eq!(Key::COUNT, 61);
    }

    #[test]
    fn mouse_motion_resets_each_frame() {
        let mut input = Input::default();
        input.mouse.set_button(MouseButton::Right, true);
        input.mouse.add_motion(3.0, -1.0);
        input.mouse.add_motion(2.0, 4.0);
        assert_eq!(input.mouse.delta(), (5.0, 3.0));

        input.mouse.add_wheel(1.0);
        input.mouse.add_wheel(0.5);
        assert_eq!(input.mouse.wheel(), 1.5);

        input.end_frame();
        assert_eq!(input.mouse.delta(), (0.0, 0.0));
        assert_eq!(input.mouse.wheel(), 0.0);
        assert!(input.mouse.is_down(MouseButton::Right));
        assert!(!input.mouse.is_down(MouseButton::Left));
    }
}
