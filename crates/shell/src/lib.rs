//! A single window and its input, driven by winit.
//!
//! The shell owns the event loop. The application implements
//! [`WindowHandler`] and gets one [`WindowHandler::on_update`] call per loop
//! iteration, after all pending OS events have been folded into [`Input`].

mod input;

pub use input::{Input, Key, Keyboard, Mouse, MouseButton};

use geometry::Extent;
use raw_window_handle::{HasRawWindowHandle, RawWindowHandle};
use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, ElementState, Event, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not create the window")]
    WindowCreation(#[from] winit::error::OsError),
}

/// Whether the event loop keeps running after an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
    /// Exit with a non-zero status.
    Fail,
}

/// Process exit status for [`Flow::Fail`].
pub const FAILURE_EXIT_CODE: i32 = 1;

/// `None` leaves the loop running.
fn control_flow(flow: Flow) -> Option<ControlFlow> {
    match flow {
        Flow::Continue => None,
        Flow::Exit => Some(ControlFlow::ExitWithCode(0)),
        Flow::Fail => Some(ControlFlow::ExitWithCode(FAILURE_EXIT_CODE)),
    }
}

/// Trait for handling window events.
pub trait WindowHandler {
    /// Called once per loop iteration with the input accumulated since the
    /// last call.
    fn on_update(&mut self, input: &Input) -> Flow;

    /// Called when the user has requested that the window be closed, either by
    /// clicking the X, by pressing Alt-F4, etc. Returning `false` keeps the
    /// window open.
    fn on_close_request(&mut self) -> bool {
        true
    }

    /// Called once, just before the event loop exits. This is the last event
    /// that will be received by the window handler before it is dropped.
    fn on_destroy(&mut self);
}

/// A description of the main window.
pub struct WindowDesc<'a> {
    pub title: &'a str,
    /// Client area size, in logical pixels.
    pub size: Extent<u32>,
    pub resizable: bool,
}

/// What a handler is created from.
#[derive(Clone, Copy, Debug)]
pub struct WindowInfo {
    pub handle: RawWindowHandle,
    /// Client area size, in physical pixels.
    pub extent: Extent<u32>,
}

/// Creates the window, builds the handler for it and runs the OS event loop
/// until the handler asks to exit or the window is closed. Only returns if
/// the window or the handler could not be created.
pub fn run<H, E>(desc: WindowDesc, create: impl FnOnce(WindowInfo) -> Result<H, E>) -> Result<(), E>
where
    H: WindowHandler + 'static,
    E: From<Error>,
{
    let event_loop = EventLoop::new();

    let window = winit::window::WindowBuilder::new()
        .with_title(desc.title)
        .with_inner_size(LogicalSize::new(desc.size.width, desc.size.height))
        .with_resizable(desc.resizable)
        .build(&event_loop)
        .map_err(Error::from)?;

    let mut handler = create(WindowInfo {
        handle: window.raw_window_handle(),
        extent: as_extent(window.inner_size()),
    })?;

    let mut input = Input::default();
    let mut destroyed = false;

    event_loop.run(move |event, _, control_flow| {
        // Render continuously instead of waiting for events.
        control_flow.set_poll();

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    if handler.on_close_request() {
                        *control_flow = ControlFlow::Exit;
                    }
                }
                WindowEvent::Focused(false) => input.keyboard.clear(),
                WindowEvent::KeyboardInput { input: key, .. } => {
                    if let Some(code) = key.virtual_keycode.and_then(Key::from_winit) {
                        input
                            .keyboard
                            .set(code, key.state == ElementState::Pressed);
                    }
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    let button = match button {
                        winit::event::MouseButton::Left => MouseButton::Left,
                        winit::event::MouseButton::Right => MouseButton::Right,
                        winit::event::MouseButton::Middle => MouseButton::Middle,
                        winit::event::MouseButton::Other(_) => return,
                    };
                    input
                        .mouse
                        .set_button(button, state == ElementState::Pressed);
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    #[allow(clippy::cast_possible_truncation)]
                    let lines = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(position) => (position.y / 120.0) as f32,
                    };
                    input.mouse.add_wheel(lines);
                }
                _ => {}
            },
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta: (dx, dy) },
                ..
            } => {
                #[allow(clippy::cast_possible_truncation)]
                let (dx, dy) = (dx as f32, dy as f32);
                input.mouse.add_motion(dx, dy);
            }
            Event::MainEventsCleared => {
                if let Some(exit) = self::control_flow(handler.on_update(&input)) {
                    *control_flow = exit;
                }
                input.end_frame();
            }
            Event::LoopDestroyed => {
                if !destroyed {
                    destroyed = true;
                    handler.on_destroy();
                }
            }
            _ => {}
        }
    });
}

fn as_extent(size: PhysicalSize<u32>) -> Extent<u32> {
    Extent::new(size.width, size.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_exits_non_zero() {
        assert_eq!(control_flow(Flow::Continue), None);
        assert_eq!(control_flow(Flow::Exit), Some(ControlFlow::ExitWithCode(0)));
        assert_eq!(
            control_flow(Flow::Fail),
            Some(ControlFlow::ExitWithCode(FAILURE_EXIT_CODE))
        );
        assert_ne!(FAILURE_EXIT_CODE, 0);
    }
}
