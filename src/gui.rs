//! A window showing the annotated camera feed.
//!
//! Everything runs on the calling thread, which has to be the main thread on most platforms:
//! [`Display::show`] presents the frame and then handles all pending window events before
//! returning.

mod renderer;

use winit::{
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::run_return::EventLoopExtRunReturn,
};

use crate::{image::Image, pipeline::FrameSink};

use self::renderer::Renderer;

/// A connection to the native display server, with at most one window.
///
/// The window is opened on the first call to [`Display::show`], at the size of that frame.
pub struct Display {
    title: String,
    renderer: Option<Renderer>,
    exit: bool,
    event_loop: EventLoop<()>,
}

impl Display {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            renderer: None,
            exit: false,
            event_loop: EventLoop::new(),
        }
    }

    fn pump_events(&mut self) {
        let window_id = self.renderer.as_ref().map(|r| r.window().id());
        let exit = &mut self.exit;
        self.event_loop.run_return(|event, _target, flow| {
            *flow = ControlFlow::Poll;
            match event {
                Event::WindowEvent { window_id: id, event } if Some(id) == window_id => {
                    if is_exit_trigger(&event) {
                        log::debug!("exit triggered by {:?}", event);
                        *exit = true;
                    }
                }
                Event::MainEventsCleared => *flow = ControlFlow::Exit,
                _ => {}
            }
        });
    }
}

fn is_exit_trigger(event: &WindowEvent<'_>) -> bool {
    match event {
        WindowEvent::CloseRequested | WindowEvent::Destroyed => true,
        WindowEvent::KeyboardInput {
            input:
                KeyboardInput {
                    state: ElementState::Pressed,
                    virtual_keycode: Some(VirtualKeyCode::Escape | VirtualKeyCode::Q),
                    ..
                },
            ..
        } => true,
        _ => false,
    }
}

impl FrameSink for Display {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        let res = image.resolution();
        let renderer = match self.renderer.take() {
            Some(renderer) if renderer.resolution() == res => renderer,
            old => {
                if let Some(old) = &old {
                    log::info!("frame size changed from {} to {}", old.resolution(), res);
                }
                // Close the old window before opening a new one.
                drop(old);
                log::debug!("opening window '{}' at {}", self.title, res);
                Renderer::open(&*self.event_loop, &self.title, res)?
            }
        };
        let renderer = self.renderer.insert(renderer);

        // Image data is RGBA8 internally so that no conversion before GPU upload is needed.
        renderer.update_texture(image.data());
        renderer.redraw()?;

        self.pump_events();
        Ok(())
    }

    fn exit_requested(&self) -> bool {
        self.exit
    }
}

#[cfg(test)]
mod tests {
    use winit::dpi::PhysicalSize;

    use super::*;

    #[test]
    fn exit_triggers() {
        assert!(is_exit_trigger(&WindowEvent::CloseRequested));
        assert!(is_exit_trigger(&WindowEvent::Destroyed));
        assert!(!is_exit_trigger(&WindowEvent::Resized(PhysicalSize::new(1, 1))));
        assert!(!is_exit_trigger(&WindowEvent::ReceivedCharacter('q')));
    }
}
