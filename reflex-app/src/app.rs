use anyhow::{Result, anyhow};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use reflex_core::SessionSummary;
use reflex_render::{FrameView, SkiaRenderer, load_font};
use reflex_session::SessionStateMachine;
use reflex_timing::{HighPrecisionClock, ThreadScheduler, TimerHandle};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::config::AppConfig;

/// Wakes the event loop from a timer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    StimulusDue(TimerHandle),
}

type Session = SessionStateMachine<HighPrecisionClock, ThreadScheduler, ThreadRng>;

pub fn run(config: AppConfig) -> Result<()> {
    let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
    let mut app = App::new(config, event_loop.create_proxy());
    event_loop.run_app(&mut app)?;
    Ok(())
}

pub struct App {
    config: AppConfig,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    session: Session,
    cursor: Option<PhysicalPosition<f64>>,
    finished: bool,
}

impl App {
    pub fn new(config: AppConfig, proxy: EventLoopProxy<AppEvent>) -> Self {
        let proxy = Mutex::new(proxy);
        let scheduler = ThreadScheduler::new(Arc::new(move |handle: TimerHandle| {
            let proxy = proxy.lock().unwrap_or_else(PoisonError::into_inner);
            if proxy.send_event(AppEvent::StimulusDue(handle)).is_err() {
                trace!(timer = handle.id(), "event loop closed, timer dropped");
            }
        }));
        let session = SessionStateMachine::new(
            config.session.clone(),
            HighPrecisionClock::new(),
            scheduler,
            rand::rng(),
        );

        Self {
            config,
            window: None,
            pixels: None,
            renderer: None,
            session,
            cursor: None,
            finished: false,
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let wc = &self.config.window;
        let mut attributes = Window::default_attributes().with_title(wc.title.clone());
        if wc.fullscreen {
            let monitor = event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next())
                .ok_or_else(|| anyhow!("no monitor available"))?;
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        } else {
            attributes = attributes.with_inner_size(LogicalSize::new(wc.width, wc.height));
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale_factor = window.scale_factor(),
            "window created"
        );

        let font = match &self.config.font_path {
            Some(path) => match load_font(path) {
                Ok(font) => Some(font),
                Err(e) => {
                    warn!(error = %e, "font unavailable, continuing without text");
                    None
                }
            },
            None => None,
        };

        let surface = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        self.renderer = Some(SkiaRenderer::new(size.width, size.height, font)?);

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let summary = self.session.summary();
        let histogram = self.session.histogram();
        let view = FrameView {
            state: self.session.trial_state(),
            last_reaction_ms: self.session.last_reaction_ms(),
            summary: &summary,
            histogram: &histogram,
        };

        let stats = renderer.render_frame(&view, pixels.frame_mut())?;
        pixels.render()?;

        trace!(
            draw_ms = stats.draw.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            total_ms = stats.total.as_secs_f64() * 1e3,
            "frame"
        );
        Ok(())
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn respond(&mut self) {
        if self.session.respond() {
            self.request_redraw();
        }
    }

    fn handle_click(&mut self) {
        let (Some(pos), Some(renderer)) = (self.cursor, self.renderer.as_ref()) else {
            return;
        };
        if renderer.layout().in_test_area(pos.x, pos.y) {
            self.respond();
        } else {
            debug!(x = pos.x, y = pos.y, "click outside test area");
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                error!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(size.width, size.height) {
                error!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(size.width, size.height) {
                error!(error = %e, "failed to resize canvas");
            }
        }
        debug!(width = size.width, height = size.height, "resized");
        self.request_redraw();
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        log_summary(&self.session.summary());
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.finish();
        event_loop.exit();
    }
}

fn log_summary(summary: &SessionSummary) {
    match serde_json::to_string(summary) {
        Ok(json) => info!(summary = %json, "session finished"),
        Err(e) => warn!(error = %e, "could not serialise session summary"),
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = %e, "failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::StimulusDue(handle) => {
                if self.session.on_stimulus_due(handle) {
                    self.request_redraw();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!(error = %e, "render failed");
                    self.cleanup_and_exit(event_loop);
                }
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor = Some(position),
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(),
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Space) => self.respond(),
                    PhysicalKey::Code(KeyCode::Escape) => self.cleanup_and_exit(event_loop),
                    _ => {}
                }
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.finish();
    }
}
