use anyhow::{Context, Result};
use joint_core::{Response, StandardPhase};
use joint_experiment::{ExperimentEvent, ExperimentStateMachine};
use joint_render::{Scene, SkiaRenderer};
use joint_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::config::AppConfig;

type Experiment = ExperimentStateMachine<StandardPhase, HighPrecisionTimer, ThreadRng>;

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    experiment: Experiment,
    font_path: Option<PathBuf>,
    frame_timer: HighPrecisionTimer,
    cursor: Option<PhysicalPosition<f64>>,
    should_exit: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let experiment = ExperimentStateMachine::new(
            config.experiment,
            config.participant,
            HighPrecisionTimer::new(),
            rand::rng(),
        )
        .context("invalid experiment configuration")?;

        Ok(Self {
            window: None,
            pixels: None,
            renderer: None,
            experiment,
            font_path: config.font_path,
            frame_timer: HighPrecisionTimer::new(),
            cursor: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            subject = %self.experiment.participant.subject_key(),
            "press SPACE to start, ESC to exit"
        );
        event_loop.run_app(&mut self).map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("No monitor available"))?;
        let refresh_hz = monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Joint Position")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            refresh_hz,
            "display configured"
        );

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface_texture)?);

        let mut renderer = SkiaRenderer::new(size.width, size.height)?;
        if let Some(path) = &self.font_path {
            renderer = match renderer.with_font(path) {
                Ok(r) => r,
                Err(e) => {
                    warn!("text labels disabled: {e:#}");
                    SkiaRenderer::new(size.width, size.height)?
                }
            };
        }
        self.renderer = Some(renderer);
        self.update_viewport();

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let experiment = &self.experiment;
        let scene = Scene {
            phase: experiment.current_phase(),
            stimulus: experiment.current_stimulus(),
            colors: experiment.colors(),
            progress: experiment.trial_progress(),
            input_enabled: experiment.accepts_input(),
        };

        let stats = renderer.render_frame(&scene, pixels.frame_mut(), &mut self.frame_timer)?;
        let now = self.frame_timer.now();
        pixels.render()?;
        let present = self.frame_timer.elapsed(now);

        debug!(
            draw_ms = stats.draw.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            present_ms = present.as_secs_f64() * 1e3,
            skipped = stats.skipped_stimulus,
            "frame"
        );
        Ok(())
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn dispatch(&mut self, event: ExperimentEvent) {
        match self.experiment.handle_event(event) {
            Ok(true) => self.request_redraw(),
            Ok(false) => debug!(?event, phase = ?self.experiment.phase, "event ignored"),
            Err(e) => warn!(?event, "event rejected: {e}"),
        }
    }

    fn handle_key(&mut self, code: KeyCode, repeat: bool, event_loop: &ActiveEventLoop) {
        let event = match code {
            KeyCode::ArrowLeft if !repeat => ExperimentEvent::ResponseReceived(Response::Left),
            KeyCode::ArrowRight if !repeat => ExperimentEvent::ResponseReceived(Response::Right),
            KeyCode::Space if !repeat => ExperimentEvent::SpacePressed,
            KeyCode::Escape => {
                self.cleanup_and_exit(event_loop);
                return;
            }
            _ => return,
        };
        self.dispatch(event);
    }

    fn handle_click(&mut self) {
        let (Some(cursor), Some(renderer)) = (self.cursor, self.renderer.as_ref()) else {
            return;
        };
        let hit = renderer.layout().hit_test(cursor.x, cursor.y);
        if let Some(response) = hit {
            self.dispatch(ExperimentEvent::ResponseReceived(response));
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!("Failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!("Failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                error!("Failed to resize canvas: {e:#}");
            }
        }
        self.update_viewport();
        info!(width = new_size.width, height = new_size.height, "display resized");
        self.request_redraw();
    }

    fn update_viewport(&mut self) {
        let Some(renderer) = &self.renderer else {
            return;
        };
        if let Err(e) = self
            .experiment
            .set_viewport(renderer.layout().stimulus_viewport())
        {
            warn!("stimulus area unusable: {e}");
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        let frames = self.frame_timer.frame_stats();
        info!(
            trials = self.experiment.results().len(),
            sessions = self.experiment.summaries().len(),
            frames = frames.samples,
            avg_frame_ms = frames.average_frame_time_ns / 1e6,
            "exiting"
        );
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!("Failed to create window and surface: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!("render failed: {e:#}");
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.handle_key(code, event.repeat, event_loop);
                }
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor = Some(position),
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(),
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
