use anyhow::{bail, Result};
use joint_core::{Phase, QuadMemo, Response, StimulusState};
use joint_timing::Timer;
use std::path::Path;
use std::time::Duration;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Transform};
use tracing::{debug, warn};

use crate::layout::Layout;
use crate::text::TextCache;

const BACKGROUND: Color = Color::BLACK;
const DIM_FACTOR: f32 = 0.35;
const TEXT_SIZE_PX: f32 = 28.0;

/// Everything needed to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a, P: Phase> {
    pub phase: &'a P,
    pub stimulus: Option<&'a StimulusState>,
    /// Left and right region colors, straight RGBA.
    pub colors: ([u8; 4], [u8; 4]),
    pub progress: Option<(usize, usize)>,
    pub input_enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    /// The stimulus could not be drawn for the current window size.
    pub skipped_stimulus: bool,
}

pub trait PhaseRenderer<P: Phase> {
    /// Draws `scene` into the offscreen canvas. Returns `false` when the
    /// stimulus was skipped.
    fn render_phase(&mut self, scene: &Scene<'_, P>) -> Result<bool>;
}

pub struct SkiaRenderer {
    layout: Layout,
    canvas: Pixmap,
    memo: QuadMemo,
    text: Option<TextCache>,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let Some(canvas) = Pixmap::new(width.max(1), height.max(1)) else {
            bail!("cannot allocate a {width}x{height} canvas");
        };
        Ok(Self {
            layout: Layout::new(width, height),
            canvas,
            memo: QuadMemo::new(),
            text: None,
        })
    }

    /// Enables text labels using the TrueType font at `path`.
    pub fn with_font(mut self, path: &Path) -> Result<Self> {
        self.text = Some(TextCache::load(path, TEXT_SIZE_PX)?);
        debug!(path = %path.display(), "font loaded");
        Ok(self)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let Some(canvas) = Pixmap::new(width.max(1), height.max(1)) else {
            bail!("cannot allocate a {width}x{height} canvas");
        };
        self.canvas = canvas;
        self.layout = Layout::new(width, height);
        self.memo.invalidate();
        Ok(())
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Draws `scene` and copies the canvas into `frame_buffer` (RGBA8, same
    /// size as the window).
    pub fn render_frame<P, T>(
        &mut self,
        scene: &Scene<'_, P>,
        frame_buffer: &mut [u8],
        timer: &mut T,
    ) -> Result<FrameStats>
    where
        P: Phase,
        T: Timer,
    {
        let t_draw = {
            let t = timer.now();
            let drawn = self.render_phase(scene)?;
            (timer.elapsed(t), drawn)
        };

        let data = self.canvas.data();
        if frame_buffer.len() != data.len() {
            bail!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                data.len()
            );
        }
        let t_copy = {
            let t = timer.now();
            frame_buffer.copy_from_slice(data);
            timer.elapsed(t)
        };

        let total = t_draw.0 + t_copy;
        timer.record_frame(total);

        Ok(FrameStats {
            draw: t_draw.0,
            copy: t_copy,
            total,
            skipped_stimulus: !t_draw.1,
        })
    }

    fn draw_stimulus(&mut self, stimulus: &StimulusState, colors: ([u8; 4], [u8; 4])) -> bool {
        let viewport = self.layout.stimulus_viewport();
        let quad = match self
            .memo
            .get(&viewport, stimulus.angle_degrees, stimulus.active_side)
        {
            Ok(quad) => quad,
            Err(err) => {
                warn!(%err, "skipping stimulus");
                return false;
            }
        };

        if let Some(area) = self.layout.stimulus_rect() {
            self.canvas
                .fill_rect(area, &paint(colors.1, 1.0), Transform::identity(), None);
        }

        let mut pb = PathBuilder::new();
        for (i, p) in quad.points().iter().enumerate() {
            let (x, y) = self.layout.to_pixel(*p);
            if i == 0 {
                pb.move_to(x, y);
            } else {
                pb.line_to(x, y);
            }
        }
        pb.close();
        let Some(path) = pb.finish() else {
            warn!(angle = stimulus.angle_degrees, "quad path is empty");
            return false;
        };
        self.canvas.fill_path(
            &path,
            &paint(colors.0, 1.0),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
        true
    }

    fn draw_buttons(&mut self, colors: ([u8; 4], [u8; 4]), enabled: bool) {
        let shade = if enabled { 1.0 } else { DIM_FACTOR };
        for (response, color) in [(Response::Left, colors.0), (Response::Right, colors.1)] {
            if let Some(rect) = self.layout.button(response) {
                self.canvas
                    .fill_rect(rect, &paint(color, shade), Transform::identity(), None);
            }
        }
    }

    /// Draws `text` centered on `pos`. No-op without a font.
    fn blit_text(&mut self, text: &str, pos: (f32, f32)) {
        let Some(pm) = self.text.as_mut().and_then(|cache| cache.get_or_render(text)) else {
            return;
        };
        let x = (pos.0 - pm.width() as f32 * 0.5) as i32;
        let y = (pos.1 - pm.height() as f32 * 0.5) as i32;
        self.canvas.draw_pixmap(
            x,
            y,
            Pixmap::as_ref(&pm),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

impl<P: Phase> PhaseRenderer<P> for SkiaRenderer {
    fn render_phase(&mut self, scene: &Scene<'_, P>) -> Result<bool> {
        self.canvas.fill(BACKGROUND);
        let center = (
            self.layout.width as f32 * 0.5,
            self.layout.band_top() * 0.5,
        );

        let phase = scene.phase;
        if phase.is_welcome() {
            self.blit_text("Press SPACE to begin", center);
            return Ok(true);
        }
        if phase.is_intermission() {
            self.blit_text("Session complete. Press SPACE to continue", center);
            return Ok(true);
        }
        if phase.is_debrief() {
            self.blit_text("Thank you! Press SPACE for the next participant", center);
            return Ok(true);
        }

        let mut drawn = true;
        if let Some(stimulus) = scene.stimulus {
            drawn = self.draw_stimulus(stimulus, scene.colors);
        }
        self.draw_buttons(scene.colors, scene.input_enabled);
        if let Some((current, total)) = scene.progress {
            self.blit_text(&format!("Trial: {current}/{total}"), (90.0, 24.0));
        }
        Ok(drawn)
    }
}

fn paint(rgba: [u8; 4], shade: f32) -> Paint<'static> {
    let scale = |c: u8| (c as f32 * shade).round().clamp(0.0, 255.0) as u8;
    let mut p = Paint::default();
    p.anti_alias = true;
    p.set_color_rgba8(scale(rgba[0]), scale(rgba[1]), scale(rgba[2]), rgba[3]);
    p
}
