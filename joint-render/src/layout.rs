use joint_core::{Point, Response, Viewport};
use tiny_skia::Rect;

/// Share of the window height given to the response-button band.
pub const BUTTON_BAND_FRACTION: f32 = 0.12;

const BUTTON_MARGIN: f32 = 8.0;

/// Splits the window into the stimulus area and the button band.
///
/// Pixel coordinates are y-down with the origin at the top-left corner of the
/// window. The stimulus [`Viewport`] is y-up with its origin at the bottom-left
/// corner of the stimulus area, so the quad geometry never sees the flip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    band_top: f32,
    left_button: Option<Rect>,
    right_button: Option<Rect>,
}

impl Layout {
    pub fn new(width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        let band_top = (h * (1.0 - BUTTON_BAND_FRACTION)).floor();
        let band_h = h - band_top;

        let button_w = (w * 0.5 - 1.5 * BUTTON_MARGIN).max(1.0);
        let button_h = (band_h - 2.0 * BUTTON_MARGIN).max(1.0);
        let top = band_top + BUTTON_MARGIN.min(band_h * 0.5);
        let left_button = Rect::from_xywh(BUTTON_MARGIN, top, button_w, button_h);
        let right_button = Rect::from_xywh(w * 0.5 + 0.5 * BUTTON_MARGIN, top, button_w, button_h);

        Self {
            width,
            height,
            band_top,
            left_button,
            right_button,
        }
    }

    /// Stimulus area as a y-up viewport.
    pub fn stimulus_viewport(&self) -> Viewport {
        Viewport::new(0.0, 0.0, self.width as f64, self.band_top as f64)
    }

    /// Stimulus area in pixel coordinates.
    pub fn stimulus_rect(&self) -> Option<Rect> {
        Rect::from_xywh(0.0, 0.0, self.width as f32, self.band_top)
    }

    pub fn band_top(&self) -> f32 {
        self.band_top
    }

    pub fn button(&self, response: Response) -> Option<Rect> {
        match response {
            Response::Left => self.left_button,
            Response::Right => self.right_button,
        }
    }

    /// Maps a y-up stimulus point to window pixels.
    pub fn to_pixel(&self, p: Point) -> (f32, f32) {
        (p.x as f32, self.band_top - p.y as f32)
    }

    /// Which response button, if any, lies under a window position.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<Response> {
        let (x, y) = (x as f32, y as f32);
        [Response::Left, Response::Right]
            .into_iter()
            .find(|r| self.button(*r).is_some_and(|b| contains(&b, x, y)))
    }
}

fn contains(rect: &Rect, x: f32, y: f32) -> bool {
    x >= rect.left() && x < rect.right() && y >= rect.top() && y < rect.bottom()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_window() {
        let layout = Layout::new(1000, 800);
        assert_eq!(layout.band_top(), 704.0);
        let vp = layout.stimulus_viewport();
        assert_eq!((vp.width, vp.height), (1000.0, 704.0));

        let left = layout.button(Response::Left).unwrap();
        let right = layout.button(Response::Right).unwrap();
        assert!(left.top() >= layout.band_top());
        assert!(left.bottom() <= 800.0);
        assert!(left.right() <= right.left());
    }

    #[test]
    fn flips_y_axis() {
        let layout = Layout::new(1000, 800);
        assert_eq!(layout.to_pixel(Point::new(10.0, 0.0)), (10.0, 704.0));
        assert_eq!(layout.to_pixel(Point::new(10.0, 704.0)), (10.0, 0.0));
    }

    #[test]
    fn hit_tests_buttons() {
        let layout = Layout::new(1000, 800);
        assert_eq!(layout.hit_test(100.0, 750.0), Some(Response::Left));
        assert_eq!(layout.hit_test(900.0, 750.0), Some(Response::Right));
        assert_eq!(layout.hit_test(500.0, 300.0), None);
    }
}
