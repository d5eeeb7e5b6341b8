//! Geometry of the joint edge.
//!
//! Coordinates are y-up: `(viewport.x, viewport.y)` is the bottom-left
//! corner of the viewport. Renderers working in y-down pixel space flip the
//! vertical axis themselves.

use crate::error::{JointError, JointResult};
use crate::stimulus::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned drawing area supplied by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn validate(&self) -> JointResult<()> {
        let valid = self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0;
        if valid {
            Ok(())
        } else {
            Err(JointError::InvalidGeometry {
                width: self.width,
                height: self.height,
            })
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    /// x coordinate of the edge's bottom anchor for `side`.
    pub fn anchor_x(&self, side: Side) -> f64 {
        self.x + side.anchor_fraction() * self.width
    }
}

/// The filled quadrilateral, in draw order: bottom-left, top-left, slanted
/// top point, bottom anchor. Clockwise in y-up space, counter-clockwise once
/// flipped into pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    /// The top end of the slanted edge.
    pub fn slanted(&self) -> Point {
        self.0[2]
    }

    /// The bottom end of the slanted edge.
    pub fn anchor(&self) -> Point {
        self.0[3]
    }

    /// True when no two non-adjacent edges intersect and the polygon has
    /// non-zero area.
    pub fn is_simple(&self) -> bool {
        let p = &self.0;
        let crosses_02 = segments_intersect(p[0], p[1], p[2], p[3]);
        let crosses_13 = segments_intersect(p[1], p[2], p[3], p[0]);
        !crosses_02 && !crosses_13 && self.signed_area().abs() > f64::EPSILON
    }

    /// Shoelace area; positive for counter-clockwise order in y-up space.
    pub fn signed_area(&self) -> f64 {
        let p = &self.0;
        let mut sum = 0.0;
        for i in 0..4 {
            let a = p[i];
            let b = p[(i + 1) % 4];
            sum += a.x * b.y - b.x * a.y;
        }
        sum * 0.5
    }
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = orientation(c, d, a);
    let d2 = orientation(c, d, b);
    let d3 = orientation(a, b, c);
    let d4 = orientation(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Horizontal offset of the slanted point from the anchor.
pub fn slant_offset(height: f64, angle_degrees: f64) -> f64 {
    if angle_degrees == 0.0 {
        0.0
    } else {
        height * angle_degrees.to_radians().tan()
    }
}

/// Computes the quadrilateral filling the region left of the joint edge.
///
/// The angle is not clamped; keep it within roughly [-60°, 60°] (or within
/// [`AngleBounds::within_viewport`]) for a simple polygon.
pub fn compute_quad(viewport: &Viewport, angle_degrees: f64, side: Side) -> JointResult<Quad> {
    viewport.validate()?;

    let anchor = viewport.anchor_x(side);
    let slanted = anchor + slant_offset(viewport.height, angle_degrees);
    let top = viewport.top();

    Ok(Quad([
        Point::new(viewport.x, viewport.y),
        Point::new(viewport.x, top),
        Point::new(slanted, top),
        Point::new(anchor, viewport.y),
    ]))
}

/// Inclusive range of edge angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleBounds {
    pub min_degrees: f64,
    pub max_degrees: f64,
}

impl Default for AngleBounds {
    fn default() -> Self {
        Self {
            min_degrees: -60.0,
            max_degrees: 60.0,
        }
    }
}

impl AngleBounds {
    pub fn new(min_degrees: f64, max_degrees: f64) -> Self {
        Self {
            min_degrees,
            max_degrees,
        }
    }

    /// Angles that keep the slanted top point within the viewport's
    /// horizontal extent.
    pub fn within_viewport(viewport: &Viewport, side: Side) -> JointResult<Self> {
        viewport.validate()?;
        let anchor = viewport.anchor_x(side);
        let min = ((viewport.x - anchor) / viewport.height).atan().to_degrees();
        let max = ((viewport.right() - anchor) / viewport.height).atan().to_degrees();
        Ok(Self::new(min, max))
    }

    pub fn clamp(&self, angle_degrees: f64) -> f64 {
        if angle_degrees.is_nan() {
            return self.min_degrees.max(0.0).min(self.max_degrees);
        }
        angle_degrees.clamp(self.min_degrees, self.max_degrees)
    }

    pub fn contains(&self, angle_degrees: f64) -> bool {
        (self.min_degrees..=self.max_degrees).contains(&angle_degrees)
    }

    /// Overlap of both ranges; `None` when they are disjoint.
    pub fn intersect(&self, other: &AngleBounds) -> Option<Self> {
        let min = self.min_degrees.max(other.min_degrees);
        let max = self.max_degrees.min(other.max_degrees);
        (min <= max).then(|| Self::new(min, max))
    }

    pub fn is_valid(&self) -> bool {
        self.min_degrees.is_finite()
            && self.max_degrees.is_finite()
            && self.min_degrees <= self.max_degrees
    }
}

/// Remembers the last computed quad and its inputs.
#[derive(Debug, Clone, Default)]
pub struct QuadMemo {
    last: Option<(Viewport, f64, Side, Quad)>,
}

impl QuadMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, viewport: &Viewport, angle_degrees: f64, side: Side) -> JointResult<Quad> {
        if let Some((vp, angle, s, quad)) = &self.last {
            if vp == viewport && angle.to_bits() == angle_degrees.to_bits() && *s == side {
                return Ok(*quad);
            }
        }
        let quad = compute_quad(viewport, angle_degrees, side)?;
        self.last = Some((*viewport, angle_degrees, side, quad));
        Ok(quad)
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }
}
