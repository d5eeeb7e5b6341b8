use serde::{Deserialize, Serialize};

/// Which half of the screen the slanted boundary anchors to.
///
/// `Left` (numeric `1`) anchors the edge at 70% of the viewport width so the
/// filled region covers most of the left side; `Right` (numeric `0`) anchors
/// it at 30%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const LEFT_ANCHOR: f64 = 0.7;
    pub const RIGHT_ANCHOR: f64 = 0.3;

    pub fn from_num(num: u8) -> Option<Self> {
        match num {
            1 => Some(Side::Left),
            0 => Some(Side::Right),
            _ => None,
        }
    }

    pub fn num(&self) -> u8 {
        match self {
            Side::Left => 1,
            Side::Right => 0,
        }
    }

    /// Horizontal position of the anchor as a fraction of viewport width.
    pub fn anchor_fraction(&self) -> f64 {
        match self {
            Side::Left => Self::LEFT_ANCHOR,
            Side::Right => Self::RIGHT_ANCHOR,
        }
    }
}

/// A participant's answer: the boundary appears to the left or to the right
/// of their finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    Left,
    Right,
}

impl Response {
    /// Sign of the angle change this response asks for.
    pub fn sign(&self) -> f64 {
        match self {
            Response::Left => -1.0,
            Response::Right => 1.0,
        }
    }
}

/// Current stimulus parameters of one active trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StimulusState {
    /// Edge slant in degrees; negative leans left.
    pub angle_degrees: f64,
    pub active_side: Side,
    pub step_degrees: f64,
}

impl StimulusState {
    pub fn new(angle_degrees: f64, active_side: Side, step_degrees: f64) -> Self {
        Self {
            angle_degrees,
            active_side,
            step_degrees,
        }
    }
}

/// Paired color lists; index `i` colors the left region with `left[i]` and
/// the right region with `right[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub left: Vec<[u8; 4]>,
    pub right: Vec<[u8; 4]>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            left: vec![[255, 0, 0, 255], [255, 255, 0, 255], [0, 255, 0, 255]],
            right: vec![[0, 0, 255, 255], [128, 0, 255, 255], [255, 143, 191, 255]],
        }
    }
}

impl Palette {
    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn colors(&self, index: usize) -> Option<([u8; 4], [u8; 4])> {
        Some((*self.left.get(index)?, *self.right.get(index)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_numeric_encoding() {
        assert_eq!(Side::from_num(1), Some(Side::Left));
        assert_eq!(Side::from_num(0), Some(Side::Right));
        assert_eq!(Side::from_num(2), None);
        assert_eq!(Side::Left.num(), 1);
        assert_eq!(Side::Right.anchor_fraction(), 0.3);
    }

    #[test]
    fn palette_pairs_by_index() {
        let palette = Palette::default();
        assert_eq!(palette.len(), 3);
        let (left, right) = palette.colors(1).unwrap();
        assert_eq!(left, [255, 255, 0, 255]);
        assert_eq!(right, [128, 0, 255, 255]);
        assert!(palette.colors(3).is_none());
    }
}
