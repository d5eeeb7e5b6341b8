use crate::stimulus::Response;
use serde::{Deserialize, Serialize};

/// What the participant should have answered for the presented edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectAnswer {
    Left,
    Right,
    OnTheSpot,
}

impl CorrectAnswer {
    /// Compares the presented angle with the reference angle. A larger angle
    /// puts the slanted point further right, so the finger lies to its left.
    pub fn judge(angle_degrees: f64, reference_degrees: f64) -> Self {
        if angle_degrees > reference_degrees {
            CorrectAnswer::Left
        } else if angle_degrees < reference_degrees {
            CorrectAnswer::Right
        } else {
            CorrectAnswer::OnTheSpot
        }
    }

    /// An answer of "on the spot" is never matched by a left/right response.
    pub fn accepts(&self, response: Response) -> bool {
        matches!(
            (self, response),
            (CorrectAnswer::Left, Response::Left) | (CorrectAnswer::Right, Response::Right)
        )
    }
}

/// Recorded result per trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_total: usize,
    pub session: usize,
    pub trial_in_session: usize,
    pub reference_degrees: f64,
    pub angle_degrees: f64,
    pub offset_degrees: f64,
    /// Slanted-point x at the reference angle, when a viewport was known.
    pub correct_x: Option<f64>,
    /// Slanted-point x of the presented edge.
    pub current_x: Option<f64>,
    pub correct_answer: CorrectAnswer,
    pub response: Response,
    pub response_correct: bool,
    pub reaction_time_ns: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judge_against_reference() {
        assert_eq!(CorrectAnswer::judge(12.0, 5.0), CorrectAnswer::Left);
        assert_eq!(CorrectAnswer::judge(-3.0, 5.0), CorrectAnswer::Right);
        assert_eq!(CorrectAnswer::judge(5.0, 5.0), CorrectAnswer::OnTheSpot);
    }

    #[test]
    fn on_the_spot_is_never_correct() {
        assert!(CorrectAnswer::Left.accepts(Response::Left));
        assert!(!CorrectAnswer::Left.accepts(Response::Right));
        assert!(!CorrectAnswer::OnTheSpot.accepts(Response::Left));
        assert!(!CorrectAnswer::OnTheSpot.accepts(Response::Right));
    }
}
