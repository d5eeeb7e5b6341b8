use joint_core::{
    AngleBounds, CorrectAnswer, JointError, JointResult, Response, Side, StimulusState, Viewport,
};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ControllerConfig, SessionConfig};
use crate::staircase::{ResponseEvent, Staircase, UpDownStaircase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    AwaitingResponse,
    Terminated,
}

/// Outcome of one response, handed back to the caller so it can redraw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Stimulus the participant was answering.
    pub presented: StimulusState,
    /// Stimulus to draw next.
    pub state: StimulusState,
    pub status: ControllerStatus,
    pub response: Response,
    pub correct_answer: CorrectAnswer,
    pub reversal: bool,
    /// Responses received in this session, including this one.
    pub trials: usize,
}

impl Transition {
    pub fn response_correct(&self) -> bool {
        self.correct_answer.accepts(self.response)
    }
}

/// Holds the evolving edge angle of one session and applies participant
/// responses to it through a [`Staircase`] policy.
#[derive(Debug, Clone)]
pub struct TrialController<S: Staircase = UpDownStaircase> {
    config: ControllerConfig,
    bounds: AngleBounds,
    reference_degrees: f64,
    staircase: S,
    state: StimulusState,
    status: ControllerStatus,
    trials: usize,
    reversals: usize,
    last_response: Option<Response>,
}

impl<S: Staircase> TrialController<S> {
    pub fn new(
        config: ControllerConfig,
        side: Side,
        session: SessionConfig,
        mut staircase: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let start = staircase.start(
            session.reference_degrees,
            session.direction,
            config.initial_step_degrees,
        );
        let bounds = config.bounds;
        let state = StimulusState::new(
            sanitize(start.angle_degrees, &bounds, session.reference_degrees),
            side,
            positive_or(start.step_degrees, config.initial_step_degrees),
        );
        debug!(
            angle = state.angle_degrees,
            step = state.step_degrees,
            side = ?side,
            "controller started"
        );
        Ok(Self {
            config,
            bounds,
            reference_degrees: session.reference_degrees,
            staircase,
            state,
            status: ControllerStatus::AwaitingResponse,
            trials: 0,
            reversals: 0,
            last_response: None,
        })
    }

    pub fn on_left_pressed(&mut self) -> JointResult<Transition> {
        self.respond(Response::Left)
    }

    pub fn on_right_pressed(&mut self) -> JointResult<Transition> {
        self.respond(Response::Right)
    }

    pub fn respond(&mut self, response: Response) -> JointResult<Transition> {
        if self.status == ControllerStatus::Terminated {
            return Err(JointError::TrialAlreadyComplete {
                trials: self.trials,
            });
        }

        let presented = self.state;
        let correct_answer = CorrectAnswer::judge(presented.angle_degrees, self.reference_degrees);
        let reversal = self.last_response.is_some_and(|last| last != response);
        if reversal {
            self.reversals += 1;
        }

        let event = ResponseEvent {
            response,
            correct: correct_answer.accepts(response),
            reversal,
            reversals: self.reversals,
        };
        let adjustment = self.staircase.update(&presented, &event);

        self.state = StimulusState::new(
            sanitize(adjustment.angle_degrees, &self.bounds, presented.angle_degrees),
            presented.active_side,
            positive_or(adjustment.step_degrees, presented.step_degrees),
        );
        self.trials += 1;
        self.last_response = Some(response);

        let trial_limit = self.config.max_trials.is_some_and(|max| self.trials >= max);
        if trial_limit || self.staircase.is_converged() {
            self.status = ControllerStatus::Terminated;
            info!(
                trials = self.trials,
                reversals = self.reversals,
                angle = self.state.angle_degrees,
                "controller terminated"
            );
        }

        debug!(
            ?response,
            ?correct_answer,
            reversal,
            from = presented.angle_degrees,
            to = self.state.angle_degrees,
            step = self.state.step_degrees,
            "response applied"
        );

        Ok(Transition {
            presented,
            state: self.state,
            status: self.status,
            response,
            correct_answer,
            reversal,
            trials: self.trials,
        })
    }

    /// Stops the session on an external condition.
    pub fn terminate(&mut self) {
        self.status = ControllerStatus::Terminated;
    }

    /// Narrows the clamp range so the slanted point stays inside `viewport`
    /// and re-clamps the current angle. The configured range is kept when the
    /// two do not overlap.
    pub fn constrain_to(&mut self, viewport: &Viewport) -> JointResult<AngleBounds> {
        let visible = AngleBounds::within_viewport(viewport, self.state.active_side)?;
        self.bounds = match self.config.bounds.intersect(&visible) {
            Some(bounds) => bounds,
            None => {
                warn!(
                    configured = ?self.config.bounds,
                    visible = ?visible,
                    "configured bounds fall outside the viewport"
                );
                self.config.bounds
            }
        };
        self.state.angle_degrees = self.bounds.clamp(self.state.angle_degrees);
        Ok(self.bounds)
    }

    pub fn state(&self) -> &StimulusState {
        &self.state
    }

    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    pub fn is_terminated(&self) -> bool {
        self.status == ControllerStatus::Terminated
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn reversals(&self) -> usize {
        self.reversals
    }

    pub fn max_trials(&self) -> Option<usize> {
        self.config.max_trials
    }

    pub fn reference_degrees(&self) -> f64 {
        self.reference_degrees
    }

    pub fn bounds(&self) -> &AngleBounds {
        &self.bounds
    }

    pub fn staircase(&self) -> &S {
        &self.staircase
    }
}

fn sanitize(angle: f64, bounds: &AngleBounds, fallback: f64) -> f64 {
    bounds.clamp(if angle.is_finite() { angle } else { fallback })
}

fn positive_or(step: f64, fallback: f64) -> f64 {
    if step.is_finite() && step >= 0.0 {
        step
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpDownConfig;

    fn controller(max_trials: Option<usize>) -> TrialController {
        let config = ControllerConfig {
            initial_step_degrees: 5.0,
            bounds: AngleBounds::new(-20.0, 20.0),
            max_trials,
        };
        let staircase = UpDownStaircase::new(UpDownConfig {
            start_offset_degrees: 0.0,
            max_reversals: None,
            ..Default::default()
        })
        .unwrap();
        TrialController::new(config, Side::Left, SessionConfig::default(), staircase).unwrap()
    }

    #[test]
    fn left_presses_move_left_until_clamped() {
        let mut c = controller(None);
        let mut angles = vec![c.state().angle_degrees];
        for _ in 0..8 {
            angles.push(c.on_left_pressed().unwrap().state.angle_degrees);
        }
        assert_eq!(&angles[..6], &[0.0, -5.0, -10.0, -15.0, -20.0, -20.0]);
        assert!(angles.windows(2).all(|w| w[1] <= w[0]));
        assert!(angles[4..].iter().all(|a| *a == -20.0));
    }

    #[test]
    fn right_presses_are_symmetric() {
        let mut c = controller(None);
        let t = c.on_right_pressed().unwrap();
        assert_eq!(t.presented.angle_degrees, 0.0);
        assert_eq!(t.state.angle_degrees, 5.0);
        assert_eq!(t.state.active_side, Side::Left);
        assert_eq!(t.status, ControllerStatus::AwaitingResponse);
    }

    #[test]
    fn reversal_halves_step() {
        let mut c = controller(None);
        c.on_left_pressed().unwrap();
        let t = c.on_right_pressed().unwrap();
        assert!(t.reversal);
        assert_eq!(t.state.angle_degrees, 0.0);
        assert_eq!(t.state.step_degrees, 2.5);
        assert_eq!(c.reversals(), 1);
    }

    #[test]
    fn terminated_controller_signals_completion() {
        let mut c = controller(Some(2));
        c.on_left_pressed().unwrap();
        let last = c.on_left_pressed().unwrap();
        assert_eq!(last.status, ControllerStatus::Terminated);
        let frozen = *c.state();

        for _ in 0..3 {
            assert_eq!(
                c.on_right_pressed(),
                Err(JointError::TrialAlreadyComplete { trials: 2 })
            );
        }
        assert_eq!(*c.state(), frozen);
    }

    #[test]
    fn external_termination() {
        let mut c = controller(None);
        c.terminate();
        assert!(c.is_terminated());
        assert!(c.on_left_pressed().is_err());
    }

    #[test]
    fn scores_against_reference() {
        let mut c = controller(None);
        c.on_right_pressed().unwrap();
        let t = c.on_left_pressed().unwrap();
        assert_eq!(t.correct_answer, CorrectAnswer::Left);
        assert!(t.response_correct());
        let t = c.on_left_pressed().unwrap();
        assert_eq!(t.correct_answer, CorrectAnswer::OnTheSpot);
        assert!(!t.response_correct());
    }

    #[test]
    fn viewport_narrows_bounds() {
        let mut c = controller(None);
        for _ in 0..4 {
            c.on_right_pressed().unwrap();
        }
        assert_eq!(c.state().angle_degrees, 20.0);
        // Left side anchors at x = 70 of 100, so at most atan(30 / 100).
        let bounds = c.constrain_to(&Viewport::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let limit = (0.3f64).atan().to_degrees();
        assert!((bounds.max_degrees - limit).abs() < 1e-9);
        assert_eq!(bounds.min_degrees, -20.0);
        assert!((c.state().angle_degrees - limit).abs() < 1e-9);

        assert!(matches!(
            c.constrain_to(&Viewport::new(0.0, 0.0, 0.0, 100.0)),
            Err(JointError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn disjoint_viewport_keeps_configured_bounds() {
        let config = ControllerConfig {
            initial_step_degrees: 5.0,
            bounds: AngleBounds::new(30.0, 50.0),
            max_trials: None,
        };
        let staircase = UpDownStaircase::new(UpDownConfig {
            start_offset_degrees: 0.0,
            ..Default::default()
        })
        .unwrap();
        let mut c =
            TrialController::new(config, Side::Left, SessionConfig::default(), staircase).unwrap();
        assert_eq!(c.state().angle_degrees, 30.0);

        // Visible range tops out at atan(0.3), below the configured minimum.
        let bounds = c.constrain_to(&Viewport::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        assert_eq!(bounds, AngleBounds::new(30.0, 50.0));
        assert_eq!(c.state().angle_degrees, 30.0);
        let t = c.on_left_pressed().unwrap();
        assert_eq!(t.state.angle_degrees, 30.0);
    }
}
