use joint_core::{
    geometry::slant_offset, JointResult, ParticipantProfile, Phase, Response, StimulusState,
    TrialRecord, Viewport,
};
use joint_timing::Timer;
use rand::Rng;
use tracing::{info, warn};

use crate::config::{validate_participant, ConfigError, ControllerConfig, ExperimentConfig};
use crate::controller::{ControllerStatus, TrialController, Transition};
use crate::psi::PsiEstimates;
use crate::staircase::ConfiguredStaircase;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExperimentEvent {
    /// Start from the welcome screen, resume after the intermission, or
    /// move on to the next participant from the debrief.
    SpacePressed,
    ResponseReceived(Response),
}

/// Accuracy and timing of one finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session: usize,
    pub trials: usize,
    pub correct: usize,
    pub mean_reaction_ms: Option<f64>,
    pub final_angle_degrees: f64,
    pub psi: Option<PsiEstimates>,
}

pub struct ExperimentStateMachine<P, T, R>
where
    P: Phase,
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub phase: P,
    pub timer: T,
    pub rng: R,
    pub config: ExperimentConfig,
    pub participant: ParticipantProfile,
    controller: Option<TrialController<ConfiguredStaircase>>,
    viewport: Option<Viewport>,
    palette_index: usize,
    trial_total: usize,
    presented_at: Option<u64>,
    results: Vec<TrialRecord>,
    summaries: Vec<SessionSummary>,
}

impl<P, T, R> ExperimentStateMachine<P, T, R>
where
    P: Phase,
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(
        config: ExperimentConfig,
        participant: ParticipantProfile,
        timer: T,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        validate_participant(&participant)?;
        // Build once up front so a bad staircase configuration fails here
        // rather than at the start of a session.
        ConfiguredStaircase::from_config(&config.staircase)?;
        Ok(Self {
            phase: P::default(),
            timer,
            rng,
            config,
            participant,
            controller: None,
            viewport: None,
            palette_index: 0,
            trial_total: 0,
            presented_at: None,
            results: Vec::new(),
            summaries: Vec::new(),
        })
    }

    /// Applies one input event. Returns whether anything changed.
    pub fn handle_event(&mut self, event: ExperimentEvent) -> JointResult<bool> {
        match (self.phase, event) {
            (phase, ExperimentEvent::SpacePressed) if phase.is_debrief() => {
                self.reset();
                Ok(true)
            }
            (phase, ExperimentEvent::SpacePressed)
                if phase.is_welcome() || phase.is_intermission() =>
            {
                Ok(self.advance_phase())
            }
            (phase, ExperimentEvent::ResponseReceived(response)) if phase.allows_input() => {
                let transition = self.record_response(response)?;
                if transition.status == ControllerStatus::Terminated {
                    self.finish_session();
                    self.advance_phase();
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Moves to the next phase, starting its session if it has one. The
    /// phase is left unchanged when the session cannot be started.
    pub fn advance_phase(&mut self) -> bool {
        let Some(next) = self.phase.next() else {
            return false;
        };
        let controller = match next.session() {
            Some(session) => match self.build_controller(session) {
                Ok(controller) => Some(controller),
                Err(e) => {
                    warn!("failed to start session {session}: {e}");
                    return false;
                }
            },
            None => None,
        };

        self.phase = next;
        if let (Some(session), Some(controller)) = (next.session(), &controller) {
            let settings = self.config.sessions[session];
            info!(
                session,
                subject = %self.participant.subject_key(),
                reference = settings.reference_degrees,
                direction = settings.direction,
                angle = controller.state().angle_degrees,
                "session started"
            );
            self.presented_at = Some(self.timer.now());
        } else if next.is_debrief() {
            self.log_results();
        }
        self.controller = controller;
        info!(phase = ?self.phase, "phase advanced");
        true
    }

    fn build_controller(
        &self,
        session: usize,
    ) -> Result<TrialController<ConfiguredStaircase>, ConfigError> {
        let settings = self.config.sessions[session];
        let controller_config = ControllerConfig {
            initial_step_degrees: self
                .participant
                .initial_step_degrees
                .unwrap_or(self.config.controller.initial_step_degrees),
            ..self.config.controller.clone()
        };
        let staircase = ConfiguredStaircase::from_config(&self.config.staircase)?;
        let mut controller = TrialController::new(
            controller_config,
            self.participant.handedness.side(),
            settings,
            staircase,
        )?;
        if let Some(viewport) = &self.viewport {
            if let Err(e) = controller.constrain_to(viewport) {
                warn!("ignoring viewport: {e}");
            }
        }
        Ok(controller)
    }

    /// Records a response for the current trial
    pub fn record_response(&mut self, response: Response) -> JointResult<Transition> {
        let Some(session) = self.phase.session() else {
            return Err(joint_core::JointError::TrialAlreadyComplete {
                trials: self.trial_total,
            });
        };
        let Some(controller) = self.controller.as_mut() else {
            return Err(joint_core::JointError::TrialAlreadyComplete {
                trials: self.trial_total,
            });
        };

        let transition = controller.respond(response)?;
        let reference = controller.reference_degrees();
        let reaction_time_ns = self
            .presented_at
            .map(|t| self.timer.now().saturating_sub(t));

        let presented = transition.presented;
        let slanted_x = |angle: f64| {
            self.viewport.map(|vp| {
                vp.anchor_x(presented.active_side) + slant_offset(vp.height, angle)
            })
        };
        let record = TrialRecord {
            trial_total: self.trial_total,
            session,
            trial_in_session: transition.trials - 1,
            reference_degrees: reference,
            angle_degrees: presented.angle_degrees,
            offset_degrees: presented.angle_degrees - reference,
            correct_x: slanted_x(reference),
            current_x: slanted_x(presented.angle_degrees),
            correct_answer: transition.correct_answer,
            response,
            response_correct: transition.response_correct(),
            reaction_time_ns,
        };
        info!(
            trial = record.trial_total,
            session,
            in_session = record.trial_in_session,
            angle = record.angle_degrees,
            offset = record.offset_degrees,
            correct_answer = ?record.correct_answer,
            response = ?record.response,
            correct = record.response_correct,
            rt_ms = reaction_time_ns.map(|ns| ns as f64 / 1_000_000.0),
            "trial recorded"
        );

        self.results.push(record);
        self.trial_total += 1;
        self.rotate_palette();
        self.presented_at = Some(self.timer.now());
        Ok(transition)
    }

    /// Picks a palette entry different from the current one.
    fn rotate_palette(&mut self) {
        let len = self.config.palette.len();
        if len < 2 {
            return;
        }
        let mut next = self.rng.random_range(0..len);
        while next == self.palette_index {
            next = self.rng.random_range(0..len);
        }
        self.palette_index = next;
    }

    fn finish_session(&mut self) {
        let Some(session) = self.phase.session() else {
            return;
        };
        let Some(controller) = &self.controller else {
            return;
        };
        let records: Vec<&TrialRecord> =
            self.results.iter().filter(|r| r.session == session).collect();
        let times: Vec<f64> = records
            .iter()
            .filter_map(|r| r.reaction_time_ns)
            .map(|ns| ns as f64 / 1_000_000.0)
            .collect();
        let summary = SessionSummary {
            session,
            trials: records.len(),
            correct: records.iter().filter(|r| r.response_correct).count(),
            mean_reaction_ms: (!times.is_empty())
                .then(|| times.iter().sum::<f64>() / times.len() as f64),
            final_angle_degrees: controller.state().angle_degrees,
            psi: controller.staircase().psi_estimates().copied(),
        };
        info!(
            session,
            trials = summary.trials,
            correct = summary.correct,
            mean_rt_ms = summary.mean_reaction_ms,
            final_angle = summary.final_angle_degrees,
            threshold = summary.psi.map(|p| p.threshold.mean),
            slope = summary.psi.map(|p| p.slope.mean),
            "session finished"
        );
        self.summaries.push(summary);
    }

    fn log_results(&self) {
        let correct = self.results.iter().filter(|r| r.response_correct).count();
        let rate = if self.results.is_empty() {
            0.0
        } else {
            correct as f64 / self.results.len() as f64 * 100.0
        };
        info!(
            subject = %self.participant.subject_key(),
            trials = self.results.len(),
            accuracy_pct = rate,
            "experiment complete"
        );
    }

    /// Clears all state for the next participant.
    pub fn reset(&mut self) {
        info!(subject = %self.participant.subject_key(), "resetting for next participant");
        self.phase = P::default();
        self.controller = None;
        self.palette_index = 0;
        self.trial_total = 0;
        self.presented_at = None;
        self.results.clear();
        self.summaries.clear();
    }

    /// Replaces the stimulus viewport after a layout change.
    pub fn set_viewport(&mut self, viewport: Viewport) -> JointResult<()> {
        viewport.validate()?;
        self.viewport = Some(viewport);
        if let Some(controller) = self.controller.as_mut() {
            controller.constrain_to(&viewport)?;
        }
        Ok(())
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    /// Returns current phase
    pub fn current_phase(&self) -> &P {
        &self.phase
    }

    pub fn current_stimulus(&self) -> Option<&StimulusState> {
        self.controller.as_ref().map(|c| c.state())
    }

    pub fn controller(&self) -> Option<&TrialController<ConfiguredStaircase>> {
        self.controller.as_ref()
    }

    /// Left and right region colors for the current trial.
    pub fn colors(&self) -> ([u8; 4], [u8; 4]) {
        self.config
            .palette
            .colors(self.palette_index)
            .unwrap_or(([255, 255, 255, 255], [0, 0, 0, 255]))
    }

    pub fn palette_index(&self) -> usize {
        self.palette_index
    }

    pub fn accepts_input(&self) -> bool {
        self.phase.allows_input()
            && self
                .controller
                .as_ref()
                .is_some_and(|c| !c.is_terminated())
    }

    /// One-based trial number within the session and the session length.
    pub fn trial_progress(&self) -> Option<(usize, usize)> {
        let controller = self.controller.as_ref()?;
        let total = controller.max_trials()?;
        Some(((controller.trials() + 1).min(total), total))
    }

    pub fn results(&self) -> &[TrialRecord] {
        &self.results
    }

    pub fn summaries(&self) -> &[SessionSummary] {
        &self.summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joint_core::StandardPhase;
    use joint_timing::ManualTimer;
    use rand::{rngs::StdRng, SeedableRng};
    use std::time::Duration;

    type Machine = ExperimentStateMachine<StandardPhase, ManualTimer, StdRng>;

    fn machine(max_trials: usize) -> Machine {
        let mut config = ExperimentConfig::default();
        config.controller.max_trials = Some(max_trials);
        ExperimentStateMachine::new(
            config,
            ParticipantProfile::default(),
            ManualTimer::new(),
            StdRng::seed_from_u64(7),
        )
        .unwrap()
    }

    #[test]
    fn responses_ignored_outside_sessions() {
        let mut m = machine(3);
        assert_eq!(m.handle_event(ExperimentEvent::ResponseReceived(Response::Left)), Ok(false));
        assert!(m.current_stimulus().is_none());
        assert!(!m.accepts_input());
    }

    #[test]
    fn reaction_time_is_measured_from_presentation() {
        let mut m = machine(3);
        m.handle_event(ExperimentEvent::SpacePressed).unwrap();
        m.timer.advance(Duration::from_millis(640));
        m.handle_event(ExperimentEvent::ResponseReceived(Response::Right)).unwrap();
        assert_eq!(m.results()[0].reaction_time_ns, Some(640_000_000));
    }

    #[test]
    fn palette_changes_every_trial() {
        let mut m = machine(10);
        m.handle_event(ExperimentEvent::SpacePressed).unwrap();
        let mut previous = m.palette_index();
        for _ in 0..5 {
            m.handle_event(ExperimentEvent::ResponseReceived(Response::Left)).unwrap();
            assert_ne!(m.palette_index(), previous);
            previous = m.palette_index();
        }
    }

    #[test]
    fn progress_counts_from_one() {
        let mut m = machine(4);
        m.handle_event(ExperimentEvent::SpacePressed).unwrap();
        assert_eq!(m.trial_progress(), Some((1, 4)));
        m.handle_event(ExperimentEvent::ResponseReceived(Response::Left)).unwrap();
        assert_eq!(m.trial_progress(), Some((2, 4)));
    }

    #[test]
    fn rejects_participant_with_unusable_step() {
        let participant = ParticipantProfile {
            initial_step_degrees: Some(0.0),
            ..Default::default()
        };
        let result = Machine::new(
            ExperimentConfig::default(),
            participant,
            ManualTimer::new(),
            StdRng::seed_from_u64(7),
        );
        assert!(matches!(result, Err(ConfigError::InvalidStep(_))));
    }

    #[test]
    fn phase_is_kept_when_session_cannot_start() {
        let mut m = machine(3);
        m.participant.initial_step_degrees = Some(0.0);
        assert_eq!(m.handle_event(ExperimentEvent::SpacePressed), Ok(false));
        assert_eq!(*m.current_phase(), StandardPhase::Welcome);
        assert!(m.current_stimulus().is_none());

        m.participant.initial_step_degrees = Some(1.0);
        assert_eq!(m.handle_event(ExperimentEvent::SpacePressed), Ok(true));
        assert_eq!(*m.current_phase(), StandardPhase::FirstSession);
        assert_eq!(m.current_stimulus().map(|s| s.step_degrees), Some(1.0));
    }

    #[test]
    fn small_participant_step_keeps_session_running() {
        let mut m = machine(50);
        m.participant.initial_step_degrees = Some(0.1);
        m.handle_event(ExperimentEvent::SpacePressed).unwrap();
        assert_eq!(m.current_stimulus().map(|s| s.step_degrees), Some(0.25));
        m.handle_event(ExperimentEvent::ResponseReceived(Response::Left)).unwrap();
        assert_eq!(*m.current_phase(), StandardPhase::FirstSession);
        assert_eq!(m.results().len(), 1);
        assert!(m.accepts_input());
    }
}
