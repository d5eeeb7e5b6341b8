use joint_core::{Response, StimulusState};
use tracing::debug;

use crate::config::{ConfigError, StaircaseConfig, UpDownConfig};
use crate::psi::{Psi, PsiEstimates};

/// Angle and step a policy proposes; the controller clamps before applying.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub angle_degrees: f64,
    pub step_degrees: f64,
}

/// A scored participant response handed to the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseEvent {
    pub response: Response,
    pub correct: bool,
    /// The response differs from the previous one.
    pub reversal: bool,
    /// Reversals so far in this session, including this one.
    pub reversals: usize,
}

/// Decides how the edge angle evolves between trials.
pub trait Staircase {
    /// First stimulus of a session.
    fn start(&mut self, reference_degrees: f64, direction: f64, step_degrees: f64) -> Adjustment;

    fn update(&mut self, state: &StimulusState, event: &ResponseEvent) -> Adjustment;

    /// The policy's own stop rule has been met.
    fn is_converged(&self) -> bool {
        false
    }
}

/// 1-up/1-down staircase: each response moves the edge one step in the
/// answered direction; reversals optionally shrink the step, never below
/// `min_step_degrees`. Converges after `max_reversals` reversals.
#[derive(Debug, Clone)]
pub struct UpDownStaircase {
    config: UpDownConfig,
    reversals: usize,
    converged: bool,
}

impl UpDownStaircase {
    pub fn new(config: UpDownConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            reversals: 0,
            converged: false,
        })
    }

    pub fn reversals(&self) -> usize {
        self.reversals
    }

    fn floor(&self, step_degrees: f64) -> f64 {
        match self.config.min_step_degrees {
            Some(min) => step_degrees.max(min),
            None => step_degrees,
        }
    }
}

impl Staircase for UpDownStaircase {
    fn start(&mut self, reference_degrees: f64, direction: f64, step_degrees: f64) -> Adjustment {
        self.reversals = 0;
        self.converged = false;
        Adjustment {
            angle_degrees: reference_degrees + direction * self.config.start_offset_degrees,
            step_degrees: self.floor(step_degrees),
        }
    }

    fn update(&mut self, state: &StimulusState, event: &ResponseEvent) -> Adjustment {
        let angle_degrees = state.angle_degrees + event.response.sign() * state.step_degrees;
        let mut step_degrees = state.step_degrees;

        if event.reversal {
            self.reversals = event.reversals;
            if self.config.halve_on_reversal {
                step_degrees = self.floor(step_degrees * self.config.reversal_factor);
                debug!(step_degrees, reversals = self.reversals, "step reduced on reversal");
            }
        }

        self.converged = self
            .config
            .max_reversals
            .is_some_and(|max| self.reversals >= max);

        Adjustment {
            angle_degrees,
            step_degrees,
        }
    }

    fn is_converged(&self) -> bool {
        self.converged
    }
}

/// Presents `reference + direction * level`, with `level` chosen by Psi.
#[derive(Debug, Clone)]
pub struct PsiStaircase {
    psi: Psi,
    reference_degrees: f64,
    direction: f64,
}

impl PsiStaircase {
    pub fn new(psi: Psi) -> Self {
        Self {
            psi,
            reference_degrees: 0.0,
            direction: 1.0,
        }
    }

    pub fn psi(&self) -> &Psi {
        &self.psi
    }

    fn angle(&self) -> f64 {
        self.reference_degrees + self.direction * self.psi.current_level()
    }
}

impl Staircase for PsiStaircase {
    fn start(&mut self, reference_degrees: f64, direction: f64, _step_degrees: f64) -> Adjustment {
        self.reference_degrees = reference_degrees;
        self.direction = direction;
        Adjustment {
            angle_degrees: self.angle(),
            step_degrees: self.psi.current_level(),
        }
    }

    fn update(&mut self, state: &StimulusState, event: &ResponseEvent) -> Adjustment {
        self.psi.add_data(event.correct);
        let angle_degrees = self.angle();
        Adjustment {
            angle_degrees,
            step_degrees: (angle_degrees - state.angle_degrees).abs(),
        }
    }
}

/// The staircase chosen in the experiment configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredStaircase {
    UpDown(UpDownStaircase),
    Psi(Box<PsiStaircase>),
}

impl ConfiguredStaircase {
    pub fn from_config(config: &StaircaseConfig) -> Result<Self, ConfigError> {
        Ok(match config {
            StaircaseConfig::UpDown(c) => ConfiguredStaircase::UpDown(UpDownStaircase::new(c.clone())?),
            StaircaseConfig::Psi(c) => {
                ConfiguredStaircase::Psi(Box::new(PsiStaircase::new(Psi::new(c)?)))
            }
        })
    }

    pub fn psi_estimates(&self) -> Option<&PsiEstimates> {
        match self {
            ConfiguredStaircase::Psi(p) => p.psi().estimates(),
            ConfiguredStaircase::UpDown(_) => None,
        }
    }
}

impl Staircase for ConfiguredStaircase {
    fn start(&mut self, reference_degrees: f64, direction: f64, step_degrees: f64) -> Adjustment {
        match self {
            ConfiguredStaircase::UpDown(s) => s.start(reference_degrees, direction, step_degrees),
            ConfiguredStaircase::Psi(s) => s.start(reference_degrees, direction, step_degrees),
        }
    }

    fn update(&mut self, state: &StimulusState, event: &ResponseEvent) -> Adjustment {
        match self {
            ConfiguredStaircase::UpDown(s) => s.update(state, event),
            ConfiguredStaircase::Psi(s) => s.update(state, event),
        }
    }

    fn is_converged(&self) -> bool {
        match self {
            ConfiguredStaircase::UpDown(s) => s.is_converged(),
            ConfiguredStaircase::Psi(s) => s.is_converged(),
        }
    }
}
