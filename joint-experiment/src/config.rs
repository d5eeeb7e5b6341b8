use std::path::{Path, PathBuf};

use joint_core::{AngleBounds, Palette, ParticipantProfile};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::psi::{Prior, PsychometricFunction};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("step size must be positive and finite, got {0}")]
    InvalidStep(f64),

    #[error("invalid angle bounds [{min}, {max}]")]
    InvalidBounds { min: f64, max: f64 },

    #[error("reversal factor must be in (0, 1], got {0}")]
    InvalidReversalFactor(f64),

    #[error("session direction must be 1 or -1, got {0}")]
    InvalidDirection(f64),

    #[error("{0} grid is empty")]
    EmptyGrid(&'static str),

    #[error("{name} value {value} is outside [0, 1]")]
    RateOutOfRange { name: &'static str, value: f64 },

    #[error("prior over the hypothesis grid has no mass")]
    DegeneratePrior,

    #[error("palette needs at least one color pair")]
    EmptyPalette,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings shared by every controller regardless of staircase policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub initial_step_degrees: f64,
    pub bounds: AngleBounds,
    /// Responses per session before the controller terminates.
    pub max_trials: Option<usize>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            initial_step_degrees: 2.0,
            bounds: AngleBounds::default(),
            max_trials: Some(50),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_step_degrees.is_finite() && self.initial_step_degrees > 0.0) {
            return Err(ConfigError::InvalidStep(self.initial_step_degrees));
        }
        if !self.bounds.is_valid() {
            return Err(ConfigError::InvalidBounds {
                min: self.bounds.min_degrees,
                max: self.bounds.max_degrees,
            });
        }
        Ok(())
    }
}

/// 1-up/1-down staircase settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpDownConfig {
    /// Distance from the reference at which a session starts.
    pub start_offset_degrees: f64,
    pub halve_on_reversal: bool,
    pub reversal_factor: f64,
    pub min_step_degrees: Option<f64>,
    pub max_reversals: Option<usize>,
}

impl Default for UpDownConfig {
    fn default() -> Self {
        Self {
            start_offset_degrees: 10.0,
            halve_on_reversal: true,
            reversal_factor: 0.5,
            min_step_degrees: Some(0.25),
            max_reversals: Some(12),
        }
    }
}

impl UpDownConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.start_offset_degrees.is_finite() {
            return Err(ConfigError::InvalidStep(self.start_offset_degrees));
        }
        if !(self.reversal_factor > 0.0 && self.reversal_factor <= 1.0) {
            return Err(ConfigError::InvalidReversalFactor(self.reversal_factor));
        }
        if let Some(min) = self.min_step_degrees {
            if !(min.is_finite() && min > 0.0) {
                return Err(ConfigError::InvalidStep(min));
            }
        }
        Ok(())
    }
}

/// Psi-marginal search space and priors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsiConfig {
    pub function: PsychometricFunction,
    pub threshold: Vec<f64>,
    pub threshold_prior: Prior,
    pub slope: Vec<f64>,
    pub slope_prior: Prior,
    pub guess_rate: Vec<f64>,
    pub guess_prior: Prior,
    pub lapse_rate: Vec<f64>,
    pub lapse_prior: Prior,
    /// Candidate offsets from the reference, in degrees.
    pub stim_levels: Vec<f64>,
    /// Sum out guess and lapse rates before scoring candidate levels.
    pub marginalize: bool,
}

impl Default for PsiConfig {
    fn default() -> Self {
        // 5.0 degrees is skipped: it marks the centre of the index finger.
        let stim_levels = (0..50)
            .map(|i| i as f64 / 10.0)
            .chain((51..100).map(|i| i as f64 / 10.0))
            .chain((10..16).map(|i| i as f64))
            .collect();
        Self {
            function: PsychometricFunction::Gumbel,
            threshold: linspace(0.0, 15.0, 61),
            threshold_prior: Prior::Normal {
                mean: 13.0,
                sd: 3.0,
            },
            slope: linspace(0.05, 1.0, 21),
            slope_prior: Prior::Gamma { shape: 2.0 },
            guess_rate: vec![0.5],
            guess_prior: Prior::Uniform,
            lapse_rate: linspace(0.0, 0.1, 15),
            lapse_prior: Prior::Beta {
                alpha: 2.0,
                beta: 20.0,
            },
            stim_levels,
            marginalize: true,
        }
    }
}

impl PsiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grids: [(&'static str, &Vec<f64>); 5] = [
            ("threshold", &self.threshold),
            ("slope", &self.slope),
            ("guess rate", &self.guess_rate),
            ("lapse rate", &self.lapse_rate),
            ("stimulus level", &self.stim_levels),
        ];
        for (name, grid) in grids {
            if grid.is_empty() {
                return Err(ConfigError::EmptyGrid(name));
            }
        }
        for (name, grid) in [("guess rate", &self.guess_rate), ("lapse rate", &self.lapse_rate)] {
            if let Some(&value) = grid.iter().find(|v| !(0.0..=1.0).contains(*v)) {
                return Err(ConfigError::RateOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

/// Evenly spaced values over `[start, stop]`, endpoints included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StaircaseConfig {
    UpDown(UpDownConfig),
    Psi(PsiConfig),
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        StaircaseConfig::UpDown(UpDownConfig::default())
    }
}

/// Reference edge of one session and the side its offsets approach from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub reference_degrees: f64,
    /// `1.0` adds offsets to the reference, `-1.0` subtracts them.
    pub direction: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reference_degrees: 0.0,
            direction: -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub controller: ControllerConfig,
    pub staircase: StaircaseConfig,
    pub sessions: [SessionConfig; 2],
    pub palette: Palette,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            staircase: StaircaseConfig::default(),
            sessions: [
                SessionConfig {
                    reference_degrees: 0.0,
                    direction: -1.0,
                },
                SessionConfig {
                    reference_degrees: 0.0,
                    direction: 1.0,
                },
            ],
            palette: Palette::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()?;
        match &self.staircase {
            StaircaseConfig::UpDown(c) => c.validate()?,
            StaircaseConfig::Psi(c) => c.validate()?,
        }
        for session in &self.sessions {
            if session.direction != 1.0 && session.direction != -1.0 {
                return Err(ConfigError::InvalidDirection(session.direction));
            }
            if !session.reference_degrees.is_finite() {
                return Err(ConfigError::InvalidBounds {
                    min: session.reference_degrees,
                    max: session.reference_degrees,
                });
            }
        }
        if self.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        Ok(())
    }
}

/// Rejects a participant whose operator-supplied step cannot drive a
/// staircase.
pub fn validate_participant(participant: &ParticipantProfile) -> Result<(), ConfigError> {
    match participant.initial_step_degrees {
        Some(step) if !(step.is_finite() && step > 0.0) => Err(ConfigError::InvalidStep(step)),
        _ => Ok(()),
    }
}
