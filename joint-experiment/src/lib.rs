pub mod config;
pub mod controller;
pub mod psi;
pub mod staircase;
pub mod state;

pub use config::{
    validate_participant, ConfigError, ControllerConfig, ExperimentConfig, PsiConfig,
    SessionConfig, StaircaseConfig, UpDownConfig,
};
pub use controller::{ControllerStatus, TrialController, Transition};
pub use psi::{Prior, Psi, PsiEstimates, PsychometricFunction};
pub use staircase::{ConfiguredStaircase, PsiStaircase, Staircase, UpDownStaircase};
pub use state::{ExperimentEvent, ExperimentStateMachine, SessionSummary};
