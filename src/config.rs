use anyhow::{Context, Result};
use joint_core::ParticipantProfile;
use joint_experiment::{validate_participant, ExperimentConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "joint.json";

/// Everything the application reads at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub participant: ParticipantProfile,
    pub experiment: ExperimentConfig,
    /// TrueType font for on-screen labels. Labels are omitted without one.
    pub font_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("parsing configuration")?;
        config.experiment.validate()?;
        validate_participant(&config.participant)?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "configuration not found, using defaults");
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config =
            Self::from_json_str(&json).with_context(|| format!("loading {}", path.display()))?;

        let missing = config.participant.missing_fields();
        if !missing.is_empty() {
            warn!(?missing, "participant profile incomplete");
        }
        info!(
            path = %path.display(),
            subject = %config.participant.subject_key(),
            "configuration loaded"
        );
        Ok(config)
    }
}
