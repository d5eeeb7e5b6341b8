use thiserror::Error;

/// Errors raised by the stimulus geometry and the trial controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JointError {
    /// The viewport has a non-positive (or non-finite) dimension. The caller
    /// should skip drawing this frame.
    #[error("invalid viewport geometry: {width}x{height} (both dimensions must be > 0)")]
    InvalidGeometry { width: f64, height: f64 },

    /// A response arrived after the controller terminated. The caller should
    /// disable its response inputs.
    #[error("trial already complete after {trials} responses")]
    TrialAlreadyComplete { trials: usize },
}

pub type JointResult<T> = std::result::Result<T, JointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = JointError::InvalidGeometry {
            width: 0.0,
            height: 480.0,
        };
        assert!(format!("{err}").contains("0x480"));

        let err = JointError::TrialAlreadyComplete { trials: 50 };
        assert_eq!(format!("{err}"), "trial already complete after 50 responses");
    }
}
