pub mod error;
pub mod geometry;
pub mod participant;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use error::{JointError, JointResult};
pub use geometry::{compute_quad, AngleBounds, Point, Quad, QuadMemo, Viewport};
pub use participant::{Gender, Handedness, ParticipantProfile};
pub use phase::{Phase, StandardPhase};
pub use stimulus::{Palette, Response, Side, StimulusState};
pub use trial::{CorrectAnswer, TrialRecord};
