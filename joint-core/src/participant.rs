use crate::stimulus::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

impl Handedness {
    /// Side the edge anchors to for this participant.
    pub fn side(&self) -> Side {
        match self {
            Handedness::Left => Side::Left,
            Handedness::Right => Side::Right,
        }
    }
}

/// Participant details entered at setup. Body measurements are in
/// millimetres and are carried into the trial log unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantProfile {
    pub id: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub handedness: Handedness,
    pub finger_length_mm: Option<f64>,
    pub finger_width_mm: Option<f64>,
    pub mp_joint_radius_mm: Option<f64>,
    /// Operator-supplied starting step of the staircase.
    pub initial_step_degrees: Option<f64>,
}

impl Default for ParticipantProfile {
    fn default() -> Self {
        Self {
            id: "anonymous".to_string(),
            age: None,
            gender: None,
            handedness: Handedness::Right,
            finger_length_mm: None,
            finger_width_mm: None,
            mp_joint_radius_mm: None,
            initial_step_degrees: None,
        }
    }
}

impl ParticipantProfile {
    /// Label used to key this participant's data, e.g. `SUBJ_07`.
    pub fn subject_key(&self) -> String {
        format!("SUBJ_{}", self.id)
    }

    /// Fields an operator left empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.trim().is_empty() {
            missing.push("id");
        }
        if self.age.is_none() {
            missing.push("age");
        }
        if self.gender.is_none() {
            missing.push("gender");
        }
        if self.finger_length_mm.is_none() {
            missing.push("finger_length_mm");
        }
        if self.finger_width_mm.is_none() {
            missing.push("finger_width_mm");
        }
        if self.mp_joint_radius_mm.is_none() {
            missing.push("mp_joint_radius_mm");
        }
        if self.initial_step_degrees.is_none() {
            missing.push("initial_step_degrees");
        }
        missing
    }
}
