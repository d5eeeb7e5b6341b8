/// Defines experiment phases and behavior
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    fn allows_input(&self) -> bool;
    fn next(&self) -> Option<Self>;

    /// Index of the test session this phase runs, if any.
    fn session(&self) -> Option<usize> {
        None
    }

    fn is_welcome(&self) -> bool {
        false
    }

    fn is_intermission(&self) -> bool {
        false
    }

    fn is_debrief(&self) -> bool {
        false
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum StandardPhase {
    #[default]
    Welcome,
    FirstSession,
    Intermission,
    SecondSession,
    Debrief,
}

impl Phase for StandardPhase {
    fn allows_input(&self) -> bool {
        self.session().is_some()
    }

    fn next(&self) -> Option<Self> {
        use StandardPhase::*;
        Some(match self {
            Welcome => FirstSession,
            FirstSession => Intermission,
            Intermission => SecondSession,
            SecondSession => Debrief,
            Debrief => return None,
        })
    }

    fn session(&self) -> Option<usize> {
        match self {
            StandardPhase::FirstSession => Some(0),
            StandardPhase::SecondSession => Some(1),
            _ => None,
        }
    }

    fn is_welcome(&self) -> bool {
        matches!(self, StandardPhase::Welcome)
    }

    fn is_intermission(&self) -> bool {
        matches!(self, StandardPhase::Intermission)
    }

    fn is_debrief(&self) -> bool {
        matches!(self, StandardPhase::Debrief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_run_in_order() {
        let mut phase = StandardPhase::default();
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            phase = next;
            seen.push(phase);
        }
        assert_eq!(seen.len(), 5);
        assert!(seen[0].is_welcome());
        assert_eq!(seen[1].session(), Some(0));
        assert!(seen[2].is_intermission());
        assert_eq!(seen[3].session(), Some(1));
        assert!(seen[4].is_debrief());
    }

    #[test]
    fn input_only_during_sessions() {
        assert!(!StandardPhase::Welcome.allows_input());
        assert!(StandardPhase::FirstSession.allows_input());
        assert!(!StandardPhase::Intermission.allows_input());
        assert!(StandardPhase::SecondSession.allows_input());
    }
}
