use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Initializing,
    Disconnected,
    Stopped,
    Running,
}

impl Display for PumpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PumpState::Initializing => "Initializing".fmt(f),
            PumpState::Disconnected => "Disconnected".fmt(f),
            PumpState::Stopped => "Stopped".fmt(f),
            PumpState::Running => "Running".fmt(f),
        }
    }
}

/// Operating mode of one pump. The `pump_on` flag carried by every request
/// is derived from it and cannot be set on its own.
#[derive(Debug)]
pub struct StateTracker {
    current: PumpState,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            current: PumpState::Initializing,
        }
    }

    pub fn current(&self) -> PumpState {
        self.current
    }

    pub fn set(&mut self, state: PumpState) {
        self.current = state;
    }

    pub fn pump_on(&self) -> bool {
        self.current == PumpState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = PumpState> {
        prop_oneof![
            Just(PumpState::Initializing),
            Just(PumpState::Disconnected),
            Just(PumpState::Stopped),
            Just(PumpState::Running),
        ]
    }

    #[test]
    fn starts_initializing() {
        let tracker = StateTracker::new();
        assert_eq!(tracker.current(), PumpState::Initializing);
        assert!(!tracker.pump_on());
    }

    #[test]
    fn display_names_the_state() {
        assert_eq!(PumpState::Disconnected.to_string(), "Disconnected");
        assert_eq!(PumpState::Stopped.to_string(), "Stopped");
        assert_eq!(PumpState::Running.to_string(), "Running");
    }

    proptest! {
        #[test]
        fn pump_on_iff_running(states in prop::collection::vec(any_state(), 1..32)) {
            let mut tracker = StateTracker::new();
            for state in states {
                tracker.set(state);
                prop_assert_eq!(tracker.current(), state);
                prop_assert_eq!(tracker.pump_on(), state == PumpState::Running);
            }
        }
    }
}
