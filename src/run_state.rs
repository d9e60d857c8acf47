use crate::error::HarvestError;
use std::fmt;

/// Phase of a harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Idle,
    Resolving,
    Enumerating,
    Collecting,
    Finalizing,
    Done,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }

    fn successor(self) -> Option<RunPhase> {
        match self {
            RunPhase::Idle => Some(RunPhase::Resolving),
            RunPhase::Resolving => Some(RunPhase::Enumerating),
            RunPhase::Enumerating => Some(RunPhase::Collecting),
            RunPhase::Collecting => Some(RunPhase::Finalizing),
            RunPhase::Finalizing => Some(RunPhase::Done),
            RunPhase::Done | RunPhase::Failed => None,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks the phase of a run and refuses out-of-order transitions.
///
/// Phases advance strictly in order: `Idle`, `Resolving`, `Enumerating`,
/// `Collecting`, `Finalizing`, `Done`. Any non-terminal phase may drop to `Failed`.
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    phase: RunPhase,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn advance(&mut self, to: RunPhase) -> Result<(), HarvestError> {
        let allowed = match to {
            RunPhase::Failed => !self.phase.is_terminal(),
            _ => self.phase.successor() == Some(to),
        };
        if !allowed {
            return Err(HarvestError::IllegalTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Moves to `Failed` unless the run already ended.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = RunPhase::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() -> Result<(), HarvestError> {
        let mut state = RunStateMachine::new();
        for phase in [
            RunPhase::Resolving,
            RunPhase::Enumerating,
            RunPhase::Collecting,
            RunPhase::Finalizing,
            RunPhase::Done,
        ] {
            state.advance(phase)?;
        }
        assert_eq!(state.phase(), RunPhase::Done);
        Ok(())
    }

    #[test]
    fn skipping_a_phase_is_illegal() {
        let mut state = RunStateMachine::new();
        state.advance(RunPhase::Resolving).unwrap();
        let err = state.advance(RunPhase::Collecting).unwrap_err();
        assert!(matches!(
            err,
            HarvestError::IllegalTransition {
                from: RunPhase::Resolving,
                to: RunPhase::Collecting
            }
        ));
    }

    #[test]
    fn failed_is_terminal() {
        let mut state = RunStateMachine::new();
        state.advance(RunPhase::Resolving).unwrap();
        state.advance(RunPhase::Failed).unwrap();
        assert!(state.advance(RunPhase::Enumerating).is_err());
        assert!(state.advance(RunPhase::Failed).is_err());
        state.fail();
        assert_eq!(state.phase(), RunPhase::Failed);
    }
}
