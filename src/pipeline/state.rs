//! Lifecycle state machine of the pipeline controller.

use std::fmt;

/// State of the pipeline controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Components not bound yet.
    Uninitialized,
    /// Stages configured, camera idle.
    Initialized,
    /// Worker thread processing frames.
    Running,
    /// Worker joined. Terminal.
    Stopped,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

/// Lifecycle operations that change the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init,
    Start,
    Stop,
}

impl PipelineState {
    /// State reached by applying `op`, or `None` if `op` is not allowed
    /// from this state.
    pub fn transition(self, op: Operation) -> Option<PipelineState> {
        match (self, op) {
            (Self::Uninitialized, Operation::Init) => Some(Self::Initialized),
            (Self::Initialized, Operation::Start) => Some(Self::Running),
            (Self::Running, Operation::Stop) => Some(Self::Stopped),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Start => "start",
            Self::Stop => "stop",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [PipelineState; 4] = [
        PipelineState::Uninitialized,
        PipelineState::Initialized,
        PipelineState::Running,
        PipelineState::Stopped,
    ];
    const OPS: [Operation; 3] = [Operation::Init, Operation::Start, Operation::Stop];

    #[test]
    fn test_only_forward_transitions_are_valid() {
        let mut valid = Vec::new();
        for state in STATES {
            for op in OPS {
                if let Some(next) = state.transition(op) {
                    valid.push((state, op, next));
                }
            }
        }
        assert_eq!(
            valid,
            vec![
                (PipelineState::Uninitialized, Operation::Init, PipelineState::Initialized),
                (PipelineState::Initialized, Operation::Start, PipelineState::Running),
                (PipelineState::Running, Operation::Stop, PipelineState::Stopped),
            ]
        );
    }

    #[test]
    fn test_stopped_is_terminal() {
        for op in OPS {
            assert_eq!(PipelineState::Stopped.transition(op), None);
        }
    }
}
