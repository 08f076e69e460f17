use crate::error::TaskError;

/// What a decode task delivers downstream.
///
/// A task emits zero or more non-final `Value`s followed by exactly one
/// terminal outcome: either `Value { is_final: true, .. }` or `Error`.
///
/// ```text
///   Value(a₀, false) → Value(a₁, false) → … → Value(aₙ, true)
///   Value(a₀, false) → … → Error(e)
/// ```
#[derive(Debug)]
pub enum Outcome<A> {
    /// A decoded artifact. `is_final` marks the full-fidelity result.
    Value { artifact: A, is_final: bool },

    /// The task failed. Always terminal.
    Error(TaskError),
}

impl<A> Outcome<A> {
    /// Whether this outcome ends the task.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Value { is_final, .. } => *is_final,
            Self::Error(_) => true,
        }
    }

    pub fn into_result(self) -> Result<A, TaskError> {
        match self {
            Self::Value { artifact, .. } => Ok(artifact),
            Self::Error(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeFailure;

    #[test]
    fn terminal_classification() {
        let progressive: Outcome<u8> = Outcome::Value {
            artifact: 1,
            is_final: false,
        };
        let last: Outcome<u8> = Outcome::Value {
            artifact: 2,
            is_final: true,
        };
        let failed: Outcome<u8> = Outcome::Error(DecodeFailure::NoArtifact.into());

        assert!(!progressive.is_terminal());
        assert!(last.is_terminal());
        assert!(failed.is_terminal());
    }
}
