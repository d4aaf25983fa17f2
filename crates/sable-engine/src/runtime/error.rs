//! Evaluator error types.

use super::value::Value;

/// Abrupt termination of evaluation
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A target exception; lowered `catch` handlers see this
    #[error("Uncaught exception: {0}")]
    Thrown(Value),

    /// Evaluator fault (bad operand, unknown callee, step limit); never catchable
    #[error("Evaluation fault: {0}")]
    Fault(String),
}

impl RuntimeError {
    pub fn fault(message: impl Into<String>) -> Self {
        RuntimeError::Fault(message.into())
    }

    /// The thrown value, if this is a target exception
    pub fn thrown(&self) -> Option<&Value> {
        match self {
            RuntimeError::Thrown(v) => Some(v),
            RuntimeError::Fault(_) => None,
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
