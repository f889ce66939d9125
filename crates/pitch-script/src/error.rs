//! Error types for compiling and running strategy scripts.

use std::time::Duration;

/// Everything that can go wrong while compiling or executing a script.
///
/// Every variant is recoverable from the host's point of view: the embedding
/// kernel records the message and carries on with a safe default.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// The source text could not be tokenized or parsed.
    #[error("syntax error at line {line}: {message}")]
    Syntax {
        /// 1-based source line.
        line: u32,
        /// Human readable description.
        message: String,
    },

    /// A well-formed program did something invalid while running.
    #[error("runtime error at line {line}: {message}")]
    Runtime {
        /// 1-based source line of the statement being executed.
        line: u32,
        /// Human readable description.
        message: String,
    },

    /// The script executed a `throw` statement that nothing caught.
    #[error("uncaught exception at line {line}: {message}")]
    Thrown {
        /// 1-based source line of the `throw`.
        line: u32,
        /// The thrown value rendered as a string.
        message: String,
    },

    /// The step budget ran out before the call returned.
    #[error("step budget of {0} exhausted")]
    StepBudgetExhausted(u64),

    /// The wall-clock budget ran out before the call returned.
    #[error("time budget of {0:?} exceeded")]
    TimeBudgetExceeded(Duration),

    /// The arrays and objects the script keeps alive outgrew the heap budget.
    #[error("heap budget of {0} bytes exhausted")]
    HeapExhausted(usize),

    /// Recursion went deeper than the configured limit.
    #[error("call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    /// The host asked for an entry point the script never defined.
    #[error("function `{0}` is not defined")]
    MissingFunction(String),

    /// A host value could not be converted into a script value.
    #[error("cannot marshal host value: {0}")]
    Marshal(String),
}

impl ScriptError {
    /// Returns true for failures caused by running out of a budget rather
    /// than by the script's own logic.
    #[must_use]
    pub fn is_budget(&self) -> bool {
        matches!(
            self,
            Self::StepBudgetExhausted(_)
                | Self::TimeBudgetExceeded(_)
                | Self::CallDepthExceeded(_)
                | Self::HeapExhausted(_)
        )
    }

    pub(crate) fn syntax(line: u32, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn runtime(line: u32, message: impl Into<String>) -> Self {
        Self::Runtime {
            line,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type ScriptResult<T> = Result<T, ScriptError>;
