use thiserror::Error;

/// Errors surfaced by the cleanup core.
///
/// Host-call failures are deliberately absent: a rejected host call is an
/// expected outcome (a vanished frame, an already-removed cookie) and is
/// logged at the call site rather than propagated.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CleanupError {
    #[error("invalid rule expression {expression:?}: {reason}")]
    InvalidRuleExpression { expression: String, reason: String },

    #[error("rule list rejected: {invalid} of {total} expressions failed to compile")]
    RuleListRejected { invalid: usize, total: usize },
}

impl CleanupError {
    /// Build an [`CleanupError::InvalidRuleExpression`] for `expression`.
    pub fn invalid_expression(expression: &str, reason: impl Into<String>) -> Self {
        CleanupError::InvalidRuleExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}
