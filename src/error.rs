//! Error types for the analysis boundary and the workflow state machine.

use thiserror::Error;

use crate::workflow::{PhaseKind, Ticket};

/// Message shown when the analysis fails without a usable server reason.
pub const GENERIC_FAILURE: &str = "Failed to analyze the document. Please try again.";

/// Failure reported by an [`Analyzer`](crate::analyzer::Analyzer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The credential was rejected (HTTP 401/403). Retrying in place cannot succeed.
    #[error("session is no longer authorized")]
    Unauthorized,

    /// The service processed the request but declined it.
    #[error("analysis rejected: {}", reason.as_deref().unwrap_or("no reason given"))]
    ServerRejected { reason: Option<String> },

    /// Timeout, network failure or a malformed response body.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl AnalysisError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::ServerRejected {
            reason: (!reason.trim().is_empty()).then_some(reason),
        }
    }

    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }

    /// Text shown in the `Failed` phase.
    ///
    /// Only server rejections surface their own reason; everything else falls
    /// back to the generic retry message.
    pub fn user_message(&self) -> String {
        match self {
            Self::ServerRejected {
                reason: Some(reason),
            } => reason.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

/// A user action or completion that the workflow refused to apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("cannot {event} while {phase}")]
    InvalidTransition {
        phase: PhaseKind,
        event: &'static str,
    },

    #[error("an analysis is already in progress")]
    AnalysisInFlight,

    #[error("choose a language before requesting analysis")]
    LanguageRequired,

    #[error("session expired, log in again")]
    SessionExpired,

    #[error("discarded completion for {ticket}")]
    StaleCompletion { ticket: Ticket },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_with_reason_surfaces_reason() {
        let err = AnalysisError::rejected("File is not a lab report");
        assert_eq!(err.user_message(), "File is not a lab report");
    }

    #[test]
    fn test_blank_reason_falls_back_to_generic() {
        let err = AnalysisError::rejected("   ");
        assert_eq!(err, AnalysisError::ServerRejected { reason: None });
        assert_eq!(err.user_message(), GENERIC_FAILURE);
    }

    #[test]
    fn test_transport_uses_generic_message() {
        let err = AnalysisError::transport("connection reset");
        assert_eq!(err.user_message(), GENERIC_FAILURE);
        assert!(err.to_string().contains("connection reset"));
    }
}
