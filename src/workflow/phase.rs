//! Workflow phases. Exactly one is active; per-phase data lives in the variant.

use std::fmt;

use crate::document::Document;
use crate::language::Language;

/// Identifies one outbound analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub(crate) u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "analysis #{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Phase {
    Idle,
    DocumentAccepted {
        document: Document,
        language: Option<Language>,
    },
    ConfirmPending {
        document: Document,
        language: Language,
    },
    Analyzing {
        ticket: Ticket,
        document: Document,
        language: Language,
    },
    Succeeded {
        result_text: String,
    },
    Failed {
        error_message: String,
    },
}

/// Data-free mirror of [`Phase`] for logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Idle,
    DocumentAccepted,
    ConfirmPending,
    Analyzing,
    Succeeded,
    Failed,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::DocumentAccepted => "document accepted",
            Self::ConfirmPending => "awaiting confirmation",
            Self::Analyzing => "analyzing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Self::Idle => PhaseKind::Idle,
            Self::DocumentAccepted { .. } => PhaseKind::DocumentAccepted,
            Self::ConfirmPending { .. } => PhaseKind::ConfirmPending,
            Self::Analyzing { .. } => PhaseKind::Analyzing,
            Self::Succeeded { .. } => PhaseKind::Succeeded,
            Self::Failed { .. } => PhaseKind::Failed,
        }
    }

    pub fn result_text(&self) -> Option<&str> {
        match self {
            Self::Succeeded { result_text } => Some(result_text),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { error_message } => Some(error_message),
            _ => None,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::DocumentAccepted { document, .. }
            | Self::ConfirmPending { document, .. }
            | Self::Analyzing { document, .. } => Some(document),
            _ => None,
        }
    }

    pub fn language(&self) -> Option<Language> {
        match self {
            Self::DocumentAccepted { language, .. } => *language,
            Self::ConfirmPending { language, .. } | Self::Analyzing { language, .. } => {
                Some(*language)
            }
            _ => None,
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, Self::Analyzing { .. })
    }
}

/// Which user affordances are enabled right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub select_file: bool,
    pub choose_language: bool,
    pub request_analysis: bool,
    pub confirm: bool,
    pub cancel: bool,
    pub start_new: bool,
    pub retry: bool,
}

impl Controls {
    /// `reveal_complete` gates "start new" the same way the result view does.
    pub fn for_phase(phase: &Phase, reveal_complete: bool) -> Self {
        let none = Self::default();
        match phase {
            Phase::Idle => Self {
                select_file: true,
                ..none
            },
            Phase::DocumentAccepted { language, .. } => Self {
                choose_language: true,
                request_analysis: language.is_some(),
                ..none
            },
            Phase::ConfirmPending { .. } => Self {
                confirm: true,
                cancel: true,
                ..none
            },
            Phase::Analyzing { .. } => none,
            Phase::Succeeded { .. } => Self {
                start_new: reveal_complete,
                ..none
            },
            Phase::Failed { .. } => Self {
                retry: true,
                ..none
            },
        }
    }
}
