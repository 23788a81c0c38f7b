//! Pure transition function of the analysis workflow.
//!
//! `transition` never performs I/O. Anything the coordinator must do as a
//! consequence (issue the call, start or discard the reveal, expire the
//! session) comes back as an [`Effect`].

use crate::document::{Document, SelectedFile};
use crate::error::{AnalysisError, WorkflowError};
use crate::language::Language;
use crate::validator;

use super::phase::{Phase, Ticket};

#[derive(Debug, Clone)]
pub enum Event {
    FileSelected(SelectedFile),
    LanguageChosen(Language),
    AnalysisRequested,
    Cancelled,
    /// The coordinator allocates the ticket for the call about to be issued.
    Confirmed { ticket: Ticket },
    AnalysisCompleted {
        ticket: Ticket,
        outcome: Result<String, AnalysisError>,
    },
    Dismissed,
    NewDocument,
    SessionExpired,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FileSelected(_) => "select a file",
            Self::LanguageChosen(_) => "choose a language",
            Self::AnalysisRequested => "request analysis",
            Self::Cancelled => "cancel",
            Self::Confirmed { .. } => "confirm",
            Self::AnalysisCompleted { .. } => "complete an analysis",
            Self::Dismissed => "dismiss",
            Self::NewDocument => "start a new document",
            Self::SessionExpired => "expire the session",
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone)]
pub enum Effect {
    None,
    IssueAnalysis {
        ticket: Ticket,
        document: Document,
        language: Language,
    },
    StartReveal(String),
    /// Drop the in-flight call and any reveal belonging to the current request.
    DiscardRequest,
    /// The service rejected the credential: evict and leave the workflow.
    ExpireSession,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub next: Phase,
    pub effect: Effect,
}

impl Step {
    fn to(next: Phase) -> Self {
        Self {
            next,
            effect: Effect::None,
        }
    }

    fn with(next: Phase, effect: Effect) -> Self {
        Self { next, effect }
    }
}

pub fn transition(phase: &Phase, event: Event) -> Result<Step, WorkflowError> {
    let invalid = |event: &Event| WorkflowError::InvalidTransition {
        phase: phase.kind(),
        event: event.name(),
    };

    match (phase, event) {
        // Session loss wins over everything, from any phase.
        (_, Event::SessionExpired) => Ok(Step::with(Phase::Idle, Effect::DiscardRequest)),

        (Phase::Idle, Event::FileSelected(file)) => Ok(match validator::accept(file) {
            Ok(document) => Step::to(Phase::DocumentAccepted {
                document,
                language: None,
            }),
            Err(reason) => Step::to(Phase::Failed {
                error_message: reason,
            }),
        }),

        (Phase::DocumentAccepted { document, .. }, Event::LanguageChosen(language)) => {
            Ok(Step::to(Phase::DocumentAccepted {
                document: document.clone(),
                language: Some(language),
            }))
        }

        (Phase::DocumentAccepted { document, language }, Event::AnalysisRequested) => {
            let language = (*language).ok_or(WorkflowError::LanguageRequired)?;
            Ok(Step::to(Phase::ConfirmPending {
                document: document.clone(),
                language,
            }))
        }

        // Rolls back without clearing the selections.
        (Phase::ConfirmPending { document, language }, Event::Cancelled) => {
            Ok(Step::to(Phase::DocumentAccepted {
                document: document.clone(),
                language: Some(*language),
            }))
        }

        (Phase::ConfirmPending { document, language }, Event::Confirmed { ticket }) => {
            Ok(Step::with(
                Phase::Analyzing {
                    ticket,
                    document: document.clone(),
                    language: *language,
                },
                Effect::IssueAnalysis {
                    ticket,
                    document: document.clone(),
                    language: *language,
                },
            ))
        }

        (Phase::Analyzing { ticket: current, .. }, Event::AnalysisCompleted { ticket, outcome })
            if *current == ticket =>
        {
            Ok(match outcome {
                Ok(result_text) => Step::with(
                    Phase::Succeeded {
                        result_text: result_text.clone(),
                    },
                    Effect::StartReveal(result_text),
                ),
                Err(AnalysisError::Unauthorized) => Step::with(Phase::Idle, Effect::ExpireSession),
                Err(err) => Step::to(Phase::Failed {
                    error_message: err.user_message(),
                }),
            })
        }

        (_, Event::AnalysisCompleted { ticket, .. }) => {
            Err(WorkflowError::StaleCompletion { ticket })
        }

        (Phase::Analyzing { .. }, _) => Err(WorkflowError::AnalysisInFlight),

        (Phase::Failed { .. }, Event::Dismissed) => Ok(Step::to(Phase::Idle)),

        (Phase::Succeeded { .. }, Event::NewDocument) => {
            Ok(Step::with(Phase::Idle, Effect::DiscardRequest))
        }

        (_, event) => Err(invalid(&event)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GENERIC_FAILURE;
    use crate::validator::UNSUPPORTED_TYPE;
    use crate::workflow::PhaseKind;

    fn pdf() -> SelectedFile {
        SelectedFile::new("report.pdf", "application/pdf", b"%PDF-1.4".to_vec())
    }

    fn step(phase: &Phase, event: Event) -> Step {
        transition(phase, event).expect("transition should be allowed")
    }

    fn confirm_pending() -> Phase {
        let accepted = step(&Phase::Idle, Event::FileSelected(pdf())).next;
        let chosen = step(&accepted, Event::LanguageChosen(Language::Hindi)).next;
        step(&chosen, Event::AnalysisRequested).next
    }

    fn analyzing(ticket: Ticket) -> Phase {
        step(&confirm_pending(), Event::Confirmed { ticket }).next
    }

    #[test]
    fn test_accepted_file_stores_document() {
        let next = step(&Phase::Idle, Event::FileSelected(pdf())).next;
        assert_eq!(next.kind(), PhaseKind::DocumentAccepted);
        assert_eq!(next.document().unwrap().name(), "report.pdf");
        assert_eq!(next.language(), None);
    }

    #[test]
    fn test_rejected_file_fails_with_reason() {
        let docx = SelectedFile::new(
            "notes.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            vec![0u8; 4],
        );
        let next = step(&Phase::Idle, Event::FileSelected(docx)).next;
        assert_eq!(next.error_message(), Some(UNSUPPORTED_TYPE));
        assert_eq!(next.result_text(), None);
    }

    #[test]
    fn test_request_requires_language() {
        let accepted = step(&Phase::Idle, Event::FileSelected(pdf())).next;
        let err = transition(&accepted, Event::AnalysisRequested).unwrap_err();
        assert_eq!(err, WorkflowError::LanguageRequired);
    }

    #[test]
    fn test_language_can_change_before_request() {
        let accepted = step(&Phase::Idle, Event::FileSelected(pdf())).next;
        let first = step(&accepted, Event::LanguageChosen(Language::Tamil)).next;
        let second = step(&first, Event::LanguageChosen(Language::Telugu)).next;
        assert_eq!(second.language(), Some(Language::Telugu));
    }

    #[test]
    fn test_language_before_document_is_invalid() {
        let err = transition(&Phase::Idle, Event::LanguageChosen(Language::English)).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::InvalidTransition {
                phase: PhaseKind::Idle,
                event: "choose a language",
            }
        );
    }

    #[test]
    fn test_cancel_keeps_selections() {
        let next = step(&confirm_pending(), Event::Cancelled).next;
        assert_eq!(next.kind(), PhaseKind::DocumentAccepted);
        assert_eq!(next.language(), Some(Language::Hindi));
        assert_eq!(next.document().unwrap().name(), "report.pdf");
    }

    #[test]
    fn test_confirm_issues_single_call() {
        let step = step(&confirm_pending(), Event::Confirmed { ticket: Ticket(7) });
        assert_eq!(step.next.kind(), PhaseKind::Analyzing);
        match step.effect {
            Effect::IssueAnalysis {
                ticket, language, ..
            } => {
                assert_eq!(ticket, Ticket(7));
                assert_eq!(language, Language::Hindi);
            }
            other => panic!("expected IssueAnalysis, got {:?}", other),
        }
    }

    #[test]
    fn test_second_confirm_while_analyzing_is_rejected() {
        let phase = analyzing(Ticket(1));
        let err = transition(&phase, Event::Confirmed { ticket: Ticket(2) }).unwrap_err();
        assert_eq!(err, WorkflowError::AnalysisInFlight);
        let err = transition(&phase, Event::NewDocument).unwrap_err();
        assert_eq!(err, WorkflowError::AnalysisInFlight);
    }

    #[test]
    fn test_success_starts_reveal() {
        let step = step(
            &analyzing(Ticket(1)),
            Event::AnalysisCompleted {
                ticket: Ticket(1),
                outcome: Ok("Summary: all normal.".to_string()),
            },
        );
        assert_eq!(step.next.result_text(), Some("Summary: all normal."));
        assert!(matches!(step.effect, Effect::StartReveal(ref t) if t == "Summary: all normal."));
    }

    #[test]
    fn test_unauthorized_forces_idle_without_error() {
        let step = step(
            &analyzing(Ticket(1)),
            Event::AnalysisCompleted {
                ticket: Ticket(1),
                outcome: Err(AnalysisError::Unauthorized),
            },
        );
        assert_eq!(step.next.kind(), PhaseKind::Idle);
        assert_eq!(step.next.error_message(), None);
        assert!(matches!(step.effect, Effect::ExpireSession));
    }

    #[test]
    fn test_failures_map_to_messages() {
        let rejected = step(
            &analyzing(Ticket(1)),
            Event::AnalysisCompleted {
                ticket: Ticket(1),
                outcome: Err(AnalysisError::rejected("Not a lab report")),
            },
        );
        assert_eq!(rejected.next.error_message(), Some("Not a lab report"));

        let transport = step(
            &analyzing(Ticket(1)),
            Event::AnalysisCompleted {
                ticket: Ticket(1),
                outcome: Err(AnalysisError::transport("timed out")),
            },
        );
        assert_eq!(transport.next.error_message(), Some(GENERIC_FAILURE));
    }

    #[test]
    fn test_stale_completion_is_refused() {
        let err = transition(
            &analyzing(Ticket(2)),
            Event::AnalysisCompleted {
                ticket: Ticket(1),
                outcome: Ok("late".to_string()),
            },
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::StaleCompletion { ticket: Ticket(1) });

        let err = transition(
            &Phase::Idle,
            Event::AnalysisCompleted {
                ticket: Ticket(2),
                outcome: Ok("late".to_string()),
            },
        )
        .unwrap_err();
        assert_eq!(err, WorkflowError::StaleCompletion { ticket: Ticket(2) });
    }

    #[test]
    fn test_dismiss_and_new_document_return_to_idle() {
        let failed = Phase::Failed {
            error_message: "boom".to_string(),
        };
        assert_eq!(step(&failed, Event::Dismissed).next.kind(), PhaseKind::Idle);

        let succeeded = Phase::Succeeded {
            result_text: "done".to_string(),
        };
        let step = step(&succeeded, Event::NewDocument);
        assert_eq!(step.next.kind(), PhaseKind::Idle);
        assert!(matches!(step.effect, Effect::DiscardRequest));
    }

    #[test]
    fn test_session_expiry_from_any_phase() {
        for phase in [
            Phase::Idle,
            confirm_pending(),
            analyzing(Ticket(3)),
            Phase::Succeeded {
                result_text: "x".to_string(),
            },
        ] {
            let step = step(&phase, Event::SessionExpired);
            assert_eq!(step.next.kind(), PhaseKind::Idle);
            assert!(matches!(step.effect, Effect::DiscardRequest));
        }
    }

    #[test]
    fn test_result_and_error_never_both_set() {
        let phases = vec![
            Phase::Idle,
            step(&Phase::Idle, Event::FileSelected(pdf())).next,
            confirm_pending(),
            analyzing(Ticket(1)),
            Phase::Succeeded {
                result_text: "ok".to_string(),
            },
            Phase::Failed {
                error_message: "no".to_string(),
            },
        ];
        for phase in phases {
            assert!(
                !(phase.result_text().is_some() && phase.error_message().is_some()),
                "{:?} carries both",
                phase.kind()
            );
        }
    }
}
