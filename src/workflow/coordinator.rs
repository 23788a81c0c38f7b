//! Analysis Request Coordinator.
//!
//! Owns the active request: its phase, the single in-flight analysis call and
//! the reveal of the result. All mutation goes through [`transition`]; the
//! coordinator only carries out the effects it returns.
//!
//! Must be driven from inside a tokio runtime, since confirming spawns the call.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyzer::{AnalysisInput, Analyzer, ArtifactKind};
use crate::document::{Document, SelectedFile};
use crate::error::{AnalysisError, WorkflowError};
use crate::guard::SessionGuard;
use crate::language::Language;
use crate::reveal::{spawn_reveal, RevealFrame, RevealProgress, RevealSession, RevealStream};

use super::machine::{transition, Effect, Event, Step};
use super::phase::{Controls, Phase, PhaseKind, Ticket};

/// Timing knobs for the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Upper bound on one analysis call; exceeding it is a transport failure.
    pub analysis_timeout: Duration,
    /// Delay between revealed characters.
    pub reveal_interval: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(60),
            reveal_interval: Duration::from_millis(30),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Completion {
    pub(crate) ticket: Ticket,
    pub(crate) outcome: Result<String, AnalysisError>,
}

struct InFlight {
    ticket: Ticket,
    request_id: Uuid,
    task: JoinHandle<()>,
}

enum Wake {
    Completed(Option<Completion>),
    SessionLost,
}

pub struct Coordinator {
    phase: Phase,
    kind: ArtifactKind,
    analyzer: Arc<dyn Analyzer>,
    guard: SessionGuard,
    settings: WorkflowSettings,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: Option<InFlight>,
    reveal: Option<RevealStream>,
    progress: Option<RevealProgress>,
    next_ticket: u64,
}

impl Coordinator {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        guard: SessionGuard,
        kind: ArtifactKind,
        settings: WorkflowSettings,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            phase: Phase::Idle,
            kind,
            analyzer,
            guard,
            settings,
            completions_tx,
            completions_rx,
            in_flight: None,
            reveal: None,
            progress: None,
            next_ticket: 0,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn is_analyzing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn controls(&self) -> Controls {
        let reveal_complete = self.progress.is_some_and(|p| p.completed);
        Controls::for_phase(&self.phase, reveal_complete)
    }

    /// Progress of the current reveal, if the request has succeeded.
    pub fn reveal_progress(&self) -> Option<RevealProgress> {
        self.progress
    }

    // ========================================================================
    // User actions
    // ========================================================================

    pub fn select_file(&mut self, file: SelectedFile) -> Result<&Phase, WorkflowError> {
        self.dispatch(Event::FileSelected(file))
    }

    pub fn choose_language(&mut self, language: Language) -> Result<&Phase, WorkflowError> {
        self.dispatch(Event::LanguageChosen(language))
    }

    pub fn request_analysis(&mut self) -> Result<&Phase, WorkflowError> {
        self.dispatch(Event::AnalysisRequested)
    }

    pub fn cancel(&mut self) -> Result<&Phase, WorkflowError> {
        self.dispatch(Event::Cancelled)
    }

    /// Pass the confirmation gate and issue the analysis call.
    pub fn confirm(&mut self) -> Result<&Phase, WorkflowError> {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.dispatch(Event::Confirmed { ticket })
    }

    /// "Try again" from the error phase.
    pub fn dismiss(&mut self) -> Result<&Phase, WorkflowError> {
        self.dispatch(Event::Dismissed)
    }

    /// "Upload new document" from the result view. Discards the reveal.
    pub fn start_new(&mut self) -> Result<&Phase, WorkflowError> {
        self.dispatch(Event::NewDocument)
    }

    // ========================================================================
    // Asynchronous progress
    // ========================================================================

    /// Wait until the in-flight call lands in `Succeeded`, `Failed` or forced `Idle`.
    ///
    /// Returns immediately when nothing is in flight. A session loss observed
    /// while waiting takes precedence over the call's own completion.
    pub async fn settle(&mut self) -> &Phase {
        while self.in_flight.is_some() {
            let wake = tokio::select! {
                biased;
                _ = self.guard.lost() => Wake::SessionLost,
                completion = self.completions_rx.recv() => Wake::Completed(completion),
            };
            match wake {
                Wake::SessionLost => self.expire_session(),
                Wake::Completed(Some(completion)) => {
                    let _ = self.apply_completion(completion);
                }
                // We hold a sender, so this only happens if the runtime is shutting down.
                Wake::Completed(None) => break,
            }
        }
        &self.phase
    }

    /// Next reveal frame of the current result, or `None` when there is nothing
    /// (more) to reveal.
    pub async fn next_frame(&mut self) -> Option<RevealFrame> {
        if !self.guard.check() {
            self.force_idle();
            return None;
        }
        let frame = self.reveal.as_mut()?.next().await;
        if !self.guard.check() {
            self.force_idle();
            return None;
        }

        match &frame {
            Some(frame) => {
                if let Some(progress) = self.progress.as_mut() {
                    progress.observe(frame);
                }
                if frame.is_complete() {
                    self.reveal = None;
                }
            }
            None => self.reveal = None,
        }
        frame
    }

    pub(crate) fn apply_completion(
        &mut self,
        completion: Completion,
    ) -> Result<&Phase, WorkflowError> {
        let Completion { ticket, outcome } = completion;
        match self.dispatch(Event::AnalysisCompleted { ticket, outcome }) {
            Err(WorkflowError::StaleCompletion { ticket }) => {
                debug!("Ignoring late completion of {}", ticket);
                Err(WorkflowError::StaleCompletion { ticket })
            }
            other => other,
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn dispatch(&mut self, event: Event) -> Result<&Phase, WorkflowError> {
        if !self.guard.check() {
            self.force_idle();
            return Err(WorkflowError::SessionExpired);
        }
        let step = transition(&self.phase, event)?;
        self.enter(step);
        Ok(&self.phase)
    }

    fn enter(&mut self, step: Step) {
        let from = self.phase.kind();
        let Step { next, effect } = step;

        if from == PhaseKind::Analyzing && !next.is_analyzing() {
            self.release_in_flight();
        }
        self.phase = next;
        debug!("Phase {} -> {}", from, self.phase.kind());

        match effect {
            Effect::None => {}
            Effect::IssueAnalysis {
                ticket,
                document,
                language,
            } => self.issue(ticket, document, language),
            Effect::StartReveal(text) => self.start_reveal(text),
            Effect::DiscardRequest => self.discard(),
            Effect::ExpireSession => {
                self.discard();
                self.guard.expire();
            }
        }

        // Level-triggered: every phase entry re-checks the session.
        if !self.guard.check() {
            self.force_idle();
        }
    }

    fn issue(&mut self, ticket: Ticket, document: Document, language: Language) {
        let request_id = Uuid::new_v4();
        info!(
            "Issuing {} for {} ({}, {} bytes, sha256={}) in {} [request_id={}]",
            ticket,
            self.kind,
            document.media_type(),
            document.data().len(),
            document.digest(),
            language,
            request_id
        );

        let input = AnalysisInput {
            document,
            language,
            kind: self.kind,
            credential: self.guard.session().current_credential(),
        };
        let analyzer = self.analyzer.clone();
        let completions = self.completions_tx.clone();
        let timeout = self.settings.analysis_timeout;

        let task = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, analyzer.analyze(&input)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AnalysisError::Transport(format!(
                    "no response within {:?}",
                    timeout
                ))),
            };
            match &outcome {
                Ok(text) => info!(
                    "{} completed via {} ({} chars)",
                    ticket,
                    analyzer.name(),
                    text.chars().count()
                ),
                Err(e) => warn!("{} failed via {}: {}", ticket, analyzer.name(), e),
            }
            let _ = completions.send(Completion { ticket, outcome });
        });

        self.in_flight = Some(InFlight {
            ticket,
            request_id,
            task,
        });
    }

    fn start_reveal(&mut self, text: String) {
        let session = RevealSession::new(text);
        self.progress = Some(RevealProgress::start(session.len()));
        self.reveal = Some(spawn_reveal(session, self.settings.reveal_interval));
    }

    fn release_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            if !in_flight.task.is_finished() {
                debug!(
                    "Abandoning {} [request_id={}]",
                    in_flight.ticket, in_flight.request_id
                );
            }
            in_flight.task.abort();
        }
    }

    /// Drop everything that belongs to the current request.
    fn discard(&mut self) {
        self.release_in_flight();
        if let Some(reveal) = self.reveal.take() {
            reveal.cancel();
        }
        self.progress = None;
    }

    fn force_idle(&mut self) {
        self.discard();
        if !matches!(self.phase, Phase::Idle) {
            debug!("Phase {} -> {} (session lost)", self.phase.kind(), PhaseKind::Idle);
            self.phase = Phase::Idle;
        }
    }

    fn expire_session(&mut self) {
        if let Ok(step) = transition(&self.phase, Event::SessionExpired) {
            self.enter(step);
        }
        self.force_idle();
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.discard();
    }
}
