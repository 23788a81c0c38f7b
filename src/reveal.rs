//! Progressive reveal of a finished result string.
//!
//! [`RevealSession`] is the pure part: an iterator yielding growing prefixes
//! (one character at a time) followed by a single [`RevealFrame::Complete`].
//! [`spawn_reveal`] paces a session on a timer and hands the frames out
//! through a [`RevealStream`] that stops emitting the moment it is cancelled.

use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// One emission of the reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealFrame {
    /// Text revealed so far.
    Partial(String),
    /// Reveal finished; carries the full text. Emitted exactly once, after the last partial.
    Complete(String),
}

impl RevealFrame {
    pub fn text(&self) -> &str {
        match self {
            Self::Partial(text) | Self::Complete(text) => text,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Reveal state over one fixed source text. Consumed by iteration, so it cannot restart.
#[derive(Debug, Clone)]
pub struct RevealSession {
    source: String,
    /// Byte offset just past each character.
    ends: Vec<usize>,
    revealed: usize,
    completed: bool,
}

impl RevealSession {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let ends = source
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .collect();
        Self {
            source,
            ends,
            revealed: 0,
            completed: false,
        }
    }

    pub fn source_text(&self) -> &str {
        &self.source
    }

    /// Length of the source in characters.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    pub fn revealed_len(&self) -> usize {
        self.revealed
    }

    pub fn is_active(&self) -> bool {
        self.revealed < self.len()
    }

    pub fn revealed_text(&self) -> &str {
        match self.revealed {
            0 => "",
            n => &self.source[..self.ends[n - 1]],
        }
    }
}

impl Iterator for RevealSession {
    type Item = RevealFrame;

    fn next(&mut self) -> Option<RevealFrame> {
        if self.revealed < self.len() {
            self.revealed += 1;
            Some(RevealFrame::Partial(self.revealed_text().to_string()))
        } else if !self.completed {
            self.completed = true;
            Some(RevealFrame::Complete(self.source.clone()))
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len() - self.revealed + usize::from(!self.completed);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RevealSession {}

impl FusedIterator for RevealSession {}

/// Observable progress of a running reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealProgress {
    pub total_len: usize,
    pub revealed_len: usize,
    pub completed: bool,
}

impl RevealProgress {
    pub fn start(total_len: usize) -> Self {
        Self {
            total_len,
            revealed_len: 0,
            completed: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revealed_len < self.total_len
    }

    pub(crate) fn observe(&mut self, frame: &RevealFrame) {
        match frame {
            RevealFrame::Partial(text) => self.revealed_len = text.chars().count(),
            RevealFrame::Complete(_) => {
                self.revealed_len = self.total_len;
                self.completed = true;
            }
        }
    }
}

/// Paced, cancellable view of a reveal running on a background task.
///
/// Dropping the stream cancels it.
pub struct RevealStream {
    frames: mpsc::Receiver<RevealFrame>,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Start revealing `session`: the first frame goes out immediately, each further
/// character `interval` after the previous one was taken, and the completion
/// signal right after the last character.
pub fn spawn_reveal(session: RevealSession, interval: Duration) -> RevealStream {
    // tokio intervals panic on a zero period
    let interval = interval.max(Duration::from_millis(1));
    let (tx, frames) = mpsc::channel(1);
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();

    debug!(
        "Starting reveal of {} chars at {:?} per char",
        session.len(),
        interval
    );

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first = true;

        for frame in session {
            // Hold off until the previous frame has been taken, so a late reader
            // resumes at the cadence instead of draining a backlog.
            let Ok(permit) = tx.reserve().await else {
                return;
            };
            if !first && !frame.is_complete() {
                ticker.reset();
                ticker.tick().await;
            }
            first = false;
            if flag.load(Ordering::Acquire) {
                return;
            }
            permit.send(frame);
        }
    });

    RevealStream {
        frames,
        cancelled,
        task,
    }
}

impl RevealStream {
    /// Next frame, or `None` once the reveal has finished or was cancelled.
    pub async fn next(&mut self) -> Option<RevealFrame> {
        if self.is_cancelled() {
            return None;
        }
        let frame = self.frames.recv().await?;
        if self.is_cancelled() {
            return None;
        }
        Some(frame)
    }

    /// Stop the reveal. No frame is handed out after this returns.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            debug!("Reveal cancelled");
        }
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for RevealStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
