//! medsummary - guided workflow for getting a plain-language summary of a
//! lab report or medicine label.
//!
//! The core is the [`workflow::Coordinator`]: it validates the selected file,
//! collects the output language, gates the upload behind an explicit
//! confirmation, issues exactly one analysis call, and reveals the result
//! progressively. A [`guard::SessionGuard`] can pull the workflow back to idle
//! at any point when the session is lost.

pub mod analyzer;
pub mod config;
pub mod document;
pub mod error;
pub mod guard;
pub mod language;
pub mod openrouter;
pub mod prompt;
pub mod reveal;
pub mod session;
pub mod validator;
pub mod workflow;

pub use analyzer::{AnalysisInput, Analyzer, ArtifactKind};
pub use document::{Document, MediaType, SelectedFile};
pub use error::{AnalysisError, WorkflowError};
pub use language::Language;
pub use workflow::{Coordinator, Phase, PhaseKind, WorkflowSettings};
