//! The remote analysis boundary.
//!
//! Defines the [`Analyzer`] trait so the coordinator can talk to the backend
//! service ([`http::HttpAnalyzer`]) or straight to a language model
//! ([`direct::DirectAnalyzer`]) without knowing which.

pub mod direct;
pub mod http;

use std::fmt;
use std::str::FromStr;

use crate::document::Document;
use crate::error::AnalysisError;
use crate::language::Language;
use crate::session::Credential;

/// What kind of medical artifact is being summarized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    #[default]
    LabReport,
    MedicineLabel,
}

impl ArtifactKind {
    /// Backend route that handles this kind.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::LabReport => "labreport",
            Self::MedicineLabel => "medicine",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LabReport => "lab report",
            Self::MedicineLabel => "medicine label",
        })
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lab-report" | "labreport" => Ok(Self::LabReport),
            "medicine" | "medicine-label" => Ok(Self::MedicineLabel),
            other => Err(format!("unknown artifact kind: {}", other)),
        }
    }
}

/// Everything one `analyze` call needs.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub document: Document,
    pub language: Language,
    pub kind: ArtifactKind,
    pub credential: Option<Credential>,
}

/// Async trait implemented by each analysis backend.
#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the plain-language summary text.
    async fn analyze(&self, input: &AnalysisInput) -> Result<String, AnalysisError>;
}
