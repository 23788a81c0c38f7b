//! Pre-flight gate on the declared media type of a selected file.

use crate::document::{Document, MediaType, SelectedFile};

/// Rejection reason for any type outside the accepted set.
pub const UNSUPPORTED_TYPE: &str = "unsupported type";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(MediaType),
    Rejected(String),
}

/// Check the declared type against `application/pdf`, `image/jpeg`, `image/png`.
///
/// Advisory only: the coordinator decides which phase follows.
pub fn validate(file: &SelectedFile) -> Verdict {
    match MediaType::from_mime(&file.declared_type) {
        Some(media_type) => Verdict::Accepted(media_type),
        None => Verdict::Rejected(UNSUPPORTED_TYPE.to_string()),
    }
}

/// Validate and, if accepted, seal the file into a [`Document`].
pub fn accept(file: SelectedFile) -> Result<Document, String> {
    match validate(&file) {
        Verdict::Accepted(media_type) => Ok(Document::accept(file, media_type)),
        Verdict::Rejected(reason) => Err(reason),
    }
}
