//! Direct analyzer: local text extraction plus an OpenRouter completion.
//!
//! PDFs are read with lopdf and sent as text. Images go to a vision model as
//! an inline PNG, downscaled first so large phone photos stay within limits.

use image::imageops::FilterType;
use std::io::Cursor;
use tracing::{debug, info};

use super::{AnalysisInput, Analyzer, ArtifactKind};
use crate::document::MediaType;
use crate::error::AnalysisError;
use crate::openrouter::{Message, OpenRouterClient, OpenRouterError};
use crate::prompt::{self, PatientContext};

/// Longest image side sent to the model, in pixels.
pub const MAX_IMAGE_SIDE: u32 = 2048;

const NO_TEXT: &str = "Could not extract text from document";
const UNREADABLE_IMAGE: &str = "Could not read the uploaded image";
const IMAGE_PLACEHOLDER: &str = "(see the attached image)";
const SYSTEM_PROMPT: &str =
    "You are a careful medical assistant who explains medical documents to patients in simple language.";

pub struct DirectAnalyzer {
    client: OpenRouterClient,
    patient: PatientContext,
}

impl DirectAnalyzer {
    pub fn new(client: OpenRouterClient, patient: PatientContext) -> Self {
        Self { client, patient }
    }

    fn prompt(&self, kind: ArtifactKind, text: &str, input: &AnalysisInput) -> String {
        match kind {
            ArtifactKind::LabReport => prompt::lab_report_prompt(text, input.language, &self.patient),
            ArtifactKind::MedicineLabel => prompt::medicine_prompt(text, input.language, &self.patient),
        }
    }
}

#[async_trait::async_trait]
impl Analyzer for DirectAnalyzer {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn analyze(&self, input: &AnalysisInput) -> Result<String, AnalysisError> {
        let document = &input.document;
        let data = document.data().to_vec();

        let message = match document.media_type() {
            MediaType::Pdf => {
                let text = tokio::task::spawn_blocking(move || extract_pdf_text(&data))
                    .await
                    .map_err(AnalysisError::transport)?
                    .map_err(|e| {
                        debug!("PDF extraction failed: {:#}", e);
                        AnalysisError::rejected(NO_TEXT)
                    })?;
                if text.trim().is_empty() {
                    return Err(AnalysisError::rejected(NO_TEXT));
                }
                info!(
                    "DirectAnalyzer: extracted {} chars from {}",
                    text.chars().count(),
                    document.name()
                );
                Message::user(self.prompt(input.kind, &text, input))
            }
            MediaType::Jpeg | MediaType::Png => {
                let png = tokio::task::spawn_blocking(move || prepare_image(&data))
                    .await
                    .map_err(AnalysisError::transport)?
                    .map_err(|e| {
                        debug!("Image preparation failed: {:#}", e);
                        AnalysisError::rejected(UNREADABLE_IMAGE)
                    })?;
                info!(
                    "DirectAnalyzer: sending {} as {} byte PNG",
                    document.name(),
                    png.len()
                );
                Message::user_with_image(
                    self.prompt(input.kind, IMAGE_PLACEHOLDER, input),
                    "image/png",
                    &png,
                )
            }
        };

        let reply = self
            .client
            .chat(vec![Message::system(SYSTEM_PROMPT), message])
            .await
            .map_err(|e| match e {
                // The service key is ours, not the user's: never a session expiry.
                OpenRouterError::Api { .. } => {
                    debug!("{}", e);
                    AnalysisError::ServerRejected { reason: None }
                }
                OpenRouterError::Request(_) | OpenRouterError::Decode(_) => {
                    AnalysisError::transport(e)
                }
            })?;

        Ok(reply.trim().to_string())
    }
}

/// Extract text from a PDF file using lopdf.
fn extract_pdf_text(data: &[u8]) -> anyhow::Result<String> {
    let doc = lopdf::Document::load_from(Cursor::new(data))
        .map_err(|e| anyhow::anyhow!("Failed to load PDF: {}", e))?;

    let mut text = String::new();
    for page_num in doc.get_pages().into_keys() {
        if let Ok(content) = doc.extract_text(&[page_num]) {
            text.push_str(&content);
            text.push('\n');
        }
    }
    Ok(text)
}

/// Decode, downscale to [`MAX_IMAGE_SIDE`] and re-encode as PNG.
fn prepare_image(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let img = image::load_from_memory(data)?;
    let img = if img.width().max(img.height()) > MAX_IMAGE_SIDE {
        img.resize(MAX_IMAGE_SIDE, MAX_IMAGE_SIDE, FilterType::Triangle)
    } else {
        img
    };

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png)?;
    Ok(out.into_inner())
}
