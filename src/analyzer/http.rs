//! Backend analyzer: uploads the document to the service's analysis route.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{AnalysisInput, Analyzer};
use crate::error::AnalysisError;

/// Successful response body.
#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    #[serde(rename = "llmResponse")]
    llm_response: Option<String>,
}

/// Error body; the service uses either key.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpAnalyzer {
    base_url: String,
    client: Client,
}

impl HttpAnalyzer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }
}

#[async_trait::async_trait]
impl Analyzer for HttpAnalyzer {
    fn name(&self) -> &str {
        "backend"
    }

    async fn analyze(&self, input: &AnalysisInput) -> Result<String, AnalysisError> {
        // No credential means the request could only come back 401.
        let credential = input
            .credential
            .as_ref()
            .ok_or(AnalysisError::Unauthorized)?;

        let url = format!("{}/{}", self.base_url, input.kind.endpoint());
        let document = &input.document;

        let part = Part::bytes(document.data().to_vec())
            .file_name(document.name().to_string())
            .mime_str(document.media_type().as_mime())
            .map_err(AnalysisError::transport)?;

        let form = Form::new()
            .part("file", part)
            .text("language", input.language.backend_id());

        info!(
            "HttpAnalyzer: POST {} ({} bytes, language={})",
            url,
            document.data().len(),
            input.language
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credential.token)
            .multipart(form)
            .send()
            .await
            .map_err(AnalysisError::transport)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("HttpAnalyzer: credential rejected ({})", status);
            return Err(AnalysisError::Unauthorized);
        }

        let body = response.text().await.map_err(AnalysisError::transport)?;

        if !status.is_success() {
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message.or(b.error));
            warn!(
                "HttpAnalyzer: service error ({}): {}",
                status,
                reason.as_deref().unwrap_or("no reason")
            );
            return Err(match reason {
                Some(reason) => AnalysisError::rejected(reason),
                None => AnalysisError::ServerRejected { reason: None },
            });
        }

        debug!("HttpAnalyzer: response body {} bytes", body.len());

        let parsed: AnalysisResponse = serde_json::from_str(&body).map_err(|e| {
            AnalysisError::Transport(format!("malformed response: {}", e))
        })?;

        parsed
            .llm_response
            .map(|text| text.trim().to_string())
            .ok_or_else(|| AnalysisError::Transport("response has no llmResponse".to_string()))
    }
}
