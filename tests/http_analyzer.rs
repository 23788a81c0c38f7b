//! Analyzers against local stand-in services.

use axum::extract::Multipart;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use medsummary::analyzer::direct::DirectAnalyzer;
use medsummary::analyzer::http::HttpAnalyzer;
use medsummary::analyzer::{AnalysisInput, Analyzer, ArtifactKind};
use medsummary::document::SelectedFile;
use medsummary::error::AnalysisError;
use medsummary::language::Language;
use medsummary::openrouter::OpenRouterClient;
use medsummary::prompt::PatientContext;
use medsummary::session::Credential;
use medsummary::validator;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::io::Cursor;

const TOKEN: &str = "good-token";

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn input(file: SelectedFile, language: Language, kind: ArtifactKind, token: Option<&str>) -> AnalysisInput {
    AnalysisInput {
        document: validator::accept(file).unwrap(),
        language,
        kind,
        credential: token.map(Credential::new),
    }
}

fn pdf_input(token: Option<&str>) -> AnalysisInput {
    input(
        SelectedFile::new("report.pdf", "application/pdf", b"%PDF-1.4".to_vec()),
        Language::Hindi,
        ArtifactKind::LabReport,
        token,
    )
}

/// Answers with a description of what it received.
async fn echo(headers: HeaderMap, mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != format!("Bearer {}", TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "token expired"})));
    }

    let mut file = String::new();
    let mut language = String::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.unwrap();
                file = format!("{} {} {}", file_name, content_type, bytes.len());
            }
            "language" => language = field.text().await.unwrap(),
            _ => {}
        }
    }

    (
        StatusCode::OK,
        Json(json!({"llmResponse": format!("  {} in {}\n", file, language)})),
    )
}

// ============================================================================
// HttpAnalyzer
// ============================================================================

#[tokio::test]
async fn test_uploads_file_and_language() {
    let base = serve(Router::new().route("/labreport", post(echo))).await;
    let analyzer = HttpAnalyzer::new(format!("{}/", base));

    let text = analyzer.analyze(&pdf_input(Some(TOKEN))).await.unwrap();
    assert_eq!(text, "report.pdf application/pdf 8 in Hindi");
}

#[tokio::test]
async fn test_medicine_kind_uses_its_route() {
    let base = serve(Router::new().route("/medicine", post(echo))).await;
    let analyzer = HttpAnalyzer::new(base);

    let photo = input(
        SelectedFile::new("label.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]),
        Language::Tamil,
        ArtifactKind::MedicineLabel,
        Some(TOKEN),
    );
    let text = analyzer.analyze(&photo).await.unwrap();
    assert_eq!(text, "label.jpg image/jpeg 3 in Tamil");
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let base = serve(Router::new().route("/labreport", post(echo))).await;
    let analyzer = HttpAnalyzer::new(base);

    let err = analyzer.analyze(&pdf_input(Some("stale"))).await.unwrap_err();
    assert_eq!(err, AnalysisError::Unauthorized);
}

#[tokio::test]
async fn test_forbidden_is_unauthorized() {
    let base = serve(Router::new().route(
        "/labreport",
        post(|| async { (StatusCode::FORBIDDEN, "nope") }),
    ))
    .await;
    let err = HttpAnalyzer::new(base)
        .analyze(&pdf_input(Some(TOKEN)))
        .await
        .unwrap_err();
    assert_eq!(err, AnalysisError::Unauthorized);
}

#[tokio::test]
async fn test_missing_credential_never_sends() {
    // Nothing listens on the discard port; a request would surface as Transport.
    let analyzer = HttpAnalyzer::new("http://127.0.0.1:9");
    let err = analyzer.analyze(&pdf_input(None)).await.unwrap_err();
    assert_eq!(err, AnalysisError::Unauthorized);
}

#[tokio::test]
async fn test_server_reason_is_carried() {
    let base = serve(Router::new().route(
        "/labreport",
        post(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"message": "Could not extract text from document"})),
            )
        }),
    ))
    .await;
    let err = HttpAnalyzer::new(base)
        .analyze(&pdf_input(Some(TOKEN)))
        .await
        .unwrap_err();
    assert_eq!(err, AnalysisError::rejected("Could not extract text from document"));
    assert_eq!(err.user_message(), "Could not extract text from document");
}

#[tokio::test]
async fn test_error_key_is_also_read() {
    let base = serve(Router::new().route(
        "/labreport",
        post(|| async { (StatusCode::BAD_REQUEST, Json(json!({"error": "No file uploaded"}))) }),
    ))
    .await;
    let err = HttpAnalyzer::new(base)
        .analyze(&pdf_input(Some(TOKEN)))
        .await
        .unwrap_err();
    assert_eq!(err, AnalysisError::rejected("No file uploaded"));
}

#[tokio::test]
async fn test_server_error_without_reason() {
    let base = serve(Router::new().route(
        "/labreport",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;
    let err = HttpAnalyzer::new(base)
        .analyze(&pdf_input(Some(TOKEN)))
        .await
        .unwrap_err();
    assert_eq!(err, AnalysisError::ServerRejected { reason: None });
}

#[tokio::test]
async fn test_malformed_success_is_transport() {
    let base = serve(
        Router::new()
            .route("/labreport", post(|| async { "not json" }))
            .route("/medicine", post(|| async { Json(json!({"result": "wrong key"})) })),
    )
    .await;
    let analyzer = HttpAnalyzer::new(base);

    let err = analyzer.analyze(&pdf_input(Some(TOKEN))).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Transport(_)), "{:?}", err);

    let mut medicine = pdf_input(Some(TOKEN));
    medicine.kind = ArtifactKind::MedicineLabel;
    let err = analyzer.analyze(&medicine).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Transport(_)), "{:?}", err);
}

#[tokio::test]
async fn test_unreachable_service_is_transport() {
    let analyzer = HttpAnalyzer::new("http://127.0.0.1:9");
    let err = analyzer.analyze(&pdf_input(Some(TOKEN))).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Transport(_)), "{:?}", err);
}

// ============================================================================
// DirectAnalyzer
// ============================================================================

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

async fn fake_chat(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != "Bearer router-key" {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "bad key"}})));
    }

    let parts = &body["messages"][1]["content"];
    let prompt = parts[0]["text"].as_str().unwrap_or_default();
    let image = parts[1]["image_url"]["url"].as_str().unwrap_or_default();
    let reply = format!(
        "  model={} tamil={} png={}  ",
        body["model"].as_str().unwrap_or_default(),
        prompt.contains("Write the answer in Tamil."),
        image.starts_with("data:image/png;base64,"),
    );
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"message": {"content": reply}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })),
    )
}

fn label_photo() -> AnalysisInput {
    input(
        SelectedFile::new("label.png", "image/png", png(64, 32)),
        Language::Tamil,
        ArtifactKind::MedicineLabel,
        None,
    )
}

#[tokio::test]
async fn test_direct_sends_image_to_vision_model() {
    let base = serve(Router::new().route("/chat", post(fake_chat))).await;
    let client = OpenRouterClient::new("router-key")
        .with_model("test/vision")
        .with_endpoint(format!("{}/chat", base));
    let analyzer = DirectAnalyzer::new(client, PatientContext::default());

    let text = analyzer.analyze(&label_photo()).await.unwrap();
    assert_eq!(text, "model=test/vision tamil=true png=true");
}

#[tokio::test]
async fn test_direct_key_rejection_is_not_session_expiry() {
    let base = serve(Router::new().route("/chat", post(fake_chat))).await;
    let client = OpenRouterClient::new("wrong-key").with_endpoint(format!("{}/chat", base));
    let analyzer = DirectAnalyzer::new(client, PatientContext::default());

    let err = analyzer.analyze(&label_photo()).await.unwrap_err();
    assert_eq!(err, AnalysisError::ServerRejected { reason: None });
}
