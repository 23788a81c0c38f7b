//! medsummary - plain-language summaries of lab reports and medicine labels.
//!
//! Usage:
//!   medsummary analyze report.pdf --language Hindi
//!   medsummary analyze label.jpg --language Tamil --kind medicine --yes
//!   medsummary login --token <TOKEN> --email me@example.com
//!   medsummary logout
//!   medsummary languages

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medsummary::analyzer::direct::DirectAnalyzer;
use medsummary::analyzer::http::HttpAnalyzer;
use medsummary::config::{BackendKind, Settings};
use medsummary::document::SelectedFile;
use medsummary::guard::SessionGuard;
use medsummary::openrouter::OpenRouterClient;
use medsummary::reveal::RevealFrame;
use medsummary::session::{Credential, CredentialFile, SessionContext};
use medsummary::validator::UNSUPPORTED_TYPE;
use medsummary::{Analyzer, ArtifactKind, Coordinator, Language, Phase};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "medsummary", version, about = "Understand your medical documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a lab report (PDF) or medicine label (JPEG/PNG)
    Analyze {
        /// Document to upload
        file: PathBuf,

        /// Output language (English, Hindi, Telugu, Tamil or the native label)
        #[arg(short, long)]
        language: Language,

        /// What the document is
        #[arg(short, long, default_value = "lab-report")]
        kind: ArtifactKind,

        /// Skip the upload confirmation
        #[arg(short, long)]
        yes: bool,

        /// Override MEDSUMMARY_BACKEND (http or openrouter)
        #[arg(long)]
        backend: Option<String>,
    },
    /// Store a session token
    Login {
        #[arg(long, env = "MEDSUMMARY_TOKEN", hide_env_values = true)]
        token: String,

        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// List the supported output languages
    Languages,
}

type StdinLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medsummary=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;

    match cli.command {
        Command::Analyze {
            file,
            language,
            kind,
            yes,
            backend,
        } => {
            if let Some(backend) = backend {
                settings.backend = backend.parse()?;
            }
            analyze(&settings, file, language, kind, yes).await
        }
        Command::Login { token, email } => {
            let session = SessionContext::load(CredentialFile::new(&settings.credentials_path))?;
            let credential = match email {
                Some(email) => Credential::new(token).with_email(email),
                None => Credential::new(token),
            };
            session.login(credential)?;
            println!("Logged in.");
            Ok(())
        }
        Command::Logout => {
            let session = SessionContext::load(CredentialFile::new(&settings.credentials_path))?;
            session.evict();
            println!("Logged out.");
            Ok(())
        }
        Command::Languages => {
            for language in Language::ALL {
                println!("{:<10} {}", language.backend_id(), language.native_label());
            }
            Ok(())
        }
    }
}

fn build_analyzer(settings: &Settings) -> Result<Arc<dyn Analyzer>> {
    match settings.backend {
        BackendKind::Http => Ok(Arc::new(HttpAnalyzer::new(settings.api_url.as_str()))),
        BackendKind::OpenRouter => {
            let api_key = settings
                .openrouter_api_key
                .clone()
                .context("OPENROUTER_API_KEY must be set for the openrouter backend")?;
            let mut client = OpenRouterClient::new(api_key);
            if let Some(model) = &settings.openrouter_model {
                client = client.with_model(model.as_str());
            }
            Ok(Arc::new(DirectAnalyzer::new(client, settings.patient.clone())))
        }
    }
}

async fn analyze(
    settings: &Settings,
    path: PathBuf,
    language: Language,
    kind: ArtifactKind,
    yes: bool,
) -> Result<()> {
    let session = SessionContext::load(CredentialFile::new(&settings.credentials_path))?;
    let expired = Arc::new(AtomicBool::new(false));
    let handler = {
        let expired = expired.clone();
        move || {
            expired.store(true, Ordering::SeqCst);
            eprintln!("Your session has expired. Log in again with `medsummary login --token <TOKEN>`.");
        }
    };
    let guard = SessionGuard::new(session, Arc::new(handler));

    let analyzer = build_analyzer(settings)?;
    info!("Using {} analyzer for a {}", analyzer.name(), kind);

    let mut coordinator = Coordinator::new(analyzer, guard, kind, settings.workflow());
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let file = SelectedFile::from_path(&path)?;
        coordinator.select_file(file)?;

        if let Phase::DocumentAccepted { .. } = coordinator.phase() {
            coordinator.choose_language(language)?;
            coordinator.request_analysis()?;

            let name = coordinator
                .phase()
                .document()
                .map(|d| d.name().to_string())
                .unwrap_or_default();
            let question = format!("Upload {} for analysis in {}?", name, language.native_label());
            if !yes && !ask(&mut stdin, &question).await? {
                coordinator.cancel()?;
                println!("Cancelled, nothing was uploaded.");
                return Ok(());
            }

            coordinator.confirm()?;
            println!("Analyzing {}...", name);
            coordinator.settle().await;
        }

        match coordinator.phase() {
            Phase::Succeeded { .. } => {
                tokio::time::sleep(settings.reveal_lead_in).await;
                print_reveal(&mut coordinator).await?;
                return Ok(());
            }
            Phase::Failed { error_message } => {
                if !retry_can_help(error_message) {
                    anyhow::bail!("{}: {}", path.display(), error_message);
                }
                eprintln!("{}", error_message);
                if ask(&mut stdin, "Try again?").await? {
                    coordinator.dismiss()?;
                    continue;
                }
                anyhow::bail!("Analysis failed");
            }
            phase => {
                if expired.load(Ordering::SeqCst) {
                    anyhow::bail!("Session expired");
                }
                anyhow::bail!("Workflow stopped in {} phase", phase.kind());
            }
        }
    }
}

/// Print the reveal frames as deltas so the text appears in place.
async fn print_reveal(coordinator: &mut Coordinator) -> Result<()> {
    let mut stdout = std::io::stdout();
    let mut printed = 0;
    while let Some(frame) = coordinator.next_frame().await {
        let text = frame.text();
        write!(stdout, "{}", &text[printed..])?;
        stdout.flush()?;
        printed = text.len();
        if let RevealFrame::Complete(_) = frame {
            writeln!(stdout)?;
            return Ok(());
        }
    }
    // Frames stopped without completing: the session went away mid-reveal.
    writeln!(stdout)?;
    anyhow::bail!("Session expired")
}

/// Retrying re-reads the same path, so a file-type rejection would only repeat.
fn retry_can_help(error_message: &str) -> bool {
    error_message != UNSUPPORTED_TYPE
}

async fn ask(lines: &mut StdinLines, question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
