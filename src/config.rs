//! Runtime settings, read from the environment (a `.env` file is loaded first by the binary).

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::prompt::PatientContext;
use crate::session::CredentialFile;
use crate::workflow::WorkflowSettings;

const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Which analyzer serves the `analyze` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// The backend service (`/labreport`, `/medicine`).
    #[default]
    Http,
    /// Local extraction plus OpenRouter.
    OpenRouter,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "backend" => Ok(Self::Http),
            "openrouter" | "direct" => Ok(Self::OpenRouter),
            other => anyhow::bail!("Unknown backend '{}', expected http or openrouter", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendKind,
    pub api_url: String,
    pub analysis_timeout: Duration,
    pub reveal_interval: Duration,
    /// Pause between the result arriving and the reveal starting.
    pub reveal_lead_in: Duration,
    pub credentials_path: PathBuf,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: Option<String>,
    pub patient: PatientContext,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or blank keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = get("MEDSUMMARY_BACKEND")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();

        let credentials_path = match get("MEDSUMMARY_CREDENTIALS") {
            Some(path) => PathBuf::from(path),
            None => CredentialFile::default_path()
                .context("No config directory on this platform; set MEDSUMMARY_CREDENTIALS")?,
        };

        let analysis_timeout = Duration::from_secs(parse_or(
            get("MEDSUMMARY_ANALYSIS_TIMEOUT_SECS"),
            "MEDSUMMARY_ANALYSIS_TIMEOUT_SECS",
            60,
        )?);
        if analysis_timeout.is_zero() {
            anyhow::bail!("MEDSUMMARY_ANALYSIS_TIMEOUT_SECS must be greater than zero");
        }

        let reveal_interval = Duration::from_millis(parse_or(
            get("MEDSUMMARY_REVEAL_INTERVAL_MS"),
            "MEDSUMMARY_REVEAL_INTERVAL_MS",
            30,
        )?);
        if reveal_interval.is_zero() {
            anyhow::bail!("MEDSUMMARY_REVEAL_INTERVAL_MS must be greater than zero");
        }

        let reveal_lead_in = Duration::from_millis(parse_or(
            get("MEDSUMMARY_REVEAL_LEAD_IN_MS"),
            "MEDSUMMARY_REVEAL_LEAD_IN_MS",
            1000,
        )?);

        let patient = PatientContext {
            age: get("MEDSUMMARY_PATIENT_AGE")
                .map(|v| {
                    v.trim()
                        .parse::<u32>()
                        .with_context(|| format!("MEDSUMMARY_PATIENT_AGE is not a number: {}", v))
                })
                .transpose()?,
            history: get("MEDSUMMARY_PATIENT_HISTORY"),
        };

        Ok(Self {
            backend,
            api_url: get("MEDSUMMARY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            analysis_timeout,
            reveal_interval,
            reveal_lead_in,
            credentials_path,
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            openrouter_model: get("OPENROUTER_MODEL"),
            patient,
        })
    }

    pub fn workflow(&self) -> WorkflowSettings {
        WorkflowSettings {
            analysis_timeout: self.analysis_timeout,
            reveal_interval: self.reveal_interval,
        }
    }
}

fn parse_or(value: Option<String>, key: &str, default: u64) -> Result<u64> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{} is not a whole number: {}", key, v)),
        None => Ok(default),
    }
}
