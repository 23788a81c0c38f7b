//! Explicit session context and the persisted credential file.
//!
//! One [`SessionContext`] is shared by the coordinator and the session guard.
//! Eviction is a single operation: drop the in-memory credential, delete the
//! credential file, flip the authenticated flag.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Bearer credential issued at login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    fn is_usable(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// JSON file holding the credential between runs.
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/medsummary/credentials.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("medsummary").join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials: {:?}", self.path))?;
        let credential: Credential = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials: {:?}", self.path))?;
        Ok(Some(credential))
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(credential)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Failed to open credentials: {:?}", self.path))?;
        // `mode` only applies on creation; tighten a file left by an older run too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {:?}", self.path))?;
        }
        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write credentials: {:?}", self.path))?;
        Ok(())
    }

    /// Delete the file. A missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", self.path)),
        }
    }
}

struct SessionInner {
    credential: RwLock<Option<Credential>>,
    authenticated: watch::Sender<bool>,
    store: Option<CredentialFile>,
}

/// Process-wide authentication state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

impl SessionContext {
    /// Session without persistence.
    pub fn in_memory(credential: Option<Credential>) -> Self {
        Self::build(credential, None)
    }

    /// Session backed by a credential file; loads whatever is stored there.
    pub fn load(store: CredentialFile) -> Result<Self> {
        let credential = store.load()?;
        debug!(
            "Loaded session from {:?} (authenticated={})",
            store.path(),
            credential.as_ref().is_some_and(Credential::is_usable)
        );
        Ok(Self::build(credential, Some(store)))
    }

    fn build(credential: Option<Credential>, store: Option<CredentialFile>) -> Self {
        let credential = credential.filter(Credential::is_usable);
        let (authenticated, _) = watch::channel(credential.is_some());
        Self {
            inner: Arc::new(SessionInner {
                credential: RwLock::new(credential),
                authenticated,
                store,
            }),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        *self.inner.authenticated.borrow()
    }

    pub fn current_credential(&self) -> Option<Credential> {
        self.inner
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install a credential, persisting it first when a file is attached.
    pub fn login(&self, credential: Credential) -> Result<()> {
        if !credential.is_usable() {
            anyhow::bail!("Refusing to store an empty token");
        }
        if let Some(store) = &self.inner.store {
            store.save(&credential)?;
        }
        *self
            .inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
        self.inner.authenticated.send_replace(true);
        info!("Session established");
        Ok(())
    }

    /// Clear every cached credential artifact and mark the session unauthenticated.
    pub fn evict(&self) {
        self.inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(store) = &self.inner.store {
            if let Err(e) = store.remove() {
                warn!("Credential file not removed: {:#}", e);
            }
        }
        let was_authenticated = self.inner.authenticated.send_replace(false);
        if was_authenticated {
            info!("Session evicted");
        }
    }

    /// Observe the authenticated flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.authenticated.subscribe()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .field("store", &self.inner.store)
            .finish()
    }
}
