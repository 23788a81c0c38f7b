//! Session guard: keeps the workflow unusable while unauthenticated.
//!
//! Checks are level-triggered. The coordinator calls [`SessionGuard::check`]
//! on every phase entry, and [`SessionGuard::lost`] lets it notice an expiry
//! while a call is in flight.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use crate::session::SessionContext;

/// Collaborator that leaves the workflow once the session is gone
/// (redirect to login, close the window, exit the process).
pub trait ExpiryHandler: Send + Sync {
    fn on_session_expired(&self);
}

impl<F> ExpiryHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_session_expired(&self) {
        self()
    }
}

pub struct SessionGuard {
    session: SessionContext,
    watcher: watch::Receiver<bool>,
    handler: Arc<dyn ExpiryHandler>,
    redirected: bool,
}

impl SessionGuard {
    pub fn new(session: SessionContext, handler: Arc<dyn ExpiryHandler>) -> Self {
        let watcher = session.subscribe();
        Self {
            session,
            watcher,
            handler,
            redirected: false,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Returns `true` while authenticated. Otherwise tears the session down and returns `false`.
    pub fn check(&mut self) -> bool {
        if self.session.is_authenticated() {
            self.redirected = false;
            return true;
        }
        self.teardown();
        false
    }

    /// Explicit eviction after the service rejected the credential.
    pub fn expire(&mut self) {
        self.teardown();
    }

    /// Resolves once the session is (or becomes) unauthenticated.
    pub async fn lost(&mut self) {
        // Sender lives inside `session`, so the channel cannot close under us.
        let _ = self.watcher.wait_for(|authenticated| !*authenticated).await;
    }

    fn teardown(&mut self) {
        self.session.evict();
        if !self.redirected {
            self.redirected = true;
            warn!("Session lost, leaving the analysis workflow");
            self.handler.on_session_expired();
        }
    }
}
