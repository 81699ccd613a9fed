//! Shared collaborators handed to every view

use std::sync::Arc;

use croupier_store::{Actor, IdentityProvider};

use crate::{AuditLog, Notifier, TracingAuditLog, LogNotifier};

/// One store plus the side-effect collaborators.
///
/// Created once per session and cloned into each view; clones share the
/// same underlying instances.
pub struct Context<S> {
    pub store: Arc<S>,
    pub audit: Arc<dyn AuditLog>,
    pub notifier: Arc<dyn Notifier>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
}

impl<S> Context<S> {
    /// Context with tracing-backed audit and notification
    pub fn new(store: Arc<S>) -> Self {
        Context {
            store,
            audit: Arc::new(TracingAuditLog),
            notifier: Arc::new(LogNotifier),
            identity: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Current actor, if an identity provider is configured and signed in
    pub fn actor(&self) -> Option<Actor> {
        self.identity.as_ref().and_then(|id| id.current_actor())
    }
}

impl<S> Clone for Context<S> {
    fn clone(&self) -> Self {
        Context {
            store: Arc::clone(&self.store),
            audit: Arc::clone(&self.audit),
            notifier: Arc::clone(&self.notifier),
            identity: self.identity.clone(),
        }
    }
}
