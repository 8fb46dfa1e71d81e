use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use repkit_core::program::ProgramIdSource;
use repkit_core::providers::Providers;

use crate::ToolHandlerSet;

/// A bound request context: immutable id, rebindable identity.
pub struct Session {
    id: String,
    identity: Mutex<String>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, identity: &str) -> Self {
        Self {
            id: id.into(),
            identity: Mutex::new(identity.to_string()),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Snapshot of the currently bound identity. Tool calls read this once at
    /// entry; a concurrent rebind does not affect a call already in flight.
    pub fn identity(&self) -> String {
        self.identity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Overwrite the identity binding, last write wins. Returns whether the
    /// binding actually changed.
    pub fn rebind(&self, identity: &str) -> bool {
        let mut bound = self.identity.lock().unwrap_or_else(|e| e.into_inner());
        if *bound == identity {
            return false;
        }
        *bound = identity.to_string();
        true
    }
}

/// Owns the session-token to handler-set mapping. At most one handler set per
/// session id holds by construction: ids are freshly generated UUIDv7 values,
/// and insertion happens under the registry lock.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<ToolHandlerSet>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live handler set for `token`, or create a fresh session
    /// bound to `identity` when the token is absent or unknown. The second
    /// element reports whether a session was created.
    pub fn lookup_or_create(
        &self,
        token: Option<&str>,
        identity: &str,
        providers: &Providers,
        ids: &Arc<dyn ProgramIdSource>,
    ) -> (Arc<ToolHandlerSet>, bool) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(existing) = sessions.get(token) {
                return (existing.clone(), false);
            }
        }

        let id = Uuid::now_v7().to_string();
        let session = Arc::new(Session::new(id.clone(), identity));
        let handlers = Arc::new(ToolHandlerSet::new(session, providers.clone(), ids.clone()));
        sessions.insert(id, handlers.clone());
        (handlers, true)
    }

    /// Remove a session and its handler set. `false` for unknown tokens — an
    /// unknown token is a no-op, not an error.
    pub fn delete(&self, token: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
