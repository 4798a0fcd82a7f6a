//! Application state and the session token registry.

use std::collections::HashMap;
use std::sync::Mutex;

use elvtrace_core::Session;

use crate::service::TraceService;

/// Bearer tokens issued by `POST /session`, held in memory only.
pub(crate) struct SessionRegistry {
    tokens: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Store `session` under a new random token and return the token.
    pub(crate) fn issue(&self, session: Session) -> Option<String> {
        let bytes: [u8; 32] = rand::random();
        let token: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        let mut tokens = self.tokens.lock().ok()?;
        tokens.insert(token.clone(), session);
        Some(token)
    }

    pub(crate) fn get(&self, token: &str) -> Option<Session> {
        self.tokens.lock().ok()?.get(token).cloned()
    }

    /// Drop a token. Returns whether it was live.
    pub(crate) fn revoke(&self, token: &str) -> bool {
        self.tokens
            .lock()
            .map(|mut tokens| tokens.remove(token).is_some())
            .unwrap_or(false)
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    /// The record store and everything gated on it. Every call reads or
    /// writes the whole table, so callers are serialized.
    pub(crate) service: Mutex<TraceService>,
    pub(crate) sessions: SessionRegistry,
}
