use super::{ResponseCode, ResponseResults, Stage};
use crate::error::NegotiationError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A response routed back to the stage that issued the request
#[derive(Debug, Clone, PartialEq)]
pub struct PortalResponse {
    pub stage: Stage,
    pub code: ResponseCode,
    pub results: ResponseResults,
}

struct PendingRequest {
    stage: Stage,
    continuation: oneshot::Sender<PortalResponse>,
}

/// Outstanding request tokens and the continuation waiting on each.
///
/// Calls are registered from the negotiation task while responses are
/// resolved from the signal listener task, so the table sits behind a mutex.
#[derive(Default)]
pub struct CorrelationRegistry {
    table: Mutex<Table>,
}

#[derive(Default)]
struct Table {
    pending: HashMap<String, PendingRequest>,
    /// Set by [`CorrelationRegistry::close`]; no further registrations
    closed: bool,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        // every critical section is a single map operation, so poison is harmless
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(
        &self,
        token: &str,
        stage: Stage,
        continuation: oneshot::Sender<PortalResponse>,
    ) -> Result<(), NegotiationError> {
        let mut table = self.table();
        if table.closed {
            return Err(NegotiationError::Cancelled { stage });
        }
        if table.pending.contains_key(token) {
            return Err(NegotiationError::DuplicateToken(token.to_string()));
        }
        debug!(%token, %stage, "registered request");
        table.pending.insert(
            token.to_string(),
            PendingRequest {
                stage,
                continuation,
            },
        );
        Ok(())
    }

    /// Hand a response to the continuation registered for `token`.
    ///
    /// Returns false, without touching the table, when nothing is waiting on
    /// the token.
    pub fn resolve(&self, token: &str, code: u32, results: ResponseResults) -> bool {
        let Some(entry) = self.table().pending.remove(token) else {
            warn!(%token, code, "response for unknown request token");
            return false;
        };

        let response = PortalResponse {
            stage: entry.stage,
            code: ResponseCode::from(code),
            results,
        };
        debug!(%token, stage = %entry.stage, code, "resolved request");
        if entry.continuation.send(response).is_err() {
            debug!(%token, "requester went away before its response arrived");
        }
        true
    }

    /// Forget a token without running its continuation
    pub fn cancel(&self, token: &str) -> bool {
        self.table().pending.remove(token).is_some()
    }

    /// Drop every pending continuation; waiters see their channel close
    pub fn clear(&self) {
        let mut table = self.table();
        if !table.pending.is_empty() {
            debug!(pending = table.pending.len(), "dropping pending requests");
        }
        table.pending.clear();
    }

    /// Clear the table and refuse every later registration with `Cancelled`
    pub fn close(&self) {
        self.table().closed = true;
        self.clear();
    }

    pub fn len(&self) -> usize {
        self.table().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().pending.is_empty()
    }
}
