// SPDX-License-Identifier: MPL-2.0

//! Output routing for compression sessions
//!
//! Backends deliver encode output on their own threads. Instead of holding a
//! pointer back to the encoder, a session carries an [`OutputRoute`]: a token
//! that is looked up in the [`SessionRegistry`] for every delivery. Once the
//! encoder unregisters its token, late outputs are dropped.

use super::session::EncodeOutput;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

/// Receiver of a session's encode output
pub trait OutputHandler: Send + Sync {
    fn handle_output(&self, output: EncodeOutput);
}

/// Opaque identifier of a registered session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Token to handler lookup table shared by all sessions
#[derive(Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<SessionToken, Weak<dyn OutputHandler>>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn handlers(&self) -> MutexGuard<'_, HashMap<SessionToken, Weak<dyn OutputHandler>>> {
        // The map holds no invariant a panicking holder could break
        self.handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a handler and return its token
    ///
    /// Only a weak reference is stored; the caller keeps the handler alive.
    pub fn register(&self, handler: &Arc<dyn OutputHandler>) -> SessionToken {
        let token = SessionToken(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.handlers().insert(token, Arc::downgrade(handler));
        debug!(token = token.id(), "Registered session output handler");
        token
    }

    /// Remove a token; returns whether it was registered
    pub fn unregister(&self, token: SessionToken) -> bool {
        let removed = self.handlers().remove(&token).is_some();
        if removed {
            debug!(token = token.id(), "Unregistered session output handler");
        }
        removed
    }

    /// Resolve a token to a live handler
    pub fn lookup(&self, token: SessionToken) -> Option<Arc<dyn OutputHandler>> {
        self.handlers().get(&token).and_then(Weak::upgrade)
    }

    /// Number of registered tokens
    pub fn len(&self) -> usize {
        self.handlers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Delivery address handed to a backend session
#[derive(Clone)]
pub struct OutputRoute {
    registry: Arc<SessionRegistry>,
    token: SessionToken,
}

impl OutputRoute {
    pub fn new(registry: Arc<SessionRegistry>, token: SessionToken) -> Self {
        Self { registry, token }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Hand an output to the registered handler
    ///
    /// Returns `false` when the token is no longer registered, in which case
    /// the output is dropped.
    pub fn deliver(&self, output: EncodeOutput) -> bool {
        // Resolve first so the registry lock is not held during handling
        let handler = self.registry.lookup(self.token);
        match handler {
            Some(handler) => {
                handler.handle_output(output);
                true
            }
            None => {
                debug!(
                    token = self.token.id(),
                    "Dropping encode output for unregistered session"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for OutputRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputRoute")
            .field("token", &self.token)
            .finish()
    }
}
