//! Shared runtime state for cart-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Nothing here is
//! mutable: per-request work goes through the store's own pool.

use std::sync::Arc;

use cart_auth::SessionVerifier;
use cart_core::{CartStore, LifecycleGuard};
use serde::{Deserialize, Serialize};

/// Static build metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    /// Guarded cart operations over the configured store.
    pub guard: LifecycleGuard,
    /// Session token verifier.
    pub sessions: Arc<dyn SessionVerifier>,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(store: Arc<dyn CartStore>, sessions: Arc<dyn SessionVerifier>) -> Self {
        Self {
            guard: LifecycleGuard::new(store),
            sessions,
            build: BuildInfo {
                service: "cart-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}
