// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared server-wide state.

use super::stats::StatsState;
use crate::config::Config;
use crate::core::accounts::AccountRegistry;
use crate::core::activity::ActivityLog;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The central struct holding all shared, server-wide state.
///
/// Wrapped in an `Arc` and handed to the dispatcher and every session. The account
/// registry is the only piece that live sessions mutate; it owns its own locking.
pub struct ServerState {
    pub config: Config,
    /// The shared account directory.
    pub registry: Arc<AccountRegistry>,
    pub stats: StatsState,
    /// Where processed requests are recorded.
    pub activity: ActivityLog,
    session_id_counter: AtomicU64,
}

impl ServerState {
    pub fn new(config: Config, registry: Arc<AccountRegistry>, activity: ActivityLog) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry,
            stats: StatsState::new(),
            activity,
            session_id_counter: AtomicU64::new(0),
        })
    }

    /// Allocates the opaque handle for a newly accepted connection. Handles increase
    /// monotonically, so ascending handle order is arrival order.
    pub fn next_session_id(&self) -> u64 {
        self.session_id_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
