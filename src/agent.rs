use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::transport::{Connection, Target};

const DEFAULT_MAX_IDLE_PER_HOST: usize = 8;

/// Handle to a pool of idle keep-alive connections.
///
/// Cloning the agent clones the handle, not the pool. Pass it in
/// [`Options::agent`][crate::Options::agent] to reuse connections across calls.
/// Without an agent every call opens its own connection and closes it after
/// the response.
#[derive(Clone)]
pub struct Agent {
    pool: Arc<Mutex<Pool>>,
}

struct Pool {
    max_idle_per_host: usize,
    idle: HashMap<Target, Vec<Connection>>,
}

impl Agent {
    /// New empty pool.
    pub fn new() -> Self {
        Agent::with_max_idle_per_host(DEFAULT_MAX_IDLE_PER_HOST)
    }

    /// New empty pool keeping at most `max` idle connections per host.
    pub fn with_max_idle_per_host(max: usize) -> Self {
        Agent {
            pool: Arc::new(Mutex::new(Pool {
                max_idle_per_host: max,
                idle: HashMap::new(),
            })),
        }
    }

    /// Number of idle connections across all hosts.
    pub fn idle_count(&self) -> usize {
        self.lock().idle.values().map(|v| v.len()).sum()
    }

    /// Take an idle connection for `target`. Connections the server has
    /// closed in the meantime are dropped on the way.
    pub(crate) fn checkout(&self, target: &Target) -> Option<Connection> {
        let mut pool = self.lock();
        let idle = pool.idle.get_mut(target)?;

        while let Some(mut conn) = idle.pop() {
            if conn.is_reusable() {
                debug!("Reuse pooled connection: {}", target);
                return Some(conn);
            }
        }

        None
    }

    pub(crate) fn checkin(&self, conn: Connection) {
        let mut pool = self.lock();
        let max = pool.max_idle_per_host;
        let idle = pool.idle.entry(conn.target.clone()).or_default();

        if idle.len() >= max {
            debug!("Pool full, drop connection: {}", conn.target);
            return;
        }

        debug!("Return connection to pool: {}", conn.target);
        idle.push(conn);
    }

    fn lock(&self) -> MutexGuard<'_, Pool> {
        // A panic while holding the lock leaves the pool in a usable state.
        self.pool.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Agent {
    fn default() -> Self {
        Agent::new()
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("idle", &self.idle_count())
            .finish()
    }
}
