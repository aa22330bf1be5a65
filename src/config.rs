use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::observe::{NoOpObserver, Observer};

/// Default TCP port the acceptance pools listen on.
pub const DEFAULT_PORT: u16 = 8888;
/// Default number of acceptor workers per pool.
pub const DEFAULT_WORKERS: usize = 4;
/// Default pending-connection backlog configured at listen time.
pub const DEFAULT_BACKLOG: i32 = 100;

/// Configuration for an acceptance pool.
///
/// Controls the listening endpoint, pool sizing, and the knobs that make the
/// kernel's wakeup behavior observable. Use `AcceptorConfig::builder()` for
/// ergonomic construction.
///
/// ## Observation knobs
///
/// - `wake_delay`: artificial pause between a readiness wakeup and the accept
///   attempt. Zero by default; a nonzero value widens the race window so
///   concurrent multi-worker wakeups become visible instead of resolving in
///   microseconds.
/// - `exclusive_wake`: registers the listener with an exclusive-wakeup
///   interest so at most one waiting worker is woken per arriving
///   connection. Off by default, which reproduces the herd.
#[derive(Clone)]
pub struct AcceptorConfig {
    /// Address the listening endpoint(s) bind to
    pub addr: SocketAddr,
    /// Number of acceptor workers
    pub workers: usize,
    /// Pending-connection backlog
    pub backlog: i32,
    /// Pause between readiness wakeup and accept attempt
    pub wake_delay: Duration,
    /// Request at-most-one-worker wakeups from the readiness layer
    pub exclusive_wake: bool,
    /// Sink for worker events
    pub observer: Arc<dyn Observer>,
}

impl AcceptorConfig {
    /// Create a new builder for AcceptorConfig
    pub fn builder() -> AcceptorConfigBuilder {
        AcceptorConfigBuilder::new()
    }
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            workers: DEFAULT_WORKERS,
            backlog: DEFAULT_BACKLOG,
            wake_delay: Duration::ZERO,
            exclusive_wake: false,
            observer: Arc::new(NoOpObserver),
        }
    }
}

/// Builder for AcceptorConfig.
///
/// All fields are optional and fall back to `AcceptorConfig::default()`.
pub struct AcceptorConfigBuilder {
    addr: Option<SocketAddr>,
    workers: Option<usize>,
    backlog: Option<i32>,
    wake_delay: Option<Duration>,
    exclusive_wake: Option<bool>,
    observer: Option<Arc<dyn Observer>>,
}

impl AcceptorConfigBuilder {
    pub fn new() -> Self {
        Self {
            addr: None,
            workers: None,
            backlog: None,
            wake_delay: None,
            exclusive_wake: None,
            observer: None,
        }
    }

    /// Set the address to bind to
    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Set the number of acceptor workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the pending-connection backlog
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = Some(backlog);
        self
    }

    /// Set the pause between readiness wakeup and accept attempt
    pub fn wake_delay(mut self, delay: Duration) -> Self {
        self.wake_delay = Some(delay);
        self
    }

    /// Request at-most-one-worker wakeups from the readiness layer
    pub fn exclusive_wake(mut self, exclusive: bool) -> Self {
        self.exclusive_wake = Some(exclusive);
        self
    }

    /// Set the observer implementation
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the AcceptorConfig
    pub fn build(self) -> AcceptorConfig {
        let default = AcceptorConfig::default();
        AcceptorConfig {
            addr: self.addr.unwrap_or(default.addr),
            workers: self.workers.unwrap_or(default.workers),
            backlog: self.backlog.unwrap_or(default.backlog),
            wake_delay: self.wake_delay.unwrap_or(default.wake_delay),
            exclusive_wake: self.exclusive_wake.unwrap_or(default.exclusive_wake),
            observer: self.observer.unwrap_or(default.observer),
        }
    }
}

impl Default for AcceptorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
