//! Structured event stream for connection-acceptance observability.
//!
//! Every worker emits its lifecycle through an [`Observer`] so the three
//! acceptance architectures stay comparable: the same accept happening under
//! a different fan-out strategy produces the same event shape, attributed to
//! exactly one worker. The stream is a debugging and measurement aid, not a
//! wire contract.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::SetupStage;

/// 1-based ordinal identifying a worker within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

impl WorkerId {
    pub fn ordinal(&self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an accepted connection, drawn from a pool-wide
/// counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a worker can report while serving its accept loop.
#[derive(Debug, Clone)]
pub enum AcceptEvent {
    /// The worker finished its setup and entered the serve loop.
    WorkerStarted { worker: WorkerId },
    /// The worker's readiness context reported `readiness` listener events.
    Woke { worker: WorkerId, readiness: usize },
    /// The worker accepted a connection.
    Accepted {
        worker: WorkerId,
        connection: ConnectionId,
        peer: SocketAddr,
    },
    /// The worker woke but another worker had already drained the pending
    /// connection. Expected under the herd scenario, not an error.
    AcceptRaced { worker: WorkerId },
    /// An accept call failed. Terminal for this worker.
    AcceptFailed { worker: WorkerId, reason: String },
    /// A readiness wait failed. Terminal for this worker.
    WaitFailed { worker: WorkerId, reason: String },
    /// A worker-owned setup step failed. Terminal for this worker only;
    /// siblings keep serving.
    WorkerSetupFailed {
        worker: WorkerId,
        stage: SetupStage,
        reason: String,
    },
}

impl AcceptEvent {
    /// The worker this event is attributed to.
    pub fn worker(&self) -> WorkerId {
        match self {
            AcceptEvent::WorkerStarted { worker }
            | AcceptEvent::Woke { worker, .. }
            | AcceptEvent::Accepted { worker, .. }
            | AcceptEvent::AcceptRaced { worker }
            | AcceptEvent::AcceptFailed { worker, .. }
            | AcceptEvent::WaitFailed { worker, .. }
            | AcceptEvent::WorkerSetupFailed { worker, .. } => *worker,
        }
    }
}

/// Sink for worker events.
///
/// Implementations must tolerate concurrent calls from every worker thread.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &AcceptEvent);
}

/// Default observer that discards all events.
#[derive(Default, Clone)]
pub struct NoOpObserver;

impl Observer for NoOpObserver {
    fn on_event(&self, _event: &AcceptEvent) {
        // Do nothing
    }
}

/// Observer that renders events as human-readable stdout/stderr lines.
#[derive(Default, Clone)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_event(&self, event: &AcceptEvent) {
        match event {
            AcceptEvent::WorkerStarted { worker } => {
                println!("[INFO] worker {} run", worker);
            }
            AcceptEvent::Woke { worker, readiness } => {
                println!("[INFO] worker {} in ({} ready)", worker, readiness);
            }
            AcceptEvent::Accepted {
                worker,
                connection,
                peer,
            } => {
                println!(
                    "[INFO] worker {} accept client {} from {}",
                    worker, connection, peer
                );
            }
            AcceptEvent::AcceptRaced { worker } => {
                println!("[INFO] worker {} accept: connection already taken", worker);
            }
            AcceptEvent::AcceptFailed { worker, reason } => {
                eprintln!("[ERROR] worker {} accept error: {}", worker, reason);
            }
            AcceptEvent::WaitFailed { worker, reason } => {
                eprintln!("[ERROR] worker {} wait error: {}", worker, reason);
            }
            AcceptEvent::WorkerSetupFailed {
                worker,
                stage,
                reason,
            } => {
                eprintln!("[ERROR] worker {} setup error at {}: {}", worker, stage, reason);
            }
        }
    }
}

/// Observer that records every event for later inspection.
///
/// This is the capture point for the test suite: tests hand one to a pool,
/// drive clients against it, and assert over the recorded stream.
#[derive(Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<AcceptEvent>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AcceptEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of `Accepted` events recorded so far.
    pub fn accepted_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, AcceptEvent::Accepted { .. }))
            .count()
    }

    /// Block until `predicate` holds over the recorded events or `timeout`
    /// elapses. Returns whether the predicate held.
    ///
    /// The predicate runs on a snapshot, so it may freely call back into
    /// this observer.
    pub fn wait_for<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&[AcceptEvent]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let snapshot = self.events();
            if predicate(&snapshot) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Observer for MemoryObserver {
    fn on_event(&self, event: &AcceptEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn records_events_in_order() {
        let observer = MemoryObserver::new();
        observer.on_event(&AcceptEvent::WorkerStarted { worker: WorkerId(1) });
        observer.on_event(&AcceptEvent::Accepted {
            worker: WorkerId(1),
            connection: ConnectionId(1),
            peer: "127.0.0.1:9999".parse().unwrap(),
        });

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AcceptEvent::WorkerStarted { .. }));
        assert_eq!(observer.accepted_count(), 1);
    }

    #[test]
    fn wait_for_sees_events_from_other_threads() {
        let observer = Arc::new(MemoryObserver::new());
        let writer = Arc::clone(&observer);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            writer.on_event(&AcceptEvent::WorkerStarted { worker: WorkerId(2) });
        });

        assert!(observer.wait_for(Duration::from_secs(2), |events| !events.is_empty()));
        handle.join().unwrap();
    }

    #[test]
    fn wait_for_times_out() {
        let observer = MemoryObserver::new();
        assert!(!observer.wait_for(Duration::from_millis(50), |events| !events.is_empty()));
    }

    #[test]
    fn every_event_is_attributable() {
        let worker = WorkerId(3);
        let events = [
            AcceptEvent::WorkerStarted { worker },
            AcceptEvent::Woke { worker, readiness: 1 },
            AcceptEvent::AcceptRaced { worker },
            AcceptEvent::AcceptFailed {
                worker,
                reason: "broken".into(),
            },
        ];
        for event in &events {
            assert_eq!(event.worker(), worker);
        }
    }
}
