//! Worker pools implementing the three acceptance architectures.
//!
//! All three pools share one lifecycle: spawn N named worker threads, let
//! them serve until a terminal per-worker failure or a pool shutdown, then
//! join every handle. The pools differ only in where the fan-out decision
//! lives:
//!
//! ```text
//!  BlockingAcceptPool      MultiplexedAcceptPool      PortSharedPool
//!  ┌───────────────┐       ┌───────────────┐          ┌────┐ ┌────┐
//!  │   listener    │       │   listener    │          │ l1 │ │ l2 │ ...
//!  └───────┬───────┘       └───┬───────┬───┘          └──┬─┘ └──┬─┘
//!    accept│(kernel            │       │ readiness       │      │
//!          │ wait queue)     ┌─┴─┐   ┌─┴─┐ (epoll)     ┌─┴─┐  ┌─┴─┐
//!     ┌────┴────┐            │ep1│   │ep2│ ...         │ep1│  │ep2│ ...
//!   ┌─┴─┐     ┌─┴─┐          └─┬─┘   └─┬─┘             └─┬─┘  └─┬─┘
//!   │w1 │ ... │wN │           w1  ...  w2                w1     w2
//!   └───┘     └───┘
//! ```
//!
//! The readiness-driven variants (multiplexed, port-sharing) run the same
//! serve loop; only their setup differs, which is the point: herd behavior
//! is a property of the wiring, not of the loop.

mod blocking;
mod multiplexed;
mod port_shared;

pub use blocking::BlockingAcceptPool;
pub use multiplexed::MultiplexedAcceptPool;
pub use port_shared::PortSharedPool;

use std::io;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use nix::sys::epoll::EpollEvent;

use crate::error::{AcceptorError, Result, SetupStage};
use crate::observe::{AcceptEvent, ConnectionId, Observer, WorkerId};
use crate::poll::{PollWaker, ReadinessPoll, LISTENER_TOKEN, WAKE_TOKEN};

const EVENTS_CAPACITY: usize = 64;

/// Handle to a spawned acceptor thread, owned by its pool.
pub(crate) struct Worker {
    #[allow(dead_code)]
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn new(id: WorkerId, thread: JoinHandle<()>) -> Self {
        Self {
            id,
            thread: Some(thread),
        }
    }

    pub(crate) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Build a worker's readiness context: private epoll instance with the
/// listener and the pool-wide shutdown waker registered into it.
pub(crate) fn readiness_setup(
    listener: &TcpListener,
    waker: &PollWaker,
    exclusive: bool,
) -> Result<ReadinessPoll> {
    let poll = ReadinessPoll::new().map_err(|e| AcceptorError::setup(SetupStage::Poll, e))?;
    poll.register(listener, LISTENER_TOKEN, exclusive)
        .map_err(|e| AcceptorError::setup(SetupStage::Register, e))?;
    poll.register(waker.read_fd(), WAKE_TOKEN, false)
        .map_err(|e| AcceptorError::setup(SetupStage::Register, e))?;
    Ok(poll)
}

/// Report a worker-owned setup failure. Terminal for that worker only.
pub(crate) fn report_setup_failure(observer: &dyn Observer, worker: WorkerId, err: AcceptorError) {
    let (stage, reason) = match err {
        AcceptorError::Setup { stage, source } => (stage, source.to_string()),
        other => (SetupStage::Socket, other.to_string()),
    };
    observer.on_event(&AcceptEvent::WorkerSetupFailed {
        worker,
        stage,
        reason,
    });
}

/// Readiness/accept serve loop shared by the multiplexed and port-sharing
/// variants.
///
/// Blocks in the worker's readiness context until the listener is reported
/// acceptable, then attempts one non-blocking accept per reported listener
/// event. `WouldBlock` means another worker drained the connection first,
/// the expected outcome under the herd: reported and survived. Every other
/// failure ends this worker's life after an attributable event.
pub(crate) fn serve_readiness(
    id: WorkerId,
    listener: &TcpListener,
    poll: &ReadinessPoll,
    running: &AtomicBool,
    wake_delay: Duration,
    observer: &dyn Observer,
    next_conn: &AtomicU64,
) {
    let mut events = vec![EpollEvent::empty(); EVENTS_CAPACITY];
    observer.on_event(&AcceptEvent::WorkerStarted { worker: id });

    while running.load(Ordering::SeqCst) {
        let ready = match poll.wait(&mut events, None) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                observer.on_event(&AcceptEvent::WaitFailed {
                    worker: id,
                    reason: e.to_string(),
                });
                return;
            }
        };
        if !running.load(Ordering::SeqCst) {
            return;
        }

        let pending = events[..ready]
            .iter()
            .filter(|event| event.data() == LISTENER_TOKEN)
            .count();
        if pending == 0 {
            continue;
        }
        observer.on_event(&AcceptEvent::Woke {
            worker: id,
            readiness: pending,
        });

        // Widens the race window so concurrent wakeups become visible.
        if !wake_delay.is_zero() {
            std::thread::sleep(wake_delay);
        }

        for _ in 0..pending {
            match listener.accept() {
                Ok((stream, peer)) => {
                    let connection = ConnectionId(next_conn.fetch_add(1, Ordering::SeqCst));
                    observer.on_event(&AcceptEvent::Accepted {
                        worker: id,
                        connection,
                        peer,
                    });
                    drop(stream);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    observer.on_event(&AcceptEvent::AcceptRaced { worker: id });
                }
                Err(e) => {
                    observer.on_event(&AcceptEvent::AcceptFailed {
                        worker: id,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }
    }
}
