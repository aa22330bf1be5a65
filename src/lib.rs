//! # Stampede
//!
//! A laboratory for TCP connection-acceptance fan-out: three worker-pool
//! architectures that all serve one local port, built to make the kernel's
//! connection-wakeup policy (the thundering herd and its mitigations)
//! directly observable.
//!
//! ## The three architectures
//!
//! - [`BlockingAcceptPool`]: one listening socket, N threads blocked in
//!   `accept(2)`. The kernel's accept wait queue wakes exactly one thread
//!   per connection on any modern kernel; there is no herd to see, which is
//!   itself the demonstration.
//! - [`MultiplexedAcceptPool`]: one listening socket registered into N
//!   worker-private epoll instances. Without the exclusive-wake flag, one
//!   connection wakes every waiting worker and all but one lose the race to
//!   accept: the herd. With the flag set, the kernel wakes at most one
//!   waiter per connection. One loop, one toggle.
//! - [`PortSharedPool`]: N listening sockets bound to the identical
//!   address/port via the port-reuse option, one per worker. The kernel
//!   routes each connection to exactly one socket, so nothing is ever
//!   contended.
//!
//! ```text
//!              ┌────────────┐      ┌────────────┐
//!  clients ──▶ │  listener  │  or  │ l1 l2 … lN │  (reuseport group)
//!              └─────┬──────┘      └──┬──┬───┬──┘
//!        wake policy │ (kernel)       │  │   │ (kernel routing hash)
//!              ┌─────┴─────┐          │  │   │
//!              w1   w2 …  wN          w1 w2  wN
//! ```
//!
//! ## Observability
//!
//! Workers report their lifecycle as structured [`AcceptEvent`]s through an
//! [`Observer`]: worker startup, readiness wakeups, accepted connections
//! with their attribution, raced accepts (the herd's signature), and every
//! terminal failure. [`MemoryObserver`] records the stream for assertions;
//! [`LogObserver`] renders it for a human watching the demonstration
//! binaries.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stampede::{AcceptorConfig, LogObserver, MultiplexedAcceptPool};
//!
//! fn main() -> stampede::Result<()> {
//!     let config = AcceptorConfig::builder()
//!         .addr("0.0.0.0:8888".parse().unwrap())
//!         .workers(4)
//!         .exclusive_wake(false) // flip to watch the herd disappear
//!         .observer(Arc::new(LogObserver))
//!         .build();
//!
//!     let _pool = MultiplexedAcceptPool::spawn(config)?;
//!     loop {
//!         std::thread::park();
//!     }
//! }
//! ```
//!
//! Accepted connections are attributed and immediately dropped: everything
//! after acceptance (I/O, teardown, backpressure) is deliberately out of
//! scope so the fan-out behavior stays isolated.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod observe;
pub mod poll;
pub mod pool;

pub use config::{AcceptorConfig, AcceptorConfigBuilder};
pub use error::{AcceptorError, Result, SetupStage};
pub use observe::{
    AcceptEvent, ConnectionId, LogObserver, MemoryObserver, NoOpObserver, Observer, WorkerId,
};
pub use pool::{BlockingAcceptPool, MultiplexedAcceptPool, PortSharedPool};

/// Re-exports of the types most callers need.
pub mod prelude {
    pub use crate::config::AcceptorConfig;
    pub use crate::observe::{AcceptEvent, LogObserver, MemoryObserver, Observer};
    pub use crate::pool::{BlockingAcceptPool, MultiplexedAcceptPool, PortSharedPool};
}
