//! Shared-socket multiplexed-accept demonstration: the epoll thundering
//! herd.
//!
//! Four workers each register the shared listening socket into a private
//! epoll instance. Connect a client (`telnet 127.0.0.1 8888`) and watch
//! every worker wake for it while only one wins the accept; the one-second
//! wake delay keeps the race slow enough to read.
//!
//! The process has no normal exit path; terminate it externally.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use stampede::{AcceptorConfig, LogObserver, MultiplexedAcceptPool};

/// Flip to register the listener with the kernel's exclusive-wakeup policy
/// and watch the herd disappear: one worker woken per connection.
const EXCLUSIVE_WAKE: bool = false;

fn main() -> Result<()> {
    let config = AcceptorConfig::builder()
        .wake_delay(Duration::from_secs(1))
        .exclusive_wake(EXCLUSIVE_WAKE)
        .observer(Arc::new(LogObserver))
        .build();
    let addr = config.addr;

    let _pool = MultiplexedAcceptPool::spawn(config)
        .with_context(|| format!("failed to start multiplexed-accept pool on {addr}"))?;
    println!("[INFO] multiplexed-accept pool listening on {addr} (exclusive_wake: {EXCLUSIVE_WAKE})");

    loop {
        thread::park();
    }
}
