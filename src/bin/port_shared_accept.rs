//! Per-worker-socket port-sharing demonstration.
//!
//! Four workers each bind their own listening socket to port 8888 through
//! the port-reuse option and service it with a private epoll instance. The
//! kernel routes every incoming connection to exactly one socket, so the
//! herd is avoided by construction: connect repeatedly and watch the
//! accepts distribute across workers.
//!
//! The process has no normal exit path; terminate it externally.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use stampede::{AcceptorConfig, LogObserver, PortSharedPool};

fn main() -> Result<()> {
    let config = AcceptorConfig::builder()
        .wake_delay(Duration::from_secs(1))
        .observer(Arc::new(LogObserver))
        .build();
    let addr = config.addr;

    let _pool = PortSharedPool::spawn(config)
        .with_context(|| format!("failed to start port-sharing pool on {addr}"))?;
    println!("[INFO] port-sharing pool listening on {addr}");

    loop {
        thread::park();
    }
}
