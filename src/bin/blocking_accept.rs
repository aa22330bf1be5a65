//! Shared-socket blocking-accept demonstration.
//!
//! Four workers block in `accept(2)` on one listening socket on port 8888.
//! Connect clients (`telnet 127.0.0.1 8888`) and watch which worker the
//! kernel wakes: modern kernels wake exactly one blocked acceptor per
//! connection, so no herd appears here.
//!
//! The process has no normal exit path; terminate it externally.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use stampede::{AcceptorConfig, BlockingAcceptPool, LogObserver};

fn main() -> Result<()> {
    let config = AcceptorConfig::builder()
        .observer(Arc::new(LogObserver))
        .build();
    let addr = config.addr;

    let _pool = BlockingAcceptPool::spawn(config)
        .with_context(|| format!("failed to start blocking-accept pool on {addr}"))?;
    println!("[INFO] blocking-accept pool listening on {addr}");

    loop {
        thread::park();
    }
}
