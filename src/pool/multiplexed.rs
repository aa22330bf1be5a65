//! Shared socket, per-worker readiness contexts.
//!
//! The classic epoll thundering herd. One listening socket is registered
//! into N worker-private epoll instances; a single arriving connection makes
//! all of them readable at once, every waiting worker wakes, and all but one
//! find nothing left to accept. Registering with the exclusive-wake flag
//! asks the kernel to wake at most one waiter per connection instead. Same
//! loop, one toggle.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::Builder;

use super::{readiness_setup, report_setup_failure, serve_readiness, Worker};
use crate::config::AcceptorConfig;
use crate::endpoint::bind_listener;
use crate::error::{AcceptorError, Result, SetupStage};
use crate::observe::WorkerId;
use crate::poll::PollWaker;

/// Worker pool where every worker multiplexes the shared endpoint through
/// its own readiness context.
pub struct MultiplexedAcceptPool {
    listener: Arc<TcpListener>,
    workers: Vec<Worker>,
    running: Arc<AtomicBool>,
    waker: Arc<PollWaker>,
}

impl MultiplexedAcceptPool {
    /// Bind the shared endpoint and spawn the worker threads.
    ///
    /// The endpoint and the shutdown waker are supervisor-owned: failures
    /// there abort the whole pool. Each worker builds its own readiness
    /// context on its own thread; a failure there is reported through the
    /// observer and ends that worker only.
    pub fn spawn(config: AcceptorConfig) -> Result<Self> {
        let listener = Arc::new(bind_listener(config.addr, config.backlog, false, true)?);
        let waker = Arc::new(
            PollWaker::new().map_err(|e| AcceptorError::setup(SetupStage::Poll, e))?,
        );
        let running = Arc::new(AtomicBool::new(true));
        let next_conn = Arc::new(AtomicU64::new(1));

        let mut workers = Vec::with_capacity(config.workers);
        for ordinal in 1..=config.workers {
            let id = WorkerId(ordinal);
            let listener = Arc::clone(&listener);
            let waker = Arc::clone(&waker);
            let running = Arc::clone(&running);
            let next_conn = Arc::clone(&next_conn);
            let observer = Arc::clone(&config.observer);
            let exclusive = config.exclusive_wake;
            let wake_delay = config.wake_delay;

            let thread = Builder::new()
                .name(format!("mux-acceptor-{ordinal}"))
                .spawn(move || {
                    let poll = match readiness_setup(&listener, &waker, exclusive) {
                        Ok(poll) => poll,
                        Err(err) => {
                            report_setup_failure(observer.as_ref(), id, err);
                            return;
                        }
                    };
                    serve_readiness(
                        id,
                        &listener,
                        &poll,
                        &running,
                        wake_delay,
                        observer.as_ref(),
                        &next_conn,
                    );
                })
                .map_err(AcceptorError::Spawn)?;
            workers.push(Worker::new(id, thread));
        }

        Ok(Self {
            listener,
            workers,
            running,
            waker,
        })
    }

    /// Address the shared endpoint actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Stop the pool: wake every readiness wait, then join the workers.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.waker.wake();
        for worker in &mut self.workers {
            worker.join();
        }
    }
}

impl Drop for MultiplexedAcceptPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
