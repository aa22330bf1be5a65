//! Per-worker sockets sharing one port.
//!
//! Every worker binds its own listening socket to the same address/port via
//! the port-reuse option and services it through a private readiness
//! context. The kernel hashes each incoming connection onto exactly one of
//! the sockets, so workers never race for an accept and never observe each
//! other's connections. The herd is avoided by construction rather than by
//! wakeup policy; the pool implements no balancing of its own.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::Builder;

use super::{readiness_setup, report_setup_failure, serve_readiness, Worker};
use crate::config::AcceptorConfig;
use crate::endpoint::bind_listener;
use crate::error::{AcceptorError, Result, SetupStage};
use crate::observe::WorkerId;
use crate::poll::PollWaker;

/// Worker pool where every worker owns a port-sharing listening endpoint.
pub struct PortSharedPool {
    workers: Vec<Worker>,
    running: Arc<AtomicBool>,
    waker: Arc<PollWaker>,
    addr: SocketAddr,
}

impl PortSharedPool {
    /// Spawn the worker threads. Each worker performs its own endpoint
    /// setup on its own thread, so a bind failure is reported through the
    /// observer and ends that worker without touching its siblings;
    /// `spawn` itself fails only if the shutdown waker cannot be built or a
    /// thread cannot be created.
    pub fn spawn(config: AcceptorConfig) -> Result<Self> {
        let waker = Arc::new(
            PollWaker::new().map_err(|e| AcceptorError::setup(SetupStage::Poll, e))?,
        );
        let running = Arc::new(AtomicBool::new(true));
        let next_conn = Arc::new(AtomicU64::new(1));
        let addr = config.addr;

        let mut workers = Vec::with_capacity(config.workers);
        for ordinal in 1..=config.workers {
            let id = WorkerId(ordinal);
            let waker = Arc::clone(&waker);
            let running = Arc::clone(&running);
            let next_conn = Arc::clone(&next_conn);
            let observer = Arc::clone(&config.observer);
            let backlog = config.backlog;
            let wake_delay = config.wake_delay;

            let thread = Builder::new()
                .name(format!("reuseport-acceptor-{ordinal}"))
                .spawn(move || {
                    let listener = match bind_listener(addr, backlog, true, true) {
                        Ok(listener) => listener,
                        Err(err) => {
                            report_setup_failure(observer.as_ref(), id, err);
                            return;
                        }
                    };
                    let poll = match readiness_setup(&listener, &waker, false) {
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
            workers,
            running,
            waker,
            addr,
        })
    }

    /// Address every worker's endpoint binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
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

impl Drop for PortSharedPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
