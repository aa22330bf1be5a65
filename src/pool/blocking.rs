//! Shared socket, blocking accept.
//!
//! One listening socket; every worker thread parks inside `accept(2)` on it
//! and the kernel's accept wait queue decides which thread services each
//! arriving connection. Modern kernels wake exactly one blocked acceptor per
//! connection, so no herd is observable here, which is the behavior this
//! variant exists to demonstrate. The pool adds no fairness logic of its
//! own.

use std::net::{SocketAddr, TcpListener};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::Builder;

use super::Worker;
use crate::config::AcceptorConfig;
use crate::endpoint::bind_listener;
use crate::error::{AcceptorError, Result};
use crate::observe::{AcceptEvent, ConnectionId, Observer, WorkerId};

/// Worker pool where every worker blocks in `accept` on one shared endpoint.
pub struct BlockingAcceptPool {
    listener: Arc<TcpListener>,
    workers: Vec<Worker>,
    running: Arc<AtomicBool>,
}

impl BlockingAcceptPool {
    /// Bind the shared endpoint and spawn the worker threads.
    ///
    /// The endpoint is supervisor-owned, so any setup failure aborts the
    /// whole pool before a single worker runs.
    ///
    /// ## Errors
    ///
    /// Returns [`AcceptorError::Setup`] if the endpoint cannot be built and
    /// [`AcceptorError::Spawn`] if a worker thread cannot be created.
    pub fn spawn(config: AcceptorConfig) -> Result<Self> {
        let listener = Arc::new(bind_listener(config.addr, config.backlog, false, false)?);
        let running = Arc::new(AtomicBool::new(true));
        let next_conn = Arc::new(AtomicU64::new(1));

        let mut workers = Vec::with_capacity(config.workers);
        for ordinal in 1..=config.workers {
            let id = WorkerId(ordinal);
            let listener = Arc::clone(&listener);
            let running = Arc::clone(&running);
            let next_conn = Arc::clone(&next_conn);
            let observer = Arc::clone(&config.observer);

            let thread = Builder::new()
                .name(format!("blocking-acceptor-{ordinal}"))
                .spawn(move || serve(id, &listener, &running, observer.as_ref(), &next_conn))
                .map_err(AcceptorError::Spawn)?;
            workers.push(Worker::new(id, thread));
        }

        Ok(Self {
            listener,
            workers,
            running,
        })
    }

    /// Address the shared endpoint actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Stop the pool: force every blocked accept to return, then join the
    /// workers. Idempotent.
    pub fn shutdown(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // A thread blocked in accept does not notice its fd being closed by
        // another thread; shutdown(2) on the listening socket forces the
        // call to return with an error.
        unsafe {
            libc::shutdown(self.listener.as_raw_fd(), libc::SHUT_RDWR);
        }
        for worker in &mut self.workers {
            worker.join();
        }
    }
}

impl Drop for BlockingAcceptPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(
    id: WorkerId,
    listener: &TcpListener,
    running: &AtomicBool,
    observer: &dyn Observer,
    next_conn: &AtomicU64,
) {
    observer.on_event(&AcceptEvent::WorkerStarted { worker: id });

    while running.load(Ordering::SeqCst) {
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
            Err(e) => {
                if !running.load(Ordering::SeqCst) {
                    // Shutdown forced the accept to return.
                    return;
                }
                observer.on_event(&AcceptEvent::AcceptFailed {
                    worker: id,
                    reason: e.to_string(),
                });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::MemoryObserver;
    use std::net::TcpStream;
    use std::time::Duration;

    fn spawn_pool(workers: usize) -> (BlockingAcceptPool, Arc<MemoryObserver>) {
        let observer = Arc::new(MemoryObserver::new());
        let config = AcceptorConfig::builder()
            .addr("127.0.0.1:0".parse().unwrap())
            .workers(workers)
            .observer(Arc::clone(&observer) as Arc<dyn Observer>)
            .build();
        let pool = BlockingAcceptPool::spawn(config).unwrap();
        (pool, observer)
    }

    fn wait_for_started(observer: &MemoryObserver, count: usize) {
        assert!(
            observer.wait_for(Duration::from_secs(5), |events| {
                events
                    .iter()
                    .filter(|e| matches!(e, AcceptEvent::WorkerStarted { .. }))
                    .count()
                    == count
            }),
            "workers did not start in time"
        );
    }

    fn accepted(events: &[AcceptEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, AcceptEvent::Accepted { .. }))
            .count()
    }

    #[test]
    fn single_connection_is_served_by_exactly_one_worker() {
        let (mut pool, observer) = spawn_pool(4);
        wait_for_started(&observer, 4);
        let addr = pool.local_addr().unwrap();

        let _client = TcpStream::connect(addr).unwrap();
        assert!(observer.wait_for(Duration::from_secs(5), |events| accepted(events) == 1));

        // The other three workers must stay parked in accept.
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(observer.accepted_count(), 1);
        let events = observer.events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, AcceptEvent::AcceptFailed { .. })));

        pool.shutdown();
    }

    #[test]
    fn every_connection_is_attributed_exactly_once() {
        let (mut pool, observer) = spawn_pool(4);
        wait_for_started(&observer, 4);
        let addr = pool.local_addr().unwrap();

        let clients: Vec<_> = (0..6).map(|_| TcpStream::connect(addr).unwrap()).collect();
        assert!(observer.wait_for(Duration::from_secs(5), |events| accepted(events) == 6));

        let events = observer.events();
        let mut connection_ids: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                AcceptEvent::Accepted { connection, .. } => Some(connection.as_u64()),
                _ => None,
            })
            .collect();
        connection_ids.sort_unstable();
        connection_ids.dedup();
        assert_eq!(connection_ids.len(), 6, "duplicate attribution");

        drop(clients);
        pool.shutdown();
    }

    #[test]
    fn shutdown_unblocks_and_joins_all_workers() {
        let (mut pool, observer) = spawn_pool(4);
        wait_for_started(&observer, 4);

        pool.shutdown();
        // Idempotent: a second call is a no-op.
        pool.shutdown();

        // No worker reported a failure on the shutdown path.
        let events = observer.events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, AcceptEvent::AcceptFailed { .. })));
    }

    #[test]
    fn port_is_immediately_rebindable_after_shutdown() {
        let (mut pool, observer) = spawn_pool(2);
        wait_for_started(&observer, 2);
        let addr = pool.local_addr().unwrap();
        pool.shutdown();
        drop(pool);

        let observer = Arc::new(MemoryObserver::new());
        let config = AcceptorConfig::builder()
            .addr(addr)
            .workers(2)
            .observer(Arc::clone(&observer) as Arc<dyn Observer>)
            .build();
        let mut pool = BlockingAcceptPool::spawn(config).unwrap();
        wait_for_started(&observer, 2);
        pool.shutdown();
    }
}
