//! Listening-endpoint factory.
//!
//! Produces a bound, listening TCP socket with a bounded backlog and the
//! socket options the acceptance variants need: address reuse always (rapid
//! rebind after restart), port reuse only for the per-worker-socket variant
//! (several sockets listening on one address/port), and non-blocking mode for
//! the readiness-driven variants so a raced accept reports `WouldBlock`
//! instead of parking the worker.
//!
//! Each failing step maps to its own [`SetupStage`] so a caller can tell a
//! bind conflict from a listen failure. The factory never retries; the
//! caller decides whether the failure kills the whole pool or one worker.

use std::net::{SocketAddr, TcpListener};

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{AcceptorError, Result, SetupStage};

/// Bind a listening socket on `addr` with the given backlog.
///
/// ## Errors
///
/// Returns [`AcceptorError::Setup`] naming the stage that failed:
/// `Socket` for socket creation, `Options` for option application,
/// `Bind` for the bind call (e.g. the port is already exclusively bound),
/// `Listen` for entering the listening state.
pub fn bind_listener(
    addr: SocketAddr,
    backlog: i32,
    reuse_port: bool,
    nonblocking: bool,
) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| AcceptorError::setup(SetupStage::Socket, e))?;

    socket
        .set_reuse_address(true)
        .map_err(|e| AcceptorError::setup(SetupStage::Options, e))?;
    if reuse_port {
        socket
            .set_reuse_port(true)
            .map_err(|e| AcceptorError::setup(SetupStage::Options, e))?;
    }

    socket
        .bind(&addr.into())
        .map_err(|e| AcceptorError::setup(SetupStage::Bind, e))?;
    socket
        .listen(backlog)
        .map_err(|e| AcceptorError::setup(SetupStage::Listen, e))?;

    if nonblocking {
        socket
            .set_nonblocking(true)
            .map_err(|e| AcceptorError::setup(SetupStage::Options, e))?;
    }

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BACKLOG;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn binds_and_listens() {
        let listener = bind_listener(loopback(), DEFAULT_BACKLOG, false, false).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn rebinding_after_drop_succeeds() {
        let first = bind_listener(loopback(), DEFAULT_BACKLOG, false, false).unwrap();
        let addr = first.local_addr().unwrap();
        drop(first);

        // SO_REUSEADDR must make the port immediately bindable again.
        let second = bind_listener(addr, DEFAULT_BACKLOG, false, false).unwrap();
        assert_eq!(second.local_addr().unwrap(), addr);
    }

    #[test]
    fn double_bind_without_port_reuse_fails_at_bind_stage() {
        let first = bind_listener(loopback(), DEFAULT_BACKLOG, false, false).unwrap();
        let addr = first.local_addr().unwrap();

        match bind_listener(addr, DEFAULT_BACKLOG, false, false) {
            Err(AcceptorError::Setup { stage, .. }) => assert_eq!(stage, SetupStage::Bind),
            other => panic!("expected bind failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn port_reuse_allows_parallel_binds() {
        let first = bind_listener(loopback(), DEFAULT_BACKLOG, true, false).unwrap();
        let addr = first.local_addr().unwrap();

        let second = bind_listener(addr, DEFAULT_BACKLOG, true, false).unwrap();
        assert_eq!(second.local_addr().unwrap(), addr);
    }

    #[test]
    fn nonblocking_listener_reports_would_block() {
        let listener = bind_listener(loopback(), DEFAULT_BACKLOG, false, true).unwrap();
        match listener.accept() {
            Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::WouldBlock),
            Ok(_) => panic!("accept on an idle non-blocking listener cannot succeed"),
        }
    }
}
