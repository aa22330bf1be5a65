//! Per-worker readiness notification.
//!
//! Each readiness-driven worker owns a private [`ReadinessPoll`], an epoll
//! instance wrapping [`nix::sys::epoll::Epoll`]. The shared listening socket
//! is registered into every worker's instance, which is exactly the setup
//! that produces the thundering herd: one arriving connection makes the
//! listener readable in N epoll instances at once. Registration takes an
//! `exclusive` flag mapping to `EPOLLEXCLUSIVE`, the kernel's at-most-one
//! wakeup policy, so herd and no-herd runs differ by one toggle rather than
//! two code paths.
//!
//! [`PollWaker`] is the shutdown side: a pipe whose read end is registered
//! (level-triggered, never exclusive) into every worker's instance under a
//! reserved token. One write makes every instance readable and stays
//! readable, so all workers drain out of indefinite waits regardless of the
//! wakeup policy on the listener.

use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::time::Duration;

use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::unistd;

/// Reserved registration token for the shutdown waker.
pub const WAKE_TOKEN: u64 = 0;
/// Registration token for a listening endpoint.
pub const LISTENER_TOKEN: u64 = 1;

fn into_io(errno: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(errno as i32)
}

/// A worker-private readiness context.
pub struct ReadinessPoll {
    epoll: Epoll,
}

impl ReadinessPoll {
    pub fn new() -> io::Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC).map_err(into_io)?;
        Ok(Self { epoll })
    }

    /// Register read-readiness interest for `source` under `token`.
    ///
    /// With `exclusive` set, the kernel wakes at most one of the contexts
    /// this source is registered into per readiness transition; without it,
    /// every waiting context is woken and the wakers race.
    pub fn register<F: AsFd>(&self, source: F, token: u64, exclusive: bool) -> io::Result<()> {
        let mut interest = EpollFlags::EPOLLIN;
        if exclusive {
            interest |= EpollFlags::EPOLLEXCLUSIVE;
        }
        self.epoll
            .add(source, EpollEvent::new(interest, token))
            .map_err(into_io)
    }

    /// Wait for readiness, filling `events`. `None` blocks indefinitely.
    ///
    /// Returns the number of events reported. Callers are expected to treat
    /// `ErrorKind::Interrupted` as a restartable wait.
    pub fn wait(&self, events: &mut [EpollEvent], timeout: Option<Duration>) -> io::Result<usize> {
        let timeout = match timeout {
            Some(d) => u16::try_from(d.as_millis())
                .map(EpollTimeout::from)
                .unwrap_or(EpollTimeout::NONE),
            None => EpollTimeout::NONE,
        };
        self.epoll.wait(events, timeout).map_err(into_io)
    }
}

/// Shutdown waker shared by a pool's workers.
///
/// Plays the role of a reactor's reserved-token waker: writing once leaves
/// the read end readable until the pool is torn down, so every registered
/// context observes the wake no matter when it next waits.
pub struct PollWaker {
    reader: OwnedFd,
    writer: OwnedFd,
}

impl PollWaker {
    pub fn new() -> io::Result<Self> {
        let (reader, writer) = unistd::pipe().map_err(into_io)?;
        Ok(Self { reader, writer })
    }

    /// Wake every context the read end is registered into.
    pub fn wake(&self) -> io::Result<()> {
        unistd::write(&self.writer, &[1u8]).map_err(into_io)?;
        Ok(())
    }

    /// The fd workers register under [`WAKE_TOKEN`].
    pub fn read_fd(&self) -> BorrowedFd<'_> {
        self.reader.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::bind_listener;
    use std::net::TcpStream;

    #[test]
    fn idle_wait_times_out_with_no_events() {
        let poll = ReadinessPoll::new().unwrap();
        let mut events = vec![EpollEvent::empty(); 8];
        let n = poll
            .wait(&mut events, Some(Duration::from_millis(50)))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn waker_write_is_reported_under_the_reserved_token() {
        let poll = ReadinessPoll::new().unwrap();
        let waker = PollWaker::new().unwrap();
        poll.register(waker.read_fd(), WAKE_TOKEN, false).unwrap();

        waker.wake().unwrap();

        let mut events = vec![EpollEvent::empty(); 8];
        let n = poll.wait(&mut events, Some(Duration::from_secs(2))).unwrap();
        assert_eq!(n, 1);
        assert_eq!(events[0].data(), WAKE_TOKEN);

        // Level-triggered: the wake stays visible on a second wait.
        let n = poll
            .wait(&mut events, Some(Duration::from_millis(50)))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn listener_readiness_is_reported_on_connect() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 16, false, true).unwrap();
        let addr = listener.local_addr().unwrap();

        let poll = ReadinessPoll::new().unwrap();
        poll.register(&listener, LISTENER_TOKEN, false).unwrap();

        let client = TcpStream::connect(addr).unwrap();

        let mut events = vec![EpollEvent::empty(); 8];
        let n = poll.wait(&mut events, Some(Duration::from_secs(2))).unwrap();
        assert_eq!(n, 1);
        assert_eq!(events[0].data(), LISTENER_TOKEN);

        let (_stream, _peer) = listener.accept().unwrap();
        drop(client);
    }

    #[test]
    fn exclusive_registration_is_accepted() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 16, false, true).unwrap();
        let poll = ReadinessPoll::new().unwrap();
        poll.register(&listener, LISTENER_TOKEN, true).unwrap();
    }
}
