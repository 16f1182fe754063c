//! TCP listener for the custodian's notification feed.

use std::io::{self, BufRead, BufReader};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::SERVER_TARGET;
use crate::protocol::{Notification, ProtocolError};
use crate::sink::NotificationSink;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const READ_POLL: Duration = Duration::from_millis(50);
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Errors surfaced while binding or running the notification server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind notification listener at {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to read notification listener address: {source}")]
    LocalAddr {
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("notification listener thread panicked")]
    ThreadPanic,
}

/// Bound but not yet running notification listener.
#[derive(Debug)]
pub struct NotificationServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl NotificationServer {
    /// Binds `addr`; port `0` picks a free port.
    pub fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::LocalAddr { source })?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Binds a free loopback port.
    pub fn bind_loopback() -> Result<Self, ServerError> {
        Self::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    }

    /// Address the custodian should connect to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections on a background thread.
    pub fn start(self, sink: Arc<dyn NotificationSink>) -> Result<ServerHandle, ServerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ServerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let local_addr = self.local_addr;
        let handle = thread::spawn(move || run_accept_loop(&self, &shutdown_flag, &sink));
        Ok(ServerHandle {
            shutdown,
            handle: Some(handle),
            local_addr,
        })
    }
}

/// Handle to the running accept loop.
///
/// Dropping the handle requests shutdown without waiting; call
/// [`ServerHandle::join`] to wait until every connection thread has exited.
#[derive(Debug)]
pub struct ServerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// Address the server is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Asks the accept loop and connection readers to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop and its connection readers to exit.
    pub fn join(mut self) -> Result<(), ServerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ServerError::ThreadPanic),
            None => Ok(()),
        }
    }

    /// Shuts down and joins.
    pub fn stop(self) -> Result<(), ServerError> {
        self.shutdown();
        self.join()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    server: &NotificationServer,
    shutdown: &Arc<AtomicBool>,
    sink: &Arc<dyn NotificationSink>,
) {
    info!(
        target: SERVER_TARGET,
        addr = %server.local_addr,
        "notification listener active"
    );
    let mut readers: Vec<JoinHandle<()>> = Vec::new();
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match server.listener.accept() {
            Ok((stream, peer)) => {
                last_error = None;
                let shutdown = Arc::clone(shutdown);
                let sink = Arc::clone(sink);
                readers.push(thread::spawn(move || {
                    read_connection(stream, peer, &shutdown, sink.as_ref());
                }));
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: SERVER_TARGET,
                        error = %error,
                        "notification accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
        readers.retain(|reader| !reader.is_finished());
    }

    for reader in readers {
        if reader.join().is_err() {
            warn!(target: SERVER_TARGET, "notification reader panicked");
        }
    }
    info!(target: SERVER_TARGET, addr = %server.local_addr, "notification listener stopped");
}

fn read_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: &AtomicBool,
    sink: &dyn NotificationSink,
) {
    if let Err(error) = prepare_stream(&stream) {
        warn!(target: SERVER_TARGET, %peer, error = %error, "failed to configure connection");
        return;
    }
    debug!(target: SERVER_TARGET, %peer, "notification connection accepted");
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    while !shutdown.load(Ordering::SeqCst) {
        // A timed-out read leaves the partial line in `line`.
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                if !line.is_empty() {
                    handle_line(&line, peer, sink);
                }
                break;
            }
            Ok(_) if line.ends_with(b"\n") => {
                handle_line(&line, peer, sink);
                line.clear();
            }
            Ok(_) => {}
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(error) => {
                warn!(target: SERVER_TARGET, %peer, error = %error, "notification read error");
                break;
            }
        }
        if line.len() > MAX_LINE_BYTES {
            warn!(
                target: SERVER_TARGET,
                %peer,
                limit = MAX_LINE_BYTES,
                "notification line exceeds limit, closing connection"
            );
            break;
        }
    }
    debug!(target: SERVER_TARGET, %peer, "notification connection closed");
}

fn prepare_stream(stream: &TcpStream) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_POLL))
}

fn handle_line(line: &[u8], peer: SocketAddr, sink: &dyn NotificationSink) {
    match Notification::decode(line) {
        Ok(notification) => {
            debug!(
                target: SERVER_TARGET,
                %peer,
                kind = notification.kind(),
                "notification received"
            );
            sink.deliver(notification);
        }
        Err(ProtocolError::Empty) => {}
        Err(error) => {
            warn!(target: SERVER_TARGET, %peer, error = %error, "discarding notification");
        }
    }
}
