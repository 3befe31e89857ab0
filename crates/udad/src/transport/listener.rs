//! Accept loop for the server socket.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// A bound TCP listener that has not started accepting yet.
#[derive(Debug)]
pub struct SocketListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl SocketListener {
    /// Binds the first address `address` resolves to.
    ///
    /// # Errors
    ///
    /// Fails when the address does not resolve or cannot be bound.
    pub fn bind(address: &str) -> Result<Self, ListenerError> {
        let mut addrs = address
            .to_socket_addrs()
            .map_err(|source| ListenerError::Resolve {
                address: address.to_owned(),
                source,
            })?;
        let addr = addrs
            .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
            .ok_or_else(|| ListenerError::ResolveEmpty {
                address: address.to_owned(),
            })?;
        let listener =
            TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound; differs from the request when port 0 was asked for.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop on a background thread.
    ///
    /// # Errors
    ///
    /// Fails when the socket cannot be switched to non-blocking mode.
    pub fn start(self, handler: Arc<dyn ConnectionHandler>) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let local_addr = self.local_addr;
        let handle = thread::spawn(move || run_accept_loop(&self, &shutdown_flag, &handler));
        Ok(ListenerHandle {
            shutdown,
            local_addr,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept thread.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    local_addr: SocketAddr,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Address clients connect to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Asks the accept loop to stop.
    ///
    /// Once the loop sees the flag it closes the read side of every open
    /// connection, so each worker finishes the request it is serving and then
    /// sees the client hang up.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop and every session worker to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the accept thread panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// A running session worker and the control half of its connection.
struct Worker {
    handle: thread::JoinHandle<()>,
    control: TcpStream,
}

fn run_accept_loop(
    listener: &SocketListener,
    shutdown: &AtomicBool,
    handler: &Arc<dyn ConnectionHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        address = %listener.local_addr,
        "socket listener active"
    );
    let mut workers = Vec::new();
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        workers.retain(|worker: &Worker| !worker.handle.is_finished());
        match accept_connection(&listener.listener) {
            Ok(Some((stream, peer))) => {
                last_error = None;
                debug!(target: LISTENER_TARGET, peer = %peer, "accepted connection");
                if let Some(worker) = spawn_worker(stream, peer, handler) {
                    workers.push(worker);
                }
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    drain_workers(workers);
    info!(target: LISTENER_TARGET, "socket listener stopped");
}

fn spawn_worker(
    stream: TcpStream,
    peer: SocketAddr,
    handler: &Arc<dyn ConnectionHandler>,
) -> Option<Worker> {
    let control = match stream.try_clone() {
        Ok(control) => control,
        Err(error) => {
            warn!(target: LISTENER_TARGET, peer = %peer, error = %error, "dropping connection");
            return None;
        }
    };
    let worker = Arc::clone(handler);
    match thread::Builder::new()
        .name(format!("udad-session-{peer}"))
        .spawn(move || worker.handle(stream))
    {
        Ok(handle) => Some(Worker { handle, control }),
        Err(error) => {
            warn!(target: LISTENER_TARGET, peer = %peer, error = %error, "failed to spawn session worker");
            None
        }
    }
}

/// Ends every open session after its current request and waits for the
/// workers.
fn drain_workers(workers: Vec<Worker>) {
    if !workers.is_empty() {
        info!(target: LISTENER_TARGET, sessions = workers.len(), "draining sessions");
    }
    for worker in &workers {
        if let Err(error) = worker.control.shutdown(Shutdown::Read) {
            debug!(target: LISTENER_TARGET, error = %error, "connection already closed");
        }
    }
    for worker in workers {
        if worker.handle.join().is_err() {
            warn!(target: LISTENER_TARGET, "session worker panicked");
        }
    }
}

fn accept_connection(listener: &TcpListener) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    match listener.accept() {
        Ok((stream, peer)) => {
            stream.set_nonblocking(false)?;
            Ok(Some((stream, peer)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}
