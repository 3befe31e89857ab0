//! Shared doubles and crate-level behaviour tests.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use mockall::mock;
use uda_config::HostPort;
use uda_protocol::message::{read_hello, read_request, write_hello, write_response};
use uda_protocol::{
    ClientMessage, Hello, RecordReader, RecordWriter, Response, StructureCodec,
};

use crate::connection::{ConnectFailure, Connector, Sleeper};


mock! {
    pub Pause {}

    impl Sleeper for Pause {
        fn sleep(&self, duration: Duration);
    }
}

/// What the next connect attempt to a host does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Refuse,
    Unresolvable,
    BadOption,
    Accept,
}

/// Bytes a server sends to open a session.
pub(crate) fn hello_bytes(hello: &Hello) -> Vec<u8> {
    let mut output = RecordWriter::new(Vec::new());
    write_hello(&mut output, hello).expect("hello encodes");
    output.get_ref().clone()
}

/// A stream preloaded with the server's side of the conversation.
#[derive(Debug)]
pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    written: Vec<u8>,
}

impl ScriptedStream {
    pub(crate) fn new(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            written: Vec::new(),
        }
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        self.input.read(buffer)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Plays back a per-host list of outcomes; hosts without a script refuse.
#[derive(Debug, Default)]
pub(crate) struct ScriptedConnector {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    attempts: Mutex<Vec<String>>,
    server_hello: Option<Hello>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(self, host: &str, outcomes: &[Outcome]) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(host.to_owned(), outcomes.iter().copied().collect());
        self
    }

    pub(crate) fn with_server_hello(mut self, hello: Hello) -> Self {
        self.server_hello = Some(hello);
        self
    }

    pub(crate) fn attempts(&self) -> Vec<String> {
        self.attempts.lock().expect("attempts lock").clone()
    }

    pub(crate) fn attempts_on(&self, host: &str) -> usize {
        self.attempts().iter().filter(|name| *name == host).count()
    }
}

impl Connector for ScriptedConnector {
    type Stream = ScriptedStream;

    fn connect(&self, host: &HostPort, _timeout: Duration) -> Result<ScriptedStream, ConnectFailure> {
        self.attempts
            .lock()
            .expect("attempts lock")
            .push(host.host().to_owned());
        let outcome = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get_mut(host.host())
            .and_then(VecDeque::pop_front)
            .unwrap_or(Outcome::Refuse);
        match outcome {
            Outcome::Refuse => Err(ConnectFailure::Connect(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            ))),
            Outcome::Unresolvable => Err(ConnectFailure::Resolve(io::Error::from(
                io::ErrorKind::NotFound,
            ))),
            Outcome::BadOption => Err(ConnectFailure::Configure(io::Error::from(
                io::ErrorKind::InvalidInput,
            ))),
            Outcome::Accept => {
                let hello = self
                    .server_hello
                    .clone()
                    .unwrap_or_else(|| Hello::new("scripted udad"));
                Ok(ScriptedStream::new(hello_bytes(&hello)))
            }
        }
    }
}

type Responder = dyn Fn(&ClientMessage) -> Option<Response> + Send + Sync;

/// A TCP server that handshakes and answers each request through a closure.
/// Returning `None` from the closure drops the connection unanswered.
pub(crate) struct FakeServer {
    address: SocketAddr,
    accepted: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<ClientMessage>>>,
}

impl FakeServer {
    pub(crate) fn spawn(
        responder: impl Fn(&ClientMessage) -> Option<Response> + Send + Sync + 'static,
    ) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake server")?;
        let address = listener.local_addr().context("fake server address")?;
        let accepted = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));
        let responder: Arc<Responder> = Arc::new(responder);
        let counter = Arc::clone(&accepted);
        let log = Arc::clone(&received);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                counter.fetch_add(1, Ordering::SeqCst);
                let responder = Arc::clone(&responder);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    let _ = serve(stream, responder.as_ref(), &log);
                });
            }
        });
        Ok(Self {
            address,
            accepted,
            received,
        })
    }

    pub(crate) fn host_port(&self) -> HostPort {
        HostPort::new(self.address.ip().to_string(), self.address.port())
    }

    pub(crate) fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub(crate) fn received(&self) -> Vec<ClientMessage> {
        self.received.lock().expect("received lock").clone()
    }
}

fn serve(stream: TcpStream, responder: &Responder, log: &Mutex<Vec<ClientMessage>>) -> Result<()> {
    let codec = StructureCodec::new();
    let mut input = RecordReader::new(stream.try_clone().context("clone stream")?);
    let mut output = RecordWriter::new(stream);
    read_hello(&mut input).context("client hello")?;
    write_hello(&mut output, &Hello::new("fake udad")).context("server hello")?;
    while let Some(message) = read_request(&mut input, &codec).context("request")? {
        if message == ClientMessage::Close {
            break;
        }
        log.lock().expect("received lock").push(message.clone());
        let Some(response) = responder(&message) else {
            return Ok(());
        };
        write_response(&mut output, &codec, &response).context("response")?;
    }
    Ok(())
}
