//! The main ingest event loop: `mio`-driven readiness polling over UDP
//! sockets and plaintext TCP listeners/connections, plus a thread-per-
//! connection model for TLS listeners.

use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::{Events, Interest, Poll, Token};

use crate::processor::Processor;
use crate::stats::Stats;
use crate::tls;

const POLL_TIMEOUT: Duration = Duration::from_millis(250);
const SHUTDOWN_LINGER: Duration = Duration::from_millis(250);
const UDP_BUF_SIZE: usize = 8192;
const TCP_READ_BUF_SIZE: usize = 4096;

/// Errors starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("binding {kind} socket on {addr}: {source}")]
    Bind {
        kind: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("TLS requested but no certificate/CA configured")]
    TlsNotConfigured,
    #[error(transparent)]
    TlsConfig(#[from] tls::TlsConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Addresses the server listens on.
pub struct ListenConfig {
    pub udp: Vec<SocketAddr>,
    pub tcp: Vec<SocketAddr>,
    pub tls: Vec<SocketAddr>,
    pub pemfile: Option<std::path::PathBuf>,
    pub cacert: Option<std::path::PathBuf>,
}

/// Everything [`Server::run`] needs to act on a SIGHUP. Passing `None` to
/// [`Server::bind`] means the daemon has no facilities config to reload
/// against (only used by tests that construct a `Processor` directly).
pub struct ReloadConfig {
    pub facilities_conf: std::path::PathBuf,
    pub main_config: Option<crate::config::MainConfigGuard>,
    pub reload: Arc<AtomicBool>,
}

struct ClientConn {
    stream: TcpStream,
    addr: SocketAddr,
    buf: Vec<u8>,
}

enum Registered {
    Udp(UdpSocket),
    TcpListener(TcpListener),
}

/// Owns every listening and connected socket and drives the event loop
/// until told to shut down.
pub struct Server {
    poll: Poll,
    registered: HashMap<Token, Registered>,
    clients: HashMap<Token, ClientConn>,
    next_token: usize,
    shutdown: Arc<AtomicBool>,
    processor: Arc<Processor>,
    stats: Arc<Stats>,
    tls_threads: Vec<std::thread::JoinHandle<()>>,
    reload: Option<ReloadConfig>,
}

impl Server {
    pub fn bind(
        listen: ListenConfig,
        processor: Arc<Processor>,
        stats: Arc<Stats>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Server, ServerError> {
        Self::bind_with_reload(listen, processor, stats, shutdown, None)
    }

    /// Same as [`Server::bind`], additionally observing SIGHUP via
    /// `reload.reload` and performing [`crate::reload::reload`] in the
    /// event loop when it fires.
    pub fn bind_with_reload(
        listen: ListenConfig,
        processor: Arc<Processor>,
        stats: Arc<Stats>,
        shutdown: Arc<AtomicBool>,
        reload: Option<ReloadConfig>,
    ) -> Result<Server, ServerError> {
        let poll = Poll::new()?;
        let mut registered = HashMap::new();
        let mut next_token = 0usize;

        for addr in &listen.udp {
            let mut sock = UdpSocket::bind(*addr).map_err(|source| ServerError::Bind {
                kind: "UDP",
                addr: *addr,
                source,
            })?;
            let token = Token(next_token);
            next_token += 1;
            poll.registry().register(&mut sock, token, Interest::READABLE)?;
            tracing::info!(%addr, "listening on UDP");
            registered.insert(token, Registered::Udp(sock));
        }

        for addr in &listen.tcp {
            let mut listener = TcpListener::bind(*addr).map_err(|source| ServerError::Bind {
                kind: "TCP",
                addr: *addr,
                source,
            })?;
            let token = Token(next_token);
            next_token += 1;
            poll.registry().register(&mut listener, token, Interest::READABLE)?;
            tracing::info!(%addr, "listening on TCP");
            registered.insert(token, Registered::TcpListener(listener));
        }

        let mut server = Server {
            poll,
            registered,
            clients: HashMap::new(),
            next_token,
            shutdown: Arc::clone(&shutdown),
            processor: Arc::clone(&processor),
            stats: Arc::clone(&stats),
            tls_threads: Vec::new(),
            reload,
        };

        if !listen.tls.is_empty() {
            let pemfile = listen.pemfile.ok_or(ServerError::TlsNotConfigured)?;
            let cacert = listen.cacert.ok_or(ServerError::TlsNotConfigured)?;
            let tls_config = tls::build_server_config(&pemfile, &cacert)?;

            for addr in &listen.tls {
                let listener = StdTcpListener::bind(addr).map_err(|source| ServerError::Bind {
                    kind: "TLS",
                    addr: *addr,
                    source,
                })?;
                tracing::info!(%addr, "listening on TLS");
                server.spawn_tls_acceptor(listener, Arc::clone(&tls_config));
            }
        }

        Ok(server)
    }

    fn spawn_tls_acceptor(&mut self, listener: StdTcpListener, tls_config: Arc<rustls::ServerConfig>) {
        let processor = Arc::clone(&self.processor);
        let stats = Arc::clone(&self.stats);
        let shutdown = Arc::clone(&self.shutdown);

        listener.set_nonblocking(true).ok();

        let handle = std::thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, addr)) => {
                        stream.set_nonblocking(false).ok();
                        let processor = Arc::clone(&processor);
                        let stats = Arc::clone(&stats);
                        let tls_config = Arc::clone(&tls_config);
                        let shutdown = Arc::clone(&shutdown);
                        std::thread::spawn(move || {
                            handle_tls_connection(stream, addr, tls_config, processor, stats, shutdown)
                        });
                    }
                    Err(error) if error.kind() == ErrorKind::WouldBlock => {
                        std::thread::sleep(POLL_TIMEOUT);
                    }
                    Err(error) => {
                        tracing::warn!(%error, "TLS listener accept failed");
                    }
                }
            }
        });
        self.tls_threads.push(handle);
    }

    fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Runs the event loop until the shutdown flag is set, then drains
    /// client connections and returns.
    pub fn run(&mut self) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(128);

        while !self.shutdown.load(Ordering::Relaxed) {
            self.maybe_reload();

            match self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }

            for event in events.iter() {
                self.handle_event(event.token())?;
            }
        }

        self.shutdown_connections();
        for handle in self.tls_threads.drain(..) {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Checks and clears the reload flag; if it was set, runs one SIGHUP
    /// reload cycle. A refused or failed reload is logged and the daemon
    /// keeps running under its previous configuration.
    fn maybe_reload(&self) {
        let Some(reload_config) = &self.reload else { return };
        if !reload_config.reload.swap(false, Ordering::Relaxed) {
            return;
        }

        tracing::info!("SIGHUP received, reloading facility configuration");
        match crate::reload::reload(&reload_config.facilities_conf, reload_config.main_config.as_ref(), &self.processor) {
            Ok(()) => tracing::info!("reload complete"),
            Err(error) => tracing::warn!(%error, "reload refused, continuing with previous configuration"),
        }
    }

    fn handle_event(&mut self, token: Token) -> Result<(), ServerError> {
        if let Some(registered) = self.registered.get_mut(&token) {
            match registered {
                Registered::Udp(sock) => Self::drain_udp(sock, &self.processor, &self.stats),
                Registered::TcpListener(listener) => {
                    let mut accepted = Vec::new();
                    loop {
                        match listener.accept() {
                            Ok((stream, addr)) => accepted.push((stream, addr)),
                            Err(error) if error.kind() == ErrorKind::WouldBlock => break,
                            Err(error) => {
                                tracing::warn!(%error, "TCP accept failed");
                                break;
                            }
                        }
                    }
                    for (mut stream, addr) in accepted {
                        let token = self.next_token();
                        if self
                            .poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                            .is_ok()
                        {
                            self.clients.insert(
                                token,
                                ClientConn {
                                    stream,
                                    addr,
                                    buf: Vec::new(),
                                },
                            );
                        }
                    }
                }
            }
            return Ok(());
        }

        let disconnect = if let Some(client) = self.clients.get_mut(&token) {
            Self::drain_client(client, &self.processor, &self.stats)
        } else {
            false
        };

        if disconnect {
            if let Some(mut client) = self.clients.remove(&token) {
                let _ = self.poll.registry().deregister(&mut client.stream);
            }
        }

        Ok(())
    }

    fn drain_udp(sock: &mut UdpSocket, processor: &Arc<Processor>, stats: &Arc<Stats>) {
        let mut buf = [0u8; UDP_BUF_SIZE];
        loop {
            match sock.recv_from(&mut buf) {
                Ok((len, peer)) => match wire::frame::decode(&buf[..len]) {
                    wire::frame::Decoded::Frame { payload, .. } => {
                        stats.record_message(len as u64);
                        processor.handle(&payload, peer);
                    }
                    wire::frame::Decoded::Incomplete => {
                        tracing::warn!(%peer, "UDP datagram truncated or declares an oversize frame");
                        stats.record_error();
                    }
                    wire::frame::Decoded::Invalid { .. } => {
                        tracing::warn!(%peer, "UDP datagram payload failed to decompress");
                        stats.record_error();
                    }
                },
                Err(error) if error.kind() == ErrorKind::WouldBlock => break,
                Err(error) => {
                    tracing::warn!(%error, "UDP recv failed");
                    break;
                }
            }
        }
    }

    /// Reads available bytes from `client`, processes every complete frame
    /// in its buffer, and reports whether the connection should be torn
    /// down (EOF or error).
    fn drain_client(client: &mut ClientConn, processor: &Arc<Processor>, stats: &Arc<Stats>) -> bool {
        let mut buf = [0u8; TCP_READ_BUF_SIZE];
        loop {
            match client.stream.read(&mut buf) {
                Ok(0) => return true,
                Ok(n) => client.buf.extend_from_slice(&buf[..n]),
                Err(error) if error.kind() == ErrorKind::WouldBlock => break,
                Err(error) => {
                    tracing::warn!(addr = %client.addr, %error, "TCP read failed");
                    return true;
                }
            }
        }

        loop {
            match wire::frame::decode(&client.buf) {
                wire::frame::Decoded::Frame { payload, consumed } => {
                    stats.record_message(consumed as u64);
                    processor.handle(&payload, client.addr);
                    client.buf.drain(..consumed);
                }
                wire::frame::Decoded::Invalid { consumed } => {
                    tracing::warn!(addr = %client.addr, "dropping unframeable TCP message, connection retained");
                    stats.record_error();
                    client.buf.drain(..consumed);
                }
                wire::frame::Decoded::Incomplete => {
                    if client.buf.len() >= wire::frame::MAX_MESSAGE_SIZE {
                        tracing::warn!(
                            addr = %client.addr,
                            buffered = client.buf.len(),
                            "oversize TCP frame, dropping buffered data, connection retained"
                        );
                        stats.record_error();
                        client.buf.clear();
                    }
                    break;
                }
            }
        }

        false
    }

    fn shutdown_connections(&mut self) {
        if !self.clients.is_empty() {
            for client in self.clients.values() {
                let _ = client.stream.shutdown(std::net::Shutdown::Both);
            }
            std::thread::sleep(SHUTDOWN_LINGER);
        }
        self.clients.clear();
        self.registered.clear();
    }

    pub fn stats(&self) -> crate::stats::StatsSnapshot {
        self.stats.snapshot()
    }
}

fn handle_tls_connection(
    stream: std::net::TcpStream,
    addr: SocketAddr,
    tls_config: Arc<rustls::ServerConfig>,
    processor: Arc<Processor>,
    stats: Arc<Stats>,
    shutdown: Arc<AtomicBool>,
) {
    let mut tls_stream = match tls::accept(stream, tls_config, POLL_TIMEOUT) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::warn!(%addr, %error, "TLS handshake failed");
            stats.record_tls_handshake_failure();
            return;
        }
    };

    let mut buf = Vec::new();
    let mut chunk = [0u8; TCP_READ_BUF_SIZE];

    while !shutdown.load(Ordering::Relaxed) {
        match tls_stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(error) if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(error) => {
                tracing::warn!(%addr, %error, "TLS read failed");
                break;
            }
        }

        loop {
            match wire::frame::decode(&buf) {
                wire::frame::Decoded::Frame { payload, consumed } => {
                    stats.record_message(consumed as u64);
                    processor.handle(&payload, addr);
                    buf.drain(..consumed);
                }
                wire::frame::Decoded::Invalid { consumed } => {
                    tracing::warn!(%addr, "dropping unframeable TLS message, connection retained");
                    stats.record_error();
                    buf.drain(..consumed);
                }
                wire::frame::Decoded::Incomplete => {
                    if buf.len() >= wire::frame::MAX_MESSAGE_SIZE {
                        tracing::warn!(
                            %addr,
                            buffered = buf.len(),
                            "oversize TLS frame, dropping buffered data, connection retained"
                        );
                        stats.record_error();
                        buf.clear();
                    }
                    break;
                }
            }
        }
    }

    let _ = tls_stream.sock.shutdown(std::net::Shutdown::Both);
}

