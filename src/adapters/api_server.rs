//! Upstream API server.
//!
//! Accepts TCP clients on `relay.api_port` and speaks length-prefixed
//! postcard frames with them (see [`crate::upstream::codec`]).  Implements
//! [`UpstreamPort`] so the relay can deliver to any subscribed client.
//!
//! A connected client is not a subscriber until it sends
//! [`DownstreamRequest::Subscribe`].  Clients that close, or whose socket
//! write fails, are reported once as [`UpstreamEvent::Unsubscribed`].
//!
//! ```text
//!   TcpListener ──accept──▶ ApiClient<TcpTransport> ──frames──▶ UpstreamEvent
//!   relay ──UpstreamPort::send──▶ encode_message ──▶ encode_frame ──▶ socket
//! ```

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use log::{debug, info, warn};

use crate::app::dispatch::UpstreamEvent;
use crate::app::ports::UpstreamPort;
use crate::error::TransportError;
use crate::relay::messages::UpstreamMessage;
use crate::relay::subscribers::SubscriberId;
use crate::upstream::codec::{FrameDecoder, HEADER_SIZE, encode_frame};
use crate::upstream::messages::{DownstreamRequest, decode_request, encode_message};
use crate::upstream::transport::Transport;

const READ_CHUNK: usize = 256;

// ───────────────────────────────────────────────────────────────
// TCP transport
// ───────────────────────────────────────────────────────────────

/// Non-blocking socket as a [`Transport`].
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nonblocking(true).map_err(|_| TransportError::NotReady)?;
        let _ = stream.set_nodelay(true);
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.stream.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(_) => Err(TransportError::Closed),
        }
    }

    /// Never waits for the peer: a full send buffer fails the write, and
    /// a frame that went out partially leaves the stream unusable.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut written = 0;
        while written < data.len() {
            match self.stream.write(&data[written..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => written += n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    debug!("API: peer not reading, {} of {} bytes written", written, data.len());
                    return Err(TransportError::Send);
                }
                Err(_) => return Err(TransportError::Send),
            }
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Client session
// ───────────────────────────────────────────────────────────────

/// One connected upstream client.
pub struct ApiClient<T: Transport> {
    id: SubscriberId,
    transport: T,
    decoder: FrameDecoder,
    subscribed: bool,
    closed: bool,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(id: SubscriberId, transport: T) -> Self {
        Self {
            id,
            transport,
            decoder: FrameDecoder::new(),
            subscribed: false,
            closed: false,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read whatever is available and turn complete frames into events.
    pub fn poll(&mut self, events: &mut Vec<UpstreamEvent>) {
        if self.closed {
            return;
        }
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match self.transport.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let mut requests = Vec::new();
                    self.decoder.feed(&buf[..n], |frame| match decode_request(frame) {
                        Ok(req) => requests.push(req),
                        Err(e) => debug!("API: undecodable request ({} bytes): {}", frame.len(), e),
                    });
                    for req in requests {
                        self.apply(req, events);
                    }
                }
                Err(_) => {
                    self.close(events);
                    break;
                }
            }
        }
    }

    fn apply(&mut self, request: DownstreamRequest, events: &mut Vec<UpstreamEvent>) {
        match request {
            DownstreamRequest::Subscribe => {
                self.subscribed = true;
                events.push(UpstreamEvent::Subscribed(self.id));
            }
            DownstreamRequest::Unsubscribe => {
                if self.subscribed {
                    self.subscribed = false;
                    events.push(UpstreamEvent::Unsubscribed(self.id));
                }
            }
            DownstreamRequest::SetScannerMode { active } => events.push(UpstreamEvent::ScannerModeRequested {
                subscriber: self.id,
                active,
            }),
        }
    }

    fn close(&mut self, events: &mut Vec<UpstreamEvent>) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!("API: {} disconnected", self.id);
        if self.subscribed {
            self.subscribed = false;
            events.push(UpstreamEvent::Unsubscribed(self.id));
        }
    }

    /// Frame and write one message.
    pub fn send(&mut self, message: &UpstreamMessage) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let payload = encode_message(message).map_err(|_| TransportError::Send)?;
        let mut frame = vec![0u8; HEADER_SIZE + payload.len()];
        encode_frame(&payload, &mut frame).ok_or(TransportError::Send)?;
        self.transport.write_all(&frame).inspect_err(|_| {
            // The owner reports the unsubscribe.
            self.closed = true;
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Server
// ───────────────────────────────────────────────────────────────

pub struct ApiServer {
    listener: TcpListener,
    clients: Vec<ApiClient<TcpTransport>>,
    max_clients: usize,
    next_id: u32,
    /// Clients closed by a failed write, reported on the next poll.
    pending: Vec<UpstreamEvent>,
}

impl ApiServer {
    pub fn bind(port: u16, max_clients: usize) -> Result<Self, TransportError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).map_err(|e| {
            warn!("API: bind to {} failed: {}", addr, e);
            TransportError::NotReady
        })?;
        listener.set_nonblocking(true).map_err(|_| TransportError::NotReady)?;
        info!("API: listening on {}", addr);
        Ok(Self {
            listener,
            clients: Vec::new(),
            max_clients: max_clients.max(1),
            next_id: 1,
            pending: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Accept new clients, read requests, and reap closed sessions.
    pub fn poll(&mut self) -> Vec<UpstreamEvent> {
        self.accept_pending();

        let mut events = core::mem::take(&mut self.pending);
        for client in &mut self.clients {
            client.poll(&mut events);
        }
        self.clients.retain(|c| !c.is_closed());
        events
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.clients.len() >= self.max_clients {
                        warn!("API: rejecting {} ({} clients connected)", peer, self.clients.len());
                        continue;
                    }
                    let transport = match TcpTransport::new(stream) {
                        Ok(t) => t,
                        Err(e) => {
                            warn!("API: client setup failed: {}", e);
                            continue;
                        }
                    };
                    let id = SubscriberId(self.next_id);
                    self.next_id = self.next_id.wrapping_add(1);
                    info!("API: {} connected as {}", peer, id);
                    self.clients.push(ApiClient::new(id, transport));
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("API: accept failed: {}", e);
                    break;
                }
            }
        }
    }
}

impl UpstreamPort for ApiServer {
    fn send(&mut self, subscriber: SubscriberId, message: &UpstreamMessage) -> Result<(), TransportError> {
        let client = self
            .clients
            .iter_mut()
            .find(|c| c.id() == subscriber)
            .ok_or(TransportError::NotConnected)?;
        let result = client.send(message);
        if result.is_err() && client.is_subscribed() {
            client.subscribed = false;
            self.pending.push(UpstreamEvent::Unsubscribed(subscriber));
        }
        result
    }
}
