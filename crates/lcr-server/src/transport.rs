//! UDP signaling transport
//!
//! One socket serves both directions. Each datagram becomes a request handed
//! to the [`SignalingDispatcher`]; responses, including those the Broadworks
//! and M6 handlers address to a peer's advertised host, leave from the same
//! socket.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use lcr_core::sip::{Connection, Connector, SipResponse};
use lcr_core::{LcrError, SignalingDispatcher};

use crate::codec::{encode_response, parse_request, CodecError};

const MAX_DATAGRAM: usize = 65_535;

/// UDP transport for SIP messages
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpTransportInner>,
}

struct UdpTransportInner {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    closed: AtomicBool,
    shutdown: Notify,
}

impl UdpTransport {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        info!("SIP UDP transport bound to {}", local_addr);

        Ok(Self {
            inner: Arc::new(UdpTransportInner {
                socket: Arc::new(socket),
                local_addr,
                closed: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Connector sending from this transport's socket
    pub fn connector(&self) -> Arc<UdpConnector> {
        Arc::new(UdpConnector {
            socket: Arc::clone(&self.inner.socket),
        })
    }

    /// Spawns a task receiving datagrams and dispatching them
    ///
    /// The loop waits for a free worker before reading the next datagram.
    pub fn spawn_receive_loop(&self, dispatcher: Arc<SignalingDispatcher>) -> JoinHandle<()> {
        let transport = self.clone();

        tokio::spawn(async move {
            let inner = &transport.inner;
            let mut buf = vec![0u8; MAX_DATAGRAM];

            while !inner.closed.load(Ordering::Relaxed) {
                let received = tokio::select! {
                    _ = inner.shutdown.notified() => break,
                    received = inner.socket.recv_from(&mut buf) => received,
                };

                let (len, src) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        if inner.closed.load(Ordering::Relaxed) {
                            break;
                        }
                        error!("Error receiving UDP packet: {}", e);
                        continue;
                    }
                };
                trace!("Received {} bytes from {}", len, src);

                let request = match parse_request(&buf[..len]) {
                    Ok(request) => request.with_source(src),
                    Err(CodecError::KeepAlive) => continue,
                    Err(CodecError::NotARequest) => {
                        debug!("Ignoring SIP response from {}", src);
                        continue;
                    }
                    Err(e) => {
                        warn!("Error parsing SIP message from {}: {}", src, e);
                        continue;
                    }
                };

                let connection = Arc::new(UdpConnection {
                    socket: Arc::clone(&inner.socket),
                    peer: src,
                });
                if let Err(e) = dispatcher.dispatch(request, connection).await {
                    error!("Stopping receive loop: {}", e);
                    break;
                }
            }

            info!("UDP receive loop terminated");
        })
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Relaxed);
        self.inner.shutdown.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UdpTransport({})", self.inner.local_addr)
    }
}

/// Return path to one peer
#[derive(Debug)]
pub struct UdpConnection {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpConnection {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

#[async_trait]
impl Connection for UdpConnection {
    async fn send(&self, response: SipResponse) -> lcr_core::Result<()> {
        let bytes = encode_response(&response);
        debug!("Sending {} ({} bytes) to {}", response.status, bytes.len(), self.peer);
        self.socket
            .send_to(&bytes, self.peer)
            .await
            .map(|_| ())
            .map_err(|e| LcrError::Transport(format!("send to {} failed: {}", self.peer, e)))
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

/// Opens "connections" to arbitrary peers over the shared socket
#[derive(Debug)]
pub struct UdpConnector {
    socket: Arc<UdpSocket>,
}

#[async_trait]
impl Connector for UdpConnector {
    async fn connect(&self, host: &str, port: u16) -> lcr_core::Result<Arc<dyn Connection>> {
        let peer = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| LcrError::Transport(format!("cannot resolve {}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| LcrError::Transport(format!("no address for {}:{}", host, port)))?;
        Ok(Arc::new(UdpConnection::new(Arc::clone(&self.socket), peer)))
    }
}
