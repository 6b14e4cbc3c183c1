use crate::domain::{LinkKind, PeerRef};
use crate::error::{Result, TransportError};
use crate::infrastructure::connection::Connection;
use crate::infrastructure::transport::{
    Transport, TransportEvent, ACCEPT_RETRY_BACKOFF, DIAL_TIMEOUT,
};
use async_trait::async_trait;
use quizlink_core::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Datagrams of the advertisement protocol
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BeaconFrame {
    Probe {
        service: String,
    },
    Announce {
        service: String,
        name: String,
        port: u16,
    },
}

/// Configuration for the advertise-and-accept transport
#[derive(Debug, Clone)]
pub struct BeaconConfig {
    /// Name announced to scanning peers
    pub device_name: String,

    /// Administrative enable; everything fails with `NotEnabled` when off
    pub enabled: bool,

    /// Service record identifier; probes for other services are ignored
    pub service_name: String,

    /// UDP port the advertisement responder listens on
    pub beacon_port: u16,

    /// Data port to accept on; 0 picks an ephemeral port
    pub tcp_port: u16,

    /// Peers known without scanning (the already-paired set)
    pub known_peers: Vec<PeerRef>,

    /// Active scan shape
    pub scan_rounds: u32,
    pub scan_interval: Duration,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            device_name: "player".to_string(),
            enabled: true,
            service_name: "quizlink-trivia".to_string(),
            beacon_port: 48180,
            tcp_port: 0,
            known_peers: Vec::new(),
            scan_rounds: 3,
            scan_interval: Duration::from_secs(1),
        }
    }
}

impl BeaconConfig {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ..Default::default()
        }
    }

    pub fn with_beacon_port(mut self, port: u16) -> Self {
        self.beacon_port = port;
        self
    }

    pub fn with_tcp_port(mut self, port: u16) -> Self {
        self.tcp_port = port;
        self
    }

    pub fn with_known_peers(mut self, peers: Vec<PeerRef>) -> Self {
        self.known_peers = peers;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Advertise-and-accept transport: peers announce a service record over
/// UDP broadcast, the listening side accepts a TCP stream and becomes the
/// host.
pub struct BeaconTransport {
    config: BeaconConfig,
    events: mpsc::Sender<TransportEvent>,
    active: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
    discovery: Option<JoinHandle<()>>,
    responder: Option<JoinHandle<()>>,
    acceptor: Option<JoinHandle<()>>,
    connector: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl BeaconTransport {
    pub fn new(config: BeaconConfig, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            config,
            events,
            active: Arc::new(Mutex::new(None)),
            discovery: None,
            responder: None,
            acceptor: None,
            connector: None,
            local_addr: None,
        }
    }

    /// Bound accept address, available after `listen`
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl Transport for BeaconTransport {
    fn kind(&self) -> LinkKind {
        LinkKind::Beacon
    }

    async fn start_discovery(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Err(TransportError::NotEnabled);
        }
        self.stop_discovery().await;

        // Passive first: peers we already know about
        for peer in &self.config.known_peers {
            let _ = self
                .events
                .send(TransportEvent::DeviceFound(peer.clone()))
                .await;
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(TransportError::from_setup_io)?;
        socket
            .set_broadcast(true)
            .map_err(TransportError::from_setup_io)?;

        self.discovery = Some(tokio::spawn(scan_loop(
            socket,
            self.config.clone(),
            self.events.clone(),
        )));
        Ok(())
    }

    async fn stop_discovery(&mut self) {
        if let Some(handle) = self.discovery.take() {
            handle.abort();
        }
    }

    async fn connect(&mut self, peer: &PeerRef) -> Result<()> {
        if !self.config.enabled {
            return Err(TransportError::NotEnabled);
        }
        // Scanning interferes with establishment
        self.stop_discovery().await;

        let peer = peer.clone();
        let events = self.events.clone();
        let active = self.active.clone();
        self.connector = Some(tokio::spawn(async move {
            let stream =
                match tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(peer.address.as_str()))
                    .await
                {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(err)) => {
                        let _ = events
                            .send(TransportEvent::ConnectionFailed(format!(
                                "dial {}: {err}",
                                peer.address
                            )))
                            .await;
                        return;
                    }
                    Err(_) => {
                        let _ = events
                            .send(TransportEvent::ConnectionFailed(format!(
                                "dial {}: timed out",
                                peer.address
                            )))
                            .await;
                        return;
                    }
                };

            tracing::info!(peer = %peer, "outbound link established");
            serve_connection(stream, peer.name.clone(), false, &events, &active).await;
        }));
        Ok(())
    }

    async fn listen(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Err(TransportError::NotEnabled);
        }
        if self.acceptor.is_some() {
            return Ok(());
        }

        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.config.tcp_port))
            .await
            .map_err(TransportError::from_setup_io)?;
        let local = listener
            .local_addr()
            .map_err(TransportError::from_setup_io)?;
        self.local_addr = Some(local);
        tracing::info!(%local, "listening for inbound links");

        // Answer scans while we are acceptable
        self.responder = Some(tokio::spawn(announce_responder(
            self.config.clone(),
            local.port(),
        )));

        self.acceptor = Some(tokio::spawn(accept_loop(
            listener,
            self.events.clone(),
            self.active.clone(),
        )));
        Ok(())
    }

    async fn send(&mut self, message: Message) {
        let sender = self.active.lock().unwrap().clone();
        match sender {
            Some(tx) => {
                if tx.send(message).await.is_err() {
                    let _ = self
                        .events
                        .send(TransportEvent::ConnectionFailed(
                            "connection closed while sending".to_string(),
                        ))
                        .await;
                }
            }
            None => {
                let _ = self
                    .events
                    .send(TransportEvent::ConnectionFailed(
                        "no open connection".to_string(),
                    ))
                    .await;
            }
        }
    }

    async fn stop(&mut self) {
        for handle in [
            self.discovery.take(),
            self.responder.take(),
            self.acceptor.take(),
            self.connector.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
        *self.active.lock().unwrap() = None;
        tracing::debug!("beacon transport stopped");
    }
}

/// Hand an accepted or dialed stream to the framed connection and hold it
/// until it dies.
///
/// The outbound sender is published and `Connected` queued before the
/// reader starts, so `Connected` always precedes the first `Message` and a
/// send right after `Connected` finds an open queue.
async fn serve_connection(
    stream: TcpStream,
    peer_name: String,
    is_host: bool,
    events: &mpsc::Sender<TransportEvent>,
    active: &Arc<Mutex<Option<mpsc::Sender<Message>>>>,
) {
    let (outbound_tx, outbound_rx) = mpsc::channel(crate::infrastructure::SEND_QUEUE_DEPTH);
    *active.lock().unwrap() = Some(outbound_tx);

    if events
        .send(TransportEvent::Connected {
            peer_name,
            kind: LinkKind::Beacon,
            is_host,
        })
        .await
        .is_err()
    {
        *active.lock().unwrap() = None;
        return;
    }

    let mut connection = Connection::attach(stream, events.clone(), outbound_rx);
    connection.closed().await;
    *active.lock().unwrap() = None;
}

async fn accept_loop(
    listener: TcpListener,
    events: mpsc::Sender<TransportEvent>,
    active: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "accept failed, restarting listener");
                tokio::time::sleep(ACCEPT_RETRY_BACKOFF).await;
                continue;
            }
        };

        tracing::info!(%peer_addr, "inbound link accepted");
        serve_connection(stream, peer_addr.to_string(), true, &events, &active).await;
        // Connection ended; fall through and accept again
    }
}

async fn announce_responder(config: BeaconConfig, tcp_port: u16) {
    let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.beacon_port)).await {
        Ok(socket) => socket,
        Err(err) => {
            // Scanning peers won't see us, but direct connects still work
            tracing::warn!(error = %err, "advertisement responder unavailable");
            return;
        }
    };

    let mut buf = [0u8; 512];
    loop {
        let (n, src) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(err) => {
                tracing::warn!(error = %err, "responder receive failed");
                tokio::time::sleep(ACCEPT_RETRY_BACKOFF).await;
                continue;
            }
        };

        let Ok(BeaconFrame::Probe { service }) = serde_json::from_slice::<BeaconFrame>(&buf[..n])
        else {
            continue;
        };
        if service != config.service_name {
            continue;
        }

        let reply = BeaconFrame::Announce {
            service,
            name: config.device_name.clone(),
            port: tcp_port,
        };
        if let Ok(bytes) = serde_json::to_vec(&reply) {
            let _ = socket.send_to(&bytes, src).await;
        }
    }
}

async fn scan_loop(socket: UdpSocket, config: BeaconConfig, events: mpsc::Sender<TransportEvent>) {
    let probe = match serde_json::to_vec(&BeaconFrame::Probe {
        service: config.service_name.clone(),
    }) {
        Ok(bytes) => bytes,
        Err(_) => return,
    };

    let mut known: HashSet<String> = HashSet::new();
    let mut buf = [0u8; 512];

    for _ in 0..config.scan_rounds {
        if let Err(err) = socket
            .send_to(&probe, (Ipv4Addr::BROADCAST, config.beacon_port))
            .await
        {
            tracing::debug!(error = %err, "broadcast probe failed");
        }

        let mut seen_this_round: HashSet<String> = HashSet::new();
        let deadline = tokio::time::Instant::now() + config.scan_interval;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            let received = tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await;
            let Ok(Ok((n, src))) = received else {
                break;
            };
            let Ok(BeaconFrame::Announce {
                service,
                name,
                port,
            }) = serde_json::from_slice::<BeaconFrame>(&buf[..n])
            else {
                continue;
            };
            if service != config.service_name {
                continue;
            }

            let address = format!("{}:{}", src.ip(), port);
            seen_this_round.insert(address.clone());
            if known.insert(address.clone()) {
                let _ = events
                    .send(TransportEvent::DeviceFound(PeerRef { name, address }))
                    .await;
            }
        }

        // Peers that stopped answering this round
        let lost: Vec<String> = known
            .iter()
            .filter(|address| !seen_this_round.contains(*address))
            .cloned()
            .collect();
        for address in lost {
            known.remove(&address);
            let _ = events.send(TransportEvent::DeviceLost(address)).await;
        }
    }
}
