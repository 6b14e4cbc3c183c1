use crate::domain::{LinkKind, PeerRef};
use crate::error::{Result, TransportError};
use crate::infrastructure::connection::Connection;
use crate::infrastructure::transport::{
    Transport, TransportEvent, ACCEPT_RETRY_BACKOFF, DIAL_TIMEOUT,
};
use async_trait::async_trait;
use quizlink_core::Message;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// The negotiation loser dials the winner's data port with short retries,
/// covering the window before the winner's listener is up.
const JOIN_DIAL_ATTEMPTS: u32 = 10;
const JOIN_DIAL_DELAY: Duration = Duration::from_millis(300);

/// Datagrams of the group formation protocol
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum GroupFrame {
    Probe {
        service: String,
    },
    Announce {
        service: String,
        name: String,
    },
    /// Sent by the initiating side to start owner negotiation
    Negotiate {
        service: String,
        name: String,
        intent: u8,
        token: Uuid,
        tcp_port: u16,
    },
    /// The passive side's half of the negotiation
    NegotiateAck {
        service: String,
        name: String,
        intent: u8,
        token: Uuid,
        tcp_port: u16,
    },
}

/// Configuration for the owner-negotiation transport
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub device_name: String,

    /// Administrative enable; everything fails with `NotEnabled` when off
    pub enabled: bool,

    pub service_name: String,

    /// UDP port negotiation and discovery run on
    pub negotiation_port: u16,

    /// Data port this side serves if it wins the negotiation
    pub tcp_port: u16,

    /// Owner preference, 0..=15; higher wins, the token breaks ties
    pub owner_intent: u8,

    pub scan_rounds: u32,
    pub scan_interval: Duration,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            device_name: "player".to_string(),
            enabled: true,
            service_name: "quizlink-trivia".to_string(),
            negotiation_port: 48183,
            tcp_port: 48188,
            owner_intent: rand::thread_rng().gen_range(0..=15),
            scan_rounds: 3,
            scan_interval: Duration::from_secs(1),
        }
    }
}

impl GroupConfig {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ..Default::default()
        }
    }

    pub fn with_negotiation_port(mut self, port: u16) -> Self {
        self.negotiation_port = port;
        self
    }

    pub fn with_tcp_port(mut self, port: u16) -> Self {
        self.tcp_port = port;
        self
    }

    pub fn with_owner_intent(mut self, intent: u8) -> Self {
        self.owner_intent = intent.min(15);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Owner-negotiation transport: the two sides exchange an owner-intent
/// value plus a random token over UDP; the deterministic winner becomes
/// the group owner (host) and serves the fixed data port, the loser
/// resolves the owner's address from the negotiation datagram and dials.
pub struct GroupTransport {
    config: GroupConfig,
    token: Uuid,
    events: mpsc::Sender<TransportEvent>,
    active: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
    discovery: Option<JoinHandle<()>>,
    responder: Option<JoinHandle<()>>,
    connector: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl GroupTransport {
    pub fn new(config: GroupConfig, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            config,
            token: Uuid::new_v4(),
            events,
            active: Arc::new(Mutex::new(None)),
            discovery: None,
            responder: None,
            connector: None,
            local_addr: None,
        }
    }

    /// Bound negotiation address, available after `listen`
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

/// Both sides evaluate this with swapped arguments; the strict ordering on
/// (intent, token) makes them agree on a single owner.
fn wins_negotiation(local: (u8, Uuid), peer: (u8, Uuid)) -> bool {
    local > peer
}

#[async_trait]
impl Transport for GroupTransport {
    fn kind(&self) -> LinkKind {
        LinkKind::Group
    }

    async fn start_discovery(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Err(TransportError::NotEnabled);
        }
        self.stop_discovery().await;

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
        self.stop_discovery().await;

        let peer = peer.clone();
        let config = self.config.clone();
        let token = self.token;
        let events = self.events.clone();
        let active = self.active.clone();
        self.connector = Some(tokio::spawn(async move {
            if let Err(reason) = negotiate_out(&peer, &config, token, &events, &active).await {
                let _ = events.send(TransportEvent::ConnectionFailed(reason)).await;
            }
        }));
        Ok(())
    }

    async fn listen(&mut self) -> Result<()> {
        if !self.config.enabled {
            return Err(TransportError::NotEnabled);
        }
        if self.responder.is_some() {
            return Ok(());
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.config.negotiation_port))
            .await
            .map_err(TransportError::from_setup_io)?;
        let local = socket.local_addr().map_err(TransportError::from_setup_io)?;
        self.local_addr = Some(local);
        tracing::info!(%local, "negotiation responder up");

        self.responder = Some(tokio::spawn(negotiation_responder(
            socket,
            self.config.clone(),
            self.token,
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
            self.connector.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
        *self.active.lock().unwrap() = None;
        tracing::debug!("group transport stopped");
    }
}

/// Initiating side: send Negotiate, wait for the ack, then take the role
/// the comparison dictates.
async fn negotiate_out(
    peer: &PeerRef,
    config: &GroupConfig,
    token: Uuid,
    events: &mpsc::Sender<TransportEvent>,
    active: &Arc<Mutex<Option<mpsc::Sender<Message>>>>,
) -> std::result::Result<(), String> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .map_err(|e| format!("negotiation socket: {e}"))?;

    let hello = GroupFrame::Negotiate {
        service: config.service_name.clone(),
        name: config.device_name.clone(),
        intent: config.owner_intent,
        token,
        tcp_port: config.tcp_port,
    };
    let bytes = serde_json::to_vec(&hello).map_err(|e| e.to_string())?;
    socket
        .send_to(&bytes, peer.address.as_str())
        .await
        .map_err(|e| format!("negotiate {}: {e}", peer.address))?;

    let mut buf = [0u8; 512];
    let deadline = tokio::time::Instant::now() + DIAL_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(format!("negotiation with {} timed out", peer.address));
        }

        let Ok(Ok((n, src))) = tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await
        else {
            return Err(format!("negotiation with {} timed out", peer.address));
        };
        let Ok(GroupFrame::NegotiateAck {
            service,
            name,
            intent,
            token: peer_token,
            tcp_port,
        }) = serde_json::from_slice::<GroupFrame>(&buf[..n])
        else {
            continue;
        };
        if service != config.service_name {
            continue;
        }

        let owner = wins_negotiation((config.owner_intent, token), (intent, peer_token));
        tracing::info!(peer = %name, owner, "negotiation complete");
        establish(owner, name, src, tcp_port, config, events, active).await;
        return Ok(());
    }
}

/// Passive side: answer probes and negotiations for as long as we listen.
async fn negotiation_responder(
    socket: UdpSocket,
    config: GroupConfig,
    token: Uuid,
    events: mpsc::Sender<TransportEvent>,
    active: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
) {
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
        let Ok(frame) = serde_json::from_slice::<GroupFrame>(&buf[..n]) else {
            continue;
        };

        match frame {
            GroupFrame::Probe { service } if service == config.service_name => {
                let reply = GroupFrame::Announce {
                    service,
                    name: config.device_name.clone(),
                };
                if let Ok(bytes) = serde_json::to_vec(&reply) {
                    let _ = socket.send_to(&bytes, src).await;
                }
            }
            GroupFrame::Negotiate {
                service,
                name,
                intent,
                token: peer_token,
                tcp_port,
            } if service == config.service_name => {
                let ack = GroupFrame::NegotiateAck {
                    service,
                    name: config.device_name.clone(),
                    intent: config.owner_intent,
                    token,
                    tcp_port: config.tcp_port,
                };
                if let Ok(bytes) = serde_json::to_vec(&ack) {
                    let _ = socket.send_to(&bytes, src).await;
                }

                let owner = wins_negotiation((config.owner_intent, token), (intent, peer_token));
                tracing::info!(peer = %name, owner, "negotiation complete");
                establish(owner, name, src, tcp_port, &config, &events, &active).await;
                // Connection over; resume answering so the group can reform
            }
            _ => {}
        }
    }
}

/// Bring up the data stream in the role the negotiation decided.
async fn establish(
    owner: bool,
    peer_name: String,
    peer_addr: SocketAddr,
    peer_tcp_port: u16,
    config: &GroupConfig,
    events: &mpsc::Sender<TransportEvent>,
    active: &Arc<Mutex<Option<mpsc::Sender<Message>>>>,
) {
    if owner {
        let listener = match TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.tcp_port)).await {
            Ok(listener) => listener,
            Err(err) => {
                let _ = events
                    .send(TransportEvent::ConnectionFailed(format!(
                        "data listener: {err}"
                    )))
                    .await;
                return;
            }
        };

        match tokio::time::timeout(DIAL_TIMEOUT, listener.accept()).await {
            Ok(Ok((stream, _))) => {
                serve_connection(stream, peer_name, true, events, active).await;
            }
            Ok(Err(err)) => {
                let _ = events
                    .send(TransportEvent::ConnectionFailed(format!("accept: {err}")))
                    .await;
            }
            Err(_) => {
                let _ = events
                    .send(TransportEvent::ConnectionFailed(
                        "peer did not dial the data port in time".to_string(),
                    ))
                    .await;
            }
        }
    } else {
        // Resolve the owner's address from the negotiation datagram
        let target = SocketAddr::new(peer_addr.ip(), peer_tcp_port);
        for attempt in 0..JOIN_DIAL_ATTEMPTS {
            match tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(target)).await {
                Ok(Ok(stream)) => {
                    serve_connection(stream, peer_name, false, events, active).await;
                    return;
                }
                Ok(Err(err)) if attempt + 1 < JOIN_DIAL_ATTEMPTS => {
                    tracing::debug!(%target, attempt, error = %err, "owner not accepting yet");
                    tokio::time::sleep(JOIN_DIAL_DELAY).await;
                }
                Ok(Err(err)) => {
                    let _ = events
                        .send(TransportEvent::ConnectionFailed(format!(
                            "dial owner {target}: {err}"
                        )))
                        .await;
                    return;
                }
                Err(_) => {
                    let _ = events
                        .send(TransportEvent::ConnectionFailed(format!(
                            "dial owner {target}: timed out"
                        )))
                        .await;
                    return;
                }
            }
        }
    }
}

/// Same ordering discipline as the beacon transport: sender published and
/// `Connected` queued before the reader starts.
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
            kind: LinkKind::Group,
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

async fn scan_loop(socket: UdpSocket, config: GroupConfig, events: mpsc::Sender<TransportEvent>) {
    let probe = match serde_json::to_vec(&GroupFrame::Probe {
        service: config.service_name.clone(),
    }) {
        Ok(bytes) => bytes,
        Err(_) => return,
    };

    let mut known: HashSet<String> = HashSet::new();
    let mut buf = [0u8; 512];

    for _ in 0..config.scan_rounds {
        if let Err(err) = socket
            .send_to(&probe, (Ipv4Addr::BROADCAST, config.negotiation_port))
            .await
        {
            tracing::debug!(error = %err, "broadcast probe failed");
        }

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
            let Ok(GroupFrame::Announce { service, name }) =
                serde_json::from_slice::<GroupFrame>(&buf[..n])
            else {
                continue;
            };
            if service != config.service_name {
                continue;
            }

            let address = src.to_string();
            if known.insert(address.clone()) {
                let _ = events
                    .send(TransportEvent::DeviceFound(PeerRef { name, address }))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_is_symmetric() {
        let a = (7u8, Uuid::new_v4());
        let b = (7u8, Uuid::new_v4());

        // Exactly one side wins, and both agree on which
        assert_ne!(wins_negotiation(a, b), wins_negotiation(b, a));
    }

    #[test]
    fn test_higher_intent_wins() {
        let low = (2u8, Uuid::new_v4());
        let high = (9u8, Uuid::new_v4());

        assert!(wins_negotiation(high, low));
        assert!(!wins_negotiation(low, high));
    }

    #[tokio::test]
    async fn test_disabled_transport_refuses() {
        let (events, _rx) = mpsc::channel(8);
        let mut transport = GroupTransport::new(GroupConfig::new("a").disabled(), events);

        assert!(matches!(
            transport.start_discovery().await,
            Err(TransportError::NotEnabled)
        ));
        assert!(matches!(
            transport.listen().await,
            Err(TransportError::NotEnabled)
        ));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (events, _rx) = mpsc::channel(8);
        let config = GroupConfig::new("a").with_negotiation_port(0);
        let mut transport = GroupTransport::new(config, events);

        transport.listen().await.unwrap();
        transport.stop().await;
        transport.stop().await;
        transport.cleanup().await;
    }

    #[test]
    fn test_intent_is_clamped() {
        let config = GroupConfig::new("a").with_owner_intent(200);
        assert_eq!(config.owner_intent, 15);
    }
}
