//! The hub: multicast socket lifecycle, datagram dispatch, and the sensor
//! registry
//!
//! A [`Hub`] owns one UDP socket joined to the Lumi multicast group. A
//! dedicated receive thread decodes each datagram and dispatches it under a
//! single lock, so registry and token state only ever see one message's
//! side effects at a time. Embedders observe the hub through [`HubEvent`]
//! channels obtained from [`Hub::subscribe`]; any number of subscribers may
//! listen and a slow or dropped subscriber never blocks the others.

use crate::device::{SensorCatalog, SensorContext, SensorInfo};
use crate::error::{HubError, Result};
use crate::keys;
use crate::protocol::{
    self, Message, WireMessage, DEFAULT_PORT, DISCOVERY_PORT, GATEWAY_MODEL, MULTICAST_GROUP,
};
use crate::sensors;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long the receive thread blocks before re-checking the stop flag
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Capacity of each subscriber's event channel
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Local port for inbound reports and heartbeats
    pub port: u16,
    /// Local interface to bind the multicast membership to; `None` uses the
    /// default interface
    pub bind: Option<Ipv4Addr>,
    /// Default shared secret used for command-key derivation
    pub key: Option<String>,
    /// Per-gateway shared secrets, keyed by the gateway's address
    pub keys: HashMap<IpAddr, String>,
    /// Discovery-only mode: report gateway announcements as [`HubEvent::Browse`]
    /// and never construct sensors
    pub browse: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: None,
            key: None,
            keys: HashMap::new(),
            browse: false,
        }
    }
}

/// Lifecycle of a hub instance. Transitions only move forward:
/// `Init -> Connected -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, not listening
    Init,
    /// Socket bound and joined to the multicast group
    Connected,
    /// Terminal; every mutating operation is a no-op
    Closed,
}

/// Notifications raised to subscribers
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// A gateway answered the discovery probe (browse mode only)
    Browse { ip: IpAddr },
    /// Every successfully decoded and routed message
    Message(Message),
    /// A sensor was constructed on first contact. Fired before the sensor
    /// becomes visible to lookups.
    Device {
        sensor: SensorInfo,
        name: Option<String>,
    },
    /// Recoverable decode or construction failure
    Warning(String),
    /// Transport-level failure while connected
    Error(String),
}

struct HubInner {
    config: HubConfig,
    state: LifecycleState,
    sensors: HashMap<String, Box<dyn crate::device::Sensor>>,
    tokens: HashMap<IpAddr, String>,
    catalog: SensorCatalog,
    subscribers: Vec<mpsc::Sender<HubEvent>>,
}

/// Discovery hub for Lumi gateways and their sensors
pub struct Hub {
    inner: Arc<Mutex<HubInner>>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
}

impl Hub {
    /// Create a hub with the built-in sensor catalog
    pub fn new(config: HubConfig) -> Self {
        Self::with_catalog(config, sensors::default_catalog())
    }

    /// Create a hub with a custom sensor catalog
    pub fn with_catalog(config: HubConfig, catalog: SensorCatalog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                config,
                state: LifecycleState::Init,
                sensors: HashMap::new(),
                tokens: HashMap::new(),
                catalog,
                subscribers: Vec::new(),
            })),
            socket: Mutex::new(None),
            worker: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.inner.lock().unwrap().state
    }

    /// Register a new event subscriber.
    ///
    /// Every subscriber receives every event; delivery to one subscriber is
    /// independent of the others.
    pub fn subscribe(&self) -> mpsc::Receiver<HubEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.inner.lock().unwrap().subscribers.push(tx);
        rx
    }

    /// Bind the socket, join the multicast group, and emit the discovery
    /// probe. Returns the bound local address (useful with port 0).
    pub fn listen(&self) -> Result<SocketAddr> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            LifecycleState::Closed => return Err(HubError::Closed),
            LifecycleState::Connected => return Err(HubError::AlreadyListening),
            LifecycleState::Init => (),
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, inner.config.port))?;
        socket.set_broadcast(true)?;
        socket.set_multicast_ttl_v4(128)?;
        let iface = inner.config.bind.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket
            .join_multicast_v4(&MULTICAST_GROUP, &iface)
            .map_err(|e| {
                HubError::Network(format!("failed to join {MULTICAST_GROUP}: {e}"))
            })?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        let local_addr = socket.local_addr()?;

        let probe = protocol::whois().to_json()?;
        socket.send_to(probe.as_bytes(), (MULTICAST_GROUP, DISCOVERY_PORT))?;
        debug!("whois probe sent to {MULTICAST_GROUP}:{DISCOVERY_PORT}");

        let socket = Arc::new(socket);
        *self.socket.lock().unwrap() = Some(Arc::clone(&socket));
        self.running.store(true, Ordering::Relaxed);

        let inner_arc = Arc::clone(&self.inner);
        let running = Arc::clone(&self.running);
        let handle = std::thread::Builder::new()
            .name("lumihub-recv".to_string())
            .spawn(move || recv_loop(socket, inner_arc, running))
            .map_err(|e| HubError::Network(format!("failed to spawn receive thread: {e}")))?;
        *self.worker.lock().unwrap() = Some(handle);
        inner.state = LifecycleState::Connected;

        info!("hub listening on {local_addr}, joined {MULTICAST_GROUP}");
        Ok(local_addr)
    }

    /// Close the hub. Idempotent: the first call transitions to `Closed`
    /// before the socket is released, so in-flight dispatch observes the
    /// terminal state; later calls return immediately without a second
    /// close attempt. Errors during teardown are swallowed.
    pub fn stop(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == LifecycleState::Closed {
                return Ok(());
            }
            inner.state = LifecycleState::Closed;
        }

        self.running.store(false, Ordering::Relaxed);
        // The worker holds the other clone of the socket; it closes once
        // the thread observes the stop flag and exits.
        self.socket.lock().unwrap().take();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }

        info!("hub stopped");
        Ok(())
    }

    /// Encode `payload` and transmit it to `ip` on the configured port, or
    /// to the multicast group if no address is given.
    pub fn send(&self, payload: &Value, ip: Option<IpAddr>) -> Result<()> {
        let port = {
            let inner = self.inner.lock().unwrap();
            if inner.state == LifecycleState::Closed {
                return Err(HubError::Closed);
            }
            inner.config.port
        };

        let socket_guard = self.socket.lock().unwrap();
        let socket = socket_guard
            .as_ref()
            .ok_or_else(|| HubError::Network("socket not bound".to_string()))?;

        let json = serde_json::to_string(payload)?;
        let dest = match ip {
            Some(ip) => SocketAddr::new(ip, port),
            None => SocketAddr::new(IpAddr::V4(MULTICAST_GROUP), port),
        };
        socket.send_to(json.as_bytes(), dest)?;
        debug!("sent {json} to {dest}");
        Ok(())
    }

    /// Derive the command-authorization key for the gateway at `ip`.
    ///
    /// Fails with [`HubError::KeyUnavailable`] until a session token has
    /// been observed from that address, or when no shared secret is
    /// configured for it (neither per-address nor default).
    pub fn derive_key(&self, ip: IpAddr) -> Result<String> {
        let inner = self.inner.lock().unwrap();
        let Some(token) = inner.tokens.get(&ip) else {
            return Err(HubError::KeyUnavailable(ip.to_string()));
        };
        let Some(secret) = inner.config.keys.get(&ip).or(inner.config.key.as_ref()) else {
            return Err(HubError::KeyUnavailable(ip.to_string()));
        };
        keys::derive_key(secret, token)
    }

    /// Snapshot of one registered sensor
    pub fn sensor(&self, sid: &str) -> Option<SensorInfo> {
        let inner = self.inner.lock().unwrap();
        inner.sensors.get(sid).map(|s| SensorInfo::of(s.as_ref()))
    }

    /// Snapshots of every registered sensor
    pub fn sensors(&self) -> Vec<SensorInfo> {
        let inner = self.inner.lock().unwrap();
        inner
            .sensors
            .values()
            .map(|s| SensorInfo::of(s.as_ref()))
            .collect()
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Deliver one event to every subscriber. `try_send` per channel: a full or
/// dropped subscriber is skipped, never waited on.
fn emit_to(subscribers: &[mpsc::Sender<HubEvent>], event: HubEvent) {
    for tx in subscribers {
        let _ = tx.try_send(event.clone());
    }
}

/// Receive loop run on the `lumihub-recv` thread
fn recv_loop(socket: Arc<UdpSocket>, inner: Arc<Mutex<HubInner>>, running: Arc<AtomicBool>) {
    let mut buf = [0u8; 4096];
    while running.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, src)) => dispatch(&inner, &buf[..len], src.ip()),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) => {
                let guard = inner.lock().unwrap();
                // No use-after-close reporting
                if guard.state == LifecycleState::Closed {
                    break;
                }
                warn!("recv error: {e}");
                emit_to(&guard.subscribers, HubEvent::Error(e.to_string()));
            }
        }
    }
    debug!("receive loop stopped");
}

/// Turn one inbound datagram into registry updates and callbacks.
///
/// The lock is held for the whole of one message's processing, which is
/// what serializes dispatch against registry lookups and other datagrams.
fn dispatch(inner: &Mutex<HubInner>, datagram: &[u8], src: IpAddr) {
    let mut guard = inner.lock().unwrap();
    if guard.state == LifecycleState::Closed {
        return;
    }

    // Malformed top-level JSON is not actionable by the embedder
    let Some(wire) = WireMessage::decode(datagram) else {
        debug!("dropping undecodable datagram from {src}");
        return;
    };

    let mut msg = Message {
        cmd: wire.cmd,
        sid: wire.sid,
        model: wire.model,
        name: wire.name,
        data: wire.data,
        token: wire.token,
        addr: src,
    };

    let inner = &mut *guard;
    let known = msg
        .sid
        .as_ref()
        .is_some_and(|sid| inner.sensors.contains_key(sid));

    if !known {
        // Without a model tag there is not enough information to create
        // anything
        let Some(model) = msg.model.clone() else {
            return;
        };

        if inner.config.browse {
            if model == GATEWAY_MODEL {
                emit_to(&inner.subscribers, HubEvent::Browse { ip: src });
            }
            return;
        }

        let Some(sid) = msg.sid.clone() else {
            return;
        };
        let ctx = SensorContext {
            sid: sid.clone(),
            model,
            ip: src,
            name: msg.name.clone(),
        };
        match inner.catalog.build(ctx) {
            Ok(sensor) => {
                let info = SensorInfo::of(sensor.as_ref());
                debug!(sid = %info.sid, model = %info.model, "new sensor registered");
                // Subscribers hear about the sensor before it becomes
                // visible to lookups
                emit_to(
                    &inner.subscribers,
                    HubEvent::Device {
                        sensor: info,
                        name: msg.name.clone(),
                    },
                );
                inner.sensors.insert(sid, sensor);
            }
            Err(e) => {
                warn!(sid = %sid, "could not add new sensor: {e}");
                emit_to(
                    &inner.subscribers,
                    HubEvent::Warning(format!("Could not add new sensor: {e}")),
                );
                return;
            }
        }
    }

    // The nested payload travels as an encoded string; a malformed one is
    // non-fatal and must not abandon routing or liveness updates
    if let Some(Value::String(encoded)) = &msg.data {
        match serde_json::from_str::<Value>(encoded) {
            Ok(decoded) => msg.data = Some(decoded),
            Err(_) => {
                emit_to(
                    &inner.subscribers,
                    HubEvent::Warning(format!("Could not parse: {encoded}")),
                );
                msg.data = None;
            }
        }
    }

    if let Some(token) = &msg.token {
        inner.tokens.insert(src, token.clone());
    }

    if let Some(sensor) = msg.sid.as_ref().and_then(|sid| inner.sensors.get_mut(sid)) {
        // Any traffic from a device is evidence it is alive; only a
        // dedicated heartbeat carries token and payload
        if msg.is_heartbeat() {
            sensor.heart_beat(msg.token.clone(), msg.data.clone());
        } else {
            sensor.heart_beat(None, None);
        }

        if msg.data.is_some() && msg.is_report_or_ack() {
            sensor.on_message(&msg);
        }
    }

    emit_to(&inner.subscribers, HubEvent::Message(msg));
}
