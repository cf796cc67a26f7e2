//! Built-in sensor implementations
//!
//! A small catalog covering the common Lumi device classes. Each type keeps
//! the latest decoded state from its reports plus the last time any traffic
//! was seen from it; the hub never expires sensors, so `last_seen` is the
//! hook for embedders that want their own staleness policy.

use crate::device::{Sensor, SensorCatalog, SensorContext};
use crate::protocol::Message;
use serde_json::Value;
use std::net::IpAddr;
use std::time::Instant;
use tracing::debug;

/// Read a string field out of a decoded report payload
fn data_str<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

/// Parse a centi-unit string field ("2233" -> 22.33)
fn data_centi(data: &Value, key: &str) -> Option<f64> {
    data_str(data, key)?.parse::<f64>().ok().map(|v| v / 100.0)
}

macro_rules! sensor_base {
    () => {
        fn sid(&self) -> &str {
            &self.sid
        }

        fn model(&self) -> &str {
            &self.model
        }

        fn ip(&self) -> IpAddr {
            self.ip
        }

        fn name(&self) -> Option<String> {
            self.name.clone()
        }
    };
}

/// The Lumi gateway itself.
///
/// Its heartbeat carries the session token used for command-key derivation
/// and a payload echoing the gateway's own address.
pub struct GatewaySensor {
    sid: String,
    model: String,
    ip: IpAddr,
    name: Option<String>,
    last_seen: Option<Instant>,
    token: Option<String>,
    reported_ip: Option<String>,
}

impl GatewaySensor {
    pub fn new(ctx: SensorContext) -> Self {
        Self {
            sid: ctx.sid,
            model: ctx.model,
            ip: ctx.ip,
            name: ctx.name,
            last_seen: None,
            token: None,
            reported_ip: None,
        }
    }

    /// Last session token broadcast by this gateway
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Address the gateway reports about itself in heartbeats
    pub fn reported_ip(&self) -> Option<&str> {
        self.reported_ip.as_deref()
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }
}

impl Sensor for GatewaySensor {
    sensor_base!();

    fn heart_beat(&mut self, token: Option<String>, data: Option<Value>) {
        self.last_seen = Some(Instant::now());
        if token.is_some() {
            self.token = token;
        }
        if let Some(ip) = data.as_ref().and_then(|d| data_str(d, "ip")) {
            self.reported_ip = Some(ip.to_string());
        }
    }

    fn on_message(&mut self, msg: &Message) {
        debug!(sid = %self.sid, cmd = %msg.cmd, "gateway report");
    }
}

/// Door/window contact sensor
pub struct MagnetSensor {
    sid: String,
    model: String,
    ip: IpAddr,
    name: Option<String>,
    last_seen: Option<Instant>,
    open: Option<bool>,
}

impl MagnetSensor {
    pub fn new(ctx: SensorContext) -> Self {
        Self {
            sid: ctx.sid,
            model: ctx.model,
            ip: ctx.ip,
            name: ctx.name,
            last_seen: None,
            open: None,
        }
    }

    /// `Some(true)` if the contact last reported open
    pub fn open(&self) -> Option<bool> {
        self.open
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }
}

impl Sensor for MagnetSensor {
    sensor_base!();

    fn heart_beat(&mut self, _token: Option<String>, _data: Option<Value>) {
        self.last_seen = Some(Instant::now());
    }

    fn on_message(&mut self, msg: &Message) {
        match msg.data.as_ref().and_then(|d| data_str(d, "status")) {
            Some("open") => self.open = Some(true),
            Some("close") => self.open = Some(false),
            _ => (),
        }
    }
}

/// PIR motion sensor
pub struct MotionSensor {
    sid: String,
    model: String,
    ip: IpAddr,
    name: Option<String>,
    last_seen: Option<Instant>,
    last_motion: Option<Instant>,
    no_motion_secs: Option<u64>,
}

impl MotionSensor {
    pub fn new(ctx: SensorContext) -> Self {
        Self {
            sid: ctx.sid,
            model: ctx.model,
            ip: ctx.ip,
            name: ctx.name,
            last_seen: None,
            last_motion: None,
            no_motion_secs: None,
        }
    }

    pub fn last_motion(&self) -> Option<Instant> {
        self.last_motion
    }

    /// Seconds of stillness the sensor last reported, if any
    pub fn no_motion_secs(&self) -> Option<u64> {
        self.no_motion_secs
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }
}

impl Sensor for MotionSensor {
    sensor_base!();

    fn heart_beat(&mut self, _token: Option<String>, _data: Option<Value>) {
        self.last_seen = Some(Instant::now());
    }

    fn on_message(&mut self, msg: &Message) {
        let Some(data) = msg.data.as_ref() else {
            return;
        };
        if data_str(data, "status") == Some("motion") {
            self.last_motion = Some(Instant::now());
            self.no_motion_secs = None;
        } else if let Some(secs) = data_str(data, "no_motion").and_then(|s| s.parse().ok()) {
            self.no_motion_secs = Some(secs);
        }
    }
}

/// Wireless button; reports click, double_click, long_click_press,
/// long_click_release
pub struct SwitchSensor {
    sid: String,
    model: String,
    ip: IpAddr,
    name: Option<String>,
    last_seen: Option<Instant>,
    last_click: Option<String>,
}

impl SwitchSensor {
    pub fn new(ctx: SensorContext) -> Self {
        Self {
            sid: ctx.sid,
            model: ctx.model,
            ip: ctx.ip,
            name: ctx.name,
            last_seen: None,
            last_click: None,
        }
    }

    pub fn last_click(&self) -> Option<&str> {
        self.last_click.as_deref()
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }
}

impl Sensor for SwitchSensor {
    sensor_base!();

    fn heart_beat(&mut self, _token: Option<String>, _data: Option<Value>) {
        self.last_seen = Some(Instant::now());
    }

    fn on_message(&mut self, msg: &Message) {
        if let Some(status) = msg.data.as_ref().and_then(|d| data_str(d, "status")) {
            self.last_click = Some(status.to_string());
        }
    }
}

/// Temperature/humidity sensor; values arrive as centi-degree and
/// centi-percent strings
pub struct ThSensor {
    sid: String,
    model: String,
    ip: IpAddr,
    name: Option<String>,
    last_seen: Option<Instant>,
    temperature: Option<f64>,
    humidity: Option<f64>,
}

impl ThSensor {
    pub fn new(ctx: SensorContext) -> Self {
        Self {
            sid: ctx.sid,
            model: ctx.model,
            ip: ctx.ip,
            name: ctx.name,
            last_seen: None,
            temperature: None,
            humidity: None,
        }
    }

    /// Degrees Celsius
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Relative humidity percent
    pub fn humidity(&self) -> Option<f64> {
        self.humidity
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }
}

impl Sensor for ThSensor {
    sensor_base!();

    fn heart_beat(&mut self, _token: Option<String>, _data: Option<Value>) {
        self.last_seen = Some(Instant::now());
    }

    fn on_message(&mut self, msg: &Message) {
        let Some(data) = msg.data.as_ref() else {
            return;
        };
        if let Some(t) = data_centi(data, "temperature") {
            self.temperature = Some(t);
        }
        if let Some(h) = data_centi(data, "humidity") {
            self.humidity = Some(h);
        }
    }
}

/// Smart power plug
pub struct PlugSensor {
    sid: String,
    model: String,
    ip: IpAddr,
    name: Option<String>,
    last_seen: Option<Instant>,
    on: Option<bool>,
    in_use: Option<bool>,
}

impl PlugSensor {
    pub fn new(ctx: SensorContext) -> Self {
        Self {
            sid: ctx.sid,
            model: ctx.model,
            ip: ctx.ip,
            name: ctx.name,
            last_seen: None,
            on: None,
            in_use: None,
        }
    }

    pub fn on(&self) -> Option<bool> {
        self.on
    }

    /// Whether a load is drawing power through the plug
    pub fn in_use(&self) -> Option<bool> {
        self.in_use
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }
}

impl Sensor for PlugSensor {
    sensor_base!();

    fn heart_beat(&mut self, _token: Option<String>, _data: Option<Value>) {
        self.last_seen = Some(Instant::now());
    }

    fn on_message(&mut self, msg: &Message) {
        let Some(data) = msg.data.as_ref() else {
            return;
        };
        match data_str(data, "status") {
            Some("on") => self.on = Some(true),
            Some("off") => self.on = Some(false),
            _ => (),
        }
        if let Some(inuse) = data_str(data, "inuse") {
            self.in_use = Some(inuse == "1");
        }
    }
}

/// Catalog with every built-in model registered
pub fn default_catalog() -> SensorCatalog {
    let mut catalog = SensorCatalog::new();
    catalog.register("gateway", |ctx| Box::new(GatewaySensor::new(ctx)));
    catalog.register("magnet", |ctx| Box::new(MagnetSensor::new(ctx)));
    catalog.register("motion", |ctx| Box::new(MotionSensor::new(ctx)));
    catalog.register("switch", |ctx| Box::new(SwitchSensor::new(ctx)));
    catalog.register("sensor_ht", |ctx| Box::new(ThSensor::new(ctx)));
    catalog.register("plug", |ctx| Box::new(PlugSensor::new(ctx)));
    catalog
}
