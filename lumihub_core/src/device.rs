//! Sensor capability contract and the model-tag factory
//!
//! Every device the hub can manage implements [`Sensor`]: a heartbeat
//! callback (any inbound traffic refreshes liveness, a dedicated heartbeat
//! additionally carries token and payload) and a message callback for state
//! reports and command acknowledgments. Implementations are registered in a
//! [`SensorCatalog`] keyed by the model tag the device announces.

use crate::error::{HubError, Result};
use crate::protocol::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;

#[cfg(test)]
use mockall::automock;

/// Capability contract every managed device satisfies
#[cfg_attr(test, automock)]
pub trait Sensor: Send {
    /// Stable device identifier (`sid` on the wire)
    fn sid(&self) -> &str;

    /// Model tag this device announced
    fn model(&self) -> &str;

    /// Address the device was first seen from
    fn ip(&self) -> IpAddr;

    /// Optional human-readable name from the announce message
    fn name(&self) -> Option<String> {
        None
    }

    /// Liveness signal. For a dedicated `heartbeat` command the latest
    /// session token and decoded payload are passed along; every other
    /// command invokes this with no arguments.
    fn heart_beat(&mut self, token: Option<String>, data: Option<Value>);

    /// A state report or acknowledgment addressed to this device
    fn on_message(&mut self, msg: &Message);
}

/// Read-only snapshot of a registered sensor, safe to hand to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub sid: String,
    pub model: String,
    pub ip: IpAddr,
    pub name: Option<String>,
}

impl SensorInfo {
    pub fn of(sensor: &dyn Sensor) -> Self {
        Self {
            sid: sensor.sid().to_string(),
            model: sensor.model().to_string(),
            ip: sensor.ip(),
            name: sensor.name(),
        }
    }
}

/// Arguments handed to a sensor constructor on first contact
#[derive(Debug, Clone)]
pub struct SensorContext {
    pub sid: String,
    pub model: String,
    pub ip: IpAddr,
    pub name: Option<String>,
}

/// Constructor registered for one model tag
pub type SensorBuilder = Box<dyn Fn(SensorContext) -> Box<dyn Sensor> + Send + Sync>;

/// Factory mapping announced model tags to sensor constructors.
///
/// Populated at startup; [`register`](Self::register) replaces any earlier
/// builder for the same tag, so embedders can override the built-ins.
#[derive(Default)]
pub struct SensorCatalog {
    builders: HashMap<String, SensorBuilder>,
}

impl SensorCatalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for a model tag
    pub fn register<F>(&mut self, model: &str, builder: F)
    where
        F: Fn(SensorContext) -> Box<dyn Sensor> + Send + Sync + 'static,
    {
        self.builders.insert(model.to_string(), Box::new(builder));
    }

    /// Whether a constructor is registered for this model tag
    pub fn supports(&self, model: &str) -> bool {
        self.builders.contains_key(model)
    }

    /// Registered model tags, sorted for stable display
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }

    /// Construct a sensor for the given context.
    ///
    /// Fails with [`HubError::UnsupportedModel`] when no constructor matches
    /// the announced model tag.
    pub fn build(&self, ctx: SensorContext) -> Result<Box<dyn Sensor>> {
        match self.builders.get(&ctx.model) {
            Some(builder) => Ok(builder(ctx)),
            None => Err(HubError::UnsupportedModel(ctx.model)),
        }
    }
}
