//! LumiHub Core Library
//!
//! This crate discovers and talks to Lumi/Aqara smart-home gateways and
//! sensors over their UDP multicast announce/report protocol: it maintains
//! a live registry of discovered devices and derives the per-gateway
//! symmetric key needed to authorize outbound commands.
//!
//! # Architecture
//!
//! The library is organized into five main modules:
//!
//! - [`hub`]: socket lifecycle, datagram dispatch, registry, event surface
//! - [`protocol`]: the JSON wire dialect and its constants
//! - [`device`]: the sensor capability trait and the model-tag factory
//! - [`sensors`]: built-in implementations for the common device classes
//! - [`keys`]: AES-128-CBC command-key derivation
//!
//! # Example
//!
//! ```no_run
//! use lumihub_core::{Hub, HubConfig, HubEvent};
//!
//! async fn run() -> lumihub_core::Result<()> {
//!     let hub = Hub::new(HubConfig {
//!         key: Some("0123456789abcdef".to_string()),
//!         ..HubConfig::default()
//!     });
//!     let mut events = hub.subscribe();
//!     hub.listen()?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             HubEvent::Device { sensor, name } => {
//!                 println!("new {} sensor {} ({:?})", sensor.model, sensor.sid, name);
//!             }
//!             HubEvent::Message(msg) => println!("{} from {}", msg.cmd, msg.addr),
//!             _ => {}
//!         }
//!     }
//!     hub.stop()
//! }
//! ```

pub mod device;
pub mod error;
pub mod hub;
pub mod keys;
pub mod protocol;
pub mod sensors;

// Re-export commonly used types
pub use device::{Sensor, SensorCatalog, SensorContext, SensorInfo};
pub use error::{HubError, Result};
pub use hub::{Hub, HubConfig, HubEvent, LifecycleState};
pub use protocol::{Message, WireMessage, DEFAULT_PORT, DISCOVERY_PORT, MULTICAST_GROUP};
pub use sensors::default_catalog;

/// Get the version of the lumihub_core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
