//! Wire protocol for the Lumi multicast announce/report dialect
//!
//! Every datagram carries one JSON object. Inbound messages are decoded into
//! [`WireMessage`] and then normalized into [`Message`] by the dispatcher
//! (the nested `data` field travels as a JSON-encoded string and is parsed
//! into a structured value on arrival).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};

/// Multicast group the gateways announce on
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 50);

/// Default local port for inbound reports and heartbeats
pub const DEFAULT_PORT: u16 = 9898;

/// Port on the multicast group that answers discovery probes
pub const DISCOVERY_PORT: u16 = 4321;

/// Command sent as the discovery probe
pub const CMD_WHOIS: &str = "whois";

/// Command carrying a device's liveness signal plus token/payload
pub const CMD_HEARTBEAT: &str = "heartbeat";

/// Command carrying a state report
pub const CMD_REPORT: &str = "report";

/// Suffix marking a command acknowledgment (e.g. `read_ack`, `write_ack`)
pub const ACK_SUFFIX: &str = "_ack";

/// Model tag announced by the gateway itself
pub const GATEWAY_MODEL: &str = "gateway";

/// Raw serde view of one inbound datagram.
///
/// Every field is tolerant of absence: gateways answering a discovery
/// probe send bare `{"model":"gateway"}` announcements with no `cmd` at
/// all, which decode with an empty command. Unknown fields are ignored so
/// firmware revisions can add fields without breaking decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl WireMessage {
    /// Decode a datagram. Returns `None` for anything that is not a
    /// well-formed message; malformed top-level JSON is not actionable by
    /// the embedder and is dropped silently.
    pub fn decode(datagram: &[u8]) -> Option<Self> {
        serde_json::from_slice(datagram).ok()
    }

    /// Serialize to the single-line JSON form used on the wire
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A fully decoded inbound message as delivered to devices and subscribers.
///
/// Compared to [`WireMessage`], `data` has been parsed from its string
/// encoding (or cleared if unparseable) and the sender's address from the
/// transport is attached.
#[derive(Debug, Clone)]
pub struct Message {
    pub cmd: String,
    pub sid: Option<String>,
    pub model: Option<String>,
    pub name: Option<String>,
    pub data: Option<Value>,
    pub token: Option<String>,
    /// Source address of the datagram
    pub addr: IpAddr,
}

impl Message {
    /// Whether this command should be routed to the device's message
    /// callback when a payload is present: a state report or any
    /// acknowledgment (`*_ack`).
    pub fn is_report_or_ack(&self) -> bool {
        self.cmd == CMD_REPORT || self.cmd.ends_with(ACK_SUFFIX)
    }

    /// Whether this is a dedicated heartbeat command
    pub fn is_heartbeat(&self) -> bool {
        self.cmd == CMD_HEARTBEAT
    }
}

/// Build the discovery probe broadcast on startup
pub fn whois() -> WireMessage {
    WireMessage {
        cmd: CMD_WHOIS.to_string(),
        sid: None,
        model: None,
        name: None,
        data: None,
        token: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(MULTICAST_GROUP.to_string(), "224.0.0.50");
        assert_eq!(DEFAULT_PORT, 9898);
        assert_eq!(DISCOVERY_PORT, 4321);
    }

    #[test]
    fn test_whois_probe_shape() {
        let json = whois().to_json().unwrap();
        assert_eq!(json, r#"{"cmd":"whois"}"#);
    }

    #[test]
    fn test_decode_heartbeat() {
        let raw = br#"{"cmd":"heartbeat","model":"gateway","sid":"f0b4299a8a6c","token":"gbBdzQINrtkmbLvP","data":"{\"ip\":\"10.0.0.5\"}"}"#;
        let msg = WireMessage::decode(raw).unwrap();

        assert_eq!(msg.cmd, "heartbeat");
        assert_eq!(msg.sid.as_deref(), Some("f0b4299a8a6c"));
        assert_eq!(msg.model.as_deref(), Some("gateway"));
        assert_eq!(msg.token.as_deref(), Some("gbBdzQINrtkmbLvP"));
        // data is still the encoded string at this stage
        assert!(matches!(msg.data, Some(Value::String(_))));
    }

    #[test]
    fn test_decode_announce_without_sid() {
        // Gateways answering a whois only carry the model
        let msg = WireMessage::decode(br#"{"cmd":"iam","model":"gateway"}"#).unwrap();
        assert!(msg.sid.is_none());
        assert_eq!(msg.model.as_deref(), Some("gateway"));
    }

    #[test]
    fn test_decode_announce_without_cmd() {
        // Some gateway firmware omits cmd entirely on announcements; the
        // datagram must still decode or discovery never sees it
        let msg = WireMessage::decode(br#"{"model":"gateway"}"#).unwrap();
        assert_eq!(msg.cmd, "");
        assert_eq!(msg.model.as_deref(), Some("gateway"));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let raw = br#"{"cmd":"report","sid":"abc","short_id":4343,"data":"{}"}"#;
        let msg = WireMessage::decode(raw).unwrap();
        assert_eq!(msg.sid.as_deref(), Some("abc"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(WireMessage::decode(b"not json at all").is_none());
        assert!(WireMessage::decode(b"").is_none());
        assert!(WireMessage::decode(b"[1,2,3]").is_none());
    }

    #[test]
    fn test_report_or_ack_matching() {
        let base = Message {
            cmd: "report".to_string(),
            sid: None,
            model: None,
            name: None,
            data: None,
            token: None,
            addr: "10.0.0.5".parse().unwrap(),
        };
        assert!(base.is_report_or_ack());

        let ack = Message {
            cmd: "write_ack".to_string(),
            ..base.clone()
        };
        assert!(ack.is_report_or_ack());

        let read_ack = Message {
            cmd: "read_ack".to_string(),
            ..base.clone()
        };
        assert!(read_ack.is_report_or_ack());

        // suffix must terminate the command
        let not_ack = Message {
            cmd: "read_ack_later".to_string(),
            ..base.clone()
        };
        assert!(!not_ack.is_report_or_ack());

        let heartbeat = Message {
            cmd: "heartbeat".to_string(),
            ..base
        };
        assert!(!heartbeat.is_report_or_ack());
        assert!(heartbeat.is_heartbeat());
    }

    #[test]
    fn test_wire_roundtrip_skips_absent_fields() {
        let msg = WireMessage {
            cmd: "read".to_string(),
            sid: Some("abc123".to_string()),
            model: None,
            name: None,
            data: None,
            token: None,
        };
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"cmd":"read","sid":"abc123"}"#);
    }
}
