use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::medication::Medication;

pub const SCHEDULE_NOTIFICATIONS: &str = "schedule-notifications";
pub const ACK: &str = "ack";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    #[serde(rename = "schedule-notifications")]
    ScheduleNotifications { medications: Vec<Medication> },
    #[serde(rename = "ack")]
    Ack(ScheduleAck),
}

/// Diagnostic reply to a schedule message. Nothing depends on receiving it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleAck {
    pub armed: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BridgeMessage {
    pub fn schedule(medications: Vec<Medication>) -> Self {
        BridgeMessage::ScheduleNotifications { medications }
    }

    pub fn to_value(&self) -> Value {
        // Serializing owned strings and integers cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Decode a raw message. Unknown or malformed messages are logged and dropped.
pub fn decode_message(raw: &Value) -> Option<BridgeMessage> {
    match raw.get("type").and_then(Value::as_str) {
        Some(SCHEDULE_NOTIFICATIONS) | Some(ACK) => match serde_json::from_value(raw.clone()) {
            Ok(message) => Some(message),
            Err(err) => {
                warn!(%err, "dropping malformed bridge message");
                None
            }
        },
        Some(other) => {
            debug!(message_type = other, "ignoring unknown bridge message");
            None
        }
        None => {
            debug!("ignoring bridge message without a type");
            None
        }
    }
}

pub trait MessagePort {
    fn post(&self, message: BridgeMessage);
}

/// Fire-and-forget delivery of the page's medication list to the agent.
pub fn post_schedule<P: MessagePort + ?Sized>(port: &P, medications: &[Medication]) {
    debug!(count = medications.len(), "posting schedule to agent");
    port.post(BridgeMessage::schedule(medications.to_vec()));
}
