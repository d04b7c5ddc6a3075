use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use med_domain::{notifications::NotificationRecord, AgentEvent};
use med_push::{Permission, PushError, PushPlatform, RawSubscription};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::app::AgentConfig;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum HostEvent {
    Install,
    Activate,
    Message {
        data: Value,
    },
    Push {
        #[serde(default)]
        data: String,
    },
    NotificationClick {
        tag: String,
        #[serde(default)]
        url: Option<String>,
    },
    PushSubscriptionChange,
}

impl HostEvent {
    pub fn parse(line: &str) -> Option<Self> {
        match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(%err, "ignoring malformed host event");
                None
            }
        }
    }

    /// A click is resolved against the notification still visible under its tag.
    pub fn into_agent_event(
        self,
        lookup: impl FnOnce(&str) -> Option<NotificationRecord>,
    ) -> AgentEvent {
        match self {
            HostEvent::Install => AgentEvent::Install,
            HostEvent::Activate => AgentEvent::Activate,
            HostEvent::Message { data } => AgentEvent::Message(data),
            HostEvent::Push { data } => AgentEvent::Push(data.into_bytes()),
            HostEvent::NotificationClick { tag, url } => {
                let mut record =
                    lookup(&tag).unwrap_or_else(|| NotificationRecord::new(tag, "", ""));
                if url.is_some() {
                    record.target_url = url;
                }
                AgentEvent::NotificationClick(record)
            }
            HostEvent::PushSubscriptionChange => AgentEvent::PushSubscriptionChange,
        }
    }
}

/// Push platform whose permission decision and channel come from the
/// agent configuration rather than an interactive prompt.
#[derive(Debug, Clone)]
pub struct ConfiguredPlatform {
    permission: Permission,
    endpoint: Option<String>,
    p256dh: Option<String>,
    auth: Option<String>,
}

impl ConfiguredPlatform {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            permission: config.permission,
            endpoint: config.push_endpoint.clone(),
            p256dh: config.push_p256dh.clone(),
            auth: config.push_auth.clone(),
        }
    }
}

fn decode_key(raw: &Option<String>) -> Option<Vec<u8>> {
    let raw = raw.as_deref()?.trim();
    STANDARD
        .decode(raw)
        .or_else(|_| URL_SAFE_NO_PAD.decode(raw.trim_end_matches('=')))
        .ok()
        .filter(|key| !key.is_empty())
}

#[async_trait]
impl PushPlatform for ConfiguredPlatform {
    async fn request_permission(&self) -> Permission {
        self.permission
    }

    async fn subscribe(&self, _application_server_key: &[u8]) -> Result<RawSubscription, PushError> {
        let endpoint = self
            .endpoint
            .clone()
            .ok_or_else(|| PushError::Platform("no push endpoint configured".into()))?;
        Ok(RawSubscription {
            endpoint,
            p256dh: decode_key(&self.p256dh),
            auth: decode_key(&self.auth),
        })
    }
}
