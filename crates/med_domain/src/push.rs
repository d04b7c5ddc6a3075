use serde::Deserialize;
use tracing::warn;

use crate::{
    dedupe,
    error::{ReminderError, Result},
    notifications::{NotificationRecord, DEFAULT_DASHBOARD_URL},
};

pub const DEFAULT_PUSH_TITLE: &str = "Medicine Reminder";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub data: Option<PushData>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PushData {
    #[serde(default)]
    pub url: Option<String>,
}

/// Parse a structured push payload. Anything that is not a JSON object with
/// a string `body` is rejected.
pub fn parse_payload(raw: &[u8]) -> Result<PushPayload> {
    serde_json::from_slice(raw).map_err(|err| ReminderError::PayloadParseFailed(err.to_string()))
}

/// Where a notification tap leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickRoute {
    pub close_tag: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct PushEventHandler {
    dashboard_url: String,
}

impl Default for PushEventHandler {
    fn default() -> Self {
        Self::new(DEFAULT_DASHBOARD_URL)
    }
}

impl PushEventHandler {
    pub fn new(dashboard_url: impl Into<String>) -> Self {
        Self {
            dashboard_url: dashboard_url.into(),
        }
    }

    /// Always exactly one notification, whatever the payload.
    pub fn on_push(&self, raw: &[u8]) -> NotificationRecord {
        let payload = match parse_payload(raw) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "rendering push payload as plain text");
                // A bare JSON string is shown without its quotes.
                let body = serde_json::from_slice::<String>(raw)
                    .unwrap_or_else(|_| String::from_utf8_lossy(raw).into_owned());
                PushPayload {
                    title: None,
                    body,
                    tag: None,
                    data: None,
                }
            }
        };

        let title = payload
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PUSH_TITLE.to_string());
        let tag = payload
            .tag
            .filter(|tag| !tag.is_empty())
            .unwrap_or_else(|| dedupe::push_tag(&title, &payload.body));
        let url = payload
            .data
            .and_then(|data| data.url)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.dashboard_url.clone());

        NotificationRecord::new(tag, title, payload.body).with_target_url(url)
    }

    pub fn on_notification_click(&self, record: &NotificationRecord) -> ClickRoute {
        let url = record
            .target_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.dashboard_url)
            .to_string();
        ClickRoute {
            close_tag: record.tag.clone(),
            url,
        }
    }
}
