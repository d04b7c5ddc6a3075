use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Route opened when a notification carries no explicit target.
pub const DEFAULT_DASHBOARD_URL: &str = "/dashboard/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRecord {
    pub tag: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl NotificationRecord {
    pub fn new(tag: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            title: title.into(),
            body: body.into(),
            target_url: None,
            icon: None,
        }
    }

    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Host notification surface. Implementations must replace, not stack, a
/// notification whose tag is already visible.
pub trait NotificationSurface: Send + Sync {
    fn show(&self, record: NotificationRecord);
    fn close(&self, tag: &str);
    fn open_window(&self, url: &str);
}

/// In-process notification surface keyed by tag.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    inner: Mutex<CenterState>,
}

#[derive(Debug, Default)]
struct CenterState {
    visible: BTreeMap<String, NotificationRecord>,
    display_calls: usize,
    windows: Vec<String>,
    focused: Option<String>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> Vec<NotificationRecord> {
        self.inner.lock().visible.values().cloned().collect()
    }

    pub fn get(&self, tag: &str) -> Option<NotificationRecord> {
        self.inner.lock().visible.get(tag).cloned()
    }

    pub fn display_calls(&self) -> usize {
        self.inner.lock().display_calls
    }

    pub fn windows(&self) -> Vec<String> {
        self.inner.lock().windows.clone()
    }

    pub fn focused(&self) -> Option<String> {
        self.inner.lock().focused.clone()
    }
}

impl NotificationSurface for NotificationCenter {
    fn show(&self, record: NotificationRecord) {
        let mut state = self.inner.lock();
        state.display_calls += 1;
        let replaced = state.visible.contains_key(&record.tag);
        tracing::info!(
            tag = %record.tag,
            title = %record.title,
            body = %record.body,
            replaced,
            "notification shown"
        );
        state.visible.insert(record.tag.clone(), record);
    }

    fn close(&self, tag: &str) {
        if self.inner.lock().visible.remove(tag).is_some() {
            tracing::debug!(tag, "notification closed");
        }
    }

    fn open_window(&self, url: &str) {
        let mut state = self.inner.lock();
        if !state.windows.iter().any(|existing| existing == url) {
            state.windows.push(url.to_string());
            tracing::info!(url, "opened client window");
        } else {
            tracing::info!(url, "focused existing client window");
        }
        state.focused = Some(url.to_string());
    }
}
