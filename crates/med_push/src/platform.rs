use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
}

/// Subscription exactly as the platform reports it. Either key may be
/// missing; callers validate before use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSubscription {
    pub endpoint: String,
    pub p256dh: Option<Vec<u8>>,
    pub auth: Option<Vec<u8>>,
}

#[async_trait]
pub trait PushPlatform: Send + Sync {
    async fn request_permission(&self) -> Permission;

    async fn subscribe(&self, application_server_key: &[u8]) -> Result<RawSubscription>;
}
