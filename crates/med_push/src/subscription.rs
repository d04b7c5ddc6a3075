use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PushError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionKeys {
    pub p256dh: Vec<u8>,
    pub auth: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: Url,
    pub keys: SubscriptionKeys,
}

/// Body of the registration request, keys in standard padded base64.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationPayload {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

impl PushSubscription {
    pub fn is_complete(&self) -> bool {
        !self.keys.p256dh.is_empty() && !self.keys.auth.is_empty()
    }

    pub fn registration_payload(&self) -> Result<RegistrationPayload> {
        if !self.is_complete() {
            return Err(PushError::SubscriptionIncomplete);
        }
        Ok(RegistrationPayload {
            endpoint: self.endpoint.to_string(),
            p256dh: STANDARD.encode(&self.keys.p256dh),
            auth: STANDARD.encode(&self.keys.auth),
        })
    }

    pub fn from_payload(payload: &RegistrationPayload) -> Result<Self> {
        let endpoint = Url::parse(&payload.endpoint)
            .map_err(|_| PushError::InvalidEndpoint(payload.endpoint.clone()))?;
        let decode = |value: &str| {
            STANDARD
                .decode(value)
                .map_err(|err| PushError::Store(format!("stored key is not base64: {err}")))
        };
        Ok(Self {
            endpoint,
            keys: SubscriptionKeys {
                p256dh: decode(&payload.p256dh)?,
                auth: decode(&payload.auth)?,
            },
        })
    }
}

/// Decode a base64url application server key, tolerating padding and the
/// standard alphabet.
pub fn decode_vapid_key(raw: &str) -> Result<Vec<u8>> {
    let normalized: String = raw
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let key = URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|err| PushError::InvalidVapidKey(err.to_string()))?;
    if key.is_empty() {
        return Err(PushError::InvalidVapidKey("key is empty".into()));
    }
    Ok(key)
}
