use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    error::{PushError, Result},
    subscription::RegistrationPayload,
};

pub const VAPID_KEY_PATH: &str = "get-vapid-public-key/";
pub const SAVE_SUBSCRIPTION_PATH: &str = "save-subscription/";
pub const CSRF_HEADER: &str = "X-CSRFToken";

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[async_trait]
pub trait ServerApi: Send + Sync {
    /// Base64url application server key used to subscribe.
    async fn vapid_public_key(&self) -> Result<String>;

    async fn register(&self, payload: &RegistrationPayload) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct VapidKeyResponse {
    vapid_public_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct RegistrationResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpServerClient {
    base_url: Url,
    csrf_token: Option<String>,
    client: reqwest::Client,
}

impl HttpServerClient {
    pub fn new(base_url: Url) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(mut base_url: Url, timeout: Duration) -> Result<Self> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PushError::Platform(format!("cannot build HTTP client: {err}")))?;
        Ok(Self {
            base_url,
            csrf_token: None,
            client,
        })
    }

    pub fn with_csrf_token(mut self, token: Option<String>) -> Self {
        self.csrf_token = token.filter(|token| !token.is_empty());
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| PushError::InvalidEndpoint(format!("{}{path}: {err}", self.base_url)))
    }
}

#[async_trait]
impl ServerApi for HttpServerClient {
    #[instrument(skip_all)]
    async fn vapid_public_key(&self) -> Result<String> {
        let url = self.endpoint(VAPID_KEY_PATH)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| PushError::KeyRetrieval(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PushError::KeyRetrieval(format!("server responded with {status}")));
        }
        let body: VapidKeyResponse = response
            .json()
            .await
            .map_err(|err| PushError::KeyRetrieval(err.to_string()))?;
        debug!(base = %self.base_url, "retrieved server public key");
        Ok(body.vapid_public_key)
    }

    #[instrument(skip_all)]
    async fn register(&self, payload: &RegistrationPayload) -> Result<()> {
        let url = self.endpoint(SAVE_SUBSCRIPTION_PATH)?;
        let mut request = self.client.post(url).json(payload);
        if let Some(token) = &self.csrf_token {
            request = request.header(CSRF_HEADER, token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| PushError::RegistrationFailed(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PushError::RegistrationFailed(format!(
                "server responded with {status}"
            )));
        }
        let body: RegistrationResponse = response.json().await.unwrap_or_default();
        if body.status.as_deref() == Some("error") {
            return Err(PushError::RegistrationFailed(
                body.message
                    .unwrap_or_else(|| "server rejected the subscription".to_string()),
            ));
        }
        Ok(())
    }
}
