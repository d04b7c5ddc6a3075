use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use med_domain::{
    bridge::BridgeMessage,
    notifications::{NotificationCenter, DEFAULT_DASHBOARD_URL},
    AgentEvent, AgentState,
};
use med_push::{AgentStore, HttpServerClient, Permission, SubscriptionManager};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::host::{ConfiguredPlatform, HostEvent};
use crate::runtime::{AgentHandle, AgentRuntime};

const STORE_FILE: &str = "agent.json";
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000/";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub server_url: Url,
    pub csrf_token: Option<String>,
    pub state_dir: PathBuf,
    pub dashboard_url: String,
    pub permission: Permission,
    pub push_endpoint: Option<String>,
    pub push_p256dh: Option<String>,
    pub push_auth: Option<String>,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("MEDREMIND_SERVER_URL") {
            config.server_url = Url::parse(raw.trim())
                .with_context(|| format!("MEDREMIND_SERVER_URL is not a URL: {raw}"))?;
        }
        if let Ok(token) = std::env::var("MEDREMIND_CSRF_TOKEN") {
            config.csrf_token = non_empty(token);
        }
        if let Ok(dir) = std::env::var("MEDREMIND_STATE_DIR") {
            if !dir.trim().is_empty() {
                config.state_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var("MEDREMIND_DASHBOARD_URL") {
            if let Some(url) = non_empty(url) {
                config.dashboard_url = url;
            }
        }
        if let Ok(permission) = std::env::var("MEDREMIND_PERMISSION") {
            config.permission = match permission.trim().to_ascii_lowercase().as_str() {
                "granted" => Permission::Granted,
                _ => Permission::Denied,
            };
        }
        config.push_endpoint = std::env::var("MEDREMIND_PUSH_ENDPOINT").ok().and_then(non_empty);
        config.push_p256dh = std::env::var("MEDREMIND_PUSH_P256DH").ok().and_then(non_empty);
        config.push_auth = std::env::var("MEDREMIND_PUSH_AUTH").ok().and_then(non_empty);
        Ok(config)
    }

    pub fn store_path(&self) -> PathBuf {
        self.state_dir.join(STORE_FILE)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("default server URL is valid"),
            csrf_token: None,
            state_dir: PathBuf::from(".medremind"),
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            permission: Permission::Denied,
            push_endpoint: None,
            push_p256dh: None,
            push_auth: None,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Launch the agent: restore persisted state, treat the launch as an
/// activation, then serve host events from stdin until interrupted.
pub async fn run(config: AgentConfig) -> Result<()> {
    info!(
        server = %config.server_url,
        state_dir = %config.state_dir.display(),
        "starting medication reminder agent"
    );
    let store = AgentStore::new(config.store_path());
    debug!(path = %store.path().display(), "using agent store");
    let center = Arc::new(NotificationCenter::new());
    let server = HttpServerClient::new(config.server_url.clone())
        .context("failed to set up server client")?
        .with_csrf_token(config.csrf_token.clone());
    let subscriptions =
        SubscriptionManager::restore(ConfiguredPlatform::from_config(&config), server, store.clone())
            .context("failed to restore push subscription")?;

    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let mut runtime = AgentRuntime::new(
        AgentState::new(config.dashboard_url.clone()),
        subscriptions,
        store,
        center.clone(),
    )
    .with_replies(reply_tx);
    let restored = runtime
        .restore_schedule()
        .context("failed to load stored schedule")?;
    debug!(medications = restored, "restored schedule");

    let handle = runtime.handle();
    handle.send(AgentEvent::Activate);
    tokio::spawn(forward_host_events(handle, center));
    tokio::spawn(print_replies(reply_rx));

    runtime
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "could not listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}

async fn forward_host_events(handle: AgentHandle, center: Arc<NotificationCenter>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let Some(event) = HostEvent::parse(&line) else {
                    continue;
                };
                let event = event.into_agent_event(|tag| center.get(tag));
                if !handle.send(event) {
                    break;
                }
            }
            Ok(None) => {
                debug!("host input closed, reminders stay armed");
                break;
            }
            Err(err) => {
                warn!(%err, "failed to read host input");
                break;
            }
        }
    }
}

async fn print_replies(mut replies: mpsc::UnboundedReceiver<BridgeMessage>) {
    while let Some(message) = replies.recv().await {
        println!("{}", message.to_value());
    }
}
