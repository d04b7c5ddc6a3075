use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    error::{PushError, Result},
    platform::{Permission, PushPlatform},
    server::ServerApi,
    store::{AgentStore, StoredSubscription},
    subscription::{decode_vapid_key, PushSubscription, SubscriptionKeys},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubscriptionState {
    Unregistered,
    PermissionRequested,
    PermissionGranted,
    PermissionDenied,
    Subscribing,
    Subscribed,
    Invalidated,
}

/// A failed registration is kept and flagged for the next `activate`.
pub struct SubscriptionManager<P, S> {
    platform: P,
    server: S,
    store: Option<AgentStore>,
    state: SubscriptionState,
    permission: Option<Permission>,
    subscription: Option<PushSubscription>,
    registered: bool,
}

impl<P: PushPlatform, S: ServerApi> SubscriptionManager<P, S> {
    pub fn new(platform: P, server: S) -> Self {
        Self {
            platform,
            server,
            store: None,
            state: SubscriptionState::Unregistered,
            permission: None,
            subscription: None,
            registered: false,
        }
    }

    pub fn restore(platform: P, server: S, store: AgentStore) -> Result<Self> {
        let snapshot = store.load()?;
        let mut manager = Self::new(platform, server);
        if let Some(stored) = snapshot.subscription {
            match PushSubscription::from_payload(&stored.payload) {
                Ok(subscription) => {
                    debug!(registered = stored.registered, "restored push subscription");
                    manager.subscription = Some(subscription);
                    manager.registered = stored.registered;
                    manager.permission = Some(Permission::Granted);
                    manager.state = SubscriptionState::Subscribed;
                }
                Err(err) => warn!(%err, "discarding unreadable stored subscription"),
            }
        }
        manager.store = Some(store);
        Ok(manager)
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn subscription(&self) -> Option<&PushSubscription> {
        self.subscription.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub async fn request_permission(&mut self) -> Permission {
        if let Some(decided) = self.permission {
            return decided;
        }
        self.state = SubscriptionState::PermissionRequested;
        let decision = self.platform.request_permission().await;
        self.permission = Some(decision);
        self.state = match decision {
            Permission::Granted => SubscriptionState::PermissionGranted,
            Permission::Denied => SubscriptionState::PermissionDenied,
        };
        info!(?decision, "notification permission decided");
        decision
    }

    /// Never stores or returns a subscription with missing keys.
    #[instrument(skip(self, vapid_public_key))]
    pub async fn subscribe(&mut self, vapid_public_key: &str) -> Result<PushSubscription> {
        if self.permission != Some(Permission::Granted) {
            return Err(PushError::PermissionDenied);
        }
        let application_server_key = decode_vapid_key(vapid_public_key)?;

        let resume = self.state;
        self.state = SubscriptionState::Subscribing;
        let raw = match self.platform.subscribe(&application_server_key).await {
            Ok(raw) => raw,
            Err(err) => {
                self.state = resume;
                return Err(err);
            }
        };

        let keys = match (raw.p256dh, raw.auth) {
            (Some(p256dh), Some(auth)) if !p256dh.is_empty() && !auth.is_empty() => {
                SubscriptionKeys { p256dh, auth }
            }
            _ => {
                warn!("subscription is missing its encryption keys");
                self.state = SubscriptionState::PermissionGranted;
                return Err(PushError::SubscriptionIncomplete);
            }
        };
        let endpoint = match Url::parse(&raw.endpoint) {
            Ok(endpoint) => endpoint,
            Err(_) => {
                self.state = SubscriptionState::PermissionGranted;
                return Err(PushError::InvalidEndpoint(raw.endpoint));
            }
        };

        let subscription = PushSubscription { endpoint, keys };
        self.subscription = Some(subscription.clone());
        self.registered = false;
        self.state = SubscriptionState::Subscribed;
        self.persist();
        info!(endpoint = %subscription.endpoint, "push subscription created");
        Ok(subscription)
    }

    #[instrument(skip_all, fields(endpoint = %subscription.endpoint))]
    pub async fn register(&mut self, subscription: &PushSubscription) -> Result<()> {
        let payload = subscription.registration_payload()?;
        let outcome = self.server.register(&payload).await;
        self.registered = outcome.is_ok();
        self.persist();
        match outcome {
            Ok(()) => {
                info!("push subscription registered with server");
                Ok(())
            }
            Err(err) => {
                warn!(%err, "registration failed, will retry on next activation");
                Err(match err {
                    PushError::RegistrationFailed(_) => err,
                    other => PushError::RegistrationFailed(other.to_string()),
                })
            }
        }
    }

    pub async fn activate(&mut self) -> Result<SubscriptionState> {
        if self.state != SubscriptionState::Invalidated {
            if let Some(subscription) = self.subscription.clone() {
                if !self.registered {
                    info!("retrying pending subscription registration");
                    self.register(&subscription).await?;
                }
                return Ok(self.state);
            }
        }
        self.bring_up().await
    }

    pub fn invalidate(&mut self) {
        info!("push subscription invalidated");
        self.state = SubscriptionState::Invalidated;
        self.subscription = None;
        self.registered = false;
        self.persist();
    }

    pub async fn renew(&mut self) -> Result<SubscriptionState> {
        self.invalidate();
        self.bring_up().await
    }

    async fn bring_up(&mut self) -> Result<SubscriptionState> {
        if self.request_permission().await == Permission::Denied {
            return Err(PushError::PermissionDenied);
        }
        let vapid_public_key = self.server.vapid_public_key().await?;
        let subscription = self.subscribe(&vapid_public_key).await?;
        self.register(&subscription).await?;
        Ok(self.state)
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let stored = match &self.subscription {
            Some(subscription) => match subscription.registration_payload() {
                Ok(payload) => Some(StoredSubscription {
                    payload,
                    registered: self.registered,
                }),
                Err(_) => None,
            },
            None => None,
        };
        if let Err(err) = store.update(|snapshot| snapshot.subscription = stored) {
            warn!(%err, "failed to persist push subscription");
        }
    }
}
