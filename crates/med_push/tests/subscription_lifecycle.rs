use std::sync::Arc;

use async_trait::async_trait;
use med_push::{
    store::AgentStore, Permission, PushError, PushPlatform, RawSubscription, RegistrationPayload,
    ServerApi, SubscriptionManager, SubscriptionState,
};
use parking_lot::Mutex;
use tempfile::tempdir;

const VAPID_KEY: &str = "BEl62iUYgUivxIkv69yViEuiBIa-Ib9-SkvMeAtA3LFgDzkrxZJjSgSnfckjBJuBkr3qBUYIHBQFLXYp5Nksh8U";

#[derive(Clone)]
struct FakePlatform {
    permission: Permission,
    prompts: Arc<Mutex<usize>>,
    subscribes: Arc<Mutex<usize>>,
    drop_p256dh: bool,
}

impl FakePlatform {
    fn granting() -> Self {
        Self {
            permission: Permission::Granted,
            prompts: Arc::default(),
            subscribes: Arc::default(),
            drop_p256dh: false,
        }
    }
}

#[async_trait]
impl PushPlatform for FakePlatform {
    async fn request_permission(&self) -> Permission {
        *self.prompts.lock() += 1;
        self.permission
    }

    async fn subscribe(&self, application_server_key: &[u8]) -> Result<RawSubscription, PushError> {
        assert_eq!(application_server_key.len(), 65, "uncompressed P-256 point");
        let mut count = self.subscribes.lock();
        *count += 1;
        Ok(RawSubscription {
            endpoint: format!("https://push.example.net/send/{}", *count),
            p256dh: (!self.drop_p256dh).then(|| vec![4; 65]),
            auth: Some(vec![7; 16]),
        })
    }
}

#[derive(Clone, Default)]
struct FakeServer {
    registrations: Arc<Mutex<Vec<RegistrationPayload>>>,
    failing: Arc<Mutex<bool>>,
}

#[async_trait]
impl ServerApi for FakeServer {
    async fn vapid_public_key(&self) -> Result<String, PushError> {
        Ok(VAPID_KEY.to_string())
    }

    async fn register(&self, payload: &RegistrationPayload) -> Result<(), PushError> {
        if *self.failing.lock() {
            return Err(PushError::RegistrationFailed("503 Service Unavailable".into()));
        }
        self.registrations.lock().push(payload.clone());
        Ok(())
    }
}

#[tokio::test]
async fn activation_walks_the_full_state_machine() {
    let server = FakeServer::default();
    let mut manager = SubscriptionManager::new(FakePlatform::granting(), server.clone());
    assert_eq!(manager.state(), SubscriptionState::Unregistered);

    let state = manager.activate().await.expect("bring up");
    assert_eq!(state, SubscriptionState::Subscribed);
    assert!(manager.is_registered());

    let registrations = server.registrations.lock();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].endpoint, "https://push.example.net/send/1");
    assert_eq!(registrations[0].auth, "BwcHBwcHBwcHBwcHBwcHBw==");
}

#[tokio::test]
async fn permission_is_prompted_once() {
    let platform = FakePlatform::granting();
    let mut manager = SubscriptionManager::new(platform.clone(), FakeServer::default());

    assert_eq!(manager.request_permission().await, Permission::Granted);
    assert_eq!(manager.request_permission().await, Permission::Granted);
    assert_eq!(*platform.prompts.lock(), 1);
    assert_eq!(manager.state(), SubscriptionState::PermissionGranted);
}

#[tokio::test]
async fn denied_permission_stops_the_push_path() {
    let platform = FakePlatform {
        permission: Permission::Denied,
        ..FakePlatform::granting()
    };
    let server = FakeServer::default();
    let mut manager = SubscriptionManager::new(platform.clone(), server.clone());

    assert!(matches!(manager.activate().await, Err(PushError::PermissionDenied)));
    assert_eq!(manager.state(), SubscriptionState::PermissionDenied);
    assert!(matches!(manager.subscribe(VAPID_KEY).await, Err(PushError::PermissionDenied)));
    assert_eq!(*platform.subscribes.lock(), 0);
    assert!(server.registrations.lock().is_empty());
}

#[tokio::test]
async fn missing_p256dh_never_reaches_the_server() {
    let platform = FakePlatform {
        drop_p256dh: true,
        ..FakePlatform::granting()
    };
    let server = FakeServer::default();
    let mut manager = SubscriptionManager::new(platform, server.clone());

    let result = manager.activate().await;
    assert!(matches!(result, Err(PushError::SubscriptionIncomplete)));
    assert!(manager.subscription().is_none());
    assert!(server.registrations.lock().is_empty());
}

#[tokio::test]
async fn failed_registration_is_retried_on_next_activation() {
    let temp = tempdir().unwrap();
    let store = AgentStore::new(temp.path().join("agent.json"));
    let server = FakeServer::default();
    *server.failing.lock() = true;

    let platform = FakePlatform::granting();
    let mut manager =
        SubscriptionManager::restore(platform.clone(), server.clone(), store.clone()).unwrap();
    assert!(matches!(manager.activate().await, Err(PushError::RegistrationFailed(_))));
    assert!(manager.subscription().is_some());
    assert!(!manager.is_registered());

    let stored = store.load().unwrap().subscription.expect("kept locally");
    assert!(!stored.registered);

    // Relaunch: the server is back and the stored subscription is retried
    // without subscribing again.
    *server.failing.lock() = false;
    let mut relaunched =
        SubscriptionManager::restore(platform.clone(), server.clone(), store.clone()).unwrap();
    relaunched.activate().await.expect("retry succeeds");

    assert!(relaunched.is_registered());
    assert_eq!(*platform.subscribes.lock(), 1);
    assert_eq!(server.registrations.lock().len(), 1);
    assert!(store.load().unwrap().subscription.unwrap().registered);
}

#[tokio::test]
async fn invalidation_resubscribes_and_registers() {
    let server = FakeServer::default();
    let platform = FakePlatform::granting();
    let mut manager = SubscriptionManager::new(platform.clone(), server.clone());
    manager.activate().await.unwrap();

    manager.invalidate();
    assert_eq!(manager.state(), SubscriptionState::Invalidated);
    assert!(!manager.is_registered());

    manager.activate().await.unwrap();
    assert_eq!(manager.state(), SubscriptionState::Subscribed);
    assert_eq!(*platform.subscribes.lock(), 2);

    let registrations = server.registrations.lock();
    assert_eq!(registrations.len(), 2);
    assert_eq!(registrations[1].endpoint, "https://push.example.net/send/2");
}

#[tokio::test]
async fn renew_replaces_the_subscription() {
    let server = FakeServer::default();
    let mut manager = SubscriptionManager::new(FakePlatform::granting(), server.clone());
    manager.activate().await.unwrap();
    let first = manager.subscription().unwrap().endpoint.clone();

    manager.renew().await.unwrap();
    assert_ne!(manager.subscription().unwrap().endpoint, first);
    assert_eq!(server.registrations.lock().len(), 2);
}
