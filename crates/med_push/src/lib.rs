pub mod error;
pub mod manager;
pub mod platform;
pub mod server;
pub mod store;
pub mod subscription;

pub use crate::error::PushError;
pub use crate::manager::{SubscriptionManager, SubscriptionState};
pub use crate::platform::{Permission, PushPlatform, RawSubscription};
pub use crate::server::{HttpServerClient, ServerApi};
pub use crate::store::{AgentStore, StoreSnapshot};
pub use crate::subscription::{PushSubscription, RegistrationPayload};
