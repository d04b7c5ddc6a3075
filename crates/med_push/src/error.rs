use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("notification permission denied")]
    PermissionDenied,
    #[error("push subscription is missing its encryption keys")]
    SubscriptionIncomplete,
    #[error("registration with the server failed: {0}")]
    RegistrationFailed(String),
    #[error("could not retrieve the server public key: {0}")]
    KeyRetrieval(String),
    #[error("invalid VAPID public key: {0}")]
    InvalidVapidKey(String),
    #[error("invalid push endpoint `{0}`")]
    InvalidEndpoint(String),
    #[error("push platform error: {0}")]
    Platform(String),
    #[error("agent store error: {0}")]
    Store(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PushError>;
