use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReminderError {
    #[error("invalid time of day `{0}`, expected HH:MM between 00:00 and 23:59")]
    InvalidTimeFormat(String),
    #[error("local time {0} cannot be represented in the current time zone")]
    UnrepresentableTime(String),
    #[error("push payload could not be parsed: {0}")]
    PayloadParseFailed(String),
}

pub type Result<T> = std::result::Result<T, ReminderError>;
