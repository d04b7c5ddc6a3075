pub mod app;
pub mod host;
pub mod push;
pub mod runtime;

pub use crate::app::{run, AgentConfig};
pub use crate::push::{PushCommand, PushStatus};
pub use crate::runtime::{AgentHandle, AgentRuntime};
