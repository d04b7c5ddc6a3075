pub mod agent;
pub mod bridge;
pub mod dedupe;
pub mod error;
pub mod medication;
pub mod notifications;
pub mod push;
pub mod scheduler;
pub mod time_codec;

pub use crate::agent::{AgentEvent, AgentState, Effect};
pub use crate::error::ReminderError;
pub use crate::medication::{Medication, MedicationId};
pub use crate::scheduler::LocalScheduler;
