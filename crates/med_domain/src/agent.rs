use chrono::{DateTime, TimeZone};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    bridge::{self, BridgeMessage, ScheduleAck},
    medication::Medication,
    notifications::{NotificationRecord, DEFAULT_DASHBOARD_URL},
    push::PushEventHandler,
    scheduler::{LocalScheduler, TimerCommand},
};

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Install,
    Activate,
    Message(Value),
    Push(Vec<u8>),
    NotificationClick(NotificationRecord),
    PushSubscriptionChange,
    TimerFired { tag: String, generation: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SkipWaiting,
    ClaimClients,
    Timer(TimerCommand),
    Show(NotificationRecord),
    Close(String),
    OpenWindow(String),
    Reply(BridgeMessage),
    PersistSchedule(Vec<Medication>),
    ActivatePush,
    /// The platform dropped the subscription.
    RenewPush,
}

#[derive(Debug)]
pub struct AgentState {
    scheduler: LocalScheduler,
    push: PushEventHandler,
    medications: Vec<Medication>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new(DEFAULT_DASHBOARD_URL)
    }
}

impl AgentState {
    pub fn new(dashboard_url: impl Into<String>) -> Self {
        let dashboard_url = dashboard_url.into();
        Self {
            scheduler: LocalScheduler::new(dashboard_url.clone()),
            push: PushEventHandler::new(dashboard_url),
            medications: Vec::new(),
        }
    }

    /// Timers for restored medications are armed on the next `Activate`.
    pub fn restore(&mut self, medications: Vec<Medication>) {
        self.medications = medications;
    }

    /// Consume one event and return the side effects to perform, in order.
    pub fn handle<Tz: TimeZone>(&mut self, event: AgentEvent, now: &DateTime<Tz>) -> Vec<Effect> {
        match event {
            AgentEvent::Install => {
                info!("agent installed");
                vec![Effect::SkipWaiting]
            }
            AgentEvent::Activate => self.on_activate(now),
            AgentEvent::Message(raw) => match bridge::decode_message(&raw) {
                Some(BridgeMessage::ScheduleNotifications { medications }) => {
                    self.on_schedule(medications, now)
                }
                Some(BridgeMessage::Ack(ack)) => {
                    debug!(armed = ack.armed, "page acknowledged");
                    Vec::new()
                }
                None => Vec::new(),
            },
            AgentEvent::Push(raw) => vec![Effect::Show(self.push.on_push(&raw))],
            AgentEvent::NotificationClick(record) => {
                let route = self.push.on_notification_click(&record);
                vec![Effect::Close(route.close_tag), Effect::OpenWindow(route.url)]
            }
            AgentEvent::PushSubscriptionChange => {
                info!("push subscription invalidated by the platform");
                vec![Effect::RenewPush]
            }
            AgentEvent::TimerFired { tag, generation } => {
                match self.scheduler.fire(&tag, generation, now) {
                    Some(fired) => vec![
                        Effect::Show(fired.notification),
                        Effect::Timer(fired.rearm),
                    ],
                    None => Vec::new(),
                }
            }
        }
    }

    fn on_activate<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Vec<Effect> {
        let mut effects = vec![Effect::ClaimClients];
        if !self.medications.is_empty() {
            let outcome = self.scheduler.schedule(&self.medications, now);
            info!(
                armed = self.scheduler.len(),
                "re-armed reminders from stored schedule"
            );
            effects.extend(outcome.commands.into_iter().map(Effect::Timer));
        }
        effects.push(Effect::ActivatePush);
        effects
    }

    fn on_schedule<Tz: TimeZone>(
        &mut self,
        medications: Vec<Medication>,
        now: &DateTime<Tz>,
    ) -> Vec<Effect> {
        let outcome = self.scheduler.schedule(&medications, now);
        info!(
            medications = medications.len(),
            cancelled = outcome.cancelled().count(),
            "schedule received"
        );
        let ack = ScheduleAck {
            armed: outcome.armed().count(),
            skipped: outcome.skipped.len(),
            tags: outcome.armed().map(str::to_string).collect(),
        };
        self.medications = medications;

        let mut effects: Vec<Effect> = outcome.commands.into_iter().map(Effect::Timer).collect();
        effects.push(Effect::PersistSchedule(self.medications.clone()));
        effects.push(Effect::Reply(BridgeMessage::Ack(ack)));
        effects
    }
}
