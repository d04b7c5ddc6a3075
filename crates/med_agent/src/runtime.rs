use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use med_domain::{
    bridge::{BridgeMessage, MessagePort},
    notifications::NotificationSurface,
    scheduler::TimerCommand,
    AgentEvent, AgentState, Effect, Medication,
};
use med_push::{AgentStore, PushPlatform, ServerApi, SubscriptionManager};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::push::{PushCommand, PushStatus, PushWorker};

#[derive(Debug, Clone)]
pub struct AgentHandle {
    sender: mpsc::UnboundedSender<AgentEvent>,
}

impl AgentHandle {
    pub fn send(&self, event: AgentEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

impl MessagePort for AgentHandle {
    fn post(&self, message: BridgeMessage) {
        if !self.send(AgentEvent::Message(message.to_value())) {
            warn!("agent is gone, message dropped");
        }
    }
}

/// Timers post `TimerFired` back into the loop; push setup runs on its own
/// worker, so the loop never awaits the network.
pub struct AgentRuntime {
    state: AgentState,
    push: PushWorker,
    store: AgentStore,
    surface: Arc<dyn NotificationSurface>,
    timers: HashMap<String, JoinHandle<()>>,
    sender: mpsc::UnboundedSender<AgentEvent>,
    receiver: mpsc::UnboundedReceiver<AgentEvent>,
    replies: Option<mpsc::UnboundedSender<BridgeMessage>>,
}

impl AgentRuntime {
    pub fn new<P, S>(
        state: AgentState,
        subscriptions: SubscriptionManager<P, S>,
        store: AgentStore,
        surface: Arc<dyn NotificationSurface>,
    ) -> Self
    where
        P: PushPlatform + 'static,
        S: ServerApi + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            state,
            push: PushWorker::spawn(subscriptions),
            store,
            surface,
            timers: HashMap::new(),
            sender,
            receiver,
            replies: None,
        }
    }

    pub fn with_replies(mut self, replies: mpsc::UnboundedSender<BridgeMessage>) -> Self {
        self.replies = Some(replies);
        self
    }

    /// Load the persisted schedule. Timers are armed when `Activate` arrives.
    pub fn restore_schedule(&mut self) -> Result<usize> {
        let snapshot = self.store.load()?;
        let count = snapshot.medications.len();
        self.state.restore(snapshot.medications);
        Ok(count)
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn push_status(&self) -> PushStatus {
        self.push.status()
    }

    pub fn watch_push(&self) -> tokio::sync::watch::Receiver<PushStatus> {
        self.push.subscribe_status()
    }

    pub fn armed_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .timers
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(tag, _)| tag.clone())
            .collect();
        tags.sort();
        tags
    }

    pub fn dispatch(&mut self, event: AgentEvent) {
        let effects = self.state.handle(event, &Local::now());
        for effect in effects {
            self.apply(effect);
        }
    }

    /// Returns `false` once the channel is closed.
    pub async fn pump_once(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("agent shutting down");
                    break;
                }
                event = self.receiver.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
        self.push.shutdown();
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::SkipWaiting => debug!("taking over from previous agent"),
            Effect::ClaimClients => debug!("claiming open clients"),
            Effect::Timer(TimerCommand::Arm {
                tag,
                delay,
                generation,
            }) => self.arm(tag, delay, generation),
            Effect::Timer(TimerCommand::Cancel { tag }) => {
                if let Some(handle) = self.timers.remove(&tag) {
                    handle.abort();
                    debug!(%tag, "timer cancelled");
                }
            }
            Effect::Show(record) => self.surface.show(record),
            Effect::Close(tag) => self.surface.close(&tag),
            Effect::OpenWindow(url) => self.surface.open_window(&url),
            Effect::Reply(message) => {
                if let Some(replies) = &self.replies {
                    let _ = replies.send(message);
                }
            }
            Effect::PersistSchedule(medications) => self.persist_schedule(medications),
            Effect::ActivatePush => self.push.send(PushCommand::Activate),
            Effect::RenewPush => self.push.send(PushCommand::Renew),
        }
    }

    fn arm(&mut self, tag: String, delay: Duration, generation: u64) {
        if let Some(previous) = self.timers.remove(&tag) {
            previous.abort();
        }
        debug!(%tag, delay_secs = delay.as_secs(), generation, "timer armed");
        let sender = self.sender.clone();
        let fired = tag.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(AgentEvent::TimerFired {
                tag: fired,
                generation,
            });
        });
        self.timers.insert(tag, handle);
    }

    fn persist_schedule(&self, medications: Vec<Medication>) {
        if let Err(err) = self
            .store
            .update(|snapshot| snapshot.medications = medications)
        {
            warn!(%err, "failed to persist schedule");
        }
    }
}
