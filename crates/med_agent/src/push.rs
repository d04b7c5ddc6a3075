use med_push::{PushError, PushPlatform, ServerApi, SubscriptionManager, SubscriptionState};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushCommand {
    Activate,
    Renew,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushStatus {
    pub state: SubscriptionState,
    pub endpoint: Option<Url>,
    pub registered: bool,
}

impl PushStatus {
    fn of<P: PushPlatform, S: ServerApi>(manager: &SubscriptionManager<P, S>) -> Self {
        Self {
            state: manager.state(),
            endpoint: manager
                .subscription()
                .map(|subscription| subscription.endpoint.clone()),
            registered: manager.is_registered(),
        }
    }
}

/// Owns the subscription manager on its own task so key fetches and
/// registration never hold up reminders or pushes.
pub struct PushWorker {
    commands: mpsc::UnboundedSender<PushCommand>,
    status: watch::Receiver<PushStatus>,
    task: JoinHandle<()>,
}

impl PushWorker {
    pub fn spawn<P, S>(manager: SubscriptionManager<P, S>) -> Self
    where
        P: PushPlatform + 'static,
        S: ServerApi + 'static,
    {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (publish, status) = watch::channel(PushStatus::of(&manager));
        let task = tokio::spawn(serve(manager, receiver, publish));
        Self {
            commands,
            status,
            task,
        }
    }

    pub fn send(&self, command: PushCommand) {
        if self.commands.send(command).is_err() {
            warn!(?command, "push worker is gone, command dropped");
        }
    }

    pub fn status(&self) -> PushStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PushStatus> {
        self.status.clone()
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn serve<P: PushPlatform, S: ServerApi>(
    mut manager: SubscriptionManager<P, S>,
    mut commands: mpsc::UnboundedReceiver<PushCommand>,
    publish: watch::Sender<PushStatus>,
) {
    while let Some(command) = commands.recv().await {
        let outcome = match command {
            PushCommand::Activate => manager.activate().await,
            PushCommand::Renew => manager.renew().await,
        };
        log_outcome(command, outcome);
        publish.send_replace(PushStatus::of(&manager));
    }
    debug!("push worker stopped");
}

fn log_outcome(command: PushCommand, outcome: Result<SubscriptionState, PushError>) {
    match outcome {
        Ok(state) => debug!(?command, ?state, "push channel ready"),
        Err(PushError::PermissionDenied) => {
            info!(?command, "notifications denied, push path disabled")
        }
        Err(err) => warn!(?command, %err, "push channel unavailable, local reminders unaffected"),
    }
}
