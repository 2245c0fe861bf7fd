//! Worker lifecycle: the registration that owns installing, waiting and
//! active workers and moves them through their states.
//!
//! ```text
//! installing ──install ok──▶ installed (waiting) ──skip waiting──▶ activating ──▶ active
//!      │                                                                            │
//!      └──install failed──▶ redundant ◀──────────── superseded by a newer version ──┘
//! ```

use std::sync::Arc;

use serde::Serialize;

use super::controller::{CacheController, ControlCommand, WorkerEvent, WorkerReply};
use crate::error::{Error, Result, WorkerError};
use crate::network::{Network, Request, Response};

/// Worker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Install event running
    Installing,
    /// Installed, waiting to take over from the active worker
    Installed,
    /// Activate event running
    Activating,
    /// Handling fetches for open pages
    Active,
    /// Install failed or replaced by a newer version
    Redundant,
}

/// The set of workers registered for one origin
pub struct Registration {
    network: Arc<dyn Network>,
    waiting: Option<Arc<CacheController>>,
    active: Option<Arc<CacheController>>,
}

impl Registration {
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self {
            network,
            waiting: None,
            active: None,
        }
    }

    pub fn active(&self) -> Option<&Arc<CacheController>> {
        self.active.as_ref()
    }

    #[allow(dead_code)]
    pub fn waiting(&self) -> Option<&Arc<CacheController>> {
        self.waiting.as_ref()
    }

    /// Install a new worker version and activate it when allowed.
    ///
    /// A failed install leaves the new worker redundant and the current
    /// active worker in place. Returns the new worker's resulting state.
    pub async fn register(&mut self, controller: CacheController) -> Result<WorkerState> {
        let controller = Arc::new(controller);
        log::info!("Installing worker {}", controller.version());

        if let Err(e) = controller.dispatch(WorkerEvent::Install).await {
            controller.set_state(WorkerState::Redundant);
            log::warn!("Worker {} install failed: {}", controller.version(), e);
            return Err(e);
        }

        if let Some(previous) = self.waiting.replace(Arc::clone(&controller)) {
            previous.set_state(WorkerState::Redundant);
        }

        if self.active.is_none() || controller.wants_skip_waiting() {
            self.promote().await?;
        } else {
            log::info!("Worker {} installed and waiting", controller.version());
        }

        Ok(controller.state())
    }

    /// Bring a version back after a restart, without running install or
    /// activate again.
    ///
    /// Only the version storage records as activated comes back active. A
    /// version that was installed but never activated comes back waiting.
    pub fn resume(&mut self, controller: CacheController) -> Result<WorkerState> {
        let controller = Arc::new(controller);
        if controller.is_activated()? {
            controller.claim_clients();
            controller.set_state(WorkerState::Active);
            log::debug!("Resumed worker {} as active", controller.version());
            if let Some(previous) = self.active.replace(controller) {
                previous.set_state(WorkerState::Redundant);
            }
            Ok(WorkerState::Active)
        } else if controller.is_installed()? {
            controller.set_state(WorkerState::Installed);
            log::debug!("Resumed worker {} as waiting", controller.version());
            if let Some(previous) = self.waiting.replace(controller) {
                previous.set_state(WorkerState::Redundant);
            }
            Ok(WorkerState::Installed)
        } else {
            Err(WorkerError::NotDeployed.into())
        }
    }

    /// Send a control message to the waiting worker (or the active one when
    /// nothing is waiting). A waiting worker that asks to skip waiting is
    /// promoted immediately.
    pub async fn post_message(&mut self, message: &str) -> Result<Option<ControlCommand>> {
        let target = self
            .waiting
            .as_ref()
            .or(self.active.as_ref())
            .cloned()
            .ok_or(WorkerError::NotDeployed)?;

        let command = match target.dispatch(WorkerEvent::Message(message.to_string())).await? {
            WorkerReply::Message(command) => command,
            _ => None,
        };

        if self.waiting.as_ref().is_some_and(|w| w.wants_skip_waiting()) {
            self.promote().await?;
        }

        Ok(command)
    }

    /// Route a page request through the active worker, or straight to the
    /// network when no worker controls the page.
    pub async fn fetch(&self, request: Request) -> Result<Response> {
        match &self.active {
            Some(worker) if worker.controls_clients() => match worker
                .dispatch(WorkerEvent::Fetch(request))
                .await?
            {
                WorkerReply::Response(response) => Ok(response),
                other => Err(WorkerError::State(format!("unexpected reply {:?}", other)).into()),
            },
            _ => self.network.fetch(&request).await.map_err(Error::from),
        }
    }

    /// Wait for background work of every live worker
    pub async fn settle(&self) {
        for worker in self.waiting.iter().chain(self.active.iter()) {
            worker.settle().await;
        }
    }

    /// Activate the waiting worker and retire the previous active one
    async fn promote(&mut self) -> Result<()> {
        let next = self
            .waiting
            .take()
            .ok_or_else(|| WorkerError::State("no waiting worker to activate".to_string()))?;

        if let Err(e) = next.dispatch(WorkerEvent::Activate).await {
            next.set_state(WorkerState::Redundant);
            return Err(e);
        }

        if let Some(previous) = self.active.replace(Arc::clone(&next)) {
            previous.set_state(WorkerState::Redundant);
            log::info!(
                "Worker {} replaced by {}",
                previous.version(),
                next.version()
            );
        }
        Ok(())
    }
}
