//! # Installation Lifecycle Manager
//!
//! Decides when to show the platform's one-shot install prompt.
//!
//! ## States
//!
//! ```text
//! Idle ──capability──▶ Installable ──prompt──▶ Prompted ──accept──▶ Installed
//!                          ▲                      │
//!                          └──capability── Declined ◀──dismiss──┘
//! ```
//!
//! The prompt is shown on an explicit `prompt_now()` or automatically a short
//! delay after the engagement counter reaches its threshold. The capability
//! is held as an `Option` and taken out when invoked, so it runs at most once.
//! `Installed` is final for the session.

use crate::engine::platform::{InstallCapability, InstallOutcome};
use crate::shared::config::EngineConfig;
use crate::shared::event::{broadcast_event, EngineEvent, EngineEventBroadcast};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Install lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    Idle,
    Installable,
    Prompted,
    Installed,
    Declined,
}

impl InstallState {
    /// Whether engagement still counts toward the auto-prompt
    fn counts_engagement(self) -> bool {
        matches!(self, InstallState::Idle | InstallState::Installable)
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallState::Idle => "idle",
            InstallState::Installable => "installable",
            InstallState::Prompted => "prompted",
            InstallState::Installed => "installed",
            InstallState::Declined => "declined",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// The requested move is not allowed from the current state
    #[error("cannot {action} while {from}")]
    IllegalTransition { from: InstallState, action: &'static str },

    /// The prompt task ended without an answer
    #[error("install prompt did not complete")]
    PromptInterrupted,
}

struct InstallInner {
    state: InstallState,
    capability: Option<Box<dyn InstallCapability>>,
    engagement: u32,
    auto_prompt: Option<JoinHandle<()>>,
}

/// Install prompt state machine
///
/// Cheap to clone; clones share one state machine.
#[derive(Clone)]
pub struct InstallationManager {
    inner: Arc<Mutex<InstallInner>>,
    events: EngineEventBroadcast,
    threshold: u32,
    delay: Duration,
}

impl InstallationManager {
    pub fn new(events: EngineEventBroadcast, threshold: u32, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InstallInner {
                state: InstallState::Idle,
                capability: None,
                engagement: 0,
                auto_prompt: None,
            })),
            events,
            threshold,
            delay,
        }
    }

    pub fn from_config(config: &EngineConfig, events: EngineEventBroadcast) -> Self {
        Self::new(events, config.engagement_threshold, config.auto_prompt_delay)
    }

    pub async fn state(&self) -> InstallState {
        self.inner.lock().await.state
    }

    pub async fn engagement_count(&self) -> u32 {
        self.inner.lock().await.engagement
    }

    /// Capture the platform's install capability without invoking it
    ///
    /// Ignored once installed. A capability arriving while a prompt is on
    /// screen is rejected.
    pub async fn capability_available(&self, capability: Box<dyn InstallCapability>) -> Result<(), InstallError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            InstallState::Installed => {
                tracing::debug!("Install capability ignored; already installed");
                Ok(())
            }
            InstallState::Prompted => Err(self.reject(InstallState::Prompted, "accept a capability")),
            InstallState::Idle | InstallState::Installable | InstallState::Declined => {
                if inner.capability.replace(capability).is_some() {
                    tracing::debug!("Replaced pending install capability");
                }
                self.transition(&mut inner, InstallState::Installable);
                if inner.engagement >= self.threshold {
                    self.arm_auto_prompt(&mut inner);
                }
                Ok(())
            }
        }
    }

    /// Count one meaningful interaction; returns the new count
    pub async fn record_engagement(&self) -> u32 {
        let mut inner = self.inner.lock().await;
        if !inner.state.counts_engagement() {
            return inner.engagement;
        }

        inner.engagement += 1;
        tracing::trace!(engagement = inner.engagement, "Engagement recorded");
        if inner.engagement >= self.threshold && inner.state == InstallState::Installable {
            self.arm_auto_prompt(&mut inner);
        }
        inner.engagement
    }

    /// Show the install prompt now
    ///
    /// The prompt runs on its own task: dropping this future still records
    /// the user's answer.
    pub async fn prompt_now(&self) -> Result<InstallOutcome, InstallError> {
        let capability = {
            let mut inner = self.inner.lock().await;
            if let Some(pending) = inner.auto_prompt.take() {
                pending.abort();
            }
            self.begin_prompt(&mut inner, "prompt")?
        };

        let manager = self.clone();
        tokio::spawn(async move { manager.complete_prompt(capability).await })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Install prompt task failed");
                InstallError::PromptInterrupted
            })
    }

    /// Drop a scheduled auto-prompt, if any
    pub async fn cancel_pending_prompt(&self) {
        if let Some(pending) = self.inner.lock().await.auto_prompt.take() {
            pending.abort();
            tracing::debug!("Pending install prompt cancelled");
        }
    }

    fn arm_auto_prompt(&self, inner: &mut InstallInner) {
        if inner.auto_prompt.is_some() {
            return;
        }
        tracing::debug!(delay = ?self.delay, "Install prompt scheduled");

        let manager = self.clone();
        inner.auto_prompt = Some(tokio::spawn(async move {
            tokio::time::sleep(manager.delay).await;
            manager.fire_auto_prompt().await;
        }));
    }

    async fn fire_auto_prompt(&self) {
        let capability = {
            let mut inner = self.inner.lock().await;
            // Detach our own handle so a later cancel cannot abort a prompt on screen.
            inner.auto_prompt = None;
            if inner.state != InstallState::Installable || inner.capability.is_none() {
                tracing::debug!(state = %inner.state, "Auto-prompt no longer applicable");
                return;
            }
            match self.begin_prompt(&mut inner, "auto-prompt") {
                Ok(capability) => capability,
                Err(_) => return,
            }
        };
        self.complete_prompt(capability).await;
    }

    fn begin_prompt(
        &self,
        inner: &mut InstallInner,
        action: &'static str,
    ) -> Result<Box<dyn InstallCapability>, InstallError> {
        if inner.state != InstallState::Installable {
            return Err(self.reject(inner.state, action));
        }
        let Some(capability) = inner.capability.take() else {
            return Err(self.reject(inner.state, action));
        };
        self.transition(inner, InstallState::Prompted);
        Ok(capability)
    }

    async fn complete_prompt(&self, capability: Box<dyn InstallCapability>) -> InstallOutcome {
        let outcome = capability.prompt().await;

        let mut inner = self.inner.lock().await;
        let next = match outcome {
            InstallOutcome::Accepted => InstallState::Installed,
            InstallOutcome::Dismissed => InstallState::Declined,
        };
        inner.engagement = 0;
        self.transition(&mut inner, next);
        tracing::info!(?outcome, "Install prompt answered");
        outcome
    }

    fn transition(&self, inner: &mut InstallInner, next: InstallState) {
        if inner.state == next {
            return;
        }
        tracing::debug!(from = %inner.state, to = %next, "Install state changed");
        inner.state = next;
        broadcast_event(&self.events, EngineEvent::InstallStateChanged { state: next });
    }

    fn reject(&self, from: InstallState, action: &'static str) -> InstallError {
        let error = InstallError::IllegalTransition { from, action };
        tracing::error!(%error, "Rejected install transition");
        broadcast_event(
            &self.events,
            EngineEvent::InvariantViolation {
                component: "installation".to_string(),
                detail: error.to_string(),
            },
        );
        error
    }
}
