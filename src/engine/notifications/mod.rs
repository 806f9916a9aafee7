//! # Notification Subscription Manager
//!
//! Push subscription lifecycle and the preferences transmitted with it.
//!
//! ## Key Components
//!
//! - `NotificationManager`: permission, registration, re-transmission
//! - `preferences.rs`: preference model and the quiet-hours check
//!
//! ## Offline Updates
//!
//! Preferences are a single latest state, not a log of changes. An update made
//! while offline is persisted and flagged dirty; the next `BecameOnline`
//! transmits whatever the state is at that moment, once.
//!
//! `disable()` works the same way: a subscription that could not be removed
//! from the server is kept as a pending unregistration and sent on reconnect.

pub mod preferences;

pub use preferences::{is_quiet_time, Language, NotificationPreferences, PreferencesPatch, QuietHours};

use crate::engine::api::{EngineApi, PushRegistration};
use crate::engine::connectivity::ConnectivityMonitor;
use crate::engine::local_db::LocalDatabase;
use crate::engine::platform::{Permission, PushPlatform, PushSubscription};
use crate::shared::config::EngineConfig;
use crate::shared::error::{with_timeout, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const PREFERENCES_KEY: &str = "notifications.preferences";
const SUBSCRIPTION_KEY: &str = "notifications.subscription";
const DIRTY_KEY: &str = "notifications.dirty";
const PENDING_UNREGISTER_KEY: &str = "notifications.pending_unregister";

#[derive(Debug, Default)]
struct NotificationState {
    preferences: NotificationPreferences,
    subscription: Option<PushSubscription>,
    /// The server has not seen the current preferences
    dirty: bool,
    /// Disabled subscription the server still has registered
    pending_unregister: Option<PushSubscription>,
    /// Bumped on every local change; a transmit only clears `dirty` if no
    /// change happened while it was in flight
    revision: u64,
}

struct NotificationInner {
    db: LocalDatabase,
    api: Arc<dyn EngineApi>,
    platform: Arc<dyn PushPlatform>,
    connectivity: ConnectivityMonitor,
    timeout: Duration,
    state: Mutex<NotificationState>,
}

/// Push subscription and preference manager
#[derive(Clone)]
pub struct NotificationManager {
    inner: Arc<NotificationInner>,
}

impl NotificationManager {
    /// Create the manager with the state persisted by a previous session
    pub async fn load(
        db: LocalDatabase,
        api: Arc<dyn EngineApi>,
        platform: Arc<dyn PushPlatform>,
        connectivity: ConnectivityMonitor,
        config: &EngineConfig,
    ) -> Result<Self> {
        let state = NotificationState {
            preferences: db.get_json(PREFERENCES_KEY).await?.unwrap_or_default(),
            subscription: db.get_json(SUBSCRIPTION_KEY).await?,
            dirty: db.get_json(DIRTY_KEY).await?.unwrap_or(false),
            pending_unregister: db.get_json(PENDING_UNREGISTER_KEY).await?,
            revision: 0,
        };
        tracing::debug!(
            enabled = state.preferences.enabled,
            dirty = state.dirty,
            "Loaded notification state"
        );

        Ok(Self {
            inner: Arc::new(NotificationInner {
                db,
                api,
                platform,
                connectivity,
                timeout: config.network_timeout,
                state: Mutex::new(state),
            }),
        })
    }

    pub async fn preferences(&self) -> NotificationPreferences {
        self.inner.state.lock().await.preferences.clone()
    }

    pub async fn subscription(&self) -> Option<PushSubscription> {
        self.inner.state.lock().await.subscription.clone()
    }

    /// Whether preferences are waiting to be re-transmitted
    pub async fn is_dirty(&self) -> bool {
        self.inner.state.lock().await.dirty
    }

    /// Whether a disabled subscription still has to be removed from the server
    pub async fn has_pending_unregister(&self) -> bool {
        self.inner.state.lock().await.pending_unregister.is_some()
    }

    /// Ask for permission and register for push
    ///
    /// Returns `false` on denial or when the platform cannot subscribe. A
    /// denial is final for this call; nothing retries it.
    pub async fn request_enable(&self) -> Result<bool> {
        let permission = self.inner.platform.request_permission().await;
        if permission != Permission::Granted {
            tracing::info!(?permission, "Notification permission not granted");
            return Ok(false);
        }

        let subscription = match self.inner.platform.existing_subscription().await {
            Some(existing) => {
                tracing::debug!(endpoint = %existing.endpoint, "Reusing existing push subscription");
                existing
            }
            None => match self.inner.platform.subscribe().await {
                Ok(created) => created,
                Err(e) => {
                    tracing::warn!(error = %e, "Push subscription failed");
                    return Ok(false);
                }
            },
        };

        {
            let mut state = self.inner.state.lock().await;
            if state
                .pending_unregister
                .as_ref()
                .is_some_and(|pending| pending.endpoint == subscription.endpoint)
            {
                // Re-registering the same endpoint supersedes its removal.
                state.pending_unregister = None;
            }
            state.preferences.enabled = true;
            state.subscription = Some(subscription);
            state.dirty = true;
            state.revision += 1;
            self.persist(&state).await?;
        }
        tracing::info!("Notifications enabled");

        self.transmit().await?;
        Ok(true)
    }

    /// Merge a preference change and push it to the server when possible
    pub async fn update_preferences(&self, patch: PreferencesPatch) -> Result<NotificationPreferences> {
        let (preferences, enabled) = {
            let mut state = self.inner.state.lock().await;
            if !patch.apply(&mut state.preferences) {
                return Ok(state.preferences.clone());
            }
            state.revision += 1;
            if state.preferences.enabled {
                state.dirty = true;
            }
            self.persist(&state).await?;
            (state.preferences.clone(), state.preferences.enabled)
        };

        if enabled {
            if self.inner.connectivity.is_online() {
                self.transmit().await?;
            } else {
                tracing::debug!("Offline; preferences will be sent on reconnect");
            }
        }
        Ok(preferences)
    }

    /// Send what changed while offline: a pending unregistration, then the
    /// current preferences
    pub async fn on_online(&self) -> Result<()> {
        self.flush_unregister().await?;

        let pending = {
            let state = self.inner.state.lock().await;
            state.dirty && state.preferences.enabled && state.subscription.is_some()
        };
        if pending {
            tracing::info!("Re-transmitting notification preferences");
            self.transmit().await?;
        }
        Ok(())
    }

    /// Unsubscribe and stop receiving notifications
    ///
    /// The server registration is removed now when online, otherwise on the
    /// next reconnect.
    pub async fn disable(&self) -> Result<()> {
        let subscription = {
            let mut state = self.inner.state.lock().await;
            state.preferences.enabled = false;
            state.dirty = false;
            state.revision += 1;
            let subscription = state.subscription.take();
            if subscription.is_some() {
                state.pending_unregister = subscription.clone();
            }
            self.persist(&state).await?;
            subscription
        };

        let Some(subscription) = subscription else {
            return Ok(());
        };

        if let Err(e) = self.inner.platform.unsubscribe(&subscription).await {
            tracing::warn!(error = %e, "Platform unsubscribe failed");
        }
        tracing::info!("Notifications disabled");

        self.flush_unregister().await
    }

    /// Remove a disabled subscription from the server when online
    async fn flush_unregister(&self) -> Result<()> {
        let Some(subscription) = self.inner.state.lock().await.pending_unregister.clone() else {
            return Ok(());
        };
        if !self.inner.connectivity.is_online() {
            tracing::debug!("Offline; push unregistration will be sent on reconnect");
            return Ok(());
        }

        match with_timeout(self.inner.timeout, self.inner.api.unregister_push(&subscription)).await {
            Ok(()) => {
                let mut state = self.inner.state.lock().await;
                if state
                    .pending_unregister
                    .as_ref()
                    .is_some_and(|pending| pending.endpoint == subscription.endpoint)
                {
                    state.pending_unregister = None;
                    self.inner.db.delete_metadata(PENDING_UNREGISTER_KEY).await?;
                }
                tracing::debug!("Push subscription unregistered");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Push unregistration failed; will retry on reconnect");
            }
        }
        Ok(())
    }

    /// Send the current registration; clears `dirty` unless state moved on
    async fn transmit(&self) -> Result<()> {
        let (registration, revision) = {
            let state = self.inner.state.lock().await;
            let Some(subscription) = state.subscription.clone() else {
                return Ok(());
            };
            let registration = PushRegistration {
                subscription,
                preferences: state.preferences.clone(),
            };
            (registration, state.revision)
        };

        if !self.inner.connectivity.is_online() {
            return Ok(());
        }

        match with_timeout(self.inner.timeout, self.inner.api.register_push(&registration)).await {
            Ok(()) => {
                let mut state = self.inner.state.lock().await;
                if state.revision == revision && state.dirty {
                    state.dirty = false;
                    self.inner.db.set_json(DIRTY_KEY, &false).await?;
                }
                tracing::debug!("Push registration transmitted");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Push registration failed; will resend on reconnect");
            }
        }
        Ok(())
    }

    async fn persist(&self, state: &NotificationState) -> Result<()> {
        let db = &self.inner.db;
        db.set_json(PREFERENCES_KEY, &state.preferences).await?;
        match &state.subscription {
            Some(subscription) => db.set_json(SUBSCRIPTION_KEY, subscription).await?,
            None => db.delete_metadata(SUBSCRIPTION_KEY).await?,
        }
        match &state.pending_unregister {
            Some(subscription) => db.set_json(PENDING_UNREGISTER_KEY, subscription).await?,
            None => db.delete_metadata(PENDING_UNREGISTER_KEY).await?,
        }
        db.set_json(DIRTY_KEY, &state.dirty).await
    }
}
