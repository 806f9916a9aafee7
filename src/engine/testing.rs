//! In-memory collaborators for unit tests

use crate::engine::api::{EngineApi, PushRegistration};
use crate::engine::offline::ActionKind;
use crate::engine::platform::{InstallCapability, InstallOutcome, Permission, PlatformError, PushKeys, PushPlatform, PushSubscription};
use crate::shared::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Scriptable [`EngineApi`]
#[derive(Default)]
pub struct FakeApi {
    mutations: Mutex<Vec<(ActionKind, Value)>>,
    scripted_failures: Mutex<VecDeque<TransportError>>,
    always_fail: Mutex<Option<TransportError>>,
    mutation_delay: Mutex<Duration>,
    bundles: Mutex<HashMap<String, Result<Vec<Value>, TransportError>>>,
    bundle_fetches: AtomicUsize,
    registrations: Mutex<Vec<PushRegistration>>,
    registration_failure: Mutex<Option<TransportError>>,
    unregistrations: Mutex<Vec<PushSubscription>>,
}

impl FakeApi {
    /// Every mutation attempt, successful or not
    pub fn mutations(&self) -> Vec<(ActionKind, Value)> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn fail_next_mutations(&self, count: usize, error: TransportError) {
        let mut failures = self.scripted_failures.lock().unwrap();
        failures.extend(std::iter::repeat(error).take(count));
    }

    pub fn fail_all_mutations(&self, error: TransportError) {
        *self.always_fail.lock().unwrap() = Some(error);
    }

    pub fn set_mutation_delay(&self, delay: Duration) {
        *self.mutation_delay.lock().unwrap() = delay;
    }

    pub fn set_bundle(&self, bundle: &str, response: Result<Vec<Value>, TransportError>) {
        self.bundles.lock().unwrap().insert(bundle.to_string(), response);
    }

    pub fn bundle_fetches(&self) -> usize {
        self.bundle_fetches.load(Ordering::SeqCst)
    }

    pub fn registrations(&self) -> Vec<PushRegistration> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn fail_registrations(&self, error: Option<TransportError>) {
        *self.registration_failure.lock().unwrap() = error;
    }

    pub fn unregistrations(&self) -> Vec<PushSubscription> {
        self.unregistrations.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineApi for FakeApi {
    async fn fetch_bundle(&self, bundle: &str) -> Result<Vec<Value>, TransportError> {
        self.bundle_fetches.fetch_add(1, Ordering::SeqCst);
        self.bundles
            .lock()
            .unwrap()
            .get(bundle)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn post_mutation(&self, kind: ActionKind, payload: &Value) -> Result<(), TransportError> {
        let delay = *self.mutation_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.mutations.lock().unwrap().push((kind, payload.clone()));

        if let Some(error) = self.always_fail.lock().unwrap().clone() {
            return Err(error);
        }
        match self.scripted_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn register_push(&self, registration: &PushRegistration) -> Result<(), TransportError> {
        if let Some(error) = self.registration_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.registrations.lock().unwrap().push(registration.clone());
        Ok(())
    }

    async fn unregister_push(&self, subscription: &PushSubscription) -> Result<(), TransportError> {
        self.unregistrations.lock().unwrap().push(subscription.clone());
        Ok(())
    }
}

pub fn sample_subscription() -> PushSubscription {
    PushSubscription {
        endpoint: "https://push.example/sub/1".to_string(),
        keys: PushKeys {
            p256dh: "BNcRd".to_string(),
            auth: "tBHI".to_string(),
        },
    }
}

/// [`PushPlatform`] answering with a fixed permission
pub struct FakePushPlatform {
    pub permission: Permission,
    pub existing: Mutex<Option<PushSubscription>>,
    pub subscribe_calls: AtomicUsize,
    pub unsubscribe_calls: AtomicUsize,
}

impl FakePushPlatform {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            existing: Mutex::new(None),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PushPlatform for FakePushPlatform {
    async fn request_permission(&self) -> Permission {
        self.permission
    }

    async fn existing_subscription(&self) -> Option<PushSubscription> {
        self.existing.lock().unwrap().clone()
    }

    async fn subscribe(&self) -> Result<PushSubscription, PlatformError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let subscription = sample_subscription();
        *self.existing.lock().unwrap() = Some(subscription.clone());
        Ok(subscription)
    }

    async fn unsubscribe(&self, _subscription: &PushSubscription) -> Result<(), PlatformError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        *self.existing.lock().unwrap() = None;
        Ok(())
    }
}

/// Install capability that counts its invocations
pub struct FakeCapability {
    pub outcome: InstallOutcome,
    pub invocations: Arc<AtomicUsize>,
    /// When set, the prompt stays on screen until notified
    pub answer: Option<Arc<Notify>>,
}

impl FakeCapability {
    pub fn boxed(outcome: InstallOutcome, invocations: &Arc<AtomicUsize>) -> Box<dyn InstallCapability> {
        Box::new(Self {
            outcome,
            invocations: invocations.clone(),
            answer: None,
        })
    }

    pub fn gated(
        outcome: InstallOutcome,
        invocations: &Arc<AtomicUsize>,
        answer: Arc<Notify>,
    ) -> Box<dyn InstallCapability> {
        Box::new(Self {
            outcome,
            invocations: invocations.clone(),
            answer: Some(answer),
        })
    }
}

#[async_trait]
impl InstallCapability for FakeCapability {
    async fn prompt(self: Box<Self>) -> InstallOutcome {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(answer) = &self.answer {
            answer.notified().await;
        }
        self.outcome
    }
}
