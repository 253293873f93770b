use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use campus_core::ServiceError;
use campus_security::{Profile, ProfileChange, ProfileStore, Subscription};
use tokio::sync::mpsc;

use crate::gate::Gate;

#[derive(Default)]
struct StoreInner {
    profiles: HashMap<String, Profile>,
    failures: HashMap<String, ServiceError>,
    gates: HashMap<String, Gate>,
    watchers: Vec<(u64, String, mpsc::UnboundedSender<ProfileChange>)>,
    next_watcher: u64,
    lookups: Vec<String>,
}

/// In-memory profile table with controllable latency and failures.
#[derive(Clone, Default)]
pub struct FakeProfileStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl FakeProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, profile: Profile) -> Self {
        self.insert(profile);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("profile store lock poisoned")
    }

    /// Insert or replace a row without notifying watchers.
    pub fn insert(&self, profile: Profile) {
        self.lock().profiles.insert(profile.id.clone(), profile);
    }

    /// Replace a row and push a live change notification for it.
    pub fn update(&self, profile: Profile) {
        let mut inner = self.lock();
        let change = ProfileChange {
            identity_id: profile.id.clone(),
        };
        inner.profiles.insert(profile.id.clone(), profile);
        inner.watchers.retain(|(_, watched, tx)| {
            *watched != change.identity_id || tx.send(change.clone()).is_ok()
        });
    }

    pub fn remove(&self, identity_id: &str) {
        self.lock().profiles.remove(identity_id);
    }

    /// Make lookups for `identity_id` fail with `err`.
    pub fn fail(&self, identity_id: &str, err: ServiceError) {
        self.lock().failures.insert(identity_id.to_string(), err);
    }

    pub fn clear_failure(&self, identity_id: &str) {
        self.lock().failures.remove(identity_id);
    }

    /// Hold lookups for `identity_id` until the returned gate opens.
    ///
    /// The reply reflects the row as it is when the gate opens.
    pub fn hold(&self, identity_id: &str) -> Gate {
        let gate = Gate::new();
        self.lock()
            .gates
            .insert(identity_id.to_string(), gate.clone());
        gate
    }

    /// Identity ids looked up so far, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lock().lookups.clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lock().lookups.len()
    }

    pub fn active_watchers(&self, identity_id: &str) -> usize {
        self.lock()
            .watchers
            .iter()
            .filter(|(_, watched, _)| watched == identity_id)
            .count()
    }
}

impl ProfileStore for FakeProfileStore {
    fn profile_by_identity(
        &self,
        identity_id: &str,
    ) -> impl Future<Output = Result<Option<Profile>, ServiceError>> + Send {
        let id = identity_id.to_string();
        let gate = {
            let mut inner = self.lock();
            inner.lookups.push(id.clone());
            inner.gates.get(&id).cloned()
        };
        let shared = self.inner.clone();
        async move {
            if let Some(gate) = gate {
                gate.wait().await;
            }
            let inner = shared.lock().expect("profile store lock poisoned");
            match inner.failures.get(&id) {
                Some(err) => Err(err.clone()),
                None => Ok(inner.profiles.get(&id).cloned()),
            }
        }
    }

    fn profile_changes(&self, identity_id: &str) -> Subscription<ProfileChange> {
        let id = {
            let mut inner = self.lock();
            inner.next_watcher += 1;
            inner.next_watcher
        };
        let shared = self.inner.clone();
        let (tx, subscription) = Subscription::channel(move || {
            shared
                .lock()
                .expect("profile store lock poisoned")
                .watchers
                .retain(|(watcher_id, _, _)| *watcher_id != id);
            Ok(())
        });
        self.lock()
            .watchers
            .push((id, identity_id.to_string(), tx));
        subscription
    }
}
