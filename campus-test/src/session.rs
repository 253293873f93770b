use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use campus_core::ServiceError;
use campus_security::{Session, SessionChange, SessionProvider, Subscription};
use tokio::sync::mpsc;

use crate::gate::Gate;

#[derive(Default)]
struct ProviderInner {
    session: Option<Session>,
    current_session_error: Option<ServiceError>,
    sign_out_error: Option<ServiceError>,
    current_session_gate: Option<Gate>,
    subscribers: Vec<(u64, mpsc::UnboundedSender<SessionChange>)>,
    next_subscriber: u64,
    current_session_calls: usize,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
    sign_out_calls: usize,
}

/// In-memory stand-in for the hosted auth service.
///
/// Cloning shares the same state, so a test can keep a handle while the
/// guard owns another.
#[derive(Clone, Default)]
pub struct FakeSessionProvider {
    inner: Arc<Mutex<ProviderInner>>,
}

impl FakeSessionProvider {
    /// A provider with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider with `session` already established.
    pub fn signed_in(session: Session) -> Self {
        let provider = Self::new();
        provider.lock().session = Some(session);
        provider
    }

    fn lock(&self) -> MutexGuard<'_, ProviderInner> {
        self.inner.lock().expect("session provider lock poisoned")
    }

    /// Replace the current session without notifying subscribers.
    pub fn set_session(&self, session: Option<Session>) {
        self.lock().session = session;
    }

    /// Update the current session and notify every subscriber.
    pub fn emit(&self, change: SessionChange) {
        let mut inner = self.lock();
        inner.session = change.session.clone();
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(change.clone()).is_ok());
    }

    pub fn sign_in(&self, session: Session) {
        self.emit(SessionChange::signed_in(session));
    }

    /// Make current-session lookups fail with `err`.
    pub fn fail_current_session(&self, err: ServiceError) {
        self.lock().current_session_error = Some(err);
    }

    pub fn fail_sign_out(&self, err: ServiceError) {
        self.lock().sign_out_error = Some(err);
    }

    /// Hold current-session replies until the returned gate opens.
    ///
    /// The reply still carries the session as it was when requested.
    pub fn hold_current_session(&self) -> Gate {
        let gate = Gate::new();
        self.lock().current_session_gate = Some(gate.clone());
        gate
    }

    pub fn current_session_calls(&self) -> usize {
        self.lock().current_session_calls
    }

    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscribe_calls
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.lock().unsubscribe_calls
    }

    pub fn active_subscribers(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn sign_out_calls(&self) -> usize {
        self.lock().sign_out_calls
    }
}

impl SessionProvider for FakeSessionProvider {
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, ServiceError>> + Send {
        let (result, gate) = {
            let mut inner = self.lock();
            inner.current_session_calls += 1;
            let result = match &inner.current_session_error {
                Some(err) => Err(err.clone()),
                None => Ok(inner.session.clone()),
            };
            (result, inner.current_session_gate.clone())
        };
        async move {
            if let Some(gate) = gate {
                gate.wait().await;
            }
            result
        }
    }

    fn on_session_change(&self) -> Subscription<SessionChange> {
        let id = {
            let mut inner = self.lock();
            inner.subscribe_calls += 1;
            inner.next_subscriber += 1;
            inner.next_subscriber
        };
        let shared = self.inner.clone();
        let (tx, subscription) = Subscription::channel(move || {
            let mut inner = shared.lock().expect("session provider lock poisoned");
            inner.unsubscribe_calls += 1;
            inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
            Ok(())
        });
        self.lock().subscribers.push((id, tx));
        subscription
    }

    fn sign_out(&self) -> impl Future<Output = Result<(), ServiceError>> + Send {
        let result = {
            let mut inner = self.lock();
            inner.sign_out_calls += 1;
            inner.sign_out_error.clone()
        };
        let result = match result {
            Some(err) => Err(err),
            None => {
                self.emit(SessionChange::signed_out());
                Ok(())
            }
        };
        std::future::ready(result)
    }
}
