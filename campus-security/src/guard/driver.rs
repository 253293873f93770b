use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::GuardSettings;
use crate::decision::Authorizer;
use crate::error::SecurityError;
use crate::navigator::Navigator;
use crate::profile::{ProfileChange, ProfileResolver, ProfileStore};
use crate::role::AllowedRoles;
use crate::routes::PortalRoutes;
use crate::session::{SessionChange, SessionProvider};
use crate::subscription::{next_in, Subscription};

use super::machine::{Effect, GuardEvent, GuardMachine, GuardState};
use super::view::GuardView;

/// Access guard for one protected page.
///
/// Composed with the page's allowed roles, then [mounted](AuthGuard::mount)
/// onto the tokio runtime, where a single task drives a [`GuardMachine`]
/// from session notifications, profile replies and timers.
///
/// # Example
///
/// ```ignore
/// let guard = AuthGuard::new(provider, store, navigator, [Role::Admin])
///     .with_routes(PortalRoutes::portals())
///     .mount();
/// match guard.view() {
///     GuardView::Protected(chrome) => render(chrome, children),
///     GuardView::Loading => spinner(),
///     GuardView::Redirecting { .. } => {}
/// }
/// ```
pub struct AuthGuard<P, S, N> {
    provider: Arc<P>,
    resolver: ProfileResolver<S>,
    navigator: Arc<N>,
    allowed: AllowedRoles,
    routes: PortalRoutes,
    settings: GuardSettings,
}

impl<P, S, N> AuthGuard<P, S, N>
where
    P: SessionProvider,
    S: ProfileStore,
    N: Navigator,
{
    pub fn new(
        provider: Arc<P>,
        store: Arc<S>,
        navigator: Arc<N>,
        allowed: impl Into<AllowedRoles>,
    ) -> Self {
        Self {
            provider,
            resolver: ProfileResolver::new(store),
            navigator,
            allowed: allowed.into(),
            routes: PortalRoutes::default(),
            settings: GuardSettings::default(),
        }
    }

    pub fn with_routes(mut self, routes: PortalRoutes) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_settings(mut self, settings: GuardSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start guarding. Must be called from within a tokio runtime.
    pub fn mount(self) -> GuardHandle<P> {
        let machine = GuardMachine::new(
            self.allowed,
            Authorizer::new(self.routes.clone()),
            &self.settings,
        );
        let (state_tx, state_rx) = watch::channel(machine.state().clone());
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let unmount = CancellationToken::new();

        let effects = Effects {
            provider: self.provider.clone(),
            resolver: self.resolver,
            navigator: self.navigator,
            inbox: inbox_tx,
            cancel: unmount.clone(),
            epoch_scope: (0, unmount.child_token()),
            timer: None,
            session_sub: None,
            profile_sub: None,
        };
        let task = tokio::spawn(drive(machine, effects, inbox_rx, state_tx, unmount.clone()));

        GuardHandle {
            state: state_rx,
            routes: self.routes,
            provider: self.provider,
            unmount,
            task: Some(task),
        }
    }
}

/// Executes [`Effect`]s and owns every resource the guard holds.
struct Effects<P, S, N> {
    provider: Arc<P>,
    resolver: ProfileResolver<S>,
    navigator: Arc<N>,
    inbox: mpsc::UnboundedSender<GuardEvent>,
    cancel: CancellationToken,
    /// Token for the newest epoch's profile request.
    epoch_scope: (u64, CancellationToken),
    /// The timer outlives epochs until it is replaced.
    timer: Option<CancellationToken>,
    session_sub: Option<Subscription<SessionChange>>,
    profile_sub: Option<Subscription<ProfileChange>>,
}

impl<P, S, N> Effects<P, S, N>
where
    P: SessionProvider,
    S: ProfileStore,
    N: Navigator,
{
    fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SubscribeSession => {
                    self.session_sub = Some(self.provider.on_session_change());
                }
                Effect::RequestSession { generation } => {
                    let provider = self.provider.clone();
                    let scope = self.cancel.clone();
                    self.reply(scope, async move {
                        GuardEvent::CurrentSession {
                            generation,
                            result: provider.current_session().await,
                        }
                    });
                }
                Effect::ResolveProfile { epoch, identity_id } => {
                    let resolver = self.resolver.clone();
                    let scope = self.scope_for(epoch);
                    self.reply(scope, async move {
                        GuardEvent::ProfileResolved {
                            epoch,
                            resolution: resolver.resolve(&identity_id).await,
                        }
                    });
                }
                Effect::WatchProfile { identity_id } => {
                    if let Some(mut previous) = self.profile_sub.take() {
                        previous.unsubscribe();
                    }
                    self.profile_sub =
                        identity_id.map(|id| self.resolver.store().profile_changes(&id));
                }
                Effect::ArmTimeout { epoch, after } => {
                    let scope = self.cancel.child_token();
                    if let Some(previous) = self.timer.replace(scope.clone()) {
                        previous.cancel();
                    }
                    self.reply(scope, async move {
                        tokio::time::sleep(after).await;
                        GuardEvent::TimedOut { epoch }
                    });
                }
                Effect::Navigate { target } => {
                    tracing::debug!(%target, "Guard navigating");
                    self.navigator.navigate(&target);
                }
                Effect::Teardown => self.teardown(),
            }
        }
    }

    /// Older epochs' requests are cancelled once a newer epoch starts work.
    fn scope_for(&mut self, epoch: u64) -> CancellationToken {
        if self.epoch_scope.0 != epoch {
            self.epoch_scope.1.cancel();
            self.epoch_scope = (epoch, self.cancel.child_token());
        }
        self.epoch_scope.1.clone()
    }

    fn reply<F>(&self, scope: CancellationToken, work: F)
    where
        F: Future<Output = GuardEvent> + Send + 'static,
    {
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = scope.cancelled() => {}
                event = work => {
                    // The driver may already be gone; late replies are dropped.
                    let _ = inbox.send(event);
                }
            }
        });
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        if let Some(mut subscription) = self.session_sub.take() {
            subscription.unsubscribe();
        }
        if let Some(mut subscription) = self.profile_sub.take() {
            subscription.unsubscribe();
        }
    }
}

async fn drive<P, S, N>(
    mut machine: GuardMachine,
    mut effects: Effects<P, S, N>,
    mut inbox: mpsc::UnboundedReceiver<GuardEvent>,
    state: watch::Sender<GuardState>,
    unmount: CancellationToken,
) where
    P: SessionProvider,
    S: ProfileStore,
    N: Navigator,
{
    let mounted = machine.mount();
    effects.run(mounted);
    publish(&state, &machine);

    while !machine.is_torn_down() {
        let event = tokio::select! {
            biased;
            _ = unmount.cancelled() => GuardEvent::Unmounted,
            change = next_in(&mut effects.session_sub) => GuardEvent::SessionChanged(change),
            change = next_in(&mut effects.profile_sub) => GuardEvent::ProfileChanged(change),
            Some(event) = inbox.recv() => event,
        };
        let requested = machine.handle(event);
        effects.run(requested);
        if !machine.is_torn_down() {
            publish(&state, &machine);
        }
    }
}

fn publish(state: &watch::Sender<GuardState>, machine: &GuardMachine) {
    state.send_if_modified(|current| {
        if *current == *machine.state() {
            return false;
        }
        *current = machine.state().clone();
        true
    });
}

/// Handle to a mounted [`AuthGuard`].
///
/// Dropping the handle unmounts the guard.
pub struct GuardHandle<P> {
    state: watch::Receiver<GuardState>,
    routes: PortalRoutes,
    provider: Arc<P>,
    unmount: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<P: SessionProvider> GuardHandle<P> {
    /// Snapshot of the current state.
    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    /// What the page should render right now.
    pub fn view(&self) -> GuardView {
        GuardView::from_state(&self.state.borrow(), &self.routes)
    }

    pub fn routes(&self) -> &PortalRoutes {
        &self.routes
    }

    /// A receiver of state snapshots that outlives the handle.
    pub fn observe(&self) -> watch::Receiver<GuardState> {
        self.state.clone()
    }

    /// Wait until the guard reaches `Resolved`.
    ///
    /// Returns the last known state if the guard is unmounted first.
    pub async fn resolved(&mut self) -> GuardState {
        let resolved = self.state.wait_for(GuardState::is_resolved).await.map(|s| s.clone());
        match resolved {
            Ok(state) => state,
            Err(_) => self.state.borrow().clone(),
        }
    }

    /// Wait for the next state change. `false` once the guard is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// The logout control. The provider's sign-out notification then drives
    /// the guard to the login page.
    pub async fn sign_out(&self) -> Result<(), SecurityError> {
        self.provider.sign_out().await.map_err(|err| {
            let err = SecurityError::SignOut(err);
            err.log();
            err
        })
    }

    pub fn is_mounted(&self) -> bool {
        !self.unmount.is_cancelled()
    }

    /// Unmount and wait for the guard task to release everything.
    pub async fn unmount(mut self) {
        self.unmount.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Guard task ended abnormally");
            }
        }
    }
}

impl<P> Drop for GuardHandle<P> {
    fn drop(&mut self) {
        self.unmount.cancel();
    }
}
