//! Session → profile → decision state machine behind [`AuthGuard`](super::AuthGuard).
//!
//! The machine is synchronous and side-effect free: every input is a
//! [`GuardEvent`], every output a list of [`Effect`]s for the driver to carry
//! out. Asynchronous replies are tagged when requested and checked when they
//! come back:
//!
//! - current-session replies carry the session *generation* they were issued
//!   under; any session-change notification bumps the generation, so a reply
//!   that lost the race is dropped.
//! - profile replies carry the resolution *epoch*; every new resolution,
//!   sign-out or teardown bumps it, so an older identity's answer can never
//!   overwrite a newer one.
//! - the timer carries the epoch it was armed in. Only one timer is live, and
//!   it is not re-armed while the guard is still loading, so a stream of
//!   changes cannot postpone the deadline.
//!
//! After [`GuardEvent::Unmounted`] the machine ignores everything.

use std::time::Duration;

use campus_core::ServiceError;

use crate::config::GuardSettings;
use crate::decision::{Authorizer, Decision};
use crate::error::SecurityError;
use crate::identity::{live_identity, Identity, Profile, Session};
use crate::profile::{ProfileChange, Resolution};
use crate::role::AllowedRoles;
use crate::routes::PortalRoutes;
use crate::session::{SessionChange, SessionChangeKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    AwaitingProfile,
    Resolved,
}

/// Observable guard state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardState {
    pub phase: Phase,
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    /// Set only once `phase` is [`Phase::Resolved`].
    pub decision: Option<Decision>,
    /// Why the guard failed closed, when it did.
    pub denial: Option<SecurityError>,
}

impl GuardState {
    fn initial() -> Self {
        Self {
            phase: Phase::Initializing,
            identity: None,
            profile: None,
            decision: None,
            denial: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.phase == Phase::Resolved
    }

    /// `None` until resolved.
    pub fn authorized(&self) -> Option<bool> {
        if !self.is_resolved() {
            return None;
        }
        Some(self.decision.as_ref().is_some_and(Decision::is_authorized))
    }
}

/// Inputs to the machine.
#[derive(Debug)]
pub enum GuardEvent {
    /// Reply to the one-shot current-session request.
    CurrentSession {
        generation: u64,
        result: Result<Option<Session>, ServiceError>,
    },
    SessionChanged(SessionChange),
    ProfileResolved {
        epoch: u64,
        resolution: Resolution,
    },
    ProfileChanged(ProfileChange),
    TimedOut {
        epoch: u64,
    },
    Unmounted,
}

/// Side effects requested by the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    SubscribeSession,
    RequestSession { generation: u64 },
    ResolveProfile { epoch: u64, identity_id: String },
    /// Replace the live profile-change subscription (`None` drops it).
    WatchProfile { identity_id: Option<String> },
    /// Replace the running timer.
    ArmTimeout { epoch: u64, after: Duration },
    Navigate { target: String },
    /// Release the session subscription, the profile watch, and every
    /// pending request and timer.
    Teardown,
}

pub struct GuardMachine {
    allowed: AllowedRoles,
    authorizer: Authorizer,
    profile_timeout: Duration,
    state: GuardState,
    /// Last decision acted upon, kept across re-resolutions.
    settled: Option<Decision>,
    session_generation: u64,
    epoch: u64,
    /// Epoch tag of the live timer.
    deadline: u64,
    mounted: bool,
    torn_down: bool,
}

impl GuardMachine {
    pub fn new(allowed: AllowedRoles, authorizer: Authorizer, settings: &GuardSettings) -> Self {
        Self {
            allowed,
            authorizer,
            profile_timeout: settings.profile_timeout,
            state: GuardState::initial(),
            settled: None,
            session_generation: 0,
            epoch: 0,
            deadline: 0,
            mounted: false,
            torn_down: false,
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn allowed(&self) -> &AllowedRoles {
        &self.allowed
    }

    pub fn routes(&self) -> &PortalRoutes {
        self.authorizer.routes()
    }

    /// Current resolution epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session_generation(&self) -> u64 {
        self.session_generation
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Start: subscribe first so no change slips between the subscription and
    /// the current-session request, then bound the initial wait.
    pub fn mount(&mut self) -> Vec<Effect> {
        if self.mounted || self.torn_down {
            return Vec::new();
        }
        self.mounted = true;
        self.deadline = self.epoch;
        tracing::debug!(allowed = ?self.allowed, "Guard mounted");
        vec![
            Effect::SubscribeSession,
            Effect::RequestSession {
                generation: self.session_generation,
            },
            Effect::ArmTimeout {
                epoch: self.epoch,
                after: self.profile_timeout,
            },
        ]
    }

    pub fn handle(&mut self, event: GuardEvent) -> Vec<Effect> {
        if self.torn_down {
            tracing::trace!(?event, "Ignoring event after teardown");
            return Vec::new();
        }
        match event {
            GuardEvent::CurrentSession { generation, result } => {
                self.on_current_session(generation, result)
            }
            GuardEvent::SessionChanged(change) => self.on_session_changed(change),
            GuardEvent::ProfileResolved { epoch, resolution } => {
                self.on_profile_resolved(epoch, resolution)
            }
            GuardEvent::ProfileChanged(change) => self.on_profile_changed(change),
            GuardEvent::TimedOut { epoch } => self.on_timed_out(epoch),
            GuardEvent::Unmounted => self.teardown(),
        }
    }

    fn on_current_session(
        &mut self,
        generation: u64,
        result: Result<Option<Session>, ServiceError>,
    ) -> Vec<Effect> {
        if generation != self.session_generation || self.state.phase != Phase::Initializing {
            tracing::trace!(
                generation,
                current = self.session_generation,
                "Discarding superseded current-session reply"
            );
            return Vec::new();
        }
        match result {
            Ok(session) => self.apply_identity(live_identity(session), None),
            Err(err) => self.fail_closed(SecurityError::SessionUnavailable(err)),
        }
    }

    fn on_session_changed(&mut self, change: SessionChange) -> Vec<Effect> {
        self.session_generation += 1;
        tracing::debug!(
            kind = ?change.kind,
            generation = self.session_generation,
            "Session changed"
        );
        self.apply_identity(live_identity(change.session), Some(change.kind))
    }

    fn apply_identity(
        &mut self,
        identity: Option<Identity>,
        kind: Option<SessionChangeKind>,
    ) -> Vec<Effect> {
        let Some(identity) = identity else {
            let mut effects = Vec::new();
            if self.state.identity.take().is_some() {
                effects.push(Effect::WatchProfile { identity_id: None });
            }
            self.state.profile = None;
            self.epoch += 1;
            effects.extend(self.resolve(Decision::Unauthenticated, Some(SecurityError::NoIdentity)));
            return effects;
        };

        let same_identity = self
            .state
            .identity
            .as_ref()
            .is_some_and(|current| current.id == identity.id);
        if same_identity {
            let keep = match self.state.phase {
                Phase::Initializing => false,
                Phase::AwaitingProfile => true,
                Phase::Resolved => matches!(
                    kind,
                    Some(SessionChangeKind::TokenRefreshed | SessionChangeKind::UserUpdated)
                ),
            };
            if keep {
                tracing::trace!(identity = %identity.id, "Same identity, keeping resolution");
                self.state.identity = Some(identity);
                return Vec::new();
            }
        }
        self.begin_resolution(identity, false)
    }

    fn begin_resolution(&mut self, identity: Identity, keep_profile: bool) -> Vec<Effect> {
        self.epoch += 1;
        let identity_id = identity.id.clone();
        let identity_changed = self
            .state
            .identity
            .as_ref()
            .map_or(true, |current| current.id != identity_id);
        let rearm = self.state.phase != Phase::AwaitingProfile;

        self.state.identity = Some(identity);
        if !keep_profile {
            self.state.profile = None;
        }
        self.state.phase = Phase::AwaitingProfile;
        self.state.decision = None;
        self.state.denial = None;

        tracing::debug!(identity = %identity_id, epoch = self.epoch, "Awaiting profile");

        let mut effects = Vec::with_capacity(3);
        if identity_changed {
            effects.push(Effect::WatchProfile {
                identity_id: Some(identity_id.clone()),
            });
        }
        effects.push(Effect::ResolveProfile {
            epoch: self.epoch,
            identity_id,
        });
        if rearm {
            self.deadline = self.epoch;
            effects.push(Effect::ArmTimeout {
                epoch: self.epoch,
                after: self.profile_timeout,
            });
        } else {
            tracing::trace!(deadline = self.deadline, "Keeping the running deadline");
        }
        effects
    }

    fn on_profile_resolved(&mut self, epoch: u64, resolution: Resolution) -> Vec<Effect> {
        if epoch != self.epoch || self.state.phase != Phase::AwaitingProfile {
            tracing::trace!(epoch, current = self.epoch, "Discarding stale profile reply");
            return Vec::new();
        }
        let identity_id = self
            .state
            .identity
            .as_ref()
            .map(|identity| identity.id.clone())
            .unwrap_or_default();

        let denial = resolution.denial(&identity_id);
        self.state.profile = resolution.into_profile();
        let decision = self.authorizer.decide(self.state.profile.as_ref(), &self.allowed);
        let denial = denial.or_else(|| self.role_denial(&decision));
        self.resolve(decision, denial)
    }

    fn on_profile_changed(&mut self, change: ProfileChange) -> Vec<Effect> {
        let Some(identity) = self.state.identity.clone() else {
            return Vec::new();
        };
        if identity.id != change.identity_id || self.state.phase == Phase::Initializing {
            return Vec::new();
        }
        tracing::debug!(identity = %identity.id, "Profile changed, resolving again");
        self.begin_resolution(identity, true)
    }

    /// A profile kept from an earlier resolution may be outdated, so a
    /// timeout never decides on it.
    fn on_timed_out(&mut self, epoch: u64) -> Vec<Effect> {
        if epoch != self.deadline || self.state.phase == Phase::Resolved {
            return Vec::new();
        }
        self.fail_closed(SecurityError::Timeout(self.profile_timeout))
    }

    fn fail_closed(&mut self, cause: SecurityError) -> Vec<Effect> {
        self.state.profile = None;
        self.epoch += 1;
        self.resolve(Decision::Unauthenticated, Some(cause))
    }

    fn role_denial(&self, decision: &Decision) -> Option<SecurityError> {
        let profile = self.state.profile.as_ref()?;
        self.authorizer.denial_for(profile, decision)
    }

    /// Enter `Resolved`. Navigation is requested only when the decision
    /// differs from the last one acted upon, so re-resolving to the same
    /// redirect never navigates twice.
    fn resolve(&mut self, decision: Decision, denial: Option<SecurityError>) -> Vec<Effect> {
        if let Some(cause) = &denial {
            cause.log();
        }
        self.state.phase = Phase::Resolved;
        self.state.denial = denial;
        self.state.decision = Some(decision.clone());
        if self.settled.as_ref() == Some(&decision) {
            return Vec::new();
        }

        let target = decision
            .redirect_target(self.authorizer.routes())
            .map(str::to_string);
        tracing::debug!(?decision, "Guard resolved");
        self.settled = Some(decision);
        match target {
            Some(target) => vec![Effect::Navigate { target }],
            None => Vec::new(),
        }
    }

    fn teardown(&mut self) -> Vec<Effect> {
        self.torn_down = true;
        self.epoch += 1;
        tracing::debug!("Guard unmounted");
        vec![Effect::Teardown]
    }
}
