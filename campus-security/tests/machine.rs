use std::time::Duration;

use campus_core::ServiceError;
use campus_security::guard::{Effect, GuardEvent, GuardMachine, Phase};
use campus_security::{
    AllowedRoles, Authorizer, Decision, GuardSettings, Identity, PortalRoutes, Profile,
    Resolution, Role, SecurityError, Session, SessionChange,
};

const TIMEOUT: Duration = Duration::from_millis(500);

fn machine(allowed: impl Into<AllowedRoles>) -> GuardMachine {
    GuardMachine::new(
        allowed.into(),
        Authorizer::new(PortalRoutes::default()),
        &GuardSettings::new().with_profile_timeout(TIMEOUT),
    )
}

fn session(id: &str) -> Session {
    Session::new(Identity::new(id))
}

fn navigations(effects: &[Effect]) -> Vec<&str> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Navigate { target } => Some(target.as_str()),
            _ => None,
        })
        .collect()
}

fn resolve_epoch(effects: &[Effect]) -> Option<u64> {
    effects.iter().find_map(|effect| match effect {
        Effect::ResolveProfile { epoch, .. } => Some(*epoch),
        _ => None,
    })
}

/// Mount and answer the current-session request with `id`.
fn signed_in(m: &mut GuardMachine, id: &str) -> u64 {
    m.mount();
    let effects = m.handle(GuardEvent::CurrentSession {
        generation: 0,
        result: Ok(Some(session(id))),
    });
    resolve_epoch(&effects).expect("resolution requested")
}

#[test]
fn mount_subscribes_before_requesting_and_arms_timeout() {
    let mut m = machine([Role::Admin]);
    let effects = m.mount();
    assert_eq!(
        effects,
        vec![
            Effect::SubscribeSession,
            Effect::RequestSession { generation: 0 },
            Effect::ArmTimeout {
                epoch: 0,
                after: TIMEOUT
            },
        ]
    );
    assert_eq!(m.state().phase, Phase::Initializing);
    assert!(m.allowed().contains(&Role::Admin));
    assert_eq!(m.allowed().len(), 1);
    assert!(m.mount().is_empty());
}

#[test]
fn no_session_resolves_unauthenticated_without_profile_lookup() {
    let mut m = machine([Role::Admin]);
    m.mount();
    let effects = m.handle(GuardEvent::CurrentSession {
        generation: 0,
        result: Ok(None),
    });
    assert_eq!(effects, vec![Effect::Navigate { target: "/login".into() }]);
    assert_eq!(m.state().decision, Some(Decision::Unauthenticated));
    assert_eq!(m.state().denial, Some(SecurityError::NoIdentity));
    assert_eq!(m.state().authorized(), Some(false));
}

#[test]
fn session_starts_profile_resolution() {
    let mut m = machine([Role::Admin]);
    m.mount();
    let effects = m.handle(GuardEvent::CurrentSession {
        generation: 0,
        result: Ok(Some(session("u1"))),
    });
    assert_eq!(
        effects,
        vec![
            Effect::WatchProfile {
                identity_id: Some("u1".into())
            },
            Effect::ResolveProfile {
                epoch: 1,
                identity_id: "u1".into()
            },
            Effect::ArmTimeout {
                epoch: 1,
                after: TIMEOUT
            },
        ]
    );
    assert_eq!(m.state().phase, Phase::AwaitingProfile);
    assert_eq!(m.state().authorized(), None);
}

#[test]
fn allowed_profile_authorizes_without_navigation() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });
    assert!(effects.is_empty());
    assert_eq!(m.state().authorized(), Some(true));
    assert_eq!(m.state().denial, None);
}

#[test]
fn disallowed_profile_redirects_once() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Parent)),
    });
    assert_eq!(navigations(&effects), vec!["/parent"]);

    // The same answer again must not navigate a second time.
    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Parent)),
    });
    assert!(effects.is_empty());
}

#[test]
fn missing_profile_fails_closed() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::NotFound,
    });
    assert_eq!(navigations(&effects), vec!["/login"]);
    assert_eq!(
        m.state().denial,
        Some(SecurityError::ProfileNotFound("u1".into()))
    );
    assert_eq!(m.state().profile, None);
}

#[test]
fn fetch_error_fails_closed() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    let err = ServiceError::Unavailable("connection reset".into());
    m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::FetchError(err.clone()),
    });
    assert_eq!(m.state().decision, Some(Decision::Unauthenticated));
    assert_eq!(m.state().denial, Some(SecurityError::ProfileFetch(err)));
}

#[test]
fn unrecognized_role_is_denied_with_cause() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::from("janitor"))),
    });
    assert_eq!(navigations(&effects), vec!["/login"]);
    assert_eq!(
        m.state().denial,
        Some(SecurityError::UnrecognizedRole("janitor".into()))
    );
}

#[test]
fn session_error_fails_closed() {
    let mut m = machine([Role::Admin]);
    m.mount();
    let err = ServiceError::Unavailable("auth down".into());
    let effects = m.handle(GuardEvent::CurrentSession {
        generation: 0,
        result: Err(err.clone()),
    });
    assert_eq!(navigations(&effects), vec!["/login"]);
    assert_eq!(m.state().denial, Some(SecurityError::SessionUnavailable(err)));
}

#[test]
fn superseded_current_session_reply_is_discarded() {
    let mut m = machine([Role::Admin]);
    m.mount();
    // A sign-in notification overtakes the one-shot request.
    let effects = m.handle(GuardEvent::SessionChanged(SessionChange::signed_in(session("u2"))));
    let epoch = resolve_epoch(&effects).unwrap();
    assert_eq!(m.session_generation(), 1);

    let effects = m.handle(GuardEvent::CurrentSession {
        generation: 0,
        result: Ok(None),
    });
    assert!(effects.is_empty());
    assert_eq!(m.state().phase, Phase::AwaitingProfile);
    assert_eq!(m.state().identity.as_ref().map(|i| i.id.as_str()), Some("u2"));

    m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u2", Role::Admin)),
    });
    assert_eq!(m.state().authorized(), Some(true));
}

#[test]
fn stale_profile_reply_never_overwrites_newer_identity() {
    let mut m = machine([Role::Admin]);
    let epoch_a = signed_in(&mut m, "a");
    let effects = m.handle(GuardEvent::SessionChanged(SessionChange::signed_in(session("b"))));
    let epoch_b = resolve_epoch(&effects).unwrap();
    assert!(epoch_b > epoch_a);

    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch: epoch_b,
        resolution: Resolution::Found(Profile::new("b", Role::Parent)),
    });
    assert_eq!(navigations(&effects), vec!["/parent"]);

    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch: epoch_a,
        resolution: Resolution::Found(Profile::new("a", Role::Admin)),
    });
    assert!(effects.is_empty());
    assert_eq!(m.state().profile.as_ref().map(|p| p.id.as_str()), Some("b"));
    assert_eq!(m.state().authorized(), Some(false));
}

#[test]
fn identity_change_replaces_profile_watch() {
    let mut m = machine([Role::Admin]);
    signed_in(&mut m, "a");
    let effects = m.handle(GuardEvent::SessionChanged(SessionChange::signed_in(session("b"))));
    assert_eq!(
        effects[0],
        Effect::WatchProfile {
            identity_id: Some("b".into())
        }
    );
}

#[test]
fn sign_out_redirects_to_login_and_drops_watch() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });
    let effects = m.handle(GuardEvent::SessionChanged(SessionChange::signed_out()));
    assert_eq!(
        effects,
        vec![
            Effect::WatchProfile { identity_id: None },
            Effect::Navigate {
                target: "/login".into()
            },
        ]
    );
    assert_eq!(m.state().identity, None);
    assert_eq!(m.state().profile, None);
    assert_eq!(m.state().decision, Some(Decision::Unauthenticated));
}

#[test]
fn token_refresh_keeps_resolution() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });
    let effects = m.handle(GuardEvent::SessionChanged(SessionChange::token_refreshed(
        session("u1"),
    )));
    assert!(effects.is_empty());
    assert_eq!(m.state().authorized(), Some(true));
    assert_eq!(m.epoch(), epoch);
}

#[test]
fn repeated_sign_in_of_same_identity_resolves_again() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });
    let effects = m.handle(GuardEvent::SessionChanged(SessionChange::signed_in(session("u1"))));
    assert!(resolve_epoch(&effects).is_some());
    // Same identity, so the existing watch stays.
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::WatchProfile { .. })));
}

#[test]
fn expired_session_counts_as_signed_out() {
    let mut m = machine([Role::Admin]);
    m.mount();
    let expired = session("u1").expiring_at(chrono::Utc::now() - chrono::Duration::minutes(5));
    let effects = m.handle(GuardEvent::CurrentSession {
        generation: 0,
        result: Ok(Some(expired)),
    });
    assert_eq!(navigations(&effects), vec!["/login"]);
    assert_eq!(m.state().denial, Some(SecurityError::NoIdentity));
}

#[test]
fn timeout_while_initializing_fails_closed() {
    let mut m = machine([Role::Admin]);
    m.mount();
    let effects = m.handle(GuardEvent::TimedOut { epoch: 0 });
    assert_eq!(navigations(&effects), vec!["/login"]);
    assert_eq!(m.state().denial, Some(SecurityError::Timeout(TIMEOUT)));

    // The late reply cannot reopen the decision.
    let effects = m.handle(GuardEvent::CurrentSession {
        generation: 0,
        result: Ok(Some(session("u1"))),
    });
    assert!(effects.is_empty());
    assert_eq!(m.state().decision, Some(Decision::Unauthenticated));
}

#[test]
fn timeout_while_awaiting_profile_fails_closed() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    let effects = m.handle(GuardEvent::TimedOut { epoch });
    assert_eq!(navigations(&effects), vec!["/login"]);
    assert_eq!(m.state().denial, Some(SecurityError::Timeout(TIMEOUT)));

    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });
    assert!(effects.is_empty());
    assert_eq!(m.state().authorized(), Some(false));
}

#[test]
fn stale_timeout_is_ignored() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });
    assert!(m.handle(GuardEvent::TimedOut { epoch: 0 }).is_empty());
    assert!(m.handle(GuardEvent::TimedOut { epoch }).is_empty());
    assert_eq!(m.state().authorized(), Some(true));
}

#[test]
fn profile_change_resolves_again_with_new_role() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });

    let effects = m.handle(GuardEvent::ProfileChanged(campus_security::ProfileChange {
        identity_id: "u1".into(),
    }));
    let refresh = resolve_epoch(&effects).unwrap();
    assert_eq!(m.state().phase, Phase::AwaitingProfile);
    // The previous profile is kept while the refresh is in flight.
    assert!(m.state().profile.is_some());

    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch: refresh,
        resolution: Resolution::Found(Profile::new("u1", Role::Student)),
    });
    assert_eq!(navigations(&effects), vec!["/student"]);
}

#[test]
fn profile_refresh_timeout_fails_closed() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });
    let effects = m.handle(GuardEvent::ProfileChanged(campus_security::ProfileChange {
        identity_id: "u1".into(),
    }));
    let refresh = resolve_epoch(&effects).unwrap();
    assert!(effects.contains(&Effect::ArmTimeout {
        epoch: refresh,
        after: TIMEOUT
    }));

    // The admin profile held from before may already be revoked.
    let effects = m.handle(GuardEvent::TimedOut { epoch: refresh });
    assert_eq!(navigations(&effects), vec!["/login"]);
    assert_eq!(m.state().decision, Some(Decision::Unauthenticated));
    assert_eq!(m.state().denial, Some(SecurityError::Timeout(TIMEOUT)));
    assert_eq!(m.state().profile, None);

    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch: refresh,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });
    assert!(effects.is_empty());
    assert_eq!(m.state().authorized(), Some(false));
}

#[test]
fn profile_changes_while_loading_keep_the_deadline() {
    let mut m = machine([Role::Admin]);
    let first = signed_in(&mut m, "u1");

    let mut latest = first;
    for _ in 0..5 {
        let effects = m.handle(GuardEvent::ProfileChanged(campus_security::ProfileChange {
            identity_id: "u1".into(),
        }));
        latest = resolve_epoch(&effects).unwrap();
        assert!(!effects
            .iter()
            .any(|effect| matches!(effect, Effect::ArmTimeout { .. })));
        assert_eq!(m.state().phase, Phase::AwaitingProfile);
    }
    assert!(latest > first);

    // Only the timer armed when loading began is live.
    assert!(m.handle(GuardEvent::TimedOut { epoch: latest }).is_empty());
    let effects = m.handle(GuardEvent::TimedOut { epoch: first });
    assert_eq!(navigations(&effects), vec!["/login"]);
    assert_eq!(m.state().denial, Some(SecurityError::Timeout(TIMEOUT)));
}

#[test]
fn identity_switch_while_loading_keeps_the_deadline() {
    let mut m = machine([Role::Admin]);
    let first = signed_in(&mut m, "a");
    let effects = m.handle(GuardEvent::SessionChanged(SessionChange::signed_in(session("b"))));
    assert!(resolve_epoch(&effects).is_some());
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::ArmTimeout { .. })));

    m.handle(GuardEvent::TimedOut { epoch: first });
    assert_eq!(m.state().decision, Some(Decision::Unauthenticated));
    assert_eq!(m.state().identity.as_ref().map(|i| i.id.as_str()), Some("b"));
}

#[test]
fn profile_change_for_other_identity_is_ignored() {
    let mut m = machine([Role::Admin]);
    signed_in(&mut m, "u1");
    let effects = m.handle(GuardEvent::ProfileChanged(campus_security::ProfileChange {
        identity_id: "someone-else".into(),
    }));
    assert!(effects.is_empty());
}

#[test]
fn nothing_happens_after_teardown() {
    let mut m = machine([Role::Admin]);
    let epoch = signed_in(&mut m, "u1");
    assert_eq!(m.handle(GuardEvent::Unmounted), vec![Effect::Teardown]);
    assert!(m.is_torn_down());

    let before = m.state().clone();
    let late = [
        GuardEvent::ProfileResolved {
            epoch,
            resolution: Resolution::Found(Profile::new("u1", Role::Parent)),
        },
        GuardEvent::TimedOut { epoch },
        GuardEvent::SessionChanged(SessionChange::signed_out()),
        GuardEvent::Unmounted,
    ];
    for event in late {
        assert!(m.handle(event).is_empty());
    }
    assert_eq!(*m.state(), before);
    assert!(m.mount().is_empty());
}

#[test]
fn sign_in_after_sign_out_navigates_again() {
    let mut m = machine([Role::Admin]);
    m.mount();
    let effects = m.handle(GuardEvent::CurrentSession {
        generation: 0,
        result: Ok(None),
    });
    assert_eq!(navigations(&effects), vec!["/login"]);

    let effects = m.handle(GuardEvent::SessionChanged(SessionChange::signed_in(session("u1"))));
    let epoch = resolve_epoch(&effects).unwrap();
    let effects = m.handle(GuardEvent::ProfileResolved {
        epoch,
        resolution: Resolution::Found(Profile::new("u1", Role::Admin)),
    });
    assert!(effects.is_empty());

    let effects = m.handle(GuardEvent::SessionChanged(SessionChange::signed_out()));
    assert_eq!(navigations(&effects), vec!["/login"]);
}
