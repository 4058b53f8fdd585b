//! Session bootstrap against the in-memory backend: start-up, auth changes,
//! sign-out and shutdown ordering.

#![allow(clippy::unwrap_used)]

use skilltrack_core::{ExperienceLevel, NotificationPreferences, Role, SubscriptionTier};
use skilltrack_integration_tests::{TestContext, email, signed_in_user};
use skilltrack_labs::backend::{Fault, IdentityService, MemoryBackend, Operation};
use skilltrack_labs::models::{AuthEvent, AuthStateChange};
use skilltrack_labs::services::BootstrapError;

#[tokio::test]
async fn test_existing_profile_is_loaded_untouched() {
    let backend = MemoryBackend::new();
    let user = signed_in_user(&backend, "keep@example.com", Some(Role::Instructor));
    let stored = backend.profile(user.id).unwrap();

    let ctx = TestContext::with(backend);
    let snapshot = ctx.state.bootstrapper().wait_until_loaded().await;

    assert!(!snapshot.loading);
    assert_eq!(snapshot.user_id(), Some(user.id));
    assert_eq!(snapshot.profile.as_ref(), Some(&stored));
    assert_eq!(ctx.backend.calls(Operation::InsertProfile), 0);
    assert_eq!(ctx.backend.profile(user.id), Some(stored));
}

#[tokio::test]
async fn test_first_sign_in_creates_default_profile() {
    let ctx = TestContext::new();
    let bootstrapper = ctx.state.bootstrapper();
    assert!(!bootstrapper.wait_until_loaded().await.is_signed_in());

    let user = ctx.backend.register(&email("newcomer@example.com"), "pw", None);
    let session = ctx
        .backend
        .sign_in_with_password(&email("newcomer@example.com"), &"pw".into())
        .await
        .unwrap();
    let snapshot = bootstrapper.wait_for_user(session.user_id()).await.unwrap();

    let profile = snapshot.profile.unwrap();
    assert_eq!(profile.id, user.id);
    assert_eq!(profile.email.as_str(), "newcomer@example.com");
    assert_eq!(profile.display_name(), "newcomer");
    assert_eq!(profile.role, Role::Student);
    assert_eq!(profile.experience_level, ExperienceLevel::Beginner);
    assert_eq!(profile.subscription_tier, SubscriptionTier::Free);
    assert_eq!(profile.timezone, "UTC");
    assert_eq!(profile.language, "en");
    assert_eq!(
        profile.notification_preferences,
        NotificationPreferences::default()
    );
    assert_eq!(profile.login_count, 0);
    assert!(!profile.is_verified);
    assert!(profile.preferences.is_empty());
    assert_eq!(ctx.backend.profile(user.id), Some(profile));
}

#[tokio::test]
async fn test_sign_up_name_is_carried_onto_profile() {
    let ctx = TestContext::new();
    ctx.state.bootstrapper().wait_until_loaded().await;

    let session = ctx
        .backend
        .sign_up(&email("grace@example.com"), &"pw".into(), Some("Grace Hopper"))
        .await
        .unwrap()
        .unwrap();
    let snapshot = ctx
        .state
        .bootstrapper()
        .wait_for_user(session.user_id())
        .await
        .unwrap();

    assert_eq!(snapshot.profile.unwrap().display_name(), "Grace Hopper");
}

#[tokio::test]
async fn test_lookup_failure_leaves_profile_empty_without_insert() {
    let backend = MemoryBackend::new();
    let user = signed_in_user(&backend, "flaky@example.com", None);
    backend.fail(Operation::SelectProfile, Fault::Unavailable);

    let ctx = TestContext::with(backend);
    let snapshot = ctx.state.bootstrapper().wait_until_loaded().await;

    assert_eq!(snapshot.user_id(), Some(user.id));
    assert!(snapshot.profile.is_none());
    assert_eq!(ctx.backend.calls(Operation::InsertProfile), 0);
    assert_eq!(ctx.backend.profile_count(), 0);
}

#[tokio::test]
async fn test_insert_failure_keeps_session_and_refresh_recovers() {
    let backend = MemoryBackend::new();
    let user = signed_in_user(&backend, "retry@example.com", None);
    backend.fail(Operation::InsertProfile, Fault::Unavailable);

    let ctx = TestContext::with(backend);
    let bootstrapper = ctx.state.bootstrapper();
    let snapshot = bootstrapper.wait_until_loaded().await;
    assert!(snapshot.is_signed_in());
    assert!(snapshot.profile.is_none());

    ctx.backend.clear_fault(Operation::InsertProfile);
    let profile = bootstrapper.refresh_profile().await.unwrap().unwrap();
    assert_eq!(profile.id, user.id);
    assert_eq!(bootstrapper.snapshot().profile, Some(profile));
}

#[tokio::test]
async fn test_sign_out_clears_state_even_when_service_fails() {
    let backend = MemoryBackend::new();
    signed_in_user(&backend, "bye@example.com", Some(Role::Student));
    backend.fail(Operation::SignOut, Fault::Unavailable);

    let ctx = TestContext::with(backend);
    let bootstrapper = ctx.state.bootstrapper();
    assert!(bootstrapper.wait_until_loaded().await.profile.is_some());

    let result = bootstrapper.sign_out().await;
    assert!(matches!(result, Err(BootstrapError::SignOut(_))));

    let snapshot = bootstrapper.snapshot();
    assert!(!snapshot.is_signed_in());
    assert!(snapshot.profile.is_none());
    assert!(!snapshot.loading);
    assert_eq!(ctx.backend.calls(Operation::SignOut), 1);
}

#[tokio::test]
async fn test_failed_sign_out_drops_changes_queued_before_it() {
    let backend = MemoryBackend::new();
    let stale = signed_in_user(&backend, "stale@example.com", Some(Role::Student));
    backend.fail(Operation::SignOut, Fault::Unavailable);

    let ctx = TestContext::with(backend);
    let bootstrapper = ctx.state.bootstrapper();
    assert!(bootstrapper.wait_until_loaded().await.profile.is_some());
    let next_id = ctx
        .backend
        .register(&email("after@example.com"), "pw", None)
        .id;

    // One refresh is mid-resolution, a second is still queued.
    ctx.backend.hold_lookups();
    let session = ctx.backend.current_session().await.unwrap();
    ctx.backend.push_event(AuthStateChange::new(
        AuthEvent::TokenRefreshed,
        session.clone(),
    ));
    ctx.backend.wait_for_calls(Operation::SelectProfile, 2).await;
    ctx.backend
        .push_event(AuthStateChange::new(AuthEvent::TokenRefreshed, session));

    let result = bootstrapper.sign_out().await;
    assert!(matches!(result, Err(BootstrapError::SignOut(_))));
    assert!(!bootstrapper.snapshot().is_signed_in());

    let mut rx = bootstrapper.subscribe();
    rx.borrow_and_update();
    let recorder = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let user_id = rx.borrow_and_update().user_id();
            seen.push(user_id);
            if user_id == Some(next_id) {
                break;
            }
        }
        seen
    });

    ctx.backend.release_lookups();
    let session = ctx
        .backend
        .sign_in_with_password(&email("after@example.com"), &"pw".into())
        .await
        .unwrap();
    let snapshot = bootstrapper.wait_for_user(session.user_id()).await.unwrap();
    assert_eq!(snapshot.user_id(), Some(next_id));

    let seen = recorder.await.unwrap();
    assert!(
        !seen.contains(&Some(stale.id)),
        "cleared session came back: {seen:?}"
    );
}

#[tokio::test]
async fn test_resolution_overtaken_by_sign_out_is_never_published() {
    let ctx = TestContext::new();
    let bootstrapper = ctx.state.bootstrapper();
    bootstrapper.wait_until_loaded().await;

    let slow = signed_in_user(&ctx.backend, "slow@example.com", Some(Role::Admin));
    let next_id = ctx
        .backend
        .register(&email("next@example.com"), "pw", None)
        .id;

    ctx.backend.hold_lookups();
    ctx.backend.push_event(AuthStateChange::new(
        AuthEvent::SignedIn,
        ctx.backend.current_session().await.unwrap(),
    ));
    ctx.backend.wait_for_calls(Operation::SelectProfile, 1).await;

    bootstrapper.sign_out().await.unwrap();
    assert!(!bootstrapper.snapshot().is_signed_in());

    let mut rx = bootstrapper.subscribe();
    rx.borrow_and_update();
    let recorder = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let user_id = rx.borrow_and_update().user_id();
            seen.push(user_id);
            if user_id == Some(next_id) {
                break;
            }
        }
        seen
    });

    ctx.backend.release_lookups();
    let session = ctx
        .backend
        .sign_in_with_password(&email("next@example.com"), &"pw".into())
        .await
        .unwrap();
    let snapshot = bootstrapper.wait_for_user(session.user_id()).await.unwrap();
    assert_eq!(snapshot.user_id(), Some(next_id));

    let seen = recorder.await.unwrap();
    assert!(!seen.contains(&Some(slow.id)), "stale snapshot published: {seen:?}");
}

#[tokio::test]
async fn test_null_session_event_clears_profile() {
    let backend = MemoryBackend::new();
    signed_in_user(&backend, "gone@example.com", Some(Role::Student));
    let ctx = TestContext::with(backend);
    let bootstrapper = ctx.state.bootstrapper();
    assert!(bootstrapper.wait_until_loaded().await.is_signed_in());

    let mut rx = bootstrapper.subscribe();
    ctx.backend
        .push_event(AuthStateChange::new(AuthEvent::SignedOut, None));

    let snapshot = rx
        .wait_for(|s| !s.is_signed_in())
        .await
        .unwrap()
        .clone();
    assert!(snapshot.profile.is_none());
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn test_token_refresh_keeps_same_profile() {
    let backend = MemoryBackend::new();
    let user = signed_in_user(&backend, "renew@example.com", Some(Role::Student));
    let ctx = TestContext::with(backend);
    let bootstrapper = ctx.state.bootstrapper();
    let before = bootstrapper.wait_until_loaded().await;

    let mut rx = bootstrapper.subscribe();
    let renewed = ctx.backend.refresh_session().await.unwrap();
    let snapshot = rx
        .wait_for(|s| s.session.as_ref().is_some_and(|s| s.same_token(&renewed)))
        .await
        .unwrap()
        .clone();

    assert_eq!(snapshot.user_id(), Some(user.id));
    assert_eq!(snapshot.profile, before.profile);
    assert_eq!(ctx.backend.calls(Operation::InsertProfile), 0);
}

#[tokio::test]
async fn test_nothing_is_published_after_shutdown() {
    let ctx = TestContext::new();
    let bootstrapper = ctx.state.bootstrapper();
    bootstrapper.wait_until_loaded().await;
    bootstrapper.shutdown().await;

    let _late = ctx.backend.register(&email("late@example.com"), "pw", None);
    ctx.backend
        .sign_in_with_password(&email("late@example.com"), &"pw".into())
        .await
        .unwrap();

    assert!(!bootstrapper.snapshot().is_signed_in());
    assert!(matches!(
        bootstrapper.refresh_profile().await,
        Err(BootstrapError::ShutDown)
    ));
    assert_eq!(ctx.backend.calls(Operation::SelectProfile), 0);
}
