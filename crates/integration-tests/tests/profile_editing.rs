//! Profile edits: validation, write-through and republishing.

#![allow(clippy::unwrap_used)]

use skilltrack_core::{ExperienceLevel, Role};
use skilltrack_integration_tests::{TestContext, signed_in_user, stored_profile};
use skilltrack_labs::backend::{Fault, MemoryBackend, Operation};
use skilltrack_labs::models::ProfileUpdate;
use skilltrack_labs::services::ProfileError;

async fn editing(address: &str) -> TestContext {
    let backend = MemoryBackend::new();
    signed_in_user(&backend, address, Some(Role::Student));
    let ctx = TestContext::with(backend);
    assert!(ctx.state.bootstrapper().wait_until_loaded().await.profile.is_some());
    ctx
}

#[tokio::test]
async fn test_save_writes_through_and_republishes() {
    let ctx = editing("edit@example.com").await;
    let editor = ctx.state.profile_editor();

    let mut form = editor.form().unwrap();
    form.company = "  Acme Learning  ".to_owned();
    form.phone = "+1 (555) 010-0100".to_owned();
    form.experience_level = ExperienceLevel::Advanced;
    form.notification_preferences.sms = true;

    let saved = editor.save(&form).await.unwrap();
    assert_eq!(saved.company.as_deref(), Some("Acme Learning"));
    assert_eq!(saved.phone.as_deref(), Some("+1 (555) 010-0100"));
    assert_eq!(saved.experience_level, ExperienceLevel::Advanced);
    assert!(saved.notification_preferences.sms);
    assert!(saved.updated_at >= saved.created_at);

    assert_eq!(ctx.backend.profile(saved.id).as_ref(), Some(&saved));
    assert_eq!(ctx.state.bootstrapper().snapshot().profile, Some(saved));
}

#[tokio::test]
async fn test_blank_optional_field_clears_it() {
    let backend = MemoryBackend::new();
    let user = backend.register(
        &skilltrack_integration_tests::email("bio@example.com"),
        "pw",
        Some("Bio Writer"),
    );
    backend.restore_session(user.clone());
    let mut profile = stored_profile(&user, Role::Student);
    profile.bio = Some("Old bio".to_owned());
    backend.seed_profile(profile);

    let ctx = TestContext::with(backend);
    ctx.state.bootstrapper().wait_until_loaded().await;
    let editor = ctx.state.profile_editor();

    let mut form = editor.form().unwrap();
    assert_eq!(form.bio, "Old bio");
    form.bio = "   ".to_owned();

    let saved = editor.save(&form).await.unwrap();
    assert!(saved.bio.is_none());
    assert_eq!(saved.full_name.as_deref(), Some("Bio Writer"));
}

#[tokio::test]
async fn test_invalid_edit_writes_nothing() {
    let ctx = editing("invalid@example.com").await;
    let editor = ctx.state.profile_editor();
    let before = ctx.state.bootstrapper().snapshot().profile;

    let mut form = editor.form().unwrap();
    form.phone = "call me".to_owned();
    form.bio = "x".repeat(501);
    form.timezone = String::new();

    let Err(ProfileError::Validation(errors)) = editor.save(&form).await else {
        panic!("expected a validation error");
    };
    assert!(errors.has_field("phone"));
    assert!(errors.has_field("bio"));
    assert!(errors.has_field("timezone"));
    assert!(!errors.has_field("company"));

    assert_eq!(ctx.backend.calls(Operation::UpdateProfile), 0);
    assert_eq!(ctx.state.bootstrapper().snapshot().profile, before);
}

#[tokio::test]
async fn test_store_failure_keeps_published_profile() {
    let ctx = editing("down@example.com").await;
    let editor = ctx.state.profile_editor();
    let before = ctx.state.bootstrapper().snapshot().profile;
    ctx.backend.fail(Operation::UpdateProfile, Fault::Unavailable);

    let mut form = editor.form().unwrap();
    form.company = "Nowhere".to_owned();

    assert!(matches!(
        editor.save(&form).await,
        Err(ProfileError::Backend(_))
    ));
    assert_eq!(ctx.state.bootstrapper().snapshot().profile, before);
}

#[tokio::test]
async fn test_signed_out_user_cannot_edit() {
    let backend = MemoryBackend::new();
    let user = backend.register(
        &skilltrack_integration_tests::email("ghost@example.com"),
        "pw",
        None,
    );
    let ctx = TestContext::with(backend);
    ctx.state.bootstrapper().wait_until_loaded().await;
    let editor = ctx.state.profile_editor();

    assert!(editor.form().is_none());
    let form = ProfileUpdate::from_profile(&stored_profile(&user, Role::Student));
    assert!(matches!(
        editor.save(&form).await,
        Err(ProfileError::NoProfile)
    ));
    assert_eq!(ctx.backend.calls(Operation::UpdateProfile), 0);
}
