//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! skilltrack sign-up -e learner@example.com -n "Ada Lovelace"
//! skilltrack sign-in -e learner@example.com   # password from SKILLTRACK_PASSWORD
//! skilltrack whoami
//! skilltrack check /admin
//! skilltrack sign-out
//! ```

use secrecy::SecretString;
use skilltrack_core::Email;
use skilltrack_labs::error::LabsError;
use skilltrack_labs::guard::{self, Access};
use skilltrack_labs::services::{AuthSnapshot, BootstrapError};
use skilltrack_labs::state::AppState;

use super::CommandError;

/// Sign in and wait for the profile to be resolved.
pub async fn sign_in(
    state: &AppState,
    email: &str,
    password: &SecretString,
) -> Result<(), CommandError> {
    let email = Email::parse(email)?;

    tracing::info!("Signing in as {email}...");
    let session = state
        .backend()
        .sign_in_with_password(&email, password)
        .await?;

    let snapshot = state
        .bootstrapper()
        .wait_for_user(session.user_id())
        .await?;
    print_welcome(&snapshot, &email);
    Ok(())
}

/// Create an account. Signs straight in unless the service asks for email
/// confirmation first.
pub async fn sign_up(
    state: &AppState,
    email: &str,
    password: &SecretString,
    full_name: Option<&str>,
) -> Result<(), CommandError> {
    let email = Email::parse(email)?;

    tracing::info!("Creating account for {email}...");
    let session = state
        .backend()
        .sign_up(&email, password, full_name)
        .await?;

    match session {
        Some(session) => {
            let snapshot = state
                .bootstrapper()
                .wait_for_user(session.user_id())
                .await?;
            print_welcome(&snapshot, &email);
        }
        None => println!("Account created. Check {email} for a confirmation link, then sign in."),
    }
    Ok(())
}

/// Sign out. The local session is gone even if the service call fails.
pub async fn sign_out(state: &AppState) -> Result<(), CommandError> {
    let bootstrapper = state.bootstrapper();
    if !bootstrapper.wait_until_loaded().await.is_signed_in() {
        println!("Not signed in.");
        return Ok(());
    }

    match bootstrapper.sign_out().await {
        Ok(()) => println!("Signed out."),
        Err(err @ BootstrapError::SignOut(_)) => {
            LabsError::from(err).report();
            println!("Signed out locally; the server did not confirm.");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

pub async fn whoami(state: &AppState) -> Result<(), CommandError> {
    let snapshot = state.bootstrapper().wait_until_loaded().await;
    let session = snapshot.session.as_ref().ok_or(LabsError::NotSignedIn)?;

    let email = session
        .user
        .email
        .as_ref()
        .map_or("(no email)", Email::as_str);
    println!("Signed in as {email}");

    match &snapshot.profile {
        Some(profile) => {
            println!("  Name:        {}", profile.display_name());
            println!("  Role:        {}", profile.role);
            println!("  Experience:  {}", profile.experience_level);
            println!("  Plan:        {}", profile.subscription_tier);
            if let Some(company) = &profile.company {
                println!("  Company:     {company}");
            }
        }
        None => println!("  Profile could not be loaded."),
    }
    Ok(())
}

/// Report how the page guard treats `path` for the current session.
pub async fn check(state: &AppState, path: &str) -> Result<(), CommandError> {
    let snapshot = state.bootstrapper().wait_until_loaded().await;
    match guard::evaluate(path, &snapshot) {
        Access::Allow => println!("{path}: allowed"),
        Access::Redirect(to) => println!("{path}: redirect to {to}"),
        Access::Forbidden => println!("{path}: forbidden"),
        Access::Pending => println!("{path}: session still loading"),
    }
    Ok(())
}

fn print_welcome(snapshot: &AuthSnapshot, email: &Email) {
    match &snapshot.profile {
        Some(profile) => println!("Welcome, {} ({}).", profile.display_name(), profile.role),
        None => {
            tracing::warn!("Signed in but the profile could not be loaded");
            println!("Signed in as {email}.");
        }
    }
}
