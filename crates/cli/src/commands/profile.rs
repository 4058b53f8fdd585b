//! Profile commands.
//!
//! # Usage
//!
//! ```bash
//! skilltrack profile show
//! skilltrack profile update --company "Acme" --phone "+1 555 0100"
//! skilltrack profile update --bio ""            # clear the bio
//! skilltrack profile update --sms-notifications true
//! ```

use clap::Args;
use skilltrack_core::ExperienceLevel;
use skilltrack_labs::error::LabsError;
use skilltrack_labs::models::{Profile, ProfileUpdate};
use skilltrack_labs::services::ProfileError;
use skilltrack_labs::state::AppState;

use super::CommandError;

/// Fields to change. Anything left out keeps its current value.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(long)]
    pub full_name: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub company: Option<String>,

    #[arg(long)]
    pub bio: Option<String>,

    #[arg(long)]
    pub experience: Option<ExperienceLevel>,

    /// IANA timezone name, e.g. `Europe/Berlin`
    #[arg(long)]
    pub timezone: Option<String>,

    /// Language tag, e.g. `en` or `pt-BR`
    #[arg(long)]
    pub language: Option<String>,

    #[arg(long)]
    pub email_notifications: Option<bool>,

    #[arg(long)]
    pub push_notifications: Option<bool>,

    #[arg(long)]
    pub sms_notifications: Option<bool>,
}

impl UpdateArgs {
    fn apply_to(self, form: &mut ProfileUpdate) {
        let text = [
            (self.full_name, &mut form.full_name),
            (self.phone, &mut form.phone),
            (self.company, &mut form.company),
            (self.bio, &mut form.bio),
            (self.timezone, &mut form.timezone),
            (self.language, &mut form.language),
        ];
        for (value, field) in text {
            if let Some(value) = value {
                *field = value;
            }
        }

        if let Some(level) = self.experience {
            form.experience_level = level;
        }

        let prefs = &mut form.notification_preferences;
        prefs.email = self.email_notifications.unwrap_or(prefs.email);
        prefs.push = self.push_notifications.unwrap_or(prefs.push);
        prefs.sms = self.sms_notifications.unwrap_or(prefs.sms);
    }
}

pub async fn show(state: &AppState) -> Result<(), CommandError> {
    let snapshot = state.bootstrapper().wait_until_loaded().await;
    if !snapshot.is_signed_in() {
        return Err(LabsError::NotSignedIn.into());
    }
    let profile = snapshot.profile.ok_or(ProfileError::NoProfile)?;
    print_profile(&profile);
    Ok(())
}

pub async fn update(state: &AppState, args: UpdateArgs) -> Result<(), CommandError> {
    let snapshot = state.bootstrapper().wait_until_loaded().await;
    if !snapshot.is_signed_in() {
        return Err(LabsError::NotSignedIn.into());
    }

    let editor = state.profile_editor();
    let mut form = editor.form().ok_or(ProfileError::NoProfile)?;
    args.apply_to(&mut form);

    let profile = editor.save(&form).await?;
    tracing::info!(user_id = %profile.id, "Profile saved");
    println!("Profile updated.");
    print_profile(&profile);
    Ok(())
}

fn print_profile(profile: &Profile) {
    let or_dash = |value: Option<&str>| value.unwrap_or("-").to_owned();
    let on_off = |enabled: bool| if enabled { "on" } else { "off" };
    let prefs = profile.notification_preferences;

    println!("{} <{}>", profile.display_name(), profile.email);
    println!("  Role:           {}", profile.role);
    println!("  Experience:     {}", profile.experience_level);
    println!("  Company:        {}", or_dash(profile.company.as_deref()));
    println!("  Phone:          {}", or_dash(profile.phone.as_deref()));
    println!("  Bio:            {}", or_dash(profile.bio.as_deref()));
    println!("  Timezone:       {}", profile.timezone);
    println!("  Language:       {}", profile.language);
    println!(
        "  Notifications:  email {}, push {}, sms {}",
        on_off(prefs.email),
        on_off(prefs.push),
        on_off(prefs.sms)
    );
    println!("  Plan:           {}", profile.subscription_tier);
    println!("  Member since:   {}", profile.created_at.format("%Y-%m-%d"));
}
