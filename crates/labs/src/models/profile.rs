//! Profile records from the `profiles` collection.
//!
//! Three shapes travel over the wire:
//! - [`Profile`] - a stored record, as read back from the store
//! - [`NewProfile`] - the default record synthesized for a first sign-in
//! - [`ProfileChanges`] - a partial update written through by the editor
//!
//! [`ProfileUpdate`] is the editor's form model; it validates into
//! [`ProfileChanges`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use skilltrack_core::{
    Email, ExperienceLevel, NotificationPreferences, Role, SubscriptionTier, UserId,
};

use super::session::AuthUser;

/// Timezone written on synthesized profiles.
pub const DEFAULT_TIMEZONE: &str = "UTC";
/// Language written on synthesized profiles.
pub const DEFAULT_LANGUAGE: &str = "en";

const MAX_FULL_NAME_LENGTH: usize = 100;
const MAX_COMPANY_LENGTH: usize = 100;
const MAX_BIO_LENGTH: usize = 500;
const MAX_LANGUAGE_LENGTH: usize = 10;
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_LENGTH: usize = 20;

/// A stored profile record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub timezone: String,
    pub language: String,
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
    #[serde(default)]
    pub preferences: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub login_count: u32,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Name to greet the user with: the display name, or the email's local
    /// part when no name is set.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.email.local_part())
    }
}

/// The default record inserted the first time an account signs in.
///
/// `created_at`/`updated_at` are left to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub id: UserId,
    pub email: Email,
    pub full_name: String,
    pub role: Role,
    pub experience_level: ExperienceLevel,
    pub timezone: String,
    pub language: String,
    pub notification_preferences: NotificationPreferences,
    pub preferences: serde_json::Map<String, serde_json::Value>,
    pub login_count: u32,
    pub is_verified: bool,
    pub subscription_tier: SubscriptionTier,
}

impl NewProfile {
    /// Default profile for an account.
    ///
    /// Learner role, beginner level, UTC/en, email and push notifications on
    /// with SMS off, no preferences, zero logins, unverified, free tier.
    #[must_use]
    pub fn with_defaults(id: UserId, email: Email, full_name: Option<&str>) -> Self {
        Self {
            id,
            email,
            full_name: full_name.unwrap_or_default().to_owned(),
            role: Role::Student,
            experience_level: ExperienceLevel::Beginner,
            timezone: DEFAULT_TIMEZONE.to_owned(),
            language: DEFAULT_LANGUAGE.to_owned(),
            notification_preferences: NotificationPreferences::default(),
            preferences: serde_json::Map::new(),
            login_count: 0,
            is_verified: false,
            subscription_tier: SubscriptionTier::Free,
        }
    }

    /// Default profile for the signed-in account.
    ///
    /// Returns `None` if the account has no email to put on the profile.
    #[must_use]
    pub fn for_user(user: &AuthUser) -> Option<Self> {
        let email = user.email.clone()?;
        Some(Self::with_defaults(
            user.id,
            email,
            user.display_name_hint(),
        ))
    }

    /// Materialise the record the way the store would, stamping both
    /// timestamps with `now`.
    #[must_use]
    pub fn into_profile(self, now: DateTime<Utc>) -> Profile {
        Profile {
            id: self.id,
            email: self.email,
            full_name: Some(self.full_name),
            avatar_url: None,
            role: self.role,
            company: None,
            experience_level: self.experience_level,
            bio: None,
            phone: None,
            timezone: self.timezone,
            language: self.language,
            notification_preferences: self.notification_preferences,
            preferences: self.preferences,
            last_login: None,
            login_count: self.login_count,
            is_verified: self.is_verified,
            subscription_tier: self.subscription_tier,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A partial update of the editable profile fields.
///
/// `None` leaves a field untouched; for nullable text fields `Some(None)`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_preferences: Option<NotificationPreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileChanges {
    /// Apply these changes to a record in place.
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(full_name) = &self.full_name {
            profile.full_name.clone_from(full_name);
        }
        if let Some(phone) = &self.phone {
            profile.phone.clone_from(phone);
        }
        if let Some(company) = &self.company {
            profile.company.clone_from(company);
        }
        if let Some(bio) = &self.bio {
            profile.bio.clone_from(bio);
        }
        if let Some(level) = self.experience_level {
            profile.experience_level = level;
        }
        if let Some(timezone) = &self.timezone {
            profile.timezone.clone_from(timezone);
        }
        if let Some(language) = &self.language {
            profile.language.clone_from(language);
        }
        if let Some(prefs) = self.notification_preferences {
            profile.notification_preferences = prefs;
        }
        if let Some(updated_at) = self.updated_at {
            profile.updated_at = updated_at;
        }
    }
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

/// Validation failures for a profile edit, one entry per offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid profile: {}", format_field_errors(.0))]
pub struct ValidationError(pub Vec<FieldError>);

impl ValidationError {
    /// Whether `field` is among the failures.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// The profile editor's form.
///
/// Text fields are plain strings as typed; blank optional fields clear the
/// stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub phone: String,
    pub company: String,
    pub bio: String,
    pub experience_level: ExperienceLevel,
    pub timezone: String,
    pub language: String,
    pub notification_preferences: NotificationPreferences,
}

impl ProfileUpdate {
    /// Prefill the form from a stored profile.
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            full_name: profile.full_name.clone().unwrap_or_default(),
            phone: profile.phone.clone().unwrap_or_default(),
            company: profile.company.clone().unwrap_or_default(),
            bio: profile.bio.clone().unwrap_or_default(),
            experience_level: profile.experience_level,
            timezone: profile.timezone.clone(),
            language: profile.language.clone(),
            notification_preferences: profile.notification_preferences,
        }
    }

    /// Check the form and turn it into a write-through payload stamped with
    /// `now`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` listing every field that failed.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<ProfileChanges, ValidationError> {
        let mut errors = Vec::new();

        check_length(&mut errors, "full_name", &self.full_name, MAX_FULL_NAME_LENGTH);
        check_length(&mut errors, "company", &self.company, MAX_COMPANY_LENGTH);
        check_length(&mut errors, "bio", &self.bio, MAX_BIO_LENGTH);
        check_phone(&mut errors, &self.phone);

        if self.timezone.trim().is_empty() {
            errors.push(FieldError {
                field: "timezone",
                reason: "is required".to_owned(),
            });
        }
        let language = self.language.trim();
        if language.is_empty() {
            errors.push(FieldError {
                field: "language",
                reason: "is required".to_owned(),
            });
        } else if language.chars().count() > MAX_LANGUAGE_LENGTH {
            errors.push(FieldError {
                field: "language",
                reason: format!("must be at most {MAX_LANGUAGE_LENGTH} characters"),
            });
        }

        if !errors.is_empty() {
            return Err(ValidationError(errors));
        }

        Ok(ProfileChanges {
            full_name: Some(non_blank(&self.full_name)),
            phone: Some(non_blank(&self.phone)),
            company: Some(non_blank(&self.company)),
            bio: Some(non_blank(&self.bio)),
            experience_level: Some(self.experience_level),
            timezone: Some(self.timezone.trim().to_owned()),
            language: Some(language.to_owned()),
            notification_preferences: Some(self.notification_preferences),
            updated_at: Some(now),
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn check_length(errors: &mut Vec<FieldError>, field: &'static str, value: &str, max: usize) {
    if value.trim().chars().count() > max {
        errors.push(FieldError {
            field,
            reason: format!("must be at most {max} characters"),
        });
    }
}

fn check_phone(errors: &mut Vec<FieldError>, phone: &str) {
    let phone = phone.trim();
    if phone.is_empty() {
        return;
    }

    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();

    if !allowed {
        errors.push(FieldError {
            field: "phone",
            reason: "may only contain digits, spaces and + - ( )".to_owned(),
        });
    } else if phone.len() > MAX_PHONE_LENGTH || digits < MIN_PHONE_DIGITS {
        errors.push(FieldError {
            field: "phone",
            reason: format!(
                "must have at least {MIN_PHONE_DIGITS} digits and at most {MAX_PHONE_LENGTH} characters"
            ),
        });
    }
}
