//! Enumerations and small value types stored on a learner profile.
//!
//! Wire spellings match the `profiles` collection: roles are lowercase,
//! experience levels are capitalised, subscription tiers are free-form
//! lowercase strings.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when parsing one of the profile enums from text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseProfileFieldError {
    kind: &'static str,
    value: String,
}

impl ParseProfileFieldError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Platform role of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A learner. Every synthesized profile starts here.
    #[default]
    Student,
    /// Authors and teaches courses.
    Instructor,
    /// Full access, including the admin area.
    Admin,
}

impl Role {
    /// Whether this role may enter admin-only routes.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Instructor => write!(f, "instructor"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ParseProfileFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "instructor" => Ok(Self::Instructor),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseProfileFieldError::new("role", s)),
        }
    }
}

/// Self-reported experience level. Ordered from least to most experienced.
///
/// Also used as the difficulty of courses and labs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beginner => write!(f, "Beginner"),
            Self::Intermediate => write!(f, "Intermediate"),
            Self::Advanced => write!(f, "Advanced"),
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = ParseProfileFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseProfileFieldError::new("experience level", s))
    }
}

/// Subscription tier of a profile.
///
/// Only `free` is assigned by this codebase; other tiers are written by
/// billing tooling and are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Enterprise,
    Other(String),
}

impl SubscriptionTier {
    /// Wire spelling of the tier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SubscriptionTier {
    fn from(s: &str) -> Self {
        match s {
            "free" => Self::Free,
            "pro" => Self::Pro,
            "enterprise" => Self::Enterprise,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl Serialize for SubscriptionTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubscriptionTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// Per-channel notification opt-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
}

impl Default for NotificationPreferences {
    /// Email and push on, SMS off.
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            sms: false,
        }
    }
}

/// A single notification channel, for toggling one preference at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationChannel {
    Email,
    Push,
    Sms,
}

impl NotificationPreferences {
    /// Flip one channel, leaving the others as they were.
    #[must_use]
    pub const fn toggled(mut self, channel: NotificationChannel) -> Self {
        match channel {
            NotificationChannel::Email => self.email = !self.email,
            NotificationChannel::Push => self.push = !self.push,
            NotificationChannel::Sms => self.sms = !self.sms,
        }
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"student\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert!(role.is_admin());
        assert!(serde_json::from_str::<Role>("\"owner\"").is_err());
    }

    #[test]
    fn test_role_from_str_round_trips_display() {
        for role in [Role::Student, Role::Instructor, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_experience_level_is_ordered() {
        assert!(ExperienceLevel::Beginner < ExperienceLevel::Intermediate);
        assert!(ExperienceLevel::Intermediate < ExperienceLevel::Advanced);
    }

    #[test]
    fn test_experience_level_parse_is_case_insensitive() {
        assert_eq!(
            "advanced".parse::<ExperienceLevel>().unwrap(),
            ExperienceLevel::Advanced
        );
        let err = "expert".parse::<ExperienceLevel>().unwrap_err();
        assert_eq!(err.to_string(), "invalid experience level: expert");
    }

    #[test]
    fn test_experience_level_wire_format_is_capitalised() {
        let json = serde_json::to_string(&ExperienceLevel::Beginner).unwrap();
        assert_eq!(json, "\"Beginner\"");
    }

    #[test]
    fn test_subscription_tier_keeps_unknown_values() {
        let tier: SubscriptionTier = serde_json::from_str("\"team-2024\"").unwrap();
        assert_eq!(tier, SubscriptionTier::Other("team-2024".to_owned()));
        assert_eq!(serde_json::to_string(&tier).unwrap(), "\"team-2024\"");
    }

    #[test]
    fn test_notification_defaults_disable_sms() {
        let prefs = NotificationPreferences::default();
        assert!(prefs.email && prefs.push && !prefs.sms);
    }

    #[test]
    fn test_toggle_touches_one_channel() {
        let prefs = NotificationPreferences::default().toggled(NotificationChannel::Sms);
        assert_eq!(
            prefs,
            NotificationPreferences {
                email: true,
                push: true,
                sms: true
            }
        );
    }
}
