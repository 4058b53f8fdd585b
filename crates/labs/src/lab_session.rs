//! Countdown timer for a hands-on lab session.
//!
//! ```text
//! Idle --start--> Starting --ready--> Active <--pause/resume--> Paused
//!                                       |
//!                          tick to zero, or end from any state
//!                                       v
//!                                     Ended --reset--> Idle
//! ```
//!
//! The timer itself does not sleep; the caller drives it with one
//! [`LabSession::tick`] per elapsed second while it is active.

use core::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::Lab;

/// How long the environment takes to come up after `start`.
pub const WARM_UP: Duration = Duration::from_secs(3);

/// Remaining time below which the session is about to run out.
const LOW_TIME_SECS: u32 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabSessionState {
    Idle,
    /// Environment warming up.
    Starting,
    Active,
    Paused,
    Ended,
}

impl fmt::Display for LabSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// How much time is left, as a traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Urgency {
    /// More than half left.
    Comfortable,
    /// More than a fifth left.
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabSessionError {
    #[error("cannot {action} a lab session that is {from}")]
    InvalidTransition {
        from: LabSessionState,
        action: &'static str,
    },
}

/// A single lab session countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabSession {
    lab_id: String,
    total_secs: u32,
    remaining_secs: u32,
    state: LabSessionState,
    session_id: Option<String>,
}

impl LabSession {
    #[must_use]
    pub fn new(lab_id: impl Into<String>, minutes: u32) -> Self {
        let total_secs = minutes.saturating_mul(60);
        Self {
            lab_id: lab_id.into(),
            total_secs,
            remaining_secs: total_secs,
            state: LabSessionState::Idle,
            session_id: None,
        }
    }

    /// A session as long as the lab's advertised duration.
    #[must_use]
    pub fn for_lab(lab: &Lab) -> Self {
        Self::new(lab.id.clone(), lab.duration_minutes())
    }

    #[must_use]
    pub const fn state(&self) -> LabSessionState {
        self.state
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub const fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    fn transition(
        &mut self,
        action: &'static str,
        allowed: &[LabSessionState],
        to: LabSessionState,
    ) -> Result<(), LabSessionError> {
        if !allowed.contains(&self.state) {
            return Err(LabSessionError::InvalidTransition {
                from: self.state,
                action,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Begin warming up. Returns the new session id,
    /// `lab-{lab_id}-{unix millis}`.
    ///
    /// # Errors
    ///
    /// Returns `LabSessionError::InvalidTransition` unless idle.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<&str, LabSessionError> {
        self.transition("start", &[LabSessionState::Idle], LabSessionState::Starting)?;
        let id = self
            .session_id
            .insert(format!("lab-{}-{}", self.lab_id, now.timestamp_millis()));
        Ok(id.as_str())
    }

    /// The environment is up; start counting down.
    ///
    /// # Errors
    ///
    /// Returns `LabSessionError::InvalidTransition` unless starting.
    pub fn ready(&mut self) -> Result<(), LabSessionError> {
        self.transition("ready", &[LabSessionState::Starting], LabSessionState::Active)
    }

    /// # Errors
    ///
    /// Returns `LabSessionError::InvalidTransition` unless active.
    pub fn pause(&mut self) -> Result<(), LabSessionError> {
        self.transition("pause", &[LabSessionState::Active], LabSessionState::Paused)
    }

    /// # Errors
    ///
    /// Returns `LabSessionError::InvalidTransition` unless paused.
    pub fn resume(&mut self) -> Result<(), LabSessionError> {
        self.transition("resume", &[LabSessionState::Paused], LabSessionState::Active)
    }

    /// One second has passed. Returns the state afterwards, which is
    /// `Ended` once the time runs out.
    ///
    /// # Errors
    ///
    /// Returns `LabSessionError::InvalidTransition` unless active.
    pub fn tick(&mut self) -> Result<LabSessionState, LabSessionError> {
        if self.state != LabSessionState::Active {
            return Err(LabSessionError::InvalidTransition {
                from: self.state,
                action: "tick",
            });
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.state = LabSessionState::Ended;
        }
        Ok(self.state)
    }

    /// Stop the session early.
    ///
    /// # Errors
    ///
    /// Returns `LabSessionError::InvalidTransition` if already ended.
    pub fn end(&mut self) -> Result<(), LabSessionError> {
        self.transition(
            "end",
            &[
                LabSessionState::Idle,
                LabSessionState::Starting,
                LabSessionState::Active,
                LabSessionState::Paused,
            ],
            LabSessionState::Ended,
        )
    }

    /// Back to idle with the full time, ready for a new session.
    ///
    /// # Errors
    ///
    /// Returns `LabSessionError::InvalidTransition` unless ended.
    pub fn reset(&mut self) -> Result<(), LabSessionError> {
        self.transition("reset", &[LabSessionState::Ended], LabSessionState::Idle)?;
        self.remaining_secs = self.total_secs;
        self.session_id = None;
        Ok(())
    }

    /// Remaining time as `HH:MM:SS`.
    #[must_use]
    pub fn format_remaining(&self) -> String {
        format_hms(self.remaining_secs)
    }

    #[must_use]
    pub fn urgency(&self) -> Urgency {
        // remaining / total > 1/2, > 1/5
        let remaining = u64::from(self.remaining_secs);
        let total = u64::from(self.total_secs);
        if remaining * 2 > total && total > 0 {
            Urgency::Comfortable
        } else if remaining * 5 > total && total > 0 {
            Urgency::Warning
        } else {
            Urgency::Critical
        }
    }

    /// Share of the session used up, 0 to 100.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        if self.total_secs == 0 {
            return 100;
        }
        let used = u64::from(self.total_secs - self.remaining_secs);
        let percent = (used * 100 + u64::from(self.total_secs) / 2) / u64::from(self.total_secs);
        u8::try_from(percent).unwrap_or(100)
    }

    /// Whether less than five minutes are left.
    #[must_use]
    pub const fn is_running_low(&self) -> bool {
        self.remaining_secs < LOW_TIME_SECS
    }
}

/// Format seconds as zero-padded `HH:MM:SS`.
#[must_use]
pub fn format_hms(secs: u32) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
