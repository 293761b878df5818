//! Health checks: time-boxed status reports attached to a work item.
//!
//! A health check is valid from `reported_on` until `expiration`. Only one
//! check per object may be in force at any instant: recording a new check
//! truncates any earlier check that would still be running at the new
//! check's `reported_on`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::item::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Healthy,
    AtRisk,
    Unhealthy,
}

impl HealthStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::AtRisk => "at-risk",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "healthy" => Ok(Self::Healthy),
            "at-risk" | "atrisk" => Ok(Self::AtRisk),
            "unhealthy" => Ok(Self::Unhealthy),
            _ => Err(ParseEnumError {
                expected: "health status",
                got: s.to_string(),
            }),
        }
    }
}

/// Longest lifetime a health check may be given, in days.
pub const MAX_LIFETIME_DAYS: u32 = 36_500;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HealthCheckError {
    #[error("health check lifetime of {days} days exceeds the {max}-day limit", max = MAX_LIFETIME_DAYS)]
    LifetimeTooLong { days: i64 },

    #[error("expiration {expiration} must be after reported_on {reported_on}")]
    InvalidWindow {
        reported_on: DateTime<Utc>,
        expiration: DateTime<Utc>,
    },

    #[error("health check reported at {reported_on} does not follow the latest check at {latest}")]
    OutOfOrder {
        reported_on: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    #[error("health check belongs to '{actual}', expected '{expected}'")]
    WrongObject { expected: String, actual: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub object_id: String,
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub reported_by: String,
    pub reported_on: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
}

impl HealthCheck {
    /// Build a check, rejecting windows that end at or before they start.
    ///
    /// # Errors
    ///
    /// Returns [`HealthCheckError::InvalidWindow`] if `expiration <= reported_on`.
    pub fn new(
        object_id: impl Into<String>,
        status: HealthStatus,
        reported_by: impl Into<String>,
        reported_on: DateTime<Utc>,
        expiration: DateTime<Utc>,
    ) -> Result<Self, HealthCheckError> {
        if expiration <= reported_on {
            return Err(HealthCheckError::InvalidWindow {
                reported_on,
                expiration,
            });
        }
        Ok(Self {
            object_id: object_id.into(),
            status,
            note: None,
            reported_by: reported_by.into(),
            reported_on,
            expiration,
        })
    }

    /// Build a check that lasts `lifetime` from `reported_on`.
    ///
    /// # Errors
    ///
    /// Returns [`HealthCheckError::InvalidWindow`] for a non-positive lifetime
    /// and [`HealthCheckError::LifetimeTooLong`] past [`MAX_LIFETIME_DAYS`] or
    /// when the expiration is out of range.
    pub fn with_lifetime(
        object_id: impl Into<String>,
        status: HealthStatus,
        reported_by: impl Into<String>,
        reported_on: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<Self, HealthCheckError> {
        let too_long = HealthCheckError::LifetimeTooLong {
            days: lifetime.num_days(),
        };
        if lifetime > Duration::days(i64::from(MAX_LIFETIME_DAYS)) {
            return Err(too_long);
        }
        let expiration = reported_on.checked_add_signed(lifetime).ok_or(too_long)?;
        Self::new(object_id, status, reported_by, reported_on, expiration)
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        self.note = if note.trim().is_empty() {
            None
        } else {
            Some(note.trim().to_string())
        };
        self
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }

    /// Whether this check is in force at `at`.
    #[must_use]
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.reported_on <= at && at < self.expiration
    }
}

/// Every health check recorded against one object, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthHistory {
    object_id: String,
    checks: Vec<HealthCheck>,
}

/// A change the overlap rule made to an existing check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedCheck {
    pub reported_on: DateTime<Utc>,
    pub previous_expiration: DateTime<Utc>,
    pub new_expiration: DateTime<Utc>,
}

impl HealthHistory {
    #[must_use]
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            checks: Vec::new(),
        }
    }

    /// Rebuild a history from stored checks. Input order does not matter.
    #[must_use]
    pub fn from_checks(object_id: impl Into<String>, mut checks: Vec<HealthCheck>) -> Self {
        checks.sort_by_key(|c| c.reported_on);
        Self {
            object_id: object_id.into(),
            checks,
        }
    }

    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    #[must_use]
    pub fn checks(&self) -> &[HealthCheck] {
        &self.checks
    }

    /// The check in force at `now`, if any.
    #[must_use]
    pub fn current(&self, now: DateTime<Utc>) -> Option<&HealthCheck> {
        self.checks.iter().rev().find(|c| c.covers(now))
    }

    /// Append `check`, truncating any earlier check still running at
    /// `check.reported_on`.
    ///
    /// # Errors
    ///
    /// Returns [`HealthCheckError::WrongObject`] if the check targets another
    /// object, or [`HealthCheckError::OutOfOrder`] if it does not come
    /// strictly after the latest recorded check.
    pub fn record(&mut self, check: HealthCheck) -> Result<Vec<TruncatedCheck>, HealthCheckError> {
        if check.object_id != self.object_id {
            return Err(HealthCheckError::WrongObject {
                expected: self.object_id.clone(),
                actual: check.object_id,
            });
        }

        if let Some(latest) = self.checks.last() {
            if check.reported_on <= latest.reported_on {
                return Err(HealthCheckError::OutOfOrder {
                    reported_on: check.reported_on,
                    latest: latest.reported_on,
                });
            }
        }

        let mut truncated = Vec::new();
        for existing in &mut self.checks {
            if existing.expiration > check.reported_on {
                truncated.push(TruncatedCheck {
                    reported_on: existing.reported_on,
                    previous_expiration: existing.expiration,
                    new_expiration: check.reported_on,
                });
                existing.expiration = check.reported_on;
            }
        }

        self.checks.push(check);
        Ok(truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
    }

    fn check(day: u32, days: i64) -> HealthCheck {
        HealthCheck::with_lifetime(
            "wi-1",
            HealthStatus::Healthy,
            "pat",
            at(day),
            Duration::days(days),
        )
        .unwrap()
    }

    #[test]
    fn status_parse_accepts_common_spellings() {
        assert_eq!("At_Risk".parse::<HealthStatus>().unwrap(), HealthStatus::AtRisk);
        assert_eq!("atrisk".parse::<HealthStatus>().unwrap(), HealthStatus::AtRisk);
        assert_eq!(
            serde_json::to_string(&HealthStatus::AtRisk).unwrap(),
            "\"at-risk\""
        );
        assert!("green".parse::<HealthStatus>().is_err());
    }

    #[test]
    fn window_must_be_positive() {
        let err = HealthCheck::new("wi-1", HealthStatus::Healthy, "pat", at(5), at(5)).unwrap_err();
        assert!(matches!(err, HealthCheckError::InvalidWindow { .. }));
        assert!(
            HealthCheck::with_lifetime("wi-1", HealthStatus::Healthy, "pat", at(5), Duration::zero())
                .is_err()
        );
    }

    #[test]
    fn oversized_lifetime_is_rejected_not_overflowed() {
        let err = HealthCheck::with_lifetime(
            "wi-1",
            HealthStatus::Healthy,
            "pat",
            at(1),
            Duration::days(i64::from(u32::MAX)),
        )
        .unwrap_err();
        assert!(matches!(err, HealthCheckError::LifetimeTooLong { .. }));

        let longest = Duration::days(i64::from(MAX_LIFETIME_DAYS));
        let c = HealthCheck::with_lifetime("wi-1", HealthStatus::Healthy, "pat", at(1), longest).unwrap();
        assert_eq!(c.expiration, at(1) + longest);

        let near_end = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        let err = HealthCheck::with_lifetime("wi-1", HealthStatus::Healthy, "pat", near_end, Duration::days(2))
            .unwrap_err();
        assert!(matches!(err, HealthCheckError::LifetimeTooLong { .. }));
    }

    #[test]
    fn expiration_boundary_is_expired() {
        let c = check(1, 2);
        assert!(!c.is_expired(at(2)));
        assert!(c.is_expired(at(3)));
        assert!(c.covers(at(1)));
        assert!(!c.covers(at(3)));
    }

    #[test]
    fn blank_note_is_dropped() {
        let c = check(1, 2).with_note("   ");
        assert!(c.note.is_none());
        let c = check(1, 2).with_note(" vendor delay ");
        assert_eq!(c.note.as_deref(), Some("vendor delay"));
    }

    #[test]
    fn recording_truncates_running_check() {
        let mut history = HealthHistory::new("wi-1");
        assert!(history.record(check(1, 14)).unwrap().is_empty());

        let truncated = history.record(check(4, 14)).unwrap();
        assert_eq!(truncated.len(), 1);
        assert_eq!(truncated[0].previous_expiration, at(15));
        assert_eq!(truncated[0].new_expiration, at(4));

        assert_eq!(history.checks()[0].expiration, at(4));
        assert_eq!(history.current(at(5)).unwrap().reported_on, at(4));
        assert_eq!(history.current(at(2)).unwrap().reported_on, at(1));
    }

    #[test]
    fn recording_leaves_expired_checks_alone() {
        let mut history = HealthHistory::new("wi-1");
        history.record(check(1, 2)).unwrap();
        let truncated = history.record(check(10, 2)).unwrap();
        assert!(truncated.is_empty());
        assert_eq!(history.checks()[0].expiration, at(3));
        assert!(history.current(at(5)).is_none());
    }

    #[test]
    fn out_of_order_check_is_rejected() {
        let mut history = HealthHistory::new("wi-1");
        history.record(check(4, 2)).unwrap();
        let err = history.record(check(4, 3)).unwrap_err();
        assert!(matches!(err, HealthCheckError::OutOfOrder { .. }));
        let err = history.record(check(2, 3)).unwrap_err();
        assert!(matches!(err, HealthCheckError::OutOfOrder { .. }));
        assert_eq!(history.checks().len(), 1);
    }

    #[test]
    fn check_for_other_object_is_rejected() {
        let mut history = HealthHistory::new("wi-2");
        let err = history.record(check(1, 2)).unwrap_err();
        assert!(matches!(err, HealthCheckError::WrongObject { .. }));
    }

    #[test]
    fn from_checks_sorts_by_reported_on() {
        let history = HealthHistory::from_checks("wi-1", vec![check(9, 1), check(2, 1)]);
        assert_eq!(history.checks()[0].reported_on, at(2));
        assert_eq!(history.object_id(), "wi-1");
    }
}
