//! Counter record: the single persisted entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// How often a counter returns to its reset value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResetFrequency {
    #[default]
    Never,
    Daily,
    Weekly,
    Monthly,
}

impl ResetFrequency {
    pub const ALL: [ResetFrequency; 4] = [
        ResetFrequency::Never,
        ResetFrequency::Daily,
        ResetFrequency::Weekly,
        ResetFrequency::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResetFrequency::Never => "never",
            ResetFrequency::Daily => "daily",
            ResetFrequency::Weekly => "weekly",
            ResetFrequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for ResetFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetFrequency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(ResetFrequency::Never),
            "daily" => Ok(ResetFrequency::Daily),
            "weekly" => Ok(ResetFrequency::Weekly),
            "monthly" => Ok(ResetFrequency::Monthly),
            other => Err(ValidationError::UnknownFrequency(other.to_string())),
        }
    }
}

/// A named counter with optional goal and periodic reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub id: Uuid,
    pub title: String,
    pub value: i64,
    /// Applied per tap. Expected to be >= 1; not clamped here.
    pub step_increment: i64,
    pub goal: Option<i64>,
    pub color_name: String,
    pub reset_value: i64,
    pub reset_frequency: ResetFrequency,
    /// Anchor for due-ness. Only the reset applier moves it forward.
    pub last_reset_date: DateTime<Utc>,
    pub last_updated_date: DateTime<Utc>,
    pub sort_order: i64,
    /// Minimum rendered width; the value is zero-padded to it.
    pub digit_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Counter {
    /// Create a counter with the edit form's defaults.
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            value: 0,
            step_increment: 1,
            goal: None,
            color_name: "blue".into(),
            reset_value: 0,
            reset_frequency: ResetFrequency::Never,
            last_reset_date: now,
            last_updated_date: now,
            sort_order: 0,
            digit_count: 1,
            created_at: now,
        }
    }

    pub fn increment(&mut self, now: DateTime<Utc>) {
        self.value = self.value.saturating_add(self.step_increment);
        self.last_updated_date = now;
    }

    pub fn decrement(&mut self, now: DateTime<Utc>) {
        self.value = self.value.saturating_sub(self.step_increment);
        self.last_updated_date = now;
    }

    /// A counter with a goal is complete once its value reaches it.
    pub fn is_complete(&self) -> bool {
        self.goal.is_some_and(|goal| self.value >= goal)
    }

    /// Fraction of the goal reached, clamped to `0.0..=1.0`.
    ///
    /// Returns `None` without a positive goal.
    pub fn progress(&self) -> Option<f64> {
        let goal = self.goal.filter(|g| *g > 0)?;
        Some((self.value as f64 / goal as f64).clamp(0.0, 1.0))
    }

    /// Value zero-padded to `digit_count`, with the sign outside the padding.
    pub fn formatted_value(&self) -> String {
        format_padded(self.value, self.digit_count)
    }

    /// Check the fields the edit form is expected to enforce.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.step_increment < 1 {
            return Err(ValidationError::InvalidValue {
                field: "step_increment".into(),
                message: format!("must be at least 1, got {}", self.step_increment),
            });
        }
        if self.digit_count < 1 {
            return Err(ValidationError::InvalidValue {
                field: "digit_count".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

pub(crate) fn format_padded(value: i64, digit_count: u32) -> String {
    let width = digit_count.max(1) as usize;
    let digits = format!("{:0width$}", value.unsigned_abs(), width = width);
    if value < 0 {
        format!("-{digits}")
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn new_counter_uses_form_defaults() {
        let c = Counter::new("Water", at());
        assert_eq!(c.value, 0);
        assert_eq!(c.step_increment, 1);
        assert_eq!(c.reset_frequency, ResetFrequency::Never);
        assert_eq!(c.last_reset_date, at());
        assert_eq!(c.created_at, at());
        assert!(c.goal.is_none());
    }

    #[test]
    fn increment_and_decrement_apply_step() {
        let mut c = Counter::new("Push-ups", at());
        c.step_increment = 5;
        let later = at() + chrono::Duration::minutes(3);
        c.increment(later);
        c.increment(later);
        c.decrement(later);
        assert_eq!(c.value, 5);
        assert_eq!(c.last_updated_date, later);
        assert_eq!(c.last_reset_date, at());
    }

    #[test]
    fn value_can_go_negative() {
        let mut c = Counter::new("Balance", at());
        c.decrement(at());
        assert_eq!(c.value, -1);
    }

    #[test]
    fn completion_and_progress_follow_goal() {
        let mut c = Counter::new("Steps", at());
        assert!(!c.is_complete());
        assert!(c.progress().is_none());

        c.goal = Some(8);
        c.value = 4;
        assert!(!c.is_complete());
        assert_eq!(c.progress(), Some(0.5));

        c.value = 9;
        assert!(c.is_complete());
        assert_eq!(c.progress(), Some(1.0));
    }

    #[test]
    fn formatted_value_pads_digits() {
        let mut c = Counter::new("Pad", at());
        c.digit_count = 3;
        c.value = 7;
        assert_eq!(c.formatted_value(), "007");
        c.value = -7;
        assert_eq!(c.formatted_value(), "-007");
        c.value = 12345;
        assert_eq!(c.formatted_value(), "12345");
    }

    #[test]
    fn validate_rejects_zero_step() {
        let mut c = Counter::new("Bad", at());
        c.step_increment = 0;
        assert!(c.validate().is_err());
        c.step_increment = 1;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn frequency_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<ResetFrequency>(), Ok(ResetFrequency::Weekly));
        assert!("hourly".parse::<ResetFrequency>().is_err());
        for f in ResetFrequency::ALL {
            assert_eq!(f.as_str().parse::<ResetFrequency>(), Ok(f));
        }
    }
}
