//! Calendar arithmetic for recurring compliance schedules.
//!
//! Month-based frequencies clamp to the last day of the target month, so a
//! schedule due on 31 January becomes due on 28 (or 29) February.

use crate::error::{ComplianceError, ComplianceResult};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How often a compliance schedule recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
    Custom,
}

/// The calendar offset one period of a frequency represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Days(u64),
    Months(u32),
}

impl Frequency {
    pub fn is_recurring(self) -> bool {
        !matches!(self, Frequency::Once)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Once => "once",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::HalfYearly => "half_yearly",
            Frequency::Yearly => "yearly",
            Frequency::Custom => "custom",
        }
    }

    /// Offset for one period, `None` for one-off schedules.
    pub fn period(self, custom_interval_days: Option<u32>) -> ComplianceResult<Option<Period>> {
        let period = match self {
            Frequency::Once => return Ok(None),
            Frequency::Daily => Period::Days(1),
            Frequency::Weekly => Period::Days(7),
            Frequency::Monthly => Period::Months(1),
            Frequency::Quarterly => Period::Months(3),
            Frequency::HalfYearly => Period::Months(6),
            Frequency::Yearly => Period::Months(12),
            Frequency::Custom => match custom_interval_days {
                Some(days) if days >= 1 => Period::Days(u64::from(days)),
                _ => {
                    return Err(ComplianceError::validation(
                        "customIntervalDays must be at least 1 for custom frequency",
                    ))
                }
            },
        };
        Ok(Some(period))
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a frequency / custom interval pair without computing a date.
pub fn validate_interval(frequency: Frequency, custom_interval_days: Option<u32>) -> ComplianceResult<()> {
    frequency.period(custom_interval_days).map(|_| ())
}

/// Next due date of a schedule, advanced from its previous due date.
///
/// Returns `Ok(None)` for one-off schedules.
pub fn calculate_next_due_date(
    previous_due: NaiveDate,
    frequency: Frequency,
    custom_interval_days: Option<u32>,
) -> ComplianceResult<Option<NaiveDate>> {
    let Some(period) = frequency.period(custom_interval_days)? else {
        return Ok(None);
    };
    let next = match period {
        Period::Days(days) => previous_due.checked_add_days(Days::new(days)),
        Period::Months(months) => previous_due.checked_add_months(Months::new(months)),
    };
    next.map(Some)
        .ok_or_else(|| ComplianceError::validation("next due date is out of range"))
}

/// Signed number of days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_based_frequencies() {
        let due = date(2026, 3, 30);
        assert_eq!(
            calculate_next_due_date(due, Frequency::Daily, None).unwrap(),
            Some(date(2026, 3, 31))
        );
        assert_eq!(
            calculate_next_due_date(due, Frequency::Weekly, None).unwrap(),
            Some(date(2026, 4, 6))
        );
        assert_eq!(
            calculate_next_due_date(due, Frequency::Custom, Some(45)).unwrap(),
            Some(date(2026, 5, 14))
        );
    }

    #[test]
    fn test_month_based_frequencies_clamp_to_month_end() {
        assert_eq!(
            calculate_next_due_date(date(2025, 1, 31), Frequency::Monthly, None).unwrap(),
            Some(date(2025, 2, 28))
        );
        assert_eq!(
            calculate_next_due_date(date(2024, 1, 31), Frequency::Monthly, None).unwrap(),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            calculate_next_due_date(date(2025, 11, 30), Frequency::Quarterly, None).unwrap(),
            Some(date(2026, 2, 28))
        );
        assert_eq!(
            calculate_next_due_date(date(2025, 8, 31), Frequency::HalfYearly, None).unwrap(),
            Some(date(2026, 2, 28))
        );
        assert_eq!(
            calculate_next_due_date(date(2024, 2, 29), Frequency::Yearly, None).unwrap(),
            Some(date(2025, 2, 28))
        );
    }

    #[test]
    fn test_once_has_no_next_date() {
        assert_eq!(
            calculate_next_due_date(date(2026, 6, 1), Frequency::Once, None).unwrap(),
            None
        );
        assert!(!Frequency::Once.is_recurring());
        assert!(Frequency::Quarterly.is_recurring());
    }

    #[test]
    fn test_custom_requires_positive_interval() {
        assert!(calculate_next_due_date(date(2026, 6, 1), Frequency::Custom, None).is_err());
        assert!(calculate_next_due_date(date(2026, 6, 1), Frequency::Custom, Some(0)).is_err());
        assert!(validate_interval(Frequency::Custom, Some(14)).is_ok());
        // The interval is ignored for fixed frequencies.
        assert!(validate_interval(Frequency::Monthly, Some(0)).is_ok());
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(date(2026, 1, 1), date(2026, 1, 8)), 7);
        assert_eq!(days_between(date(2026, 1, 8), date(2026, 1, 1)), -7);
    }
}
