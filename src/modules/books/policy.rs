//! Loan period and fine rules. Both come from configuration; nothing here
//! assumes a particular school's policy.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use school_kernel::settings::{FineSettings, LibrarySettings};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("library.loan_period_days must be configured")]
    MissingLoanPeriod,

    #[error("library.loan_period_days must be at least 1")]
    EmptyLoanPeriod,

    #[error("library.fine amounts must not be negative")]
    NegativeFine,
}

/// Computes the fine owed for a late return.
pub trait FinePolicy: fmt::Debug + Send + Sync {
    fn fine(&self, days_overdue: u32) -> Decimal;
}

/// Returns never carry a fine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFine;

impl FinePolicy for NoFine {
    fn fine(&self, _days_overdue: u32) -> Decimal {
        Decimal::ZERO
    }
}

/// Flat amount per day overdue, optionally capped.
#[derive(Debug, Clone, Copy)]
pub struct DailyFine {
    pub per_day: Decimal,
    pub cap: Option<Decimal>,
}

impl FinePolicy for DailyFine {
    fn fine(&self, days_overdue: u32) -> Decimal {
        let fine = self.per_day * Decimal::from(days_overdue);
        match self.cap {
            Some(cap) => fine.min(cap),
            None => fine,
        }
    }
}

/// Started days between `due` and `returned_at`; zero when on time.
pub fn days_overdue(due: OffsetDateTime, returned_at: OffsetDateTime) -> u32 {
    if returned_at <= due {
        return 0;
    }
    let late = returned_at - due;
    let whole = late.whole_days();
    let started = if late > Duration::days(whole) { whole + 1 } else { whole };
    u32::try_from(started).unwrap_or(u32::MAX)
}

/// Everything the workflow needs to know about the school's rules.
#[derive(Debug, Clone)]
pub struct LibraryPolicy {
    loan_period: Duration,
    fine: Arc<dyn FinePolicy>,
    deny_delete_with_open_loans: bool,
}

impl LibraryPolicy {
    pub fn new(loan_period: Duration, fine: Arc<dyn FinePolicy>, deny_delete_with_open_loans: bool) -> Self {
        Self {
            loan_period,
            fine,
            deny_delete_with_open_loans,
        }
    }

    pub fn from_settings(settings: &LibrarySettings) -> Result<Self, PolicyError> {
        let days = settings
            .loan_period_days
            .ok_or(PolicyError::MissingLoanPeriod)?;
        if days == 0 {
            return Err(PolicyError::EmptyLoanPeriod);
        }

        let fine: Arc<dyn FinePolicy> = match &settings.fine {
            FineSettings::None => Arc::new(NoFine),
            FineSettings::Daily { per_day, cap } => {
                if per_day.is_sign_negative() || cap.is_some_and(|c| c.is_sign_negative()) {
                    return Err(PolicyError::NegativeFine);
                }
                Arc::new(DailyFine {
                    per_day: *per_day,
                    cap: *cap,
                })
            }
        };

        Ok(Self::new(
            Duration::days(i64::from(days)),
            fine,
            settings.deny_delete_with_open_loans,
        ))
    }

    pub fn due_date(&self, issued_at: OffsetDateTime) -> OffsetDateTime {
        issued_at + self.loan_period
    }

    pub fn fine_for(&self, due: OffsetDateTime, returned_at: OffsetDateTime) -> Decimal {
        match days_overdue(due, returned_at) {
            0 => Decimal::ZERO,
            days => self.fine.fine(days),
        }
    }

    pub fn deny_delete_with_open_loans(&self) -> bool {
        self.deny_delete_with_open_loans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use time::macros::datetime;

    fn settings(days: Option<u32>, fine: FineSettings) -> LibrarySettings {
        LibrarySettings {
            loan_period_days: days,
            fine,
            ..LibrarySettings::default()
        }
    }

    #[test]
    fn loan_period_is_required() {
        let err = LibraryPolicy::from_settings(&settings(None, FineSettings::None)).unwrap_err();
        assert_eq!(err, PolicyError::MissingLoanPeriod);

        let err = LibraryPolicy::from_settings(&settings(Some(0), FineSettings::None)).unwrap_err();
        assert_eq!(err, PolicyError::EmptyLoanPeriod);
    }

    #[test]
    fn negative_fine_is_rejected() {
        let fine = FineSettings::Daily {
            per_day: Decimal::from(-5),
            cap: None,
        };
        assert_eq!(
            LibraryPolicy::from_settings(&settings(Some(7), fine)).unwrap_err(),
            PolicyError::NegativeFine
        );
    }

    #[test]
    fn due_date_adds_configured_period() {
        let policy = LibraryPolicy::from_settings(&settings(Some(10), FineSettings::None)).unwrap();
        assert_eq!(
            policy.due_date(datetime!(2026-03-01 09:30 UTC)),
            datetime!(2026-03-11 09:30 UTC)
        );
    }

    #[test]
    fn partial_days_count_as_started_days() {
        let due = datetime!(2026-03-10 12:00 UTC);
        assert_eq!(days_overdue(due, datetime!(2026-03-09 12:00 UTC)), 0);
        assert_eq!(days_overdue(due, due), 0);
        assert_eq!(days_overdue(due, datetime!(2026-03-10 12:01 UTC)), 1);
        assert_eq!(days_overdue(due, datetime!(2026-03-12 12:00 UTC)), 2);
        assert_eq!(days_overdue(due, datetime!(2026-03-12 13:00 UTC)), 3);
    }

    #[test]
    fn daily_fine_is_capped() {
        let fine = FineSettings::Daily {
            per_day: Decimal::from_str("2.50").unwrap(),
            cap: Some(Decimal::from(10)),
        };
        let policy = LibraryPolicy::from_settings(&settings(Some(7), fine)).unwrap();
        let due = datetime!(2026-03-10 00:00 UTC);

        assert_eq!(policy.fine_for(due, datetime!(2026-03-09 00:00 UTC)), Decimal::ZERO);
        assert_eq!(
            policy.fine_for(due, datetime!(2026-03-12 00:00 UTC)),
            Decimal::from_str("5.00").unwrap()
        );
        assert_eq!(
            policy.fine_for(due, datetime!(2026-04-30 00:00 UTC)),
            Decimal::from(10)
        );
    }

    #[test]
    fn no_fine_policy_is_always_zero() {
        let policy = LibraryPolicy::from_settings(&settings(Some(7), FineSettings::None)).unwrap();
        let due = datetime!(2026-03-10 00:00 UTC);
        assert_eq!(policy.fine_for(due, datetime!(2027-01-01 00:00 UTC)), Decimal::ZERO);
    }
}
