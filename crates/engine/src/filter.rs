//! Filter engine: selects the recipients due for a reminder.

use chrono::{Local, NaiveDate, TimeDelta};

use herald_common::types::RecipientRecord;

/// Source of "today" for a dispatch run.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// The hearing date a run sends reminders for: `today + lookahead_days`.
/// `None` when the result falls outside the representable calendar.
pub fn reference_date(today: NaiveDate, lookahead_days: i64) -> Option<NaiveDate> {
    today.checked_add_signed(TimeDelta::try_days(lookahead_days)?)
}

/// Records in a dispatchable category whose hearing falls on `reference`,
/// in input order. Records without a parseable date never match.
pub fn due(records: &[RecipientRecord], reference: NaiveDate) -> Vec<&RecipientRecord> {
    records
        .iter()
        .filter(|r| r.category.is_dispatchable() && r.next_hearing_date == Some(reference))
        .collect()
}
