//! Candidate-date validation.
//!
//! Dates have day granularity and a single canonical textual form
//! (`YYYY-MM-DD`); two dates are equal iff their canonical forms match.

use chrono::NaiveDate;

/// The canonical textual form of a candidate date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a date in canonical `YYYY-MM-DD` form.
///
/// Returns `None` for any other textual form and for strings that do not
/// name a real calendar day (e.g. `2024-02-30`).
pub fn parse_canonical_date(s: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(s, DATE_FORMAT).ok()?;
    // `parse_from_str` accepts unpadded components; round-trip to enforce
    // the canonical form.
    (date.format(DATE_FORMAT).to_string() == s).then_some(date)
}

/// Whether `s` is a real calendar date in canonical form.
pub fn is_valid_calendar_date(s: &str) -> bool {
    parse_canonical_date(s).is_some()
}

/// Whether `date` is strictly before the start of `today`.
///
/// Day granularity: the time of day never affects the comparison.
pub fn is_past_date(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}
