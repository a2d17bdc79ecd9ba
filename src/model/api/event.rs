use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{api::id::ApiId, common::date, common::ledger::VoteLedger, db::Event};

/// Upper bound on candidate dates per event. Exceeding it is a policy
/// violation rather than a malformed request.
pub const MAX_CANDIDATE_DATES: usize = 10;

/// Longest accepted event or voter name.
pub const MAX_NAME_LENGTH: usize = 255;

/// An event creation request: a name plus the candidate dates offered for
/// voting.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventSpec {
    /// Event name.
    pub name: String,
    /// Candidate dates in `YYYY-MM-DD` form.
    pub dates: Vec<String>,
}

impl EventSpec {
    /// Run the creation checks in order; the first failure wins and nothing
    /// is persisted for a rejected request.
    ///
    /// On success returns the trimmed name and the parsed candidate dates,
    /// sorted ascending.
    pub fn validate(&self, today: NaiveDate) -> Result<(String, Vec<NaiveDate>)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::validation("Event name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(Error::validation("Event name cannot exceed 255 characters"));
        }

        if self.dates.is_empty() {
            return Err(Error::validation("Event must have at least one date option"));
        }
        if self.dates.len() > MAX_CANDIDATE_DATES {
            return Err(Error::business_rule(
                "Event cannot have more than 10 date options",
            ));
        }

        let mut parsed = Vec::with_capacity(self.dates.len());
        let mut malformed = Vec::new();
        for raw in &self.dates {
            match date::parse_canonical_date(raw) {
                Some(date) => parsed.push(date),
                None => malformed.push(raw.as_str()),
            }
        }
        if !malformed.is_empty() {
            return Err(Error::validation(format!(
                "Invalid date format: {}. Use YYYY-MM-DD format.",
                malformed.join(", ")
            )));
        }

        let past = parsed
            .iter()
            .copied()
            .filter(|date| date::is_past_date(*date, today))
            .collect::<Vec<_>>();
        if !past.is_empty() {
            return Err(Error::validation(format!(
                "Cannot create event with past dates: {}",
                format_dates(&past)
            )));
        }

        let mut dates = parsed.clone();
        dates.sort_unstable();
        dates.dedup();
        if dates.len() != parsed.len() {
            return Err(Error::validation("Event dates must be unique"));
        }

        Ok((name.to_string(), dates))
    }
}

/// A vote submission: the participant's name and every candidate date they
/// can attend. Replaces any previous submission by the same participant.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteSpec {
    /// Participant name.
    pub name: String,
    /// Dates voted for, in `YYYY-MM-DD` form.
    pub votes: Vec<String>,
}

impl VoteSpec {
    /// Check the submission against the event's candidate dates; the first
    /// failure wins and no vote is recorded for a rejected request.
    ///
    /// On success returns the trimmed voter name and the parsed vote dates,
    /// deduplicated and sorted ascending. A date matches a candidate date
    /// iff their canonical forms are equal.
    pub fn validate(&self, event: &Event) -> Result<(String, Vec<NaiveDate>)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::validation("Voter name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(Error::validation("Voter name cannot exceed 255 characters"));
        }

        if self.votes.is_empty() {
            return Err(Error::validation("Must vote for at least one date"));
        }

        let mut accepted = Vec::with_capacity(self.votes.len());
        let mut invalid = Vec::new();
        for raw in &self.votes {
            match date::parse_canonical_date(raw) {
                Some(date) if event.dates.contains(&date) => accepted.push(date),
                _ => invalid.push(raw.as_str()),
            }
        }
        if !invalid.is_empty() {
            return Err(Error::validation(format!(
                "Invalid vote dates: {}. Must be one of: {}.",
                invalid.join(", "),
                format_dates(&event.dates)
            )));
        }

        accepted.sort_unstable();
        accepted.dedup();
        Ok((name.to_string(), accepted))
    }
}

fn format_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|date| date.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A summary row in the event listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Event unique ID.
    pub id: ApiId,
    /// Event name.
    pub name: String,
}

/// The event listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventList {
    pub events: Vec<EventSummary>,
}

/// Response to a successful creation: just the fresh ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: ApiId,
}

/// One candidate date with the people who voted for it, deduplicated and
/// sorted lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteGroup {
    pub date: NaiveDate,
    pub people: Vec<String>,
}

impl VoteGroup {
    pub(crate) fn new(date: NaiveDate, people: &BTreeSet<String>) -> Self {
        Self {
            date,
            people: people.iter().cloned().collect(),
        }
    }
}

/// Full event detail: the candidate dates plus the current votes grouped by
/// date. Only dates with at least one vote appear under `votes`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventDetail {
    /// Event unique ID.
    pub id: ApiId,
    /// Event name.
    pub name: String,
    /// Candidate dates, ascending.
    pub dates: Vec<NaiveDate>,
    /// Current votes grouped by date.
    pub votes: Vec<VoteGroup>,
}

impl EventDetail {
    pub fn new(event: Event, ledger: &VoteLedger) -> Self {
        Self {
            id: event.id.into(),
            votes: ledger.vote_groups(),
            name: event.event.name,
            dates: event.event.dates,
        }
    }
}

/// The outcome of an event: every candidate date that reached the maximum
/// distinct-voter turnout. Empty when no votes have been recorded.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResults {
    /// Event unique ID.
    pub id: ApiId,
    /// Event name.
    pub name: String,
    /// The best-attended date(s), ties included.
    pub suitable_dates: Vec<VoteGroup>,
}

impl EventResults {
    pub fn new(event: Event, ledger: &VoteLedger) -> Self {
        Self {
            id: event.id.into(),
            name: event.event.name,
            suitable_dates: ledger.suitable_dates(),
        }
    }
}
