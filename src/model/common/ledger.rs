//! The per-event vote ledger and the turnout aggregation over it.
//!
//! The ledger is a derived read model: it is rebuilt from the vote records
//! on every query and never cached across requests, so the store stays the
//! single source of truth.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::model::{api::event::VoteGroup, db::Vote};

/// All votes for one event, grouped by candidate date.
///
/// Voter names are deduplicated per date, so a voter who submits the same
/// date twice still counts once.
#[derive(Debug, Default)]
pub struct VoteLedger {
    by_date: BTreeMap<NaiveDate, BTreeSet<String>>,
}

impl VoteLedger {
    /// Group the given vote records by date.
    pub fn new(votes: impl IntoIterator<Item = Vote>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, BTreeSet<String>> = BTreeMap::new();
        for vote in votes {
            by_date.entry(vote.date).or_default().insert(vote.voter_name);
        }
        Self { by_date }
    }

    /// Every date with at least one vote, with the people who voted for it.
    ///
    /// Dates ascend and names are sorted, so the output is deterministic
    /// for a given ledger.
    pub fn vote_groups(&self) -> Vec<VoteGroup> {
        self.by_date
            .iter()
            .map(|(date, people)| VoteGroup::new(*date, people))
            .collect()
    }

    /// The date(s) with the maximum distinct-voter turnout, ties included.
    ///
    /// An event with no votes has no suitable dates; that is an empty
    /// result, not an error.
    pub fn suitable_dates(&self) -> Vec<VoteGroup> {
        let max_turnout = self.by_date.values().map(BTreeSet::len).max().unwrap_or(0);
        if max_turnout == 0 {
            return Vec::new();
        }
        self.by_date
            .iter()
            .filter(|(_, people)| people.len() == max_turnout)
            .map(|(date, people)| VoteGroup::new(*date, people))
            .collect()
    }
}
