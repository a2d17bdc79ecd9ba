use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A single vote record: one voter's availability on one candidate date of
/// one event.
///
/// The collection holds at most one record per `(event_id, voter_name,
/// date)`, enforced by a unique index. A voter's whole record set for an
/// event is replaced when they resubmit; records are never accumulated
/// across submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub event_id: Id,
    pub voter_name: String,
    pub date: NaiveDate,
}

impl Vote {
    pub fn new(event_id: Id, voter_name: &str, date: NaiveDate) -> Self {
        Self {
            event_id,
            voter_name: voter_name.to_string(),
            date,
        }
    }
}
