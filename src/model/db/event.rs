use std::ops::{Deref, DerefMut};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// An event from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub event: EventCore,
}

impl Event {
    /// Build a fresh event with a random ID.
    ///
    /// `dates` must already be validated: non-empty, deduplicated and
    /// sorted ascending.
    pub fn new(name: String, dates: Vec<NaiveDate>) -> Self {
        Self {
            id: Id::new(),
            event: EventCore {
                name,
                dates,
                created_at: Utc::now(),
            },
        }
    }
}

impl Deref for Event {
    type Target = EventCore;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl DerefMut for Event {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.event
    }
}

/// The stored body of an event.
///
/// Candidate dates are embedded in the event document: they are immutable,
/// bounded, and must never exist without their event, so a single insert
/// covers both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCore {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}
