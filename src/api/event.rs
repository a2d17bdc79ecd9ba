use std::time::Instant;

use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions, Client};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::model::{
    api::event::{
        CreatedEvent, EventDetail, EventList, EventResults, EventSpec, EventSummary, VoteSpec,
    },
    common::ledger::VoteLedger,
    db::{Event, Vote},
    mongodb::{Coll, Id, MongoCollection},
};

pub fn routes() -> Vec<Route> {
    routes![list_events, create_event, get_event, add_vote, get_results]
}

#[get("/event/list")]
async fn list_events(events: Coll<Event>) -> Result<Json<EventList>> {
    let oldest_first = FindOptions::builder().sort(doc! {"created_at": 1}).build();
    let events = events
        .find(None, oldest_first)
        .await?
        .try_collect::<Vec<_>>()
        .await?;

    let events = events
        .into_iter()
        .map(|event| EventSummary {
            id: event.id.into(),
            name: event.event.name,
        })
        .collect();

    Ok(Json(EventList { events }))
}

#[post("/event", data = "<spec>", format = "json")]
async fn create_event(
    spec: Json<EventSpec>,
    events: Coll<Event>,
    metrics: &State<Box<dyn Metrics>>,
) -> Result<Json<CreatedEvent>> {
    // Reject before anything is written; first failure wins.
    let today = Utc::now().date_naive();
    let (name, dates) = spec.validate(today)?;

    // The candidate dates are embedded in the event document, so the event
    // and its dates cannot be persisted separately.
    let event = Event::new(name, dates);
    let started = Instant::now();
    events.insert_one(&event, None).await?;
    metrics.record_storage_op("insert", Event::NAME, started.elapsed());

    info!("Created event {} - {}", event.id, event.event.name);
    Ok(Json(CreatedEvent {
        id: event.id.into(),
    }))
}

#[get("/event/<event_id>")]
async fn get_event(
    event_id: Id,
    events: Coll<Event>,
    votes: Coll<Vote>,
) -> Result<Json<EventDetail>> {
    let event = event_by_id(event_id, &events).await?;
    let ledger = ledger_for_event(event_id, &votes).await?;
    Ok(Json(EventDetail::new(event, &ledger)))
}

#[post("/event/<event_id>/vote", data = "<spec>", format = "json")]
async fn add_vote(
    event_id: Id,
    spec: Json<VoteSpec>,
    events: Coll<Event>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
    metrics: &State<Box<dyn Metrics>>,
) -> Result<Json<EventDetail>> {
    let event = event_by_id(event_id, &events).await?;
    let (voter_name, dates) = spec.validate(&event)?;

    let new_votes = dates
        .into_iter()
        .map(|date| Vote::new(event_id, &voter_name, date))
        .collect::<Vec<_>>();

    // Replace the voter's whole vote set in one transaction: a concurrent
    // reader sees either the old set or the new one, never the gap between
    // the delete and the insert.
    let started = Instant::now();
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;
        votes
            .delete_many_with_session(
                doc! {"event_id": event_id, "voter_name": &voter_name},
                None,
                &mut session,
            )
            .await?;
        votes
            .insert_many_with_session(&new_votes, None, &mut session)
            .await?;
        session.commit_transaction().await?;
    }
    metrics.record_storage_op("replace", Vote::NAME, started.elapsed());

    info!(
        "Recorded {} vote(s) for event {event_id} by {voter_name}",
        new_votes.len()
    );

    let ledger = ledger_for_event(event_id, &votes).await?;
    Ok(Json(EventDetail::new(event, &ledger)))
}

#[get("/event/<event_id>/results")]
async fn get_results(
    event_id: Id,
    events: Coll<Event>,
    votes: Coll<Vote>,
) -> Result<Json<EventResults>> {
    let event = event_by_id(event_id, &events).await?;
    let ledger = ledger_for_event(event_id, &votes).await?;
    Ok(Json(EventResults::new(event, &ledger)))
}

/// Look up an event, mapping absence to the not-found kind rather than a
/// silently empty success.
async fn event_by_id(event_id: Id, events: &Coll<Event>) -> Result<Event> {
    events
        .find_one(event_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Event with ID '{event_id}'")))
}

/// Rebuild the vote ledger for one event from its vote records.
async fn ledger_for_event(event_id: Id, votes: &Coll<Vote>) -> Result<VoteLedger> {
    let records = votes
        .find(doc! {"event_id": event_id}, None)
        .await?
        .try_collect::<Vec<_>>()
        .await?;
    Ok(VoteLedger::new(records))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, NaiveDate};
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, serde_json, serde_json::Value},
    };

    use crate::model::api::event::VoteGroup;

    use super::*;

    /// A date `days` from now, in canonical form. Tests use offsets into
    /// the future so the past-date rule never trips on real data.
    fn future_date(days: i64) -> String {
        (Utc::now().date_naive() + Duration::days(days)).to_string()
    }

    fn naive(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn event_spec(name: &str, dates: &[String]) -> EventSpec {
        EventSpec {
            name: name.to_string(),
            dates: dates.to_vec(),
        }
    }

    fn vote_spec(name: &str, votes: &[String]) -> VoteSpec {
        VoteSpec {
            name: name.to_string(),
            votes: votes.to_vec(),
        }
    }

    async fn create(client: &Client, spec: &EventSpec) -> Id {
        let response = client
            .post(uri!(create_event))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let created: CreatedEvent =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        *created.id
    }

    async fn submit_vote(client: &Client, event_id: Id, spec: &VoteSpec) -> EventDetail {
        let response = client
            .post(uri!(add_vote(event_id)))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    async fn fetch_results(client: &Client, event_id: Id) -> EventResults {
        let response = client.get(uri!(get_results(event_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    /// Dispatch a creation request expected to fail, returning the response
    /// status plus the error code and message from the body.
    async fn rejected_creation(client: &Client, spec: &EventSpec) -> (Status, String, String) {
        let response = client
            .post(uri!(create_event))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        let status = response.status();
        let body: Value =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        (
            status,
            body["code"].as_str().unwrap().to_string(),
            body["message"].as_str().unwrap().to_string(),
        )
    }

    #[backend_test]
    async fn create_and_fetch_an_event(client: Client) {
        let dates = vec![future_date(10), future_date(5)];
        let event_id = create(&client, &event_spec("Jake's secret party", &dates)).await;

        let response = client.get(uri!(get_event(event_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let detail: EventDetail =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(*detail.id, event_id);
        assert_eq!(detail.name, "Jake's secret party");
        // Order-independent set equality on the candidate dates.
        let expected = dates.iter().map(|d| naive(d)).collect::<HashSet<_>>();
        let actual = detail.dates.iter().copied().collect::<HashSet<_>>();
        assert_eq!(expected, actual);
        assert!(detail.votes.is_empty());
    }

    #[backend_test]
    async fn list_returns_all_events(client: Client) {
        let dates = vec![future_date(7)];
        let first = create(&client, &event_spec("First", &dates)).await;
        let second = create(&client, &event_spec("Second", &dates)).await;

        let response = client.get(uri!(list_events)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let list: EventList =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let listed = list
            .events
            .iter()
            .map(|summary| (*summary.id, summary.name.clone()))
            .collect::<HashSet<_>>();
        let expected = HashSet::from([
            (first, "First".to_string()),
            (second, "Second".to_string()),
        ]);
        assert_eq!(expected, listed);
    }

    #[backend_test]
    async fn creation_rejects_an_empty_name(client: Client, db: Database) {
        let spec = event_spec("   ", &[future_date(1)]);
        let (status, code, _) = rejected_creation(&client, &spec).await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!("VALIDATION_ERROR", code);

        // Nothing was persisted.
        let count = Coll::<Event>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(0, count);
    }

    #[backend_test]
    async fn creation_rejects_an_empty_date_list(client: Client) {
        let spec = event_spec("Meeting", &[]);
        let (status, code, _) = rejected_creation(&client, &spec).await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!("VALIDATION_ERROR", code);
    }

    #[backend_test]
    async fn creation_rejects_too_many_dates_as_a_policy_violation(client: Client, db: Database) {
        let dates = (1..=11).map(future_date).collect::<Vec<_>>();
        let spec = event_spec("Meeting", &dates);
        let (status, code, _) = rejected_creation(&client, &spec).await;
        assert_eq!(Status::UnprocessableEntity, status);
        assert_eq!("BUSINESS_LOGIC_ERROR", code);

        let count = Coll::<Event>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(0, count);
    }

    #[backend_test]
    async fn creation_rejects_malformed_dates(client: Client) {
        let spec = event_spec("Meeting", &[future_date(1), "01/02/2030".to_string()]);
        let (status, code, message) = rejected_creation(&client, &spec).await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!("VALIDATION_ERROR", code);
        assert!(message.contains("01/02/2030"));
    }

    #[backend_test]
    async fn creation_names_every_past_date(client: Client) {
        let past1 = (Utc::now().date_naive() - Duration::days(3)).to_string();
        let past2 = (Utc::now().date_naive() - Duration::days(1)).to_string();
        let spec = event_spec("Meeting", &[past1.clone(), future_date(1), past2.clone()]);
        let (status, code, message) = rejected_creation(&client, &spec).await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!("VALIDATION_ERROR", code);
        assert!(message.contains(&past1));
        assert!(message.contains(&past2));
    }

    #[backend_test]
    async fn creation_rejects_duplicate_dates(client: Client) {
        let date = future_date(3);
        let spec = event_spec("Meeting", &[date.clone(), date]);
        let (status, code, _) = rejected_creation(&client, &spec).await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!("VALIDATION_ERROR", code);
    }

    #[backend_test]
    async fn unknown_event_is_not_found_everywhere(client: Client) {
        let unknown = Id::new();

        let response = client.get(uri!(get_event(unknown))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get(uri!(get_results(unknown))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .post(uri!(add_vote(unknown)))
            .header(ContentType::JSON)
            .body(json!(vote_spec("Alice", &[future_date(1)])).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let body: Value =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!("RESOURCE_NOT_FOUND", body["code"]);
    }

    #[backend_test]
    async fn voting_and_results_follow_distinct_turnout(client: Client) {
        let d1 = future_date(10);
        let d2 = future_date(11);
        let event_id = create(&client, &event_spec("Meeting", &[d1.clone(), d2.clone()])).await;

        submit_vote(&client, event_id, &vote_spec("Alice", &[d1.clone()])).await;
        let detail =
            submit_vote(&client, event_id, &vote_spec("Bob", &[d1.clone(), d2.clone()])).await;

        // The detail response groups current votes by date.
        assert_eq!(
            detail.votes,
            vec![
                VoteGroup {
                    date: naive(&d1),
                    people: vec!["Alice".to_string(), "Bob".to_string()],
                },
                VoteGroup {
                    date: naive(&d2),
                    people: vec!["Bob".to_string()],
                },
            ]
        );

        // Only the best-attended date wins.
        let results = fetch_results(&client, event_id).await;
        assert_eq!(results.name, "Meeting");
        assert_eq!(
            results.suitable_dates,
            vec![VoteGroup {
                date: naive(&d1),
                people: vec!["Alice".to_string(), "Bob".to_string()],
            }]
        );
    }

    #[backend_test]
    async fn resubmission_replaces_the_previous_votes(client: Client, db: Database) {
        let d1 = future_date(10);
        let d2 = future_date(11);
        let event_id = create(&client, &event_spec("Meeting", &[d1.clone(), d2.clone()])).await;

        submit_vote(&client, event_id, &vote_spec("Alice", &[d1.clone()])).await;
        let detail = submit_vote(&client, event_id, &vote_spec("Alice", &[d2.clone()])).await;

        // The ledger holds exactly the second submission, not the union.
        assert_eq!(
            detail.votes,
            vec![VoteGroup {
                date: naive(&d2),
                people: vec!["Alice".to_string()],
            }]
        );

        let count = Coll::<Vote>::from_db(&db)
            .count_documents(doc! {"voter_name": "Alice"}, None)
            .await
            .unwrap();
        assert_eq!(1, count);
    }

    #[backend_test]
    async fn identical_resubmission_leaves_the_ledger_unchanged(client: Client, db: Database) {
        let d1 = future_date(10);
        let event_id = create(&client, &event_spec("Meeting", &[d1.clone()])).await;

        let first = submit_vote(&client, event_id, &vote_spec("Alice", &[d1.clone()])).await;
        let second = submit_vote(&client, event_id, &vote_spec("Alice", &[d1.clone()])).await;
        assert_eq!(first.votes, second.votes);

        let count = Coll::<Vote>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(1, count);
    }

    #[backend_test]
    async fn a_vote_outside_the_candidate_set_records_nothing(client: Client, db: Database) {
        let d1 = future_date(10);
        let stray = future_date(20);
        let event_id = create(&client, &event_spec("Meeting", &[d1.clone()])).await;

        let response = client
            .post(uri!(add_vote(event_id)))
            .header(ContentType::JSON)
            .body(json!(vote_spec("Alice", &[d1.clone(), stray.clone()])).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let body: Value =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!("VALIDATION_ERROR", body["code"]);
        // The message names the invalid date and lists the valid set.
        let message = body["message"].as_str().unwrap();
        assert!(message.contains(&stray));
        assert!(message.contains(&d1));

        // No partial vote was recorded.
        let count = Coll::<Vote>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(0, count);
    }

    #[backend_test]
    async fn voting_the_same_date_twice_counts_once(client: Client, db: Database) {
        let d1 = future_date(10);
        let event_id = create(&client, &event_spec("Meeting", &[d1.clone()])).await;

        let detail =
            submit_vote(&client, event_id, &vote_spec("Alice", &[d1.clone(), d1.clone()])).await;
        assert_eq!(
            detail.votes,
            vec![VoteGroup {
                date: naive(&d1),
                people: vec!["Alice".to_string()],
            }]
        );

        let count = Coll::<Vote>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(1, count);
    }

    #[backend_test]
    async fn an_event_without_votes_has_empty_results(client: Client) {
        let event_id = create(&client, &event_spec("Meeting", &[future_date(10)])).await;

        let results = fetch_results(&client, event_id).await;
        assert!(results.suitable_dates.is_empty());
    }

    #[backend_test]
    async fn tied_dates_are_all_reported(client: Client) {
        let d1 = future_date(10);
        let d2 = future_date(11);
        let event_id = create(&client, &event_spec("Meeting", &[d1.clone(), d2.clone()])).await;

        submit_vote(&client, event_id, &vote_spec("Alice", &[d1.clone()])).await;
        submit_vote(&client, event_id, &vote_spec("Bob", &[d2.clone()])).await;

        let results = fetch_results(&client, event_id).await;
        assert_eq!(
            results.suitable_dates,
            vec![
                VoteGroup {
                    date: naive(&d1),
                    people: vec!["Alice".to_string()],
                },
                VoteGroup {
                    date: naive(&d2),
                    people: vec!["Bob".to_string()],
                },
            ]
        );
    }
}
