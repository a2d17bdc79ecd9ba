#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;

use metrics::{CounterMetrics, Metrics};

/// Assemble the server: API routes, database connection, request logging,
/// and the metrics recorder as managed state.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(config::DatabaseFairing)
        .attach(logging::LoggerFairing)
        .manage(Box::new(CounterMetrics::default()) as Box<dyn Metrics>)
}

/// Get a client for the test database.
/// Configured via `ROCKET_DB_URI`, defaulting to a local instance.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = std::env::var("ROCKET_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to the test database")
}

/// Get the name of the database to use for a test.
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Assemble a server against the given database, skipping the config
/// fairing so tests fully control the connection.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db)
        .await
        .expect("Failed to create indexes");
    rocket::build()
        .mount("/", api::routes())
        .attach(logging::LoggerFairing)
        .manage(Box::new(CounterMetrics::default()) as Box<dyn Metrics>)
        .manage(client)
        .manage(db)
}
