use chrono::{SecondsFormat, Utc};
use mongodb::{bson::doc, Database};
use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

pub fn routes() -> Vec<Route> {
    routes![health]
}

/// Service health report, including a live database ping.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub database: String,
    pub timestamp: String,
}

#[get("/health")]
async fn health(db: &State<Database>) -> Json<HealthReport> {
    // A failing ping degrades the report rather than failing the request.
    let database = match db.run_command(doc! {"ping": 1}, None).await {
        Ok(_) => "healthy",
        Err(err) => {
            error!("Database health check failed: {err}");
            "unhealthy"
        }
    };
    let status = if database == "healthy" {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthReport {
        status: status.to_string(),
        service: "eventshuffle-api".to_string(),
        database: database.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}
