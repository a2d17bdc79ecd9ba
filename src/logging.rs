use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket,
};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::metrics::Metrics;

/// A unique identifier for a particular request, plus its arrival time.
#[derive(Debug, Copy, Clone)]
pub struct RequestTrace {
    pub id: usize,
    pub received: Instant,
}

impl Display for RequestTrace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl RequestTrace {
    /// Start a trace with the next ID. The counter wraps around back to
    /// zero if you somehow exceed a usize.
    pub fn begin() -> RequestTrace {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        RequestTrace {
            id: REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            received: Instant::now(),
        }
    }
}

/// Allow the trace to be accessed via request guard.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestTrace {
    type Error = (); // No errors possible, use the `!` type once stabilised.

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(req.local_cache(RequestTrace::begin))
    }
}

/// A rocket fairing that does global logging, e.g. logging every request and
/// response, and feeds the metrics recorder.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!("Server launched on {protocol}://{ip}:{port}");
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        // Start the trace.
        let trace = req.local_cache(RequestTrace::begin);
        // Get the HTTP method.
        let method = req.method();
        // Get the request URI.
        let uri = req.uri();
        // Log the incoming request.
        info!("->req{trace} {method} {uri}");
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        // Get the trace.
        let trace = req.local_cache(RequestTrace::begin);
        // Get the response code and time taken.
        let code = res.status();
        let elapsed = trace.received.elapsed();
        // Record the response.
        if let Some(metrics) = req.rocket().state::<Box<dyn Metrics>>() {
            metrics.record_response(code.code, elapsed);
        }
        // Get the matched route.
        let route = match req.route() {
            Some(r) => {
                let mut str = r.uri.to_string();
                if let Some(ref name) = r.name {
                    str = format!("{name} ({str})");
                }
                str
            }
            None => "UNKNOWN ROUTE".to_string(),
        };
        // Log the outgoing response.
        let log_msg = format!("<-rsp{trace} {code} {route} ({}ms)", elapsed.as_millis());
        match code.class() {
            StatusClass::ServerError => error!("{log_msg}"),
            StatusClass::ClientError => warn!("{log_msg}"),
            _ => info!("{log_msg}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, stopping gracefully...");
    }
}
