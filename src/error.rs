use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The error kinds our domain operations can produce.
///
/// The first three are client-safe and carry their full message across the
/// API boundary; database failures are logged and replaced with a generic
/// message.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-policy input that the client can fix.
    #[error("{0}")]
    Validation(String),
    /// Well-formed input that violates a domain policy.
    #[error("{0}")]
    BusinessRule(String),
    /// A referenced resource does not exist.
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::BusinessRule(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

/// Wire form of an error: a stable code plus a human-readable message.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let (status, body) = match self {
            Self::Validation(message) => (
                Status::BadRequest,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message,
                },
            ),
            Self::BusinessRule(message) => (
                Status::UnprocessableEntity,
                ErrorBody {
                    code: "BUSINESS_LOGIC_ERROR",
                    message,
                },
            ),
            Self::NotFound(what) => (
                Status::NotFound,
                ErrorBody {
                    code: "RESOURCE_NOT_FOUND",
                    message: format!("{what} not found"),
                },
            ),
            Self::Db(err) => {
                // Log the cause; external callers only ever see the generic
                // message.
                error!("Database error: {err}");
                (
                    Status::InternalServerError,
                    ErrorBody {
                        code: "DATABASE_ERROR",
                        message: "Internal server error".to_string(),
                    },
                )
            }
        };
        Custom(status, Json(body)).respond_to(req)
    }
}
