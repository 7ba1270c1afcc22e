use std::fmt::Display;

use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::RequestTrace;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] naming the missing entity.
    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(format!("{what} does not exist"))
    }

    /// Combine per-field validation messages into a single error.
    pub fn validation<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages = messages.into_iter().map(Into::into).collect::<Vec<_>>();
        Self::Validation(messages.join(", "))
    }

    /// The kind of this error, as exposed to API clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated(_) | Self::Jwt(_) => ErrorKind::Unauthenticated,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Db(_) => ErrorKind::Internal,
        }
    }

    /// The message exposed to API clients. Storage failures are opaque.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated(msg)
            | Self::Forbidden(msg)
            | Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Jwt(_) => "Invalid or expired session".to_string(),
            Self::Db(_) => "Internal server error".to_string(),
        }
    }
}

/// The distinguishable categories of failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    ValidationError,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> Status {
        match self {
            Self::Unauthenticated => Status::Unauthorized,
            Self::Forbidden => Status::Forbidden,
            Self::ValidationError => Status::BadRequest,
            Self::NotFound => Status::NotFound,
            Self::Conflict => Status::Conflict,
            Self::Internal => Status::InternalServerError,
        }
    }
}

/// The JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.public_message(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let id = RequestTrace::of(req).id;
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            error!("req{id} failed: {self}");
        } else {
            debug!("req{id} rejected: {self}");
        }
        (kind.status(), Json(ErrorBody::from(&self))).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_joined() {
        let err = Error::validation(["title is empty", "section 1: title is empty"]);
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(
            err.public_message(),
            "title is empty, section 1: title is empty"
        );
    }

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(
            Error::Unauthenticated("x".into()).kind().status(),
            Status::Unauthorized
        );
        assert_eq!(Error::Forbidden("x".into()).kind().status(), Status::Forbidden);
        assert_eq!(Error::not_found("Form 1").kind().status(), Status::NotFound);
        assert_eq!(Error::Conflict("x".into()).kind().status(), Status::Conflict);
    }
}
