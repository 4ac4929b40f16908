use orchestrate_core::{ErrorBody, HeaderError};
use reqwest::StatusCode;

use crate::cursor::CursorKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("404: not found")]
    NotFound,

    /// A 412 that the calling operation did not reinterpret
    #[error("412: precondition failed")]
    PreconditionFailed,

    #[error("an item with the key {0} already exists")]
    AlreadyExists(String),

    #[error("{0} was not the most recent ref")]
    NotMostRecent(String),

    #[error("request rate limited")]
    RateLimited,

    #[error("{status} ({code}): {message}")]
    Unknown {
        status: String,
        code: u16,
        message: String,
    },

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to decompress response body: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("timestamp {0}ms is out of range")]
    InvalidTimestamp(i64),

    #[error("not an {expected} cursor")]
    WrongCursorKind { expected: CursorKind },

    #[error("cursor has no current element")]
    NoCurrentElement,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Map a non-matching status to an error.
///
/// This knows nothing about the operation that was issued, so a 412 stays
/// `PreconditionFailed`; callers turn it into `AlreadyExists` or
/// `NotMostRecent`.
pub fn classify(status: StatusCode, body: &[u8]) -> Error {
    match status.as_u16() {
        404 => Error::NotFound,
        412 => Error::PreconditionFailed,
        419 => Error::RateLimited,
        code => {
            let message = match serde_json::from_slice::<ErrorBody>(body) {
                Ok(b) => b.message,
                Err(_) => excerpt(body),
            };
            Error::Unknown {
                status: status.to_string(),
                code,
                message,
            }
        }
    }
}

/// Leading text of a body that is not the service's JSON error shape,
/// such as a proxy's HTML error page
fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

const EXCERPT_CHARS: usize = 200;

/// Reinterpret a precondition failure on a create
pub(crate) fn already_exists(key: &str) -> impl FnOnce(Error) -> Error + '_ {
    move |err| match err {
        Error::PreconditionFailed => Error::AlreadyExists(key.to_string()),
        other => other,
    }
}

/// Reinterpret a precondition failure on a conditional update or delete
pub(crate) fn not_most_recent(key: &str) -> impl FnOnce(Error) -> Error + '_ {
    move |err| match err {
        Error::PreconditionFailed => Error::NotMostRecent(key.to_string()),
        other => other,
    }
}
