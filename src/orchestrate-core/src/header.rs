//! Parsers for the response headers that carry revision identity.
//!
//! The service reports the identity of a freshly written revision through
//! headers rather than the body:
//!
//! - `Location: /v0/<collection>/<key>/refs/<ref>` after a key/value write
//! - `Content-Location`, same shape, on an unconditioned GET
//! - `Location: /v0/<collection>/<key>/events/<type>/<timestamp-ms>/<ordinal>`
//!   after an event write
//! - `ETag: "<ref>"` after an event write
//!
//! An empty header counts as missing.

pub const LOCATION: &str = "Location";
pub const CONTENT_LOCATION: &str = "Content-Location";
pub const ETAG: &str = "ETag";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("missing {0} header")]
    Missing(&'static str),

    #[error("malformed {header} header: {value:?}")]
    Malformed { header: &'static str, value: String },
}

/// Identity of an event revision as encoded in its Location header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLocation {
    pub timestamp: i64,
    pub ordinal: i64,
}

fn present<'a>(header: &'static str, value: Option<&'a str>) -> Result<&'a str, HeaderError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(HeaderError::Missing(header))
}

fn malformed(header: &'static str, value: &str) -> HeaderError {
    HeaderError::Malformed {
        header,
        value: value.to_string(),
    }
}

/// Extract `<ref>` from a `.../refs/<ref>` path.
///
/// Used for both `Location` and `Content-Location`; `header` names the
/// header in the returned error.
pub fn item_ref(header: &'static str, value: Option<&str>) -> Result<String, HeaderError> {
    let value = present(header, value)?;
    let mut segments = value.rsplit('/');

    let reference = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed(header, value))?;

    match segments.next() {
        Some("refs") => Ok(reference.to_string()),
        _ => Err(malformed(header, value)),
    }
}

/// Extract timestamp and ordinal from a `.../events/<type>/<ts>/<ordinal>` path
pub fn event_location(value: Option<&str>) -> Result<EventLocation, HeaderError> {
    let value = present(LOCATION, value)?;
    let mut segments = value.rsplit('/');

    let ordinal = segments.next().and_then(|s| s.parse::<i64>().ok());
    let timestamp = segments.next().and_then(|s| s.parse::<i64>().ok());
    let kind = segments.next().filter(|s| !s.is_empty());
    let marker = segments.next();

    match (timestamp, ordinal, kind, marker) {
        (Some(timestamp), Some(ordinal), Some(_), Some("events")) => {
            Ok(EventLocation { timestamp, ordinal })
        }
        _ => Err(malformed(LOCATION, value)),
    }
}

/// Extract `<ref>` from a quoted ETag, weak validators included
pub fn etag_ref(value: Option<&str>) -> Result<String, HeaderError> {
    let value = present(ETAG, value)?;
    let quoted = value.strip_prefix("W/").unwrap_or(value);

    quoted
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|inner| !inner.is_empty() && !inner.contains('"'))
        .map(str::to_string)
        .ok_or_else(|| malformed(ETAG, value))
}

/// Quote a ref for use in an `If-Match` header
pub fn if_match(reference: &str) -> String {
    format!("\"{}\"", reference)
}
