use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Item is one revision of a key/value entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub collection: String,
    pub key: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub value: serde_json::Value,
    /// Relevance score, only set on search results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Geo distance, only set on search results sorted by distance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    /// True if this history entry records a delete
    #[serde(default)]
    pub tombstone: bool,
    /// When this revision was written, only set on history listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(
        collection: impl Into<String>,
        key: impl Into<String>,
        reference: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            reference: reference.into(),
            value,
            score: None,
            distance: None,
            tombstone: false,
            updated: None,
        }
    }

    /// Decode the raw value into a caller-chosen type
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.value)
    }
}

/// Event is a timestamped record attached to a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub collection: String,
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Millisecond precision
    pub timestamp: DateTime<Utc>,
    /// Disambiguates events sharing a millisecond
    pub ordinal: i64,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Event {
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.value)
    }
}

/// Truncate a timestamp to the milliseconds-since-epoch the wire carries
pub fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Rebuild a timestamp from milliseconds since epoch
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// ResultPath is the `path` object attached to every listing result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultPath {
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub ordinal: i64,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub tombstone: bool,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// ListEntry is one element of a listing page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListEntry {
    #[serde(default)]
    pub path: ResultPath,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    /// Revision time in ms, history listings only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reftime: Option<i64>,
    #[serde(default)]
    pub ordinal: i64,
    #[serde(default)]
    pub timestamp: i64,
}

impl ListEntry {
    pub fn to_item(&self) -> Item {
        Item {
            collection: self.path.collection.clone(),
            key: self.path.key.clone(),
            reference: self.path.reference.clone(),
            value: self.value.clone(),
            score: self.score,
            distance: self.distance,
            tombstone: self.path.tombstone,
            updated: self.reftime.and_then(from_millis),
        }
    }

    /// Returns None if the entry's timestamp is out of range
    pub fn to_event(&self) -> Option<Event> {
        Some(Event {
            collection: self.path.collection.clone(),
            key: self.path.key.clone(),
            kind: self.path.kind.clone(),
            timestamp: from_millis(self.timestamp)?,
            ordinal: self.path.ordinal,
            reference: self.path.reference.clone(),
            value: self.value.clone(),
        })
    }
}

/// ListPage is the body returned by every listing endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default)]
    pub results: Vec<ListEntry>,
}

/// EventBody is the body of a single event GET
#[derive(Debug, Clone, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub ordinal: i64,
    #[serde(default)]
    pub path: ResultPath,
    pub timestamp: i64,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// ErrorBody is the optional JSON payload of a failed call
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}
