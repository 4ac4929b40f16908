use chrono::{DateTime, Utc};
use url::form_urlencoded::Serializer;

use crate::models::to_millis;

/// ListQuery pages through the keys of a collection
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Results per page; the service defaults to 10 and caps at 100
    pub limit: Option<usize>,
    /// Inclusive lower key bound
    pub start_key: Option<String>,
    /// Exclusive lower key bound
    pub after_key: Option<String>,
    /// Exclusive upper key bound
    pub before_key: Option<String>,
    /// Inclusive upper key bound
    pub end_key: Option<String>,
}

impl ListQuery {
    pub fn encode(&self) -> String {
        let mut query = Serializer::new(String::new());
        if let Some(limit) = self.limit {
            query.append_pair("limit", &limit.to_string());
        }
        if let Some(key) = &self.after_key {
            query.append_pair("afterKey", key);
        }
        if let Some(key) = &self.before_key {
            query.append_pair("beforeKey", key);
        }
        if let Some(key) = &self.end_key {
            query.append_pair("endKey", key);
        }
        if let Some(key) = &self.start_key {
            query.append_pair("startKey", key);
        }
        query.finish()
    }
}

/// HistoryQuery pages through the refs of one key
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub offset: Option<u64>,
    /// Include values with each ref. Without it, decoding a history item
    /// yields null.
    pub values: bool,
}

impl HistoryQuery {
    pub fn encode(&self) -> String {
        let mut query = Serializer::new(String::new());
        if let Some(limit) = self.limit {
            query.append_pair("limit", &limit.to_string());
        }
        if let Some(offset) = self.offset {
            query.append_pair("offset", &offset.to_string());
        }
        if self.values {
            query.append_pair("values", "true");
        }
        query.finish()
    }
}

/// SearchQuery carries the paging and ordering options of a search
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub limit: Option<usize>,
    pub offset: Option<u64>,
    /// Sort expression such as `value.name:asc`; score order when unset
    pub sort: Option<String>,
}

impl SearchQuery {
    pub fn encode(&self, lucene: &str) -> String {
        let mut query = Serializer::new(String::new());
        query.append_pair("query", lucene);
        if let Some(limit) = self.limit {
            query.append_pair("limit", &limit.to_string());
        }
        if let Some(offset) = self.offset {
            query.append_pair("offset", &offset.to_string());
        }
        if let Some(sort) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            query.append_pair("sort", sort);
        }
        query.finish()
    }
}

/// EventBound is one end of an event range.
///
/// Without an ordinal the bound covers every event in that millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBound {
    pub timestamp: DateTime<Utc>,
    pub ordinal: Option<i64>,
}

impl EventBound {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            ordinal: None,
        }
    }

    pub fn exact(timestamp: DateTime<Utc>, ordinal: i64) -> Self {
        Self {
            timestamp,
            ordinal: Some(ordinal),
        }
    }

    fn encode(&self) -> String {
        match self.ordinal {
            Some(ordinal) => format!("{}/{}", to_millis(&self.timestamp), ordinal),
            None => to_millis(&self.timestamp).to_string(),
        }
    }
}

/// ListEventsQuery filters an event listing by time range.
///
/// `start`/`end` are inclusive, `after`/`before` exclusive.
#[derive(Debug, Clone, Default)]
pub struct ListEventsQuery {
    pub limit: Option<usize>,
    pub start: Option<EventBound>,
    pub end: Option<EventBound>,
    pub after: Option<EventBound>,
    pub before: Option<EventBound>,
}

impl ListEventsQuery {
    pub fn encode(&self) -> String {
        let mut query = Serializer::new(String::new());
        if let Some(limit) = self.limit {
            query.append_pair("limit", &limit.to_string());
        }
        let bounds = [
            ("afterEvent", &self.after),
            ("beforeEvent", &self.before),
            ("endEvent", &self.end),
            ("startEvent", &self.start),
        ];
        for (name, bound) in bounds {
            if let Some(bound) = bound {
                query.append_pair(name, &bound.encode());
            }
        }
        query.finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetLinksQuery {
    pub limit: Option<usize>,
}

impl GetLinksQuery {
    pub fn encode(&self) -> String {
        let mut query = Serializer::new(String::new());
        if let Some(limit) = self.limit {
            query.append_pair("limit", &limit.to_string());
        }
        query.finish()
    }
}

/// Join a path and an encoded query, dropping the `?` when there is no query
pub fn with_query(path: String, query: &str) -> String {
    if query.is_empty() {
        path
    } else {
        format!("{}?{}", path, query)
    }
}
