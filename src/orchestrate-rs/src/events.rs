use chrono::{DateTime, Utc};
use orchestrate_core::header::{self, LOCATION};
use orchestrate_core::models::{from_millis, to_millis};
use orchestrate_core::query::with_query;
use orchestrate_core::{Event, EventBody, ListEventsQuery};
use reqwest::header::{HeaderMap, HeaderValue, IF_MATCH};
use reqwest::{Method, StatusCode};
use serde::Serialize;

use crate::cursor::{Cursor, CursorKind};
use crate::error::not_most_recent;
use crate::transport::Response;
use crate::{Client, Collection, Error, Result};

impl Collection {
    fn events_path(&self, key: &str, kind: &str) -> String {
        format!("{}/{}/events/{}", self.name, key, kind)
    }

    fn event_path(&self, key: &str, kind: &str, timestamp: &DateTime<Utc>, ordinal: i64) -> String {
        format!(
            "{}/{}/{}",
            self.events_path(key, kind),
            to_millis(timestamp),
            ordinal
        )
    }

    /// Attach an event to `key`, letting the service pick the timestamp
    pub async fn add_event<T: Serialize + ?Sized>(
        &self,
        key: &str,
        kind: &str,
        value: &T,
    ) -> Result<Event> {
        self.post_event(key, kind, None, value).await
    }

    /// Attach an event to `key` at `timestamp`, truncated to milliseconds
    pub async fn add_event_at<T: Serialize + ?Sized>(
        &self,
        key: &str,
        kind: &str,
        timestamp: DateTime<Utc>,
        value: &T,
    ) -> Result<Event> {
        self.post_event(key, kind, Some(timestamp), value).await
    }

    #[tracing::instrument(skip(self, value), fields(collection = %self.name))]
    async fn post_event<T: Serialize + ?Sized>(
        &self,
        key: &str,
        kind: &str,
        timestamp: Option<DateTime<Utc>>,
        value: &T,
    ) -> Result<Event> {
        let value = serde_json::to_value(value)?;
        let body = serde_json::to_vec(&value)?;
        let path = match timestamp {
            Some(ts) => format!("{}/{}", self.events_path(key, kind), to_millis(&ts)),
            None => self.events_path(key, kind),
        };

        let response = self
            .client
            .empty_reply(
                Method::POST,
                &path,
                HeaderMap::new(),
                Some(body),
                StatusCode::CREATED,
            )
            .await?;

        self.written_event(key, kind, value, &response)
    }

    /// Build the Event a write produced from its Location and ETag headers
    fn written_event(
        &self,
        key: &str,
        kind: &str,
        value: serde_json::Value,
        response: &Response,
    ) -> Result<Event> {
        let location = header::event_location(response.header(LOCATION))?;
        let reference = header::etag_ref(response.header(header::ETAG))?;

        Ok(Event {
            collection: self.name.clone(),
            key: key.to_string(),
            kind: kind.to_string(),
            timestamp: from_millis(location.timestamp)
                .ok_or(Error::InvalidTimestamp(location.timestamp))?,
            ordinal: location.ordinal,
            reference,
            value,
        })
    }

    pub async fn get_event(
        &self,
        key: &str,
        kind: &str,
        timestamp: DateTime<Utc>,
        ordinal: i64,
    ) -> Result<Event> {
        let path = self.event_path(key, kind, &timestamp, ordinal);
        let (_, body) = self
            .client
            .json_reply::<EventBody>(Method::GET, &path, StatusCode::OK)
            .await?;

        Ok(Event {
            collection: self.name.clone(),
            key: key.to_string(),
            kind: kind.to_string(),
            timestamp: from_millis(body.timestamp).ok_or(Error::InvalidTimestamp(body.timestamp))?,
            ordinal: body.ordinal,
            reference: body.path.reference,
            value: body.value,
        })
    }

    /// Replace the value of an event regardless of its current ref
    pub async fn update_event<T: Serialize + ?Sized>(
        &self,
        key: &str,
        kind: &str,
        timestamp: DateTime<Utc>,
        ordinal: i64,
        value: &T,
    ) -> Result<Event> {
        self.put_event(key, kind, timestamp, ordinal, HeaderMap::new(), value)
            .await
    }

    pub(crate) async fn put_event<T: Serialize + ?Sized>(
        &self,
        key: &str,
        kind: &str,
        timestamp: DateTime<Utc>,
        ordinal: i64,
        headers: HeaderMap,
        value: &T,
    ) -> Result<Event> {
        let value = serde_json::to_value(value)?;
        let body = serde_json::to_vec(&value)?;

        let response = self
            .client
            .empty_reply(
                Method::PUT,
                &self.event_path(key, kind, &timestamp, ordinal),
                headers,
                Some(body),
                StatusCode::NO_CONTENT,
            )
            .await?;

        self.written_event(key, kind, value, &response)
    }

    /// Permanently remove one event
    pub async fn delete_event(
        &self,
        key: &str,
        kind: &str,
        timestamp: DateTime<Utc>,
        ordinal: i64,
    ) -> Result<()> {
        self.remove_event(key, kind, timestamp, ordinal, HeaderMap::new())
            .await
    }

    pub(crate) async fn remove_event(
        &self,
        key: &str,
        kind: &str,
        timestamp: DateTime<Utc>,
        ordinal: i64,
        headers: HeaderMap,
    ) -> Result<()> {
        let path = format!(
            "{}?purge=true",
            self.event_path(key, kind, &timestamp, ordinal)
        );
        self.client
            .empty_reply(Method::DELETE, &path, headers, None, StatusCode::NO_CONTENT)
            .await?;
        Ok(())
    }

    /// Events of `kind` on `key`, newest first
    pub fn list_events(&self, key: &str, kind: &str, query: &ListEventsQuery) -> Cursor {
        self.cursor(
            CursorKind::Events,
            with_query(self.events_path(key, kind), &query.encode()),
        )
    }
}

fn if_match(event: &Event) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(IF_MATCH, HeaderValue::from_str(&header::if_match(&event.reference))?);
    Ok(headers)
}

impl Client {
    /// Replace an event's value only if `event` is still its latest revision
    pub async fn conditional_update_event<T: Serialize + ?Sized>(
        &self,
        event: &Event,
        value: &T,
    ) -> Result<Event> {
        self.collection(event.collection.as_str())
            .put_event(
                &event.key,
                &event.kind,
                event.timestamp,
                event.ordinal,
                if_match(event)?,
                value,
            )
            .await
            .map_err(not_most_recent(&event.key))
    }

    /// Remove an event only if `event` is still its latest revision
    pub async fn conditional_delete_event(&self, event: &Event) -> Result<()> {
        self.collection(event.collection.as_str())
            .remove_event(
                &event.key,
                &event.kind,
                event.timestamp,
                event.ordinal,
                if_match(event)?,
            )
            .await
            .map_err(not_most_recent(&event.key))
    }
}
