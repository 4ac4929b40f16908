use orchestrate_core::header::{self, CONTENT_LOCATION, LOCATION};
use orchestrate_core::query::with_query;
use orchestrate_core::{HistoryQuery, Item, ListQuery, SearchQuery};
use reqwest::header::{HeaderMap, HeaderValue, IF_MATCH, IF_NONE_MATCH};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cursor::{Cursor, CursorKind};
use crate::error::{already_exists, not_most_recent};
use crate::{Client, Collection, Result};

impl Collection {
    fn item_path(&self, key: &str) -> String {
        format!("{}/{}", self.name, key)
    }

    /// Store `value` under `key` only if the key does not exist yet.
    ///
    /// Fails with `AlreadyExists` if it does.
    #[tracing::instrument(skip(self, value), fields(collection = %self.name))]
    pub async fn create<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<Item> {
        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"*\""));
        self.put(key, headers, value)
            .await
            .map_err(already_exists(key))
    }

    /// Store `value` under `key`, creating or replacing it
    #[tracing::instrument(skip(self, value), fields(collection = %self.name))]
    pub async fn update<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<Item> {
        self.put(key, HeaderMap::new(), value).await
    }

    pub(crate) async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        headers: HeaderMap,
        value: &T,
    ) -> Result<Item> {
        let value = serde_json::to_value(value)?;
        let body = serde_json::to_vec(&value)?;

        let response = self
            .client
            .empty_reply(
                Method::PUT,
                &self.item_path(key),
                headers,
                Some(body),
                StatusCode::CREATED,
            )
            .await?;

        let reference = header::item_ref(LOCATION, response.header(LOCATION))?;
        Ok(Item::new(&self.name, key, reference, value))
    }

    /// Fetch the latest revision of `key`
    pub async fn get(&self, key: &str) -> Result<Item> {
        self.fetch(key, None).await
    }

    /// Fetch a specific revision of `key`
    pub async fn get_ref(&self, key: &str, reference: &str) -> Result<Item> {
        self.fetch(key, Some(reference)).await
    }

    /// Fetch the latest revision of `key` and decode its value
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<(Item, T)> {
        let item = self.get(key).await?;
        let value = item.decode()?;
        Ok((item, value))
    }

    async fn fetch(&self, key: &str, reference: Option<&str>) -> Result<Item> {
        let path = match reference {
            Some(r) => format!("{}/refs/{}", self.item_path(key), r),
            None => self.item_path(key),
        };

        let (response, value) = self
            .client
            .json_reply::<serde_json::Value>(Method::GET, &path, StatusCode::OK)
            .await?;

        let reference = match reference {
            Some(r) => r.to_string(),
            None => header::item_ref(CONTENT_LOCATION, response.header(CONTENT_LOCATION))?,
        };
        Ok(Item::new(&self.name, key, reference, value))
    }

    /// Delete `key`, keeping its history
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .empty_reply(
                Method::DELETE,
                &self.item_path(key),
                HeaderMap::new(),
                None,
                StatusCode::NO_CONTENT,
            )
            .await?;
        Ok(())
    }

    /// Delete `key` together with every past revision
    pub async fn purge(&self, key: &str) -> Result<()> {
        self.client
            .empty_reply(
                Method::DELETE,
                &format!("{}?purge=true", self.item_path(key)),
                HeaderMap::new(),
                None,
                StatusCode::NO_CONTENT,
            )
            .await?;
        Ok(())
    }

    /// Revisions of `key`, newest first
    pub fn history(&self, key: &str, query: &HistoryQuery) -> Cursor {
        let path = format!("{}/refs", self.item_path(key));
        self.cursor(CursorKind::Items, with_query(path, &query.encode()))
    }

    /// Items of this collection in key order
    pub fn list(&self, query: &ListQuery) -> Cursor {
        self.cursor(CursorKind::Items, with_query(self.name.clone(), &query.encode()))
    }

    /// Run a Lucene search over this collection
    pub fn search(&self, lucene: &str, query: &SearchQuery) -> Cursor {
        self.cursor(
            CursorKind::Items,
            with_query(self.name.clone(), &query.encode(lucene)),
        )
    }

    /// Sorted search with the service's default page size.
    #[deprecated(note = "use `search` with `SearchQuery::sort`")]
    pub fn search_sorted(&self, lucene: &str, sort: &str) -> Cursor {
        self.client.mark_deprecated();
        let query = SearchQuery {
            sort: Some(sort.to_string()),
            ..Default::default()
        };
        self.search(lucene, &query)
    }

    pub(crate) fn cursor(&self, kind: CursorKind, path: String) -> Cursor {
        Cursor::new(self.client.clone(), kind, path)
    }
}

impl Client {
    /// Replace `item`'s value only if `item` is still the latest revision.
    ///
    /// Fails with `NotMostRecent` if the key has been written since.
    #[tracing::instrument(skip(self, item, value), fields(collection = %item.collection, key = %item.key))]
    pub async fn conditional_update<T: Serialize + ?Sized>(
        &self,
        item: &Item,
        value: &T,
    ) -> Result<Item> {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, HeaderValue::from_str(&header::if_match(&item.reference))?);
        self.collection(item.collection.as_str())
            .put(&item.key, headers, value)
            .await
            .map_err(not_most_recent(&item.key))
    }

    /// Delete `item`'s key only if `item` is still the latest revision
    pub async fn conditional_delete(&self, item: &Item) -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, HeaderValue::from_str(&header::if_match(&item.reference))?);
        self.empty_reply(
            Method::DELETE,
            &format!("{}/{}", item.collection, item.key),
            headers,
            None,
            StatusCode::NO_CONTENT,
        )
        .await
        .map_err(not_most_recent(&item.key))?;
        Ok(())
    }
}
