use orchestrate_core::query::with_query;
use orchestrate_core::GetLinksQuery;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};

use crate::cursor::{Cursor, CursorKind};
use crate::{Collection, Result};

impl Collection {
    fn relation_path(&self, key: &str, kind: &str, to_collection: &str, to_key: &str) -> String {
        format!(
            "{}/{}/relation/{}/{}/{}",
            self.name, key, kind, to_collection, to_key
        )
    }

    /// Add a directed `kind` edge from `key` to `to_collection/to_key`
    pub async fn link(
        &self,
        key: &str,
        kind: &str,
        to_collection: &str,
        to_key: &str,
    ) -> Result<()> {
        self.client
            .empty_reply(
                Method::PUT,
                &self.relation_path(key, kind, to_collection, to_key),
                HeaderMap::new(),
                None,
                StatusCode::NO_CONTENT,
            )
            .await?;
        Ok(())
    }

    /// Remove an edge. No tombstone is kept.
    pub async fn unlink(
        &self,
        key: &str,
        kind: &str,
        to_collection: &str,
        to_key: &str,
    ) -> Result<()> {
        let path = format!(
            "{}?purge=true",
            self.relation_path(key, kind, to_collection, to_key)
        );
        self.client
            .empty_reply(Method::DELETE, &path, HeaderMap::new(), None, StatusCode::NO_CONTENT)
            .await?;
        Ok(())
    }

    /// Follow `kind` then each of `hops` from `key`, yielding the items
    /// reached by the last hop
    pub fn get_links(&self, key: &str, kind: &str, hops: &[&str], query: &GetLinksQuery) -> Cursor {
        let mut path = format!("{}/{}/relations/{}", self.name, key, kind);
        for hop in hops {
            path.push('/');
            path.push_str(hop);
        }
        self.cursor(CursorKind::Items, with_query(path, &query.encode()))
    }
}
