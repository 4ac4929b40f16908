//! Orchestrate Client Library
//!
//! HTTP client for the Orchestrate REST API: key/value items with
//! server-issued refs, timestamped events, graph relations, and paginated
//! listings behind a single [`Cursor`].
//!
//! ```rust,no_run
//! # async fn run() -> orchestrate_rs::Result<()> {
//! let client = orchestrate_rs::Client::new("api-token")?;
//! let users = client.collection("users");
//!
//! let item = users.create("k1", &serde_json::json!({"v": 1})).await?;
//! let item = client.conditional_update(&item, &serde_json::json!({"v": 2})).await?;
//! println!("k1 is now at ref {}", item.reference);
//! # Ok(())
//! # }
//! ```

mod client;
mod cursor;
mod error;
mod events;
mod graph;
mod kv;
pub mod transport;

#[cfg(test)]
mod mock;

pub use client::{Client, Collection, DEFAULT_API_HOST};
pub use cursor::{Cursor, CursorKind};
pub use error::{classify, Error, Result};
pub use orchestrate_core::{
    Event, EventBound, GetLinksQuery, HeaderError, HistoryQuery, Item, ListEventsQuery, ListQuery,
    SearchQuery,
};
pub use transport::{ReqwestTransport, Transport};
