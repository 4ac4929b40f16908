//! Orchestrate Core Library
//!
//! Wire-level building blocks shared by the client and the search proxy:
//! - Item and Event models plus the JSON shapes of listing pages
//! - Parsers for the Location / ETag / Content-Location headers
//! - Query-string builders for the listing endpoints
//! - Configuration

pub mod config;
pub mod header;
pub mod models;
pub mod query;

// Re-export commonly used types
pub use config::{Config, TransportConfig, DEFAULT_API_HOST};
pub use header::{EventLocation, HeaderError};
pub use models::*;
pub use query::{EventBound, GetLinksQuery, HistoryQuery, ListEventsQuery, ListQuery, SearchQuery};
