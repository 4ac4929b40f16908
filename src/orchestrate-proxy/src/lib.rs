//! orchestrate-proxy - a small HTTP search front end for Orchestrate
//!
//! Exposes one route, `GET /api/{collection}`, that runs a search through
//! [`orchestrate_rs::Client`] and returns the first page of values as JSON.
//!
//! ```bash
//! ORC_KEY=... orchestrate-proxy
//! curl 'localhost:8080/api/users?query=name:bob&limit=5'
//! ```

pub use orchestrate_rs;

pub mod api;
pub mod telemetry;
