//! Lazily paginated listing results.
//!
//! Every listing call (list, search, history, list_events, get_links) builds
//! the first page URL and returns a [`Cursor`] without touching the network.
//! [`Cursor::advance`] fetches a page only when the current one has been
//! used up, following the `next` link the service returns.
//!
//! ```rust,no_run
//! # async fn run(collection: orchestrate_rs::Collection) -> orchestrate_rs::Result<()> {
//! let mut cursor = collection.list(&Default::default());
//! while cursor.advance().await {
//!     let item = cursor.item()?;
//!     println!("{} @ {}", item.key, item.reference);
//! }
//! if let Some(err) = cursor.error() {
//!     eprintln!("listing stopped: {err}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A cursor is a single-owner object; share it across tasks only behind a
//! lock.

use std::fmt;

use orchestrate_core::{Event, Item, ListEntry, ListPage};
use reqwest::{Method, StatusCode};

use crate::{Client, Error, Result};

/// What a cursor's entries decode to, fixed when the cursor is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Items,
    Events,
}

impl fmt::Display for CursorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorKind::Items => write!(f, "item"),
            CursorKind::Events => write!(f, "event"),
        }
    }
}

enum State {
    /// Nothing fetched yet
    Fresh { url: String },
    /// A page request is in flight. Seen again only if that future was
    /// dropped, in which case the same page is requested again.
    Fetching { url: String },
    InPage {
        page: Vec<ListEntry>,
        index: usize,
        next: Option<String>,
    },
    Exhausted,
    Errored(Error),
}

pub struct Cursor {
    client: Client,
    kind: CursorKind,
    state: State,
}

impl Cursor {
    pub(crate) fn new(client: Client, kind: CursorKind, url: String) -> Self {
        Self {
            client,
            kind,
            state: State::Fresh { url },
        }
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    /// Move to the next entry, fetching a page if needed.
    ///
    /// Returns false once the listing is exhausted or a fetch failed; after
    /// that every call returns false without making a request.
    pub async fn advance(&mut self) -> bool {
        let url = match &mut self.state {
            State::Exhausted | State::Errored(_) => return false,
            State::Fresh { url } | State::Fetching { url } => url.clone(),
            State::InPage { page, index, next } => {
                if *index + 1 < page.len() {
                    *index += 1;
                    return true;
                }
                next.clone().unwrap_or_default()
            }
        };

        if url.is_empty() {
            self.state = State::Exhausted;
            return false;
        }

        self.state = State::Fetching { url: url.clone() };
        let fetched = self
            .client
            .json_reply::<ListPage>(Method::GET, &url, StatusCode::OK)
            .await;

        match fetched {
            Ok((_, page)) if page.results.is_empty() => {
                self.state = State::Exhausted;
                false
            }
            Ok((_, page)) => {
                let next = page
                    .next
                    .as_deref()
                    .map(next_path)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string);
                self.state = State::InPage {
                    page: page.results,
                    index: 0,
                    next,
                };
                true
            }
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "listing fetch failed");
                self.state = State::Errored(err);
                false
            }
        }
    }

    /// `advance` plus the sticky error, for loops that want both
    pub async fn advance_with_error(&mut self) -> (bool, Option<&Error>) {
        let more = self.advance().await;
        (more, self.error())
    }

    /// The error that stopped this cursor, if any. Never cleared.
    pub fn error(&self) -> Option<&Error> {
        match &self.state {
            State::Errored(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }

    /// True when the next `advance` cannot be served from the current page,
    /// so it would fetch or report the end
    pub fn at_page_end(&self) -> bool {
        match &self.state {
            State::InPage { page, index, .. } => *index + 1 >= page.len(),
            _ => true,
        }
    }

    fn current(&self) -> Result<&ListEntry> {
        match &self.state {
            State::InPage { page, index, .. } => page.get(*index).ok_or(Error::NoCurrentElement),
            _ => Err(Error::NoCurrentElement),
        }
    }

    /// Current entry as an Item; errors on an event cursor
    pub fn item(&self) -> Result<Item> {
        if self.kind != CursorKind::Items {
            return Err(Error::WrongCursorKind {
                expected: CursorKind::Items,
            });
        }
        Ok(self.current()?.to_item())
    }

    /// Current entry as an Event; errors on an item cursor
    pub fn event(&self) -> Result<Event> {
        if self.kind != CursorKind::Events {
            return Err(Error::WrongCursorKind {
                expected: CursorKind::Events,
            });
        }
        let entry = self.current()?;
        entry
            .to_event()
            .ok_or(Error::InvalidTimestamp(entry.timestamp))
    }

    /// Current entry's value decoded into `T`
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.current()?.value)?)
    }
}

/// The service returns `next` as an absolute path under the API prefix
fn next_path(next: &str) -> &str {
    match next.find("/v0/") {
        Some(i) => &next[i + "/v0/".len()..],
        None => next.trim_start_matches('/'),
    }
}
