//! In-memory stand-in for the Orchestrate service, for unit tests.
//!
//! Implements just enough of the REST API to exercise the client: key/value
//! revisions with If-Match / If-None-Match, history, list and search with
//! `next` links, events with ordinals and range filters, and relations.
//! Every request is recorded so tests can count round trips.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::{Arc, Mutex};

use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use reqwest::header::{
    HeaderName, HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LOCATION, CONTENT_TYPE,
    ETAG, IF_MATCH, IF_NONE_MATCH, LOCATION,
};
use reqwest::StatusCode;
use serde_json::{json, Value};
use url::Url;

use crate::transport::{Request, Response, Transport};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Identity,
    Gzip,
    Deflate,
}

type Filter = Box<dyn Fn(&mut Response) + Send + Sync>;
type Params = [(String, String)];

struct Revision {
    reference: String,
    /// None marks a tombstone
    value: Option<Value>,
    reftime: i64,
}

struct StoredEvent {
    collection: String,
    key: String,
    kind: String,
    timestamp: i64,
    ordinal: i64,
    reference: String,
    value: Value,
}

impl StoredEvent {
    fn path(&self) -> Value {
        json!({
            "collection": self.collection,
            "key": self.key,
            "ref": self.reference,
            "type": self.kind,
            "timestamp": self.timestamp,
            "ordinal": self.ordinal,
        })
    }
}

#[derive(Default)]
struct Store {
    items: BTreeMap<(String, String), Vec<Revision>>,
    events: Vec<StoredEvent>,
    /// (collection, key, kind, to_collection, to_key)
    relations: BTreeSet<(String, String, String, String, String)>,
    counter: i64,
}

pub struct FakeOrchestrate {
    store: Mutex<Store>,
    requests: Mutex<Vec<Request>>,
    filter: Mutex<Option<Filter>>,
    encoding: Mutex<Encoding>,
}

impl FakeOrchestrate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(Store::default()),
            requests: Mutex::new(Vec::new()),
            filter: Mutex::new(None),
            encoding: Mutex::new(Encoding::Identity),
        })
    }

    /// Rewrite every response before it reaches the client
    pub fn set_filter(&self, filter: impl Fn(&mut Response) + Send + Sync + 'static) {
        *self.filter.lock().unwrap() = Some(Box::new(filter));
    }

    pub fn clear_filter(&self) {
        *self.filter.lock().unwrap() = None;
    }

    /// Compress bodies for requests that accept it
    pub fn set_encoding(&self, encoding: Encoding) {
        *self.encoding.lock().unwrap() = encoding;
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn reset_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn handle(&self, request: &Request) -> Response {
        let url = match Url::parse(&request.url) {
            Ok(url) => url,
            Err(_) => return status(StatusCode::BAD_REQUEST),
        };
        let Some(path) = url.path().strip_prefix("/v0/").map(str::to_string) else {
            return status(StatusCode::NOT_FOUND);
        };
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut store = self.store.lock().unwrap();
        match (request.method.as_str(), segments.as_slice()) {
            ("HEAD", []) => status(StatusCode::OK),
            ("GET", [c]) if param(&params, "query").is_some() => store.search(c, &params),
            ("GET", [c]) => store.list(c, &params),
            ("PUT", [c, k]) => store.put_item(c, k, request),
            ("GET", [c, k]) => store.get_item(c, k, None),
            ("DELETE", [c, k]) => store.delete_item(c, k, request, &params),
            ("GET", [c, k, "refs"]) => store.history(c, k, &params),
            ("GET", [c, k, "refs", r]) => store.get_item(c, k, Some(r)),
            ("POST", [c, k, "events", t]) => store.add_event(c, k, t, None, request),
            ("POST", [c, k, "events", t, ts]) => match ts.parse() {
                Ok(ts) => store.add_event(c, k, t, Some(ts), request),
                Err(_) => status(StatusCode::BAD_REQUEST),
            },
            ("GET", [c, k, "events", t]) => store.list_events(c, k, t, &params),
            (method, [c, k, "events", t, ts, o]) => match (ts.parse(), o.parse()) {
                (Ok(ts), Ok(o)) => match method {
                    "GET" => store.get_event(c, k, t, ts, o),
                    "PUT" => store.put_event(c, k, t, ts, o, request),
                    "DELETE" => store.delete_event(c, k, t, ts, o, request),
                    _ => status(StatusCode::METHOD_NOT_ALLOWED),
                },
                _ => status(StatusCode::BAD_REQUEST),
            },
            ("PUT", [c, k, "relation", kind, dc, dk]) => {
                store.relations.insert(edge(c, k, kind, dc, dk));
                status(StatusCode::NO_CONTENT)
            }
            ("DELETE", [c, k, "relation", kind, dc, dk]) => {
                store.relations.remove(&edge(c, k, kind, dc, dk));
                status(StatusCode::NO_CONTENT)
            }
            ("GET", [c, k, "relations", kinds @ ..]) if !kinds.is_empty() => {
                store.traverse(c, k, kinds, &path, &params)
            }
            _ => status(StatusCode::NOT_FOUND),
        }
    }

    fn encode(&self, request: &Request, response: &mut Response) {
        let accepts = request
            .headers
            .get(ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if response.body.is_empty() {
            return;
        }

        let encoding = *self.encoding.lock().unwrap();
        let (name, body) = match encoding {
            Encoding::Gzip if accepts.contains("gzip") => {
                let mut enc = GzEncoder::new(Vec::new(), Compression::default());
                enc.write_all(&response.body).unwrap();
                ("gzip", enc.finish().unwrap())
            }
            Encoding::Deflate if accepts.contains("deflate") => {
                let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
                enc.write_all(&response.body).unwrap();
                ("deflate", enc.finish().unwrap())
            }
            _ => return,
        };
        response
            .headers
            .insert(CONTENT_ENCODING, HeaderValue::from_static(name));
        response.body = body;
    }
}

#[async_trait::async_trait]
impl Transport for FakeOrchestrate {
    async fn round_trip(&self, request: Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request.clone());

        let mut response = self.handle(&request);
        self.encode(&request, &mut response);
        if let Some(filter) = self.filter.lock().unwrap().as_ref() {
            filter(&mut response);
        }
        Ok(response)
    }
}

impl Store {
    fn tick(&mut self) -> i64 {
        self.counter += 1;
        self.counter
    }

    fn next_ref(&mut self) -> String {
        format!("{:016x}", self.tick().wrapping_mul(0x9e37_79b9_7f4a_7c15u64 as i64))
    }

    fn live(&self, c: &str, k: &str) -> Option<(&str, &Value)> {
        let last = self.items.get(&(c.to_string(), k.to_string()))?.last()?;
        last.value.as_ref().map(|v| (last.reference.as_str(), v))
    }

    fn put_item(&mut self, c: &str, k: &str, request: &Request) -> Response {
        let Some(value) = body_json(request) else {
            return status(StatusCode::BAD_REQUEST);
        };
        let current = self.live(c, k).map(|(r, _)| quoted(r));
        if header(request, IF_NONE_MATCH) == Some("\"*\"") && current.is_some() {
            return status(StatusCode::PRECONDITION_FAILED);
        }
        if let Some(expected) = header(request, IF_MATCH) {
            if current.as_deref() != Some(expected) {
                return status(StatusCode::PRECONDITION_FAILED);
            }
        }

        let reference = self.next_ref();
        let reftime = 1_400_000_000_000 + self.tick();
        self.items
            .entry((c.to_string(), k.to_string()))
            .or_default()
            .push(Revision {
                reference: reference.clone(),
                value: Some(value),
                reftime,
            });

        let mut resp = status(StatusCode::CREATED);
        set(&mut resp, LOCATION, &format!("/v0/{}/{}/refs/{}", c, k, reference));
        resp
    }

    fn get_item(&self, c: &str, k: &str, reference: Option<&str>) -> Response {
        match reference {
            None => match self.live(c, k) {
                Some((r, value)) => {
                    let mut resp = json_response(StatusCode::OK, value);
                    set(&mut resp, CONTENT_LOCATION, &format!("/v0/{}/{}/refs/{}", c, k, r));
                    resp
                }
                None => status(StatusCode::NOT_FOUND),
            },
            Some(r) => self
                .items
                .get(&(c.to_string(), k.to_string()))
                .and_then(|revs| revs.iter().find(|rev| rev.reference == r))
                .and_then(|rev| rev.value.as_ref())
                .map(|value| json_response(StatusCode::OK, value))
                .unwrap_or_else(|| status(StatusCode::NOT_FOUND)),
        }
    }

    fn delete_item(&mut self, c: &str, k: &str, request: &Request, params: &Params) -> Response {
        if let Some(expected) = header(request, IF_MATCH) {
            let current = self.live(c, k).map(|(r, _)| quoted(r));
            if current.as_deref() != Some(expected) {
                return status(StatusCode::PRECONDITION_FAILED);
            }
        }

        let id = (c.to_string(), k.to_string());
        if param(params, "purge") == Some("true") {
            self.items.remove(&id);
        } else if self.live(c, k).is_some() {
            let reference = self.next_ref();
            let reftime = 1_400_000_000_000 + self.tick();
            if let Some(revs) = self.items.get_mut(&id) {
                revs.push(Revision {
                    reference,
                    value: None,
                    reftime,
                });
            }
        }
        status(StatusCode::NO_CONTENT)
    }

    fn history(&self, c: &str, k: &str, params: &Params) -> Response {
        let with_values = param(params, "values") == Some("true");
        let entries = self
            .items
            .get(&(c.to_string(), k.to_string()))
            .map(|revs| {
                revs.iter()
                    .rev()
                    .map(|rev| {
                        let value = match (&rev.value, with_values) {
                            (Some(v), true) => v.clone(),
                            _ => Value::Null,
                        };
                        json!({
                            "path": {
                                "collection": c,
                                "key": k,
                                "ref": rev.reference,
                                "tombstone": rev.value.is_none(),
                            },
                            "reftime": rev.reftime,
                            "value": value,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        paginate(&format!("{}/{}/refs", c, k), params, entries)
    }

    fn item_entry(&self, c: &str, k: &str) -> Option<Value> {
        self.live(c, k).map(|(r, value)| {
            json!({
                "path": {"collection": c, "key": k, "ref": r},
                "value": value,
            })
        })
    }

    fn list(&self, c: &str, params: &Params) -> Response {
        let entries = self
            .items
            .keys()
            .filter(|(coll, _)| coll == c)
            .map(|(_, k)| k.as_str())
            .filter(|k| param(params, "afterKey").map_or(true, |b| *k > b))
            .filter(|k| param(params, "startKey").map_or(true, |b| *k >= b))
            .filter(|k| param(params, "beforeKey").map_or(true, |b| *k < b))
            .filter(|k| param(params, "endKey").map_or(true, |b| *k <= b))
            .filter_map(|k| self.item_entry(c, k))
            .collect();
        paginate(c, params, entries)
    }

    fn search(&self, c: &str, params: &Params) -> Response {
        let query = param(params, "query").unwrap_or("*");
        let entries = self
            .items
            .keys()
            .filter(|(coll, _)| coll == c)
            .filter_map(|(_, k)| self.live(c, k).map(|(_, v)| (k, v)))
            .filter(|(_, v)| query == "*" || v.to_string().contains(query))
            .filter_map(|(k, _)| self.item_entry(c, k))
            .map(|mut entry| {
                entry["score"] = json!(1.0);
                entry
            })
            .collect();
        paginate(c, params, entries)
    }

    fn add_event(
        &mut self,
        c: &str,
        k: &str,
        t: &str,
        timestamp: Option<i64>,
        request: &Request,
    ) -> Response {
        let Some(value) = body_json(request) else {
            return status(StatusCode::BAD_REQUEST);
        };
        let timestamp = match timestamp {
            Some(ts) => ts,
            None => 1_400_000_000_000 + self.tick(),
        };
        let ordinal = self.tick();
        let reference = self.next_ref();
        self.events.push(StoredEvent {
            collection: c.to_string(),
            key: k.to_string(),
            kind: t.to_string(),
            timestamp,
            ordinal,
            reference: reference.clone(),
            value,
        });
        written_event(StatusCode::CREATED, c, k, t, timestamp, ordinal, &reference)
    }

    fn find_event(&self, c: &str, k: &str, t: &str, ts: i64, o: i64) -> Option<usize> {
        self.events.iter().position(|e| {
            e.collection == c && e.key == k && e.kind == t && e.timestamp == ts && e.ordinal == o
        })
    }

    fn get_event(&self, c: &str, k: &str, t: &str, ts: i64, o: i64) -> Response {
        match self.find_event(c, k, t, ts, o) {
            Some(i) => {
                let e = &self.events[i];
                json_response(
                    StatusCode::OK,
                    &json!({
                        "ordinal": e.ordinal,
                        "timestamp": e.timestamp,
                        "path": e.path(),
                        "value": e.value,
                    }),
                )
            }
            None => status(StatusCode::NOT_FOUND),
        }
    }

    fn put_event(&mut self, c: &str, k: &str, t: &str, ts: i64, o: i64, request: &Request) -> Response {
        let Some(value) = body_json(request) else {
            return status(StatusCode::BAD_REQUEST);
        };
        let Some(i) = self.find_event(c, k, t, ts, o) else {
            return status(StatusCode::NOT_FOUND);
        };
        if let Some(expected) = header(request, IF_MATCH) {
            if quoted(&self.events[i].reference) != expected {
                return status(StatusCode::PRECONDITION_FAILED);
            }
        }

        let reference = self.next_ref();
        let event = &mut self.events[i];
        event.value = value;
        event.reference = reference.clone();
        written_event(StatusCode::NO_CONTENT, c, k, t, ts, o, &reference)
    }

    fn delete_event(&mut self, c: &str, k: &str, t: &str, ts: i64, o: i64, request: &Request) -> Response {
        if let Some(i) = self.find_event(c, k, t, ts, o) {
            if let Some(expected) = header(request, IF_MATCH) {
                if quoted(&self.events[i].reference) != expected {
                    return status(StatusCode::PRECONDITION_FAILED);
                }
            }
            self.events.remove(i);
        }
        status(StatusCode::NO_CONTENT)
    }

    fn list_events(&self, c: &str, k: &str, t: &str, params: &Params) -> Response {
        let after = bound(params, "afterEvent");
        let before = bound(params, "beforeEvent");
        let start = bound(params, "startEvent");
        let end = bound(params, "endEvent");

        let mut matching: Vec<&StoredEvent> = self
            .events
            .iter()
            .filter(|e| e.collection == c && e.key == k && e.kind == t)
            .filter(|e| {
                let at = (e.timestamp, e.ordinal);
                after.map_or(true, |(bt, bo)| match bo {
                    Some(bo) => at > (bt, bo),
                    None => e.timestamp >= bt,
                }) && start.map_or(true, |(bt, bo)| match bo {
                    Some(bo) => at >= (bt, bo),
                    None => e.timestamp >= bt,
                }) && before.map_or(true, |(bt, bo)| match bo {
                    Some(bo) => at < (bt, bo),
                    None => e.timestamp <= bt,
                }) && end.map_or(true, |(bt, bo)| match bo {
                    Some(bo) => at <= (bt, bo),
                    None => e.timestamp <= bt,
                })
            })
            .collect();
        matching.sort_by_key(|e| std::cmp::Reverse((e.timestamp, e.ordinal)));

        let entries = matching
            .into_iter()
            .map(|e| {
                json!({
                    "path": e.path(),
                    "timestamp": e.timestamp,
                    "ordinal": e.ordinal,
                    "value": e.value,
                })
            })
            .collect();
        paginate(&format!("{}/{}/events/{}", c, k, t), params, entries)
    }

    fn traverse(&self, c: &str, k: &str, kinds: &[&str], path: &str, params: &Params) -> Response {
        let mut frontier: BTreeSet<(String, String)> = BTreeSet::new();
        frontier.insert((c.to_string(), k.to_string()));

        for kind in kinds {
            frontier = self
                .relations
                .iter()
                .filter(|(sc, sk, rk, _, _)| {
                    rk == kind && frontier.contains(&(sc.clone(), sk.clone()))
                })
                .map(|(_, _, _, dc, dk)| (dc.clone(), dk.clone()))
                .collect();
        }

        let entries = frontier
            .iter()
            .filter_map(|(dc, dk)| self.item_entry(dc, dk))
            .collect();
        paginate(path, params, entries)
    }
}

fn edge(c: &str, k: &str, kind: &str, dc: &str, dk: &str) -> (String, String, String, String, String) {
    (
        c.to_string(),
        k.to_string(),
        kind.to_string(),
        dc.to_string(),
        dk.to_string(),
    )
}

fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn bound(params: &Params, name: &str) -> Option<(i64, Option<i64>)> {
    let raw = param(params, name)?;
    match raw.split_once('/') {
        Some((ts, ord)) => Some((ts.parse().ok()?, Some(ord.parse().ok()?))),
        None => Some((raw.parse().ok()?, None)),
    }
}

fn header(request: &Request, name: HeaderName) -> Option<&str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

fn body_json(request: &Request) -> Option<Value> {
    serde_json::from_slice(request.body.as_deref()?).ok()
}

fn quoted(reference: &str) -> String {
    format!("\"{}\"", reference)
}

fn status(code: StatusCode) -> Response {
    Response::new(code)
}

fn set(resp: &mut Response, name: HeaderName, value: &str) {
    resp.headers
        .insert(name, HeaderValue::from_str(value).unwrap());
}

fn json_response(code: StatusCode, body: &Value) -> Response {
    let mut resp = status(code);
    resp.headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp.body = serde_json::to_vec(body).unwrap();
    resp
}

fn written_event(
    code: StatusCode,
    c: &str,
    k: &str,
    t: &str,
    ts: i64,
    ordinal: i64,
    reference: &str,
) -> Response {
    let mut resp = status(code);
    set(
        &mut resp,
        LOCATION,
        &format!("/v0/{}/{}/events/{}/{}/{}", c, k, t, ts, ordinal),
    );
    set(&mut resp, ETAG, &quoted(reference));
    resp
}

/// Serve one page, linking to the next when more entries remain
fn paginate(base: &str, params: &Params, entries: Vec<Value>) -> Response {
    let limit: usize = param(params, "limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(10);
    let offset: usize = param(params, "offset")
        .and_then(|o| o.parse().ok())
        .unwrap_or(0);
    let total = entries.len();

    let results: Vec<Value> = entries.into_iter().skip(offset).take(limit).collect();
    let count = results.len();
    let mut body = json!({ "count": count, "results": results });

    if offset + limit < total {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in params.iter().filter(|(k, _)| k != "offset") {
            query.append_pair(k, v);
        }
        query.append_pair("offset", &(offset + limit).to_string());
        body["next"] = json!(format!("/v0/{}?{}", base, query.finish()));
    }
    json_response(StatusCode::OK, &body)
}
