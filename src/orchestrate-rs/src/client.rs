use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine;
use orchestrate_core::Config;
pub use orchestrate_core::DEFAULT_API_HOST;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::classify;
use crate::transport::{ReqwestTransport, Request, Response, Transport};
use crate::Result;

const API_PREFIX: &str = "v0";

const USER_AGENT_STRING: &str = concat!("orchestrate-rs/", env!("CARGO_PKG_VERSION"), " (rust)");
const USER_AGENT_DEPRECATED: &str = concat!(
    "orchestrate-rs/",
    env!("CARGO_PKG_VERSION"),
    " (rust) [deprecated]"
);

/// Orchestrate REST API client.
///
/// Cloning is cheap and clones share the transport, credentials and the
/// deprecation marker.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: String,
    authorization: HeaderValue,
    transport: Arc<dyn Transport>,
    /// Set once a deprecated call has been made through this client
    deprecated: AtomicBool,
}

/// A named collection. Creating one does not check that it exists.
#[derive(Clone)]
pub struct Collection {
    pub(crate) client: Client,
    pub(crate) name: String,
}

impl Client {
    /// Create a client using the default pooled transport
    pub fn new(auth_token: &str) -> Result<Self> {
        let transport = ReqwestTransport::new(&Default::default())?;
        Self::with_transport(auth_token, Arc::new(transport))
    }

    /// Create a client from the host and transport settings in `config`
    pub fn from_config(auth_token: &str, config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.transport)?;
        Ok(Self::with_transport(auth_token, Arc::new(transport))?.with_host(&config.api_host))
    }

    /// Create a client that sends every request through `transport`
    pub fn with_transport(auth_token: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:", auth_token));
        let mut authorization = HeaderValue::from_str(&format!("Basic {}", credentials))?;
        authorization.set_sensitive(true);

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url: base_url(DEFAULT_API_HOST),
                authorization,
                transport,
                deprecated: AtomicBool::new(false),
            }),
        })
    }

    /// Point the client at another host. An empty host keeps the default.
    ///
    /// `host` may carry an explicit `http://` or `https://` scheme.
    pub fn with_host(self, host: &str) -> Self {
        let host = if host.is_empty() { DEFAULT_API_HOST } else { host };
        let inner = ClientInner {
            base_url: base_url(host),
            authorization: self.inner.authorization.clone(),
            transport: self.inner.transport.clone(),
            deprecated: AtomicBool::new(self.is_deprecated()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection {
            client: self.clone(),
            name: name.into(),
        }
    }

    /// Check that the service is reachable
    pub async fn ping(&self) -> Result<()> {
        self.empty_reply(Method::HEAD, "", HeaderMap::new(), None, StatusCode::OK)
            .await?;
        Ok(())
    }

    /// True once any deprecated call has been made through this client
    pub fn is_deprecated(&self) -> bool {
        self.inner.deprecated.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_deprecated(&self) {
        if !self.inner.deprecated.swap(true, Ordering::Relaxed) {
            tracing::warn!("deprecated API call made; requests now flagged as deprecated");
        }
    }

    pub fn user_agent(&self) -> &'static str {
        if self.is_deprecated() {
            USER_AGENT_DEPRECATED
        } else {
            USER_AGENT_STRING
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.inner.base_url, API_PREFIX, path)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        mut headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        headers.insert(AUTHORIZATION, self.inner.authorization.clone());
        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agent()));
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let request = Request {
            method: method.clone(),
            url: self.url(path),
            headers,
            body,
        };
        let response = self.inner.transport.round_trip(request).await?;
        tracing::debug!(%method, path, status = response.status.as_u16(), "orchestrate request");
        Ok(response)
    }

    /// Run a call that expects no body back.
    ///
    /// The response is returned so callers can read Location and ETag.
    pub(crate) async fn empty_reply(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
        expected: StatusCode,
    ) -> Result<Response> {
        let response = self.request(method, path, headers, body).await?;
        if response.status != expected {
            return Err(failure(&response));
        }
        Ok(response)
    }

    /// Run a call that expects a JSON body, decoding it into `T`
    pub(crate) async fn json_reply<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        expected: StatusCode,
    ) -> Result<(Response, T)> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip; deflate"));

        let response = self.request(method, path, headers, None).await?;
        if response.status != expected {
            return Err(failure(&response));
        }

        let body = response.decoded_body()?;
        let value = serde_json::from_slice(&body)?;
        Ok((response, value))
    }
}

fn failure(response: &Response) -> crate::Error {
    let body = response.decoded_body().unwrap_or_default();
    let err = classify(response.status, &body);
    tracing::warn!(status = response.status.as_u16(), error = %err, "orchestrate call failed");
    err
}

fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}
