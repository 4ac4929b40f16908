//! HTTP transport seam.
//!
//! [`Client`](crate::Client) never talks to reqwest directly; it hands a fully
//! built [`Request`] to a [`Transport`] and gets back a [`Response`] whose
//! body has already been read to the end, so the connection can go back to
//! the pool whatever the status was.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use orchestrate_core::TransportConfig;
use reqwest::header::{HeaderMap, CONTENT_ENCODING};
use reqwest::{Method, StatusCode};

use crate::Result;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Raw body bytes, possibly still compressed
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Header value as a string; None if absent or not valid ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body with any gzip or deflate content encoding removed
    pub fn decoded_body(&self) -> Result<Vec<u8>> {
        match self.header(CONTENT_ENCODING.as_str()) {
            Some(enc) if enc.eq_ignore_ascii_case("gzip") => {
                let mut out = Vec::new();
                GzDecoder::new(self.body.as_slice()).read_to_end(&mut out)?;
                Ok(out)
            }
            Some(enc) if enc.eq_ignore_ascii_case("deflate") => {
                let mut out = Vec::new();
                if is_zlib(&self.body) {
                    ZlibDecoder::new(self.body.as_slice()).read_to_end(&mut out)?;
                } else {
                    DeflateDecoder::new(self.body.as_slice()).read_to_end(&mut out)?;
                }
                Ok(out)
            }
            _ => Ok(self.body.clone()),
        }
    }
}

/// "deflate" is meant to be zlib-wrapped but raw streams are common
fn is_zlib(body: &[u8]) -> bool {
    match body {
        [cmf, flg, ..] => cmf & 0x0f == 8 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}

/// Executes one HTTP exchange
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: Request) -> Result<Response>;
}

/// Default transport: a pooled reqwest client with bounded dial and
/// response waits
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .connect_timeout(config.dial_timeout())
            .read_timeout(config.response_header_timeout())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn round_trip(&self, request: Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
