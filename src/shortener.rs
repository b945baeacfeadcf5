//! Shortening of invitation URLs.
//!
//! Invitation URLs embed a whole DIDComm message and easily exceed what a QR
//! code can carry comfortably. Shortening is best effort: callers fall back to
//! the long URL on any failure.

use std::{fmt::Debug, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::Request;
use url::Url;

use crate::core::util::{execute_for_text, AsyncHttpClient};

const TINYURL_API: &str = "https://tinyurl.com/api-create.php";

#[async_trait]
pub trait UrlShortener: Debug + Send + Sync {
    async fn shorten(&self, url: &Url) -> Result<String>;
}

/// Uses the public TinyURL creation API, which answers with the short URL as plain text.
#[derive(Debug, Clone)]
pub struct TinyUrlShortener {
    http: Arc<dyn AsyncHttpClient>,
    api: Url,
}

impl TinyUrlShortener {
    pub fn new(http: Arc<dyn AsyncHttpClient>) -> Result<Self> {
        Ok(Self {
            http,
            api: TINYURL_API.parse().context("invalid shortener endpoint")?,
        })
    }

    pub fn with_api(http: Arc<dyn AsyncHttpClient>, api: Url) -> Self {
        Self { http, api }
    }
}

#[async_trait]
impl UrlShortener for TinyUrlShortener {
    async fn shorten(&self, url: &Url) -> Result<String> {
        let mut uri = self.api.clone();
        uri.query_pairs_mut().append_pair("url", url.as_str());

        let request = Request::builder()
            .method("GET")
            .uri(uri.as_str())
            .body(vec![])
            .context("failed to build shortener request")?;

        let short = execute_for_text(self.http.as_ref(), request).await?;
        let short = short.trim();
        if Url::parse(short).is_err() {
            bail!("shortener did not return a URL: {short}")
        }
        Ok(short.to_owned())
    }
}

/// Returns URLs unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopShortener;

#[async_trait]
impl UrlShortener for NoopShortener {
    async fn shorten(&self, url: &Url) -> Result<String> {
        Ok(url.to_string())
    }
}
