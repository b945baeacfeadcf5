use std::fmt::Debug;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::{header::CONTENT_TYPE, Request, Response};
use serde::{de::DeserializeOwned, Serialize};

/// Generic HTTP client used to reach the ledger registration services and the URL shortener.
///
/// A trait is used here so the collaborators can be exercised without a network.
#[async_trait]
pub trait AsyncHttpClient: Debug + Send + Sync {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

/// POST `body` as JSON and decode a successful JSON response.
pub(crate) async fn post_json<C, B, R>(client: &C, uri: &str, body: &B) -> Result<R>
where
    C: AsyncHttpClient + ?Sized,
    B: Serialize + Sync,
    R: DeserializeOwned,
{
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(serde_json::to_vec(body).context("failed to encode request body")?)
        .context("failed to build request")?;

    let body = execute_for_text(client, request).await?;
    serde_json::from_str(&body).context("failed to decode response body")
}

/// Execute `request`, failing on non-success statuses, and return the body as UTF-8.
pub(crate) async fn execute_for_text<C>(client: &C, request: Request<Vec<u8>>) -> Result<String>
where
    C: AsyncHttpClient + ?Sized,
{
    let uri = request.uri().clone();
    let response = client
        .execute(request)
        .await
        .with_context(|| format!("request to {uri} failed"))?;

    let status = response.status();
    let Ok(body) = String::from_utf8(response.into_body()) else {
        bail!("failed to parse response from {uri} as UTF-8 (status: {status})")
    };

    if !status.is_success() {
        bail!("request to {uri} was unsuccessful (status: {status}): {body}")
    }

    Ok(body)
}

#[derive(Debug)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let response = self
            .0
            .execute(request.try_into().context("unable to convert request")?)
            .await
            .context("http request failed")?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")
    }
}
