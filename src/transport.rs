//! HTTP transport for the token endpoint.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::TransportError;

/// Sends a form-encoded POST and returns the raw response.
///
/// [`ReqwestTransport`] is the production implementation. The deadline is enforced by
/// [`ValidationClient`](crate::ValidationClient) around the call, so implementations do not need
/// their own timeout.
#[async_trait]
pub trait TokenTransport: Send + Sync {
    async fn post_form(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<HttpResponse, TransportError>;
}

/// HTTP response from the token endpoint
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// [`TokenTransport`] backed by a [`reqwest::Client`].
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }

    /// Use an existing client, e.g. to share its connection pool
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenTransport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.post(url).body(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, body })
    }
}
