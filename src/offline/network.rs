use anyhow::Context as _;
use async_trait::async_trait;

use crate::offline::request::{FetchRequest, FetchResponse};

/// Transport used by the worker. Any HTTP status is a successful fetch; only transport-level
/// failures are errors.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse>;
}

// Framing headers describe the upstream connection, not the stored body.
const SKIPPED_HEADERS: [&str; 4] = [
    "connection",
    "content-length",
    "keep-alive",
    "transfer-encoding",
];

#[derive(Debug, Clone, Default)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("invalid method: {}", request.method))?;
        let resp = self
            .client
            .request(method, request.url.clone())
            .send()
            .await
            .with_context(|| format!("fetch {}", request.url))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter(|(name, _)| !SKIPPED_HEADERS.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("read body: {}", request.url))?;

        Ok(FetchResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
