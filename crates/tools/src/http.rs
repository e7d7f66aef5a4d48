//! Shared HTTP plumbing for the built-in tool servers.
//!
//! Upstream data APIs (GoPlus, Moralis, ParaSwap, ByteHunter) are occasionally
//! flaky, so transient failures (connect errors, timeouts, 5xx) get a
//! couple of retries with a short backoff before the error is folded
//! into tool output text.

use std::time::Duration;

use serde_json::Value;

use w3_domain::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: usize = 2;

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// JSON-over-HTTP client with retry, shared by every tool server.
#[derive(Clone)]
pub struct ToolHttp {
    client: reqwest::Client,
}

impl ToolHttp {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self { client })
    }

    /// GET a JSON document.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: &[(&str, &str)],
    ) -> Result<Value> {
        self.send_with_retry(url, || {
            let mut req = self.client.get(url).query(query);
            for (name, value) in headers {
                req = req.header(*name, *value);
            }
            req
        })
        .await
    }

    /// POST a JSON body and read a JSON document back.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.send_with_retry(url, || self.client.post(url).json(body))
            .await
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() && attempt < MAX_RETRIES {
                        tracing::debug!(url, %status, attempt, "upstream 5xx, retrying");
                    } else {
                        let text = resp.text().await.map_err(from_reqwest)?;
                        if !status.is_success() {
                            return Err(Error::Http(format!("{url} returned {status}: {text}")));
                        }
                        return serde_json::from_str(&text).map_err(Error::Json);
                    }
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < MAX_RETRIES => {
                    tracing::debug!(url, error = %e, attempt, "request failed, retrying");
                }
                Err(e) => return Err(from_reqwest(e)),
            }

            attempt += 1;
            tokio::time::sleep(Duration::from_millis(300 * attempt as u64)).await;
        }
    }
}
