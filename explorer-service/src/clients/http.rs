//! HTTP GET capability for Firestore, Supabase and generic REST backends.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{ClientError, ClientResult};

/// Status and decoded body of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed JSON, or the raw text as a JSON string when the body is not JSON.
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Issues a GET. Transport errors and timeouts are `Err`; any HTTP
    /// status, including 4xx/5xx, is returned as a response.
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> ClientResult<HttpResponse>;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> ClientResult<HttpResponse> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(ClientError::new)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(ClientError::new)?;

        Ok(HttpResponse {
            status,
            body: decode_body(text),
        })
    }
}

fn decode_body(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
