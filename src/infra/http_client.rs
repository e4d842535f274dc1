use crate::app::ports::{TrackingServicePort, TransportError};
use crate::error::Result;
use crate::pipeline::lookup::LookupRequest;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;

/// HTTP adapter for the tracking service: JSON POST to the service root
pub struct ReqwestTracking {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestTracking {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connection(err.to_string())
    }
}

/// Empty bodies mean "nothing found", same as a falsy JSON value
pub(crate) fn decode_body(bytes: &[u8]) -> std::result::Result<Value, TransportError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| TransportError::Decode(e.to_string()))
}

#[async_trait]
impl TrackingServicePort for ReqwestTracking {
    async fn post_lookup(&self, request: &LookupRequest) -> std::result::Result<Value, TransportError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let bytes = resp.bytes().await.map_err(classify)?;
        decode_body(&bytes)
    }
}
