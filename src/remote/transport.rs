use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{blocking::Client, redirect::Policy};
use serde_json::Value;

use crate::error::TransportError;

/// A single blocking GET against a layer query endpoint, returning the decoded JSON body.
pub trait QueryTransport {
    fn get_json(&self, url: &str, params: &[(&str, String)], timeout: Duration) -> Result<Value, TransportError>;
}

impl<T: QueryTransport + ?Sized> QueryTransport for &T {
    fn get_json(&self, url: &str, params: &[(&str, String)], timeout: Duration) -> Result<Value, TransportError> {
        (**self).get_json(url, params, timeout)
    }
}

/// `reqwest` blocking implementation of [`QueryTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::limited(10))
            .build()
            .context("[remote::transport] Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl QueryTransport for HttpTransport {
    fn get_json(&self, url: &str, params: &[(&str, String)], timeout: Duration) -> Result<Value, TransportError> {
        let resp = self.client.get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body: Value = resp.json()
            .map_err(|e| TransportError::Body(e.to_string()))?;
        check_service_error(body)
    }
}

/// Turn an ArcGIS `{"error": {...}}` payload into a [`TransportError::Service`].
pub(crate) fn check_service_error(body: Value) -> Result<Value, TransportError> {
    match body.get("error") {
        Some(error) if !error.is_null() => Err(TransportError::Service {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error.get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        }),
        _ => Ok(body),
    }
}
