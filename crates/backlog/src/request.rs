use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A mutating HTTP request captured for later delivery.
///
/// Headers are kept as a multimap so repeated header names survive the trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body: Vec<u8>,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

impl BacklogRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body: Vec::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends a header value, keeping earlier values for the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Serializes the request into a message payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restores a request from a message payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}
