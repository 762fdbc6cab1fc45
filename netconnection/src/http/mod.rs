// netconnection/src/http/mod.rs
use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// One named text part of a multipart/form-data body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// multipart/form-data, one text part per field
    Multipart(Vec<FormField>),
    /// Sent verbatim with the forced JSON content type
    Json(String),
}

/// An outbound POST described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn multipart(url: &str, fields: Vec<FormField>) -> Self {
        Self {
            url: url.to_string(),
            headers: Vec::new(),
            body: RequestBody::Multipart(fields),
        }
    }

    /// `Content-Type: application/json` always comes first; extra headers are
    /// appended as given, without replacing it.
    pub fn json(url: &str, body: &str, headers: Option<&HashMap<String, String>>) -> Self {
        let mut all = vec![("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string())];
        if let Some(headers) = headers {
            all.extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Self {
            url: url.to_string(),
            headers: all,
            body: RequestBody::Json(body.to_string()),
        }
    }
}

/// Whatever came back once a status line was received.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Reason phrase for `status`, as reported by the transport
    pub status_text: String,
    /// Response headers as received, for callers driving a `Transport`
    /// directly. Classification does not look at them.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, status_text: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.to_string(),
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// Generic HTTP transport trait - users can plug in their own
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute the request. Any received status, including 4xx/5xx, is `Ok`.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

pub fn form_fields_from_map(parameters: &HashMap<String, String>) -> Vec<FormField> {
    parameters
        .iter()
        .map(|(name, value)| FormField {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

/// String values are used as-is, everything else as compact JSON text.
pub fn form_fields_from_object(parameters: &Map<String, Value>) -> Vec<FormField> {
    parameters
        .iter()
        .map(|(name, value)| FormField {
            name: name.clone(),
            value: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
        .collect()
}

#[cfg(feature = "reqwest")]
pub mod reqwest;

#[cfg(feature = "reqwest")]
pub use reqwest::ReqwestTransport;
