// netconnection/src/http/reqwest.rs
use super::{HttpRequest, HttpResponse, RequestBody, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::multipart::Form;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Transport backed by a single shared `reqwest::Client`.
///
/// Only connection establishment is bounded; an established request runs to
/// completion.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { inner })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut req = self.inner.post(&request.url);

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        req = match request.body {
            RequestBody::Multipart(fields) => {
                let form = fields
                    .into_iter()
                    .fold(Form::new(), |form, field| form.text(field.name, field.value));
                req.multipart(form)
            }
            RequestBody::Json(body) => req.body(body),
        };

        let resp = req.send().await?;

        let status = resp.status();
        let status_code = status.as_u16();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();

        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Body {
                status: status_code,
                message: e.to_string(),
            })?
            .to_vec();

        Ok(HttpResponse {
            status: status_code,
            status_text,
            headers,
            body,
        })
    }
}
