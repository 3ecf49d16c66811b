//! HTTP transport used by the remote driver.
//!
//! The driver only talks to [`HttpClient`], so tests can script responses
//! without a network.

use async_trait::async_trait;
use eyre::{Context, Result};

/// Accept header of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Json,
    Text,
    Any,
}

impl Accept {
    pub fn header_value(&self) -> &'static str {
        match self {
            Accept::Json => "application/json; charset=utf-8",
            Accept::Text => "text/*; charset=utf-8",
            Accept::Any => "*/*",
        }
    }
}

/// A received response. Any status is a response; only transport failures are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 and 201 are the only accepted statuses.
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201)
    }
}

/// Ordered form fields where setting a name again replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(field) => field.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Minimal HTTP surface the remote driver needs.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET request.
    async fn get(&self, url: &str, accept: Accept) -> Result<HttpResponse>;

    /// Issue a multipart POST request.
    async fn post_form(&self, url: &str, form: FormData) -> Result<HttpResponse>;
}

/// [`HttpClient`] backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, accept: Accept) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept.header_value())
            .send()
            .await
            .with_context(|| format!("GET {} failed", redact(url)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", redact(url)))?;
        Ok(HttpResponse { status, body })
    }

    async fn post_form(&self, url: &str, form: FormData) -> Result<HttpResponse> {
        let multipart = form
            .fields
            .into_iter()
            .fold(reqwest::multipart::Form::new(), |multipart, (name, value)| {
                multipart.text(name, value)
            });

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, Accept::Any.header_value())
            .multipart(multipart)
            .send()
            .await
            .with_context(|| format!("POST {} failed", redact(url)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", redact(url)))?;
        Ok(HttpResponse { status, body })
    }
}

/// Strip the query string so tokens don't end up in logs and errors.
pub fn redact(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}
