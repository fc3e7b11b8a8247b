use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::CONTENT_TYPE,
};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::ClientConfig,
    error::{Error, Result},
};

/// Characters escaped when an index name is placed in a URL path.
/// Commas and `*` stay literal so multi-index and wildcard targets work.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The engine operations this crate needs. Every failure surfaces as a
/// transport error and is never retried here.
pub trait Transport {
    /// Submit a bulk body: alternating action headers and documents.
    fn bulk(&self, index: &str, body: &[Value]) -> Result<Value>;

    fn search(&self, index: &str, body: &Value) -> Result<Value>;

    fn delete_by_query(&self, index: &str, body: &Value) -> Result<Value>;

    fn create_index(&self, name: &str, body: &Value) -> Result<Value>;

    fn delete_index(&self, name: &str) -> Result<Value>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn bulk(&self, index: &str, body: &[Value]) -> Result<Value> {
        (**self).bulk(index, body)
    }

    fn search(&self, index: &str, body: &Value) -> Result<Value> {
        (**self).search(index, body)
    }

    fn delete_by_query(&self, index: &str, body: &Value) -> Result<Value> {
        (**self).delete_by_query(index, body)
    }

    fn create_index(&self, name: &str, body: &Value) -> Result<Value> {
        (**self).create_index(name, body)
    }

    fn delete_index(&self, name: &str) -> Result<Value> {
        (**self).delete_index(name)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn bulk(&self, index: &str, body: &[Value]) -> Result<Value> {
        (**self).bulk(index, body)
    }

    fn search(&self, index: &str, body: &Value) -> Result<Value> {
        (**self).search(index, body)
    }

    fn delete_by_query(&self, index: &str, body: &Value) -> Result<Value> {
        (**self).delete_by_query(index, body)
    }

    fn create_index(&self, name: &str, body: &Value) -> Result<Value> {
        (**self).create_index(name, body)
    }

    fn delete_index(&self, name: &str) -> Result<Value> {
        (**self).delete_index(name)
    }
}

/// Encode a bulk body as newline-delimited JSON, one line per entry and a
/// trailing newline.
pub fn encode_ndjson(lines: &[Value]) -> Result<String> {
    let mut out = String::new();
    for line in lines {
        out.push_str(&serde_json::to_string(line)?);
        out.push('\n');
    }
    Ok(out)
}

/// Blocking REST transport against a single engine host.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("engine host URL is empty".into()));
        }
        Ok(Self {
            client: Client::builder().build()?,
            base_url,
        })
    }

    /// Connect to the first configured host.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let host = config.hosts.first().ok_or_else(|| {
            Error::Config("no engine hosts configured".into())
        })?;
        Self::new(host.as_str())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, index: &str, endpoint: Option<&str>) -> String {
        let index = utf8_percent_encode(index, PATH_SEGMENT);
        match endpoint {
            Some(endpoint) => format!("{}/{index}/{endpoint}", self.base_url),
            None => format!("{}/{index}", self.base_url),
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(Error::Engine {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl Transport for HttpTransport {
    fn bulk(&self, index: &str, body: &[Value]) -> Result<Value> {
        debug!(index, lines = body.len(), "bulk request");
        let payload = encode_ndjson(body)?;
        self.send(
            self.client
                .post(self.url(index, Some("_bulk")))
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(payload),
        )
    }

    fn search(&self, index: &str, body: &Value) -> Result<Value> {
        debug!(index, "search request");
        self.send(self.client.post(self.url(index, Some("_search"))).json(body))
    }

    fn delete_by_query(&self, index: &str, body: &Value) -> Result<Value> {
        debug!(index, "delete-by-query request");
        self.send(
            self.client
                .post(self.url(index, Some("_delete_by_query")))
                .json(body),
        )
    }

    fn create_index(&self, name: &str, body: &Value) -> Result<Value> {
        debug!(index = name, "create index request");
        self.send(self.client.put(self.url(name, None)).json(body))
    }

    fn delete_index(&self, name: &str) -> Result<Value> {
        debug!(index = name, "delete index request");
        self.send(self.client.delete(self.url(name, None)))
    }
}
