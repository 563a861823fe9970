//! HTTP transport over reqwest

use crate::transport::Transport;
use consentsync_core::{
    Method, Request, Response, Result, ServerConfig, SyncError, TransportFailure,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum HttpTransportError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, HttpTransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn from_config(config: &ServerConfig) -> std::result::Result<Self, HttpTransportError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            base_url: Url::parse(&config.base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            SyncError::transport(TransportFailure::Other, format!("bad path {}: {}", path, e))
        })
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn classify(err: &reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout
    } else if err.is_connect() {
        TransportFailure::Connect
    } else {
        TransportFailure::Other
    }
}

fn transport_error(err: reqwest::Error) -> SyncError {
    SyncError::transport(classify(&err), err.to_string())
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let url = self.url_for(&request.path)?;
        let method = request.method();
        debug!("{} {} ({})", method, url, request.operation);

        let mut builder = self.client.request(reqwest_method(method), url);
        if let Some(content_type) = request.content_type() {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!("{} {} failed: {}", method, request.path, e);
            transport_error(e)
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?;
        debug!("{} {} -> {} ({} bytes)", method, request.path, status, body.len());

        Ok(Response::new(status, body))
    }
}
