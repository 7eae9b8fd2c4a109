use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client, Method, RequestBuilder};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

use crate::conf::Endpoint;
use crate::error::{BackendError, ScrollError, TransportError, TransportErrorKind};
use crate::models::server_info::ServerInfo;

/// Status and body of a completed HTTP call.
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

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one HTTP request against the search backend.
///
/// Implementations must be safe to share between sessions; a scroll session
/// only ever holds it behind an `Arc`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// `path` starts with `/` and may carry a query string.
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`HttpClient`] bound to one configured endpoint.
#[derive(Debug)]
pub struct EsClient {
    endpoint: Endpoint,
    http_client: Client,
}

fn inject_auth(request_builder: RequestBuilder, endpoint: &Endpoint) -> RequestBuilder {
    if endpoint.has_basic_auth() {
        request_builder.basic_auth(endpoint.get_username(), endpoint.get_password())
    } else {
        request_builder
    }
}

impl EsClient {
    pub fn new(endpoint: Endpoint, http_client: Client) -> Self {
        Self {
            endpoint,
            http_client,
        }
    }

    /// Build the reqwest client from the endpoint's TLS settings.
    pub fn from_endpoint(endpoint: Endpoint) -> Result<Self, TransportError> {
        let http_client = build_reqwest_client(&endpoint)?;
        Ok(Self::new(endpoint, http_client))
    }

    pub fn get_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.get_url().trim_end_matches('/'), path)
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let mut request_builder = self
            .http_client
            .request(method, url)
            .timeout(Duration::from_secs(self.endpoint.get_timeout_seconds()));
        request_builder = inject_auth(request_builder, &self.endpoint);
        if let Some(body) = body {
            request_builder = request_builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = request_builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }

    pub async fn print_server_info(&self, prefix: &str) -> Result<ServerInfo, ScrollError> {
        let server_info = server_info(self).await?;
        info!(
            "{}: hostname={}, name={}, uuid={:?}, version={}, lucene={}",
            prefix,
            server_info.get_hostname(),
            server_info.get_name(),
            server_info.get_uuid(),
            server_info.get_version(),
            server_info.get_lucene_version()
        );
        Ok(server_info)
    }
}

#[async_trait]
impl HttpClient for EsClient {
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<HttpResponse, TransportError> {
        let url = self.build_url(path);
        let retries = self.endpoint.get_transport_retries();
        debug!("{} {} (retries={})", method, url, retries);

        if retries == 0 {
            return self.send_once(method, &url, body.as_deref()).await;
        }

        // Only connect failures are retried: a request that reached the server
        // may have advanced the scroll cursor already.
        // 100ms, 200ms, 400ms, ...
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(retries);
        let url = url.as_str();
        let body = body.as_deref();
        RetryIf::spawn(
            strategy,
            move || {
                let method = method.clone();
                async move {
                    self.send_once(method.clone(), url, body)
                        .await
                        .inspect_err(|e| warn!("{} {} failed: {}", method, url, e))
                }
            },
            |e: &TransportError| e.kind() == TransportErrorKind::Connect,
        )
        .await
    }
}

/// `GET /` decoded into [`ServerInfo`].
pub async fn server_info(client: &dyn HttpClient) -> Result<ServerInfo, ScrollError> {
    let response = client.perform(Method::GET, "/", None).await?;
    if !response.is_success() {
        return Err(BackendError::from_response(response.status, response.body).into());
    }
    ServerInfo::from_json(&response.body)
}

pub fn build_reqwest_client(endpoint: &Endpoint) -> Result<Client, TransportError> {
    let mut builder = Client::builder();
    if endpoint.is_insecure() {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if let Some(path) = endpoint.get_root_certificates() {
        for cert in load_certificates(Path::new(path))? {
            builder = builder.add_root_certificate(cert);
        }
    }
    builder.build().map_err(TransportError::from)
}

/// Read PEM certificates from a single file or every file in a directory.
fn load_certificates(path: &Path) -> Result<Vec<Certificate>, TransportError> {
    let io_error = |e: std::io::Error| {
        TransportError::new(
            TransportErrorKind::Request,
            format!("cannot read certificates from {}: {}", path.display(), e),
        )
    };

    let files = if path.is_dir() {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path).map_err(io_error)? {
            let file_path = entry.map_err(io_error)?.path();
            if file_path.is_file() {
                files.push(file_path);
            }
        }
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut certs = Vec::new();
    for file_path in files {
        let content = std::fs::read(&file_path).map_err(io_error)?;
        match Certificate::from_pem(&content) {
            Ok(cert) => certs.push(cert),
            Err(e) => warn!("Skipping {}: not a PEM certificate ({})", file_path.display(), e),
        }
    }
    Ok(certs)
}
