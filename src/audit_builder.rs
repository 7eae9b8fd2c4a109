use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::warn;

use crate::error::TransportError;
use crate::es_client::{HttpClient, HttpResponse};

pub enum What {
    Request,
    ResponseOk,
    ResponseErr,
    TransportErr,
}

impl What {
    pub fn as_str(&self) -> &'static str {
        match self {
            What::Request => "Request",
            What::ResponseOk => "ResponseOk",
            What::ResponseErr => "ResponseErr",
            What::TransportErr => "TransportErr",
        }
    }
}

pub struct AuditBuilder {
    file_handler: Option<File>,
}

impl AuditBuilder {
    pub async fn new(file_name: &str) -> Self {
        if let Some(parent) = std::path::Path::new(file_name).parent() {
            let _ = fs::create_dir_all(parent).await;
        }

        let file_handler = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_name)
            .await
            .inspect_err(|e| warn!("Audit disabled, cannot open {}: {}", file_name, e))
            .ok();

        Self { file_handler }
    }

    pub async fn append_to_file(&mut self, data: &str) -> std::io::Result<()> {
        if let Some(file) = self.file_handler.as_mut() {
            file.write_all(data.as_bytes()).await?;
            file.flush().await?;
        }
        Ok(())
    }

    pub async fn record(&mut self, what: What, method: &Method, path: &str, detail: &str) {
        let line = format!(
            "{} {} {} {} {}\n",
            Utc::now().to_rfc3339(),
            what.as_str(),
            method,
            path,
            detail.replace('\n', " ")
        );
        if let Err(e) = self.append_to_file(&line).await {
            warn!("Failed to write audit line: {}", e);
        }
    }
}

/// [`HttpClient`] decorator writing every request and its outcome to an
/// audit file.
pub struct AuditedClient<C> {
    inner: C,
    audit: Mutex<AuditBuilder>,
}

impl<C: HttpClient> AuditedClient<C> {
    pub async fn new(inner: C, file_name: &str) -> Self {
        Self {
            inner,
            audit: Mutex::new(AuditBuilder::new(file_name).await),
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for AuditedClient<C> {
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<HttpResponse, TransportError> {
        self.audit
            .lock()
            .await
            .record(What::Request, &method, path, body.as_deref().unwrap_or(""))
            .await;

        let result = self.inner.perform(method.clone(), path, body).await;

        let mut audit = self.audit.lock().await;
        match &result {
            Ok(response) if response.is_success() => {
                let detail = format!("status={} bytes={}", response.status, response.body.len());
                audit.record(What::ResponseOk, &method, path, &detail).await;
            }
            Ok(response) => {
                let detail = format!("status={} {}", response.status, response.body);
                audit.record(What::ResponseErr, &method, path, &detail).await;
            }
            Err(e) => {
                audit
                    .record(What::TransportErr, &method, path, &e.to_string())
                    .await;
            }
        }
        result
    }
}
