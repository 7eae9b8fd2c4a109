//! Scroll cursor client for the Elasticsearch search API.
//!
//! ```no_run
//! # async fn run() -> es_scroll::Result<()> {
//! use std::sync::Arc;
//! use es_scroll::{conf::Endpoint, EsClient, ScrollSession};
//!
//! let client = EsClient::from_endpoint(Endpoint::new("local", "http://localhost:9200"))?;
//! let mut session = ScrollSession::new(Arc::new(client), 1000, "1m")?;
//! session.init("logs", "_doc", r#"{"query":{"match_all":{}}}"#)?;
//!
//! let mut page = session.start().await?;
//! while page.has_docs() {
//!     // consume page.get_docs()
//!     page = session.next().await?;
//! }
//! session.clear().await?;
//! # Ok(())
//! # }
//! ```

pub mod audit_builder;
pub mod conf;
pub mod error;
pub mod es_client;
pub mod models;
pub mod scroll;
pub mod utils;

pub use error::{BackendError, DecodeError, Result, ScrollError, TransportError, TransportErrorKind};
pub use es_client::{EsClient, HttpClient, HttpResponse};
pub use models::{decode_scroll_response, Document, ScrollResponse, ServerInfo};
pub use scroll::{ScrollMode, ScrollQuery, ScrollSession, ScrollSessionBuilder};
