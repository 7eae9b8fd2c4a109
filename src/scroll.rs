//! Scroll cursor session.
//!
//! A [`ScrollSession`] drives one backend scroll cursor through
//! `init -> start -> next* -> clear`. Mutating operations take `&mut self`,
//! so a single session never has two fetches in flight; independent sessions
//! can share one [`HttpClient`].

use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::es_client::{HttpClient, HttpResponse};
use crate::error::{BackendError, Result, ScrollError};
use crate::models::scroll_response::{decode_with_status, ScrollResponse};

const SCROLL_PATH: &str = "/_search/scroll";
const ALL_INDICES: &str = "_all";

/// How the initiating search orders hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollMode {
    /// Keep the query's own ordering.
    #[default]
    Scroll,
    /// Sort by `_doc` unless the query sorts itself; fastest for full exports.
    Scan,
}

/// Target and body of the initiating search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollQuery {
    index_name: String,
    document_type: String,
    query: Map<String, Value>,
}

impl ScrollQuery {
    pub fn get_index_name(&self) -> &String {
        &self.index_name
    }
    pub fn get_document_type(&self) -> &String {
        &self.document_type
    }
    pub fn get_query(&self) -> &Map<String, Value> {
        &self.query
    }

    fn search_path(&self, keep_alive: &str) -> String {
        let index_name = if self.index_name.is_empty() {
            ALL_INDICES
        } else {
            self.index_name.as_str()
        };
        format!(
            "/{}/{}/_search?scroll={}",
            index_name, self.document_type, keep_alive
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
enum ScrollState {
    #[default]
    Uninitialized,
    Initialized {
        query: ScrollQuery,
    },
    Started {
        query: ScrollQuery,
        scroll_id: String,
    },
}

pub struct ScrollSession {
    client: Arc<dyn HttpClient>,
    page_size: usize,
    keep_alive: String,
    mode: ScrollMode,
    state: ScrollState,
}

impl fmt::Debug for ScrollSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollSession")
            .field("page_size", &self.page_size)
            .field("keep_alive", &self.keep_alive)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ScrollSession`].
#[derive(Default)]
pub struct ScrollSessionBuilder {
    client: Option<Arc<dyn HttpClient>>,
    page_size: usize,
    keep_alive: String,
    mode: ScrollMode,
}

impl ScrollSessionBuilder {
    pub fn client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = keep_alive.into();
        self
    }

    pub fn mode(mut self, mode: ScrollMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> Result<ScrollSession> {
        let client = self
            .client
            .ok_or_else(|| ScrollError::construction("a valid HttpClient is required"))?;
        let mut session = ScrollSession::new(client, self.page_size, self.keep_alive)?;
        session.mode = self.mode;
        Ok(session)
    }
}

impl ScrollSession {
    pub fn new(
        client: Arc<dyn HttpClient>,
        page_size: usize,
        keep_alive: impl Into<String>,
    ) -> Result<Self> {
        let keep_alive = keep_alive.into();
        if page_size == 0 {
            return Err(ScrollError::construction("page size must be greater than 0"));
        }
        if keep_alive.trim().is_empty() {
            return Err(ScrollError::construction("keep alive must not be empty"));
        }
        Ok(Self {
            client,
            page_size,
            keep_alive,
            mode: ScrollMode::default(),
            state: ScrollState::Uninitialized,
        })
    }

    pub fn builder() -> ScrollSessionBuilder {
        ScrollSessionBuilder::default()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn keep_alive(&self) -> &str {
        &self.keep_alive
    }

    pub fn mode(&self) -> ScrollMode {
        self.mode
    }

    /// Was `init()` called since the last `clear()`?
    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, ScrollState::Uninitialized)
    }

    /// Does the session hold a backend cursor?
    pub fn is_scroll_started(&self) -> bool {
        matches!(self.state, ScrollState::Started { .. })
    }

    pub fn scroll_id(&self) -> Option<&str> {
        match &self.state {
            ScrollState::Started { scroll_id, .. } => Some(scroll_id),
            _ => None,
        }
    }

    pub fn query(&self) -> Option<&ScrollQuery> {
        match &self.state {
            ScrollState::Uninitialized => None,
            ScrollState::Initialized { query } | ScrollState::Started { query, .. } => Some(query),
        }
    }

    /// Set the search to scroll over.
    ///
    /// A started cursor is kept as is: call `clear()` first, otherwise the old
    /// cursor stays open on the backend until its keep alive runs out.
    pub fn init(
        &mut self,
        index_name: impl Into<String>,
        document_type: impl Into<String>,
        query_body: &str,
    ) -> Result<()> {
        let document_type = document_type.into();
        if document_type.is_empty() {
            return Err(ScrollError::invalid_query("document type must not be empty"));
        }
        if query_body.trim().is_empty() {
            return Err(ScrollError::invalid_query("query body must not be empty"));
        }
        let query = match serde_json::from_str::<Value>(query_body) {
            Ok(Value::Object(query)) => query,
            Ok(_) => return Err(ScrollError::invalid_query("query body must be a JSON object")),
            Err(e) => return Err(ScrollError::invalid_query(e.to_string())),
        };
        let query = ScrollQuery {
            index_name: index_name.into(),
            document_type,
            query,
        };

        self.state = match std::mem::take(&mut self.state) {
            ScrollState::Started { scroll_id, .. } => {
                warn!(
                    scroll_id = %scroll_id,
                    "Re-initializing a started scroll, the active cursor is kept until clear()"
                );
                ScrollState::Started { query, scroll_id }
            }
            _ => ScrollState::Initialized { query },
        };
        Ok(())
    }

    /// Run the initiating search and return the first page.
    #[instrument(skip_all, fields(page_size = self.page_size, keep_alive = %self.keep_alive))]
    pub async fn start(&mut self) -> Result<ScrollResponse> {
        let query = match &self.state {
            ScrollState::Uninitialized => return Err(ScrollError::NotInitialized),
            ScrollState::Initialized { query } | ScrollState::Started { query, .. } => {
                query.clone()
            }
        };
        if let ScrollState::Started { scroll_id, .. } = &self.state {
            warn!(scroll_id = %scroll_id, "Starting a new scroll over a started one");
        }

        let body = self.search_body(&query);
        let path = query.search_path(&self.keep_alive);
        let response = self.run(Method::POST, &path, body).await?;

        info!(
            index = %query.index_name,
            total = ?response.get_total_size(),
            docs = response.get_current_size(),
            "Scroll started"
        );
        self.state = ScrollState::Started {
            query,
            scroll_id: response.get_scroll_id().clone(),
        };
        Ok(response)
    }

    /// Fetch the next page. An empty page means the scroll is exhausted.
    #[instrument(skip_all)]
    pub async fn next(&mut self) -> Result<ScrollResponse> {
        let scroll_id = match &self.state {
            ScrollState::Uninitialized => return Err(ScrollError::NotInitialized),
            ScrollState::Initialized { .. } => return Err(ScrollError::NotStarted),
            ScrollState::Started { scroll_id, .. } => scroll_id,
        };

        let body = json!({"scroll": self.keep_alive, "scroll_id": scroll_id}).to_string();
        let response = self.run(Method::POST, SCROLL_PATH, body).await?;

        debug!(docs = response.get_current_size(), "Scroll page fetched");
        if let ScrollState::Started { scroll_id, .. } = &mut self.state {
            scroll_id.clone_from(response.get_scroll_id());
        }
        Ok(response)
    }

    /// Release the backend cursor and forget the query.
    ///
    /// Local state is reset even when the release request fails; the failure
    /// is still returned.
    #[instrument(skip_all)]
    pub async fn clear(&mut self) -> Result<()> {
        let ScrollState::Started { scroll_id, .. } = std::mem::take(&mut self.state) else {
            return Ok(());
        };

        let body = json!({ "scroll_id": scroll_id }).to_string();
        match self.send(Method::DELETE, SCROLL_PATH, body).await {
            Ok(_) => {
                info!("Scroll cleared");
                Ok(())
            }
            Err(e) => {
                warn!(scroll_id = %scroll_id, "Failed to clear scroll: {}", e);
                Err(e)
            }
        }
    }

    fn search_body(&self, query: &ScrollQuery) -> String {
        let mut body = query.query.clone();
        if let Some(size) = body.get("size") {
            debug!("Overriding query size {} with page size {}", size, self.page_size);
        }
        body.insert("size".to_string(), Value::from(self.page_size));
        if self.mode == ScrollMode::Scan && !body.contains_key("sort") {
            body.insert("sort".to_string(), Value::from(vec!["_doc"]));
        }
        Value::Object(body).to_string()
    }

    /// One request, any 2xx accepted, body left undecoded.
    async fn send(&self, method: Method, path: &str, body: String) -> Result<HttpResponse> {
        debug!("{} {}", method, path);
        let response = self.client.perform(method, path, Some(body)).await?;
        if !response.is_success() {
            return Err(BackendError::from_response(response.status, response.body).into());
        }
        Ok(response)
    }

    /// One request decoded as a scroll page.
    async fn run(&self, method: Method, path: &str, body: String) -> Result<ScrollResponse> {
        let response = self.send(method, path, body).await?;
        decode_with_status(response.status, &response.body)
    }
}

impl Drop for ScrollSession {
    fn drop(&mut self) {
        if let ScrollState::Started { scroll_id, .. } = &self.state {
            warn!(
                scroll_id = %scroll_id,
                keep_alive = %self.keep_alive,
                "Scroll session dropped without clear(), cursor stays open until keep alive expires"
            );
        }
    }
}
