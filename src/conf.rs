use std::path::{Path, PathBuf};

use twelf::reexports::serde::{Deserialize, Serialize};
use twelf::{config, Layer};

use crate::scroll::ScrollMode;

#[config]
#[derive(Debug, Default)]
pub struct Config {
    endpoint: Endpoint,
    scroll: Scroll,
    output: Option<Output>,
    audit: Option<Audit>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Endpoint {
    name: String,
    url: String,
    #[serde(default)]
    basic_auth: Option<BasicAuth>,
    #[serde(default)]
    root_certificates: Option<String>,
    #[serde(default)]
    insecure: bool,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    transport_retries: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BasicAuth {
    username: String,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Scroll {
    index: String,
    #[serde(default = "default_doc_type")]
    doc_type: String,
    #[serde(default = "default_query")]
    query: String,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(default = "default_keep_alive")]
    keep_alive: String,
    #[serde(default)]
    mode: ScrollMode,
}

impl Default for Scroll {
    fn default() -> Self {
        Self {
            index: String::default(),
            doc_type: default_doc_type(),
            query: default_query(),
            sort: None,
            page_size: default_page_size(),
            keep_alive: default_keep_alive(),
            mode: ScrollMode::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Output {
    #[serde(default)]
    file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Audit {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_audit_file_name")]
    file_name: String,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_doc_type() -> String {
    "_doc".to_string()
}

fn default_query() -> String {
    r#"{"query":{"match_all":{}}}"#.to_string()
}

fn default_page_size() -> usize {
    1000
}

fn default_keep_alive() -> String {
    "1m".to_string()
}

fn default_audit_file_name() -> String {
    "audit/es-scroll.log".to_string()
}

impl Config {
    /// Load from a `.toml` or `.json` file, picked by extension.
    pub fn load(path: &Path) -> Result<Self, twelf::Error> {
        let layer = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Layer::Json(path.to_path_buf()),
            _ => Layer::Toml(path.to_path_buf()),
        };
        Self::with_layers(&[layer])
    }

    pub fn get_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
    pub fn get_scroll(&self) -> &Scroll {
        &self.scroll
    }
    pub fn get_output_file(&self) -> Option<&PathBuf> {
        self.output.as_ref().and_then(|output| output.file.as_ref())
    }
    pub fn get_audit_file_name(&self) -> Option<&String> {
        match &self.audit {
            Some(audit) if audit.enabled => Some(&audit.file_name),
            _ => None,
        }
    }
}

impl BasicAuth {
    pub fn get_username(&self) -> &String {
        &self.username
    }
    pub fn get_password(&self) -> &Option<String> {
        &self.password
    }
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout_seconds: default_timeout_seconds(),
            ..Self::default()
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password,
        });
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_transport_retries(mut self, transport_retries: usize) -> Self {
        self.transport_retries = transport_retries;
        self
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }
    pub fn get_url(&self) -> &String {
        &self.url
    }
    pub fn get_root_certificates(&self) -> Option<&String> {
        self.root_certificates.as_ref()
    }
    pub fn is_insecure(&self) -> bool {
        self.insecure
    }
    pub fn get_timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
    pub fn get_transport_retries(&self) -> usize {
        self.transport_retries
    }
    pub fn has_basic_auth(&self) -> bool {
        self.basic_auth.is_some()
    }
    pub fn get_username(&self) -> String {
        if let Some(basic_auth) = &self.basic_auth {
            basic_auth.get_username().clone()
        } else {
            String::default()
        }
    }
    pub fn get_password(&self) -> Option<String> {
        if let Some(basic_auth) = &self.basic_auth {
            return basic_auth.get_password().clone();
        }
        None
    }
}

impl Scroll {
    pub fn get_index(&self) -> &String {
        &self.index
    }
    pub fn get_doc_type(&self) -> &String {
        &self.doc_type
    }
    pub fn get_page_size(&self) -> usize {
        self.page_size
    }
    pub fn get_keep_alive(&self) -> &String {
        &self.keep_alive
    }
    pub fn get_mode(&self) -> ScrollMode {
        self.mode
    }

    /// The search body: `query` with `sort` merged in when configured.
    pub fn build_query_body(&self) -> Result<String, serde_json::Error> {
        let Some(sort) = &self.sort else {
            return Ok(self.query.clone());
        };
        let mut body: serde_json::Value = serde_json::from_str(&self.query)?;
        let sort: serde_json::Value = serde_json::from_str(sort)?;
        if let Some(object) = body.as_object_mut() {
            object.insert("sort".to_string(), sort);
        }
        serde_json::to_string(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_toml_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[endpoint]
name = "source"
url = "http://localhost:9200"

[endpoint.basic_auth]
username = "elastic"
password = "changeme"

[scroll]
index = "logs"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        let endpoint = config.get_endpoint();
        assert_eq!(endpoint.get_url(), "http://localhost:9200");
        assert!(endpoint.has_basic_auth());
        assert_eq!(endpoint.get_password().as_deref(), Some("changeme"));
        assert_eq!(endpoint.get_timeout_seconds(), 30);
        assert_eq!(endpoint.get_transport_retries(), 0);

        let scroll = config.get_scroll();
        assert_eq!(scroll.get_index(), "logs");
        assert_eq!(scroll.get_doc_type(), "_doc");
        assert_eq!(scroll.get_page_size(), 1000);
        assert_eq!(scroll.get_keep_alive(), "1m");
        assert_eq!(scroll.get_mode(), ScrollMode::Scroll);
        assert!(config.get_output_file().is_none());
        assert!(config.get_audit_file_name().is_none());
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "endpoint": {{"name": "src", "url": "http://es:9200", "transport_retries": 2}},
                "scroll": {{"index": "logs", "doc_type": "entry", "page_size": 50, "keep_alive": "5m", "mode": "scan"}},
                "output": {{"file": "out.jsonl"}},
                "audit": {{"enabled": true}}
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.get_endpoint().get_transport_retries(), 2);
        assert_eq!(config.get_scroll().get_page_size(), 50);
        assert_eq!(config.get_scroll().get_mode(), ScrollMode::Scan);
        assert_eq!(config.get_output_file(), Some(&PathBuf::from("out.jsonl")));
        assert_eq!(
            config.get_audit_file_name().map(String::as_str),
            Some("audit/es-scroll.log")
        );
    }

    #[test]
    fn test_build_query_body_merges_sort() {
        let scroll = Scroll {
            sort: Some(r#"[{"@timestamp":"asc"}]"#.to_string()),
            ..Scroll::default()
        };
        let body: serde_json::Value =
            serde_json::from_str(&scroll.build_query_body().unwrap()).unwrap();
        assert_eq!(body["sort"][0]["@timestamp"], "asc");
        assert!(body["query"]["match_all"].is_object());
    }
}
