use semver::Version as Semver;
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, ScrollError};

/// Response of `GET /` on an Elasticsearch node.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerInfo {
    #[serde(rename = "name")]
    hostname: String,
    #[serde(rename = "cluster_name")]
    name: String,
    #[serde(rename = "cluster_uuid")]
    uuid: Option<String>,
    version: Version,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Version {
    number: String,
    lucene_version: String,
}

impl ServerInfo {
    pub fn from_json(text: &str) -> Result<Self, ScrollError> {
        serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e).into())
    }

    pub fn get_hostname(&self) -> &String {
        &self.hostname
    }
    pub fn get_name(&self) -> &String {
        &self.name
    }
    pub fn get_uuid(&self) -> &Option<String> {
        &self.uuid
    }
    pub fn get_version(&self) -> &String {
        &self.version.number
    }
    pub fn get_lucene_version(&self) -> &String {
        &self.version.lucene_version
    }

    /// Major version, `None` for version strings semver can't read
    /// (e.g. some OpenSearch distributions).
    pub fn get_version_major(&self) -> Option<u64> {
        Semver::parse(&self.version.number)
            .ok()
            .map(|version| version.major)
    }

    /// Typed endpoints (`/<index>/<type>/_search`) are gone from 8.0 on.
    pub fn supports_typed_search(&self) -> bool {
        self.get_version_major().map_or(true, |major| major < 8)
    }
}
