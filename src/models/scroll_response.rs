use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use tracing::trace;

use crate::error::{BackendError, DecodeError, ScrollError};

/// One page of a scroll, hits kept in the order the backend returned them.
#[derive(Debug, Clone)]
pub struct ScrollResponse {
    scroll_id: String,
    total_docs: Option<u64>,
    took: Option<u64>,
    docs: Vec<Document>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_index")]
    index_name: Option<String>,
    #[serde(rename = "_type")]
    doc_type: Option<String>,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Option<Value>,
    sort: Option<Vec<Value>>,
}

/// `hits.total` is a number before 7.x and `{value, relation}` after.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            TotalHits::Count(value) => *value,
            TotalHits::Object { value } => *value,
        }
    }
}

/// Decode the body of a 2xx search or scroll response.
pub fn decode_scroll_response(text: &str) -> Result<ScrollResponse, ScrollError> {
    decode_with_status(200, text)
}

pub(crate) fn decode_with_status(status: u16, text: &str) -> Result<ScrollResponse, ScrollError> {
    let json_value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;
    let Some(document) = json_value.as_object() else {
        return Err(DecodeError::NotAnObject.into());
    };

    if let Some(err) = document.get("error") {
        if err.as_bool() != Some(false) {
            return Err(BackendError::from_response(status, text).into());
        }
    }

    let timed_out = match document.get("timed_out") {
        None => false,
        Some(Value::Bool(value)) => *value,
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: "timed_out",
                message: format!("expected bool, got {other}"),
            }
            .into())
        }
    };
    let failed_shards = match document.get("_shards").and_then(|shards| shards.get("failed")) {
        None => 0,
        Some(failed) => failed.as_u64().ok_or_else(|| DecodeError::InvalidField {
            field: "_shards.failed",
            message: format!("expected a non-negative integer, got {failed}"),
        })?,
    };
    if timed_out || failed_shards > 0 {
        return Err(ScrollError::PartialResults {
            timed_out,
            failed_shards,
        });
    }

    let hits = document
        .get("hits")
        .ok_or(DecodeError::MissingField("hits"))?;
    let raw_docs = hits
        .get("hits")
        .ok_or(DecodeError::MissingField("hits.hits"))?;
    let raw_docs = raw_docs.as_array().ok_or_else(|| DecodeError::InvalidField {
        field: "hits.hits",
        message: "expected an array".to_string(),
    })?;

    let scroll_id = match document.get("_scroll_id") {
        None | Some(Value::Null) => return Err(DecodeError::MissingField("_scroll_id").into()),
        Some(Value::String(value)) if !value.is_empty() => value.clone(),
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: "_scroll_id",
                message: format!("expected a non-empty string, got {other}"),
            }
            .into())
        }
    };

    let total_docs = match hits.get("total") {
        None | Some(Value::Null) => None,
        Some(total) => {
            let total = TotalHits::deserialize(total).map_err(|e| DecodeError::InvalidField {
                field: "hits.total",
                message: e.to_string(),
            })?;
            Some(total.value())
        }
    };
    let took = document.get("took").and_then(Value::as_u64);

    let mut docs: Vec<Document> = Vec::with_capacity(raw_docs.len());
    for hit in raw_docs {
        trace!("hit: {:?}", hit);
        let doc = Document::deserialize(hit).map_err(|e| DecodeError::InvalidField {
            field: "hits.hits",
            message: e.to_string(),
        })?;
        docs.push(doc);
    }

    Ok(ScrollResponse {
        scroll_id,
        total_docs,
        took,
        docs,
    })
}

impl ScrollResponse {
    pub fn get_scroll_id(&self) -> &String {
        &self.scroll_id
    }
    pub fn get_docs(&self) -> &Vec<Document> {
        &self.docs
    }
    pub fn into_docs(self) -> Vec<Document> {
        self.docs
    }
    pub fn get_current_size(&self) -> u64 {
        self.docs.len() as u64
    }
    pub fn has_docs(&self) -> bool {
        !self.docs.is_empty()
    }
    pub fn get_total_size(&self) -> Option<u64> {
        self.total_docs
    }
    pub fn get_took(&self) -> Option<u64> {
        self.took
    }
}

impl Document {
    pub fn get_id(&self) -> &String {
        &self.id
    }
    pub fn get_index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }
    pub fn get_doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }
    pub fn get_score(&self) -> Option<f64> {
        self.score
    }
    pub fn get_source(&self) -> Option<&Value> {
        self.source.as_ref()
    }
    pub fn get_sort(&self) -> Option<&Vec<Value>> {
        self.sort.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_legacy_total() {
        let page = decode_scroll_response(
            r#"{"_scroll_id":"abc123","hits":{"total":2,"hits":[{"_id":"1","_source":{}}]}}"#,
        )
        .unwrap();
        assert_eq!(page.get_scroll_id(), "abc123");
        assert_eq!(page.get_total_size(), Some(2));
        assert_eq!(page.get_current_size(), 1);
        assert_eq!(page.get_docs()[0].get_id(), "1");
        assert_eq!(page.get_docs()[0].get_source(), Some(&json!({})));
    }

    #[test]
    fn test_decode_full_hit_and_object_total() {
        let body = json!({
            "_scroll_id": "c2Nhbg",
            "took": 7,
            "timed_out": false,
            "_shards": {"total": 5, "successful": 5, "failed": 0},
            "hits": {
                "total": {"value": 10000, "relation": "gte"},
                "max_score": null,
                "hits": [
                    {"_index": "logs", "_type": "entry", "_id": "b", "_score": 1.5, "_source": {"msg": "x"}},
                    {"_index": "logs", "_type": "entry", "_id": "a", "_score": null, "_source": {"msg": "y"}, "sort": [0]}
                ]
            }
        });
        let page = decode_scroll_response(&body.to_string()).unwrap();
        assert_eq!(page.get_total_size(), Some(10000));
        assert_eq!(page.get_took(), Some(7));

        let ids: Vec<&str> = page.get_docs().iter().map(|d| d.get_id().as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let first = &page.get_docs()[0];
        assert_eq!(first.get_index_name(), Some("logs"));
        assert_eq!(first.get_doc_type(), Some("entry"));
        assert_eq!(first.get_score(), Some(1.5));
        assert_eq!(page.get_docs()[1].get_score(), None);
        assert_eq!(page.get_docs()[1].get_sort(), Some(&vec![json!(0)]));
    }

    #[test]
    fn test_decode_empty_page_is_not_an_error() {
        let page =
            decode_scroll_response(r#"{"_scroll_id":"abc125","hits":{"total":2,"hits":[]}}"#)
                .unwrap();
        assert!(!page.has_docs());
        assert_eq!(page.get_scroll_id(), "abc125");
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode_scroll_response("{\"_scroll_id\": ").unwrap_err();
        assert!(matches!(err, ScrollError::Decode(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn test_decode_not_object() {
        let err = decode_scroll_response("[1,2]").unwrap_err();
        assert!(matches!(err, ScrollError::Decode(DecodeError::NotAnObject)));
    }

    #[test]
    fn test_decode_missing_hits_array() {
        let err = decode_scroll_response(r#"{"_scroll_id":"x","hits":{"total":0}}"#).unwrap_err();
        assert!(matches!(
            err,
            ScrollError::Decode(DecodeError::MissingField("hits.hits"))
        ));

        let err = decode_scroll_response(r#"{"_scroll_id":"x"}"#).unwrap_err();
        assert!(matches!(err, ScrollError::Decode(DecodeError::MissingField("hits"))));
    }

    #[test]
    fn test_decode_missing_or_empty_scroll_id() {
        let err = decode_scroll_response(r#"{"hits":{"hits":[]}}"#).unwrap_err();
        assert!(matches!(
            err,
            ScrollError::Decode(DecodeError::MissingField("_scroll_id"))
        ));

        let err = decode_scroll_response(r#"{"_scroll_id":"","hits":{"hits":[]}}"#).unwrap_err();
        assert!(matches!(
            err,
            ScrollError::Decode(DecodeError::InvalidField { field: "_scroll_id", .. })
        ));
    }

    #[test]
    fn test_decode_hit_without_id() {
        let err =
            decode_scroll_response(r#"{"_scroll_id":"x","hits":{"hits":[{"_source":{}}]}}"#)
                .unwrap_err();
        assert!(matches!(
            err,
            ScrollError::Decode(DecodeError::InvalidField { field: "hits.hits", .. })
        ));
    }

    #[test]
    fn test_decode_error_member_is_backend_error() {
        let err = decode_scroll_response(r#"{"error":{"type":"x","reason":"y"}}"#).unwrap_err();
        match err {
            ScrollError::Backend(backend) => {
                assert_eq!(backend.status, 200);
                assert_eq!(backend.reason.as_deref(), Some("y"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_error_false_is_ignored() {
        let page =
            decode_scroll_response(r#"{"error":false,"_scroll_id":"x","hits":{"hits":[]}}"#)
                .unwrap();
        assert_eq!(page.get_scroll_id(), "x");
    }

    #[test]
    fn test_decode_partial_results() {
        let err = decode_scroll_response(
            r#"{"_scroll_id":"x","timed_out":true,"hits":{"hits":[]}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScrollError::PartialResults {
                timed_out: true,
                failed_shards: 0
            }
        ));

        let err = decode_scroll_response(
            r#"{"_scroll_id":"x","_shards":{"total":3,"failed":2},"hits":{"hits":[]}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScrollError::PartialResults {
                timed_out: false,
                failed_shards: 2
            }
        ));
    }

    #[test]
    fn test_decode_non_integer_failed_shards() {
        let err = decode_scroll_response(
            r#"{"_scroll_id":"x","_shards":{"total":3,"failed":"2"},"hits":{"hits":[]}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScrollError::Decode(DecodeError::InvalidField { field: "_shards.failed", .. })
        ));
    }

    #[test]
    fn test_into_docs_keeps_order() {
        let page = decode_scroll_response(
            r#"{"_scroll_id":"x","hits":{"hits":[{"_id":"b"},{"_id":"a"}]}}"#,
        )
        .unwrap();
        let ids: Vec<String> = page.into_docs().into_iter().map(|d| d.get_id().clone()).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_document_serializes_without_empty_fields() {
        let page =
            decode_scroll_response(r#"{"_scroll_id":"x","hits":{"hits":[{"_id":"1","_source":{"a":1}}]}}"#)
                .unwrap();
        let line = serde_json::to_string(&page.get_docs()[0]).unwrap();
        assert_eq!(line, r#"{"_id":"1","_source":{"a":1}}"#);
    }
}
