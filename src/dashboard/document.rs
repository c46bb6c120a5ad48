//! Dashboard definition documents.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AgentError, AgentResult};

/// One saved object (dashboard, visualization, search, index pattern).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardDocument {
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: Value,
}

/// Read and parse a definition file: a JSON array of documents.
///
/// A missing file is a [`AgentError::MissingResource`].
pub fn read_definition(path: &Path) -> AgentResult<Vec<DashboardDocument>> {
    if !path.is_file() {
        return Err(AgentError::MissingResource {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path).map_err(|e| AgentError::materialize(path, e))?;
    let documents: Vec<DashboardDocument> = serde_json::from_str(&content)?;
    Ok(documents)
}

/// Newline-delimited `_bulk` request body indexing `documents` into `index`.
pub fn bulk_body(index: &str, documents: &[DashboardDocument]) -> AgentResult<String> {
    let mut body = String::new();
    for doc in documents {
        let action = json!({
            "index": { "_index": index, "_type": doc.doc_type, "_id": doc.id }
        });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&doc.source)?);
        body.push('\n');
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEFINITION: &str = r#"[
        {"_type": "dashboard", "_id": "Metron-Dashboard", "_source": {"title": "Metron"}},
        {"_type": "index-pattern", "_id": "bro*", "_source": {"title": "bro*", "timeFieldName": "timestamp"}}
    ]"#;

    #[test]
    fn test_read_definition() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dashboard.json");
        fs::write(&path, DEFINITION).unwrap();

        let docs = read_definition(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].doc_type, "dashboard");
        assert_eq!(docs[1].source["timeFieldName"], "timestamp");
    }

    #[test]
    fn test_missing_definition() {
        let tmp = TempDir::new().unwrap();
        let result = read_definition(&tmp.path().join("absent.json"));
        assert!(matches!(result, Err(AgentError::MissingResource { .. })));
    }

    #[test]
    fn test_malformed_definition() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dashboard.json");
        fs::write(&path, r#"{"not": "an array"}"#).unwrap();
        assert!(matches!(
            read_definition(&path),
            Err(AgentError::Serialization(_))
        ));
    }

    #[test]
    fn test_bulk_body_pairs_actions_with_sources() {
        let docs: Vec<DashboardDocument> = serde_json::from_str(DEFINITION).unwrap();
        let body = bulk_body(".kibana", &docs).unwrap();
        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["index"]["_index"], ".kibana");
        assert_eq!(lines[0]["index"]["_id"], "Metron-Dashboard");
        assert_eq!(lines[1]["title"], "Metron");
        assert_eq!(lines[2]["index"]["_type"], "index-pattern");
        assert!(body.ends_with('\n'));
    }
}
