//! Kibana dashboard loading.
//!
//! Replaces the `.kibana` index with the saved objects from a local
//! definition file. The definition is read and parsed before the index is
//! touched, so a missing or broken file leaves the existing dashboards in
//! place.

mod client;
mod document;

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};

pub use client::{HttpIndexClient, IndexClient, IndexResponse};
pub use document::{bulk_body, read_definition, DashboardDocument};

/// Index holding Kibana's saved objects.
pub const KIBANA_INDEX: &str = ".kibana";

#[derive(Deserialize)]
struct BulkSummary {
    #[serde(default)]
    errors: bool,
}

/// Load the dashboard definition at `path` into the search index.
///
/// Returns the number of documents loaded.
pub fn load_dashboard(client: &dyn IndexClient, path: &Path) -> AgentResult<usize> {
    let documents = read_definition(path)?;
    let body = bulk_body(KIBANA_INDEX, &documents)?;
    info!(
        path = %path.display(),
        documents = documents.len(),
        "Dashboard definition read"
    );

    let deleted = client.delete_index(KIBANA_INDEX)?;
    match deleted.status {
        400 | 404 => warn!(
            index = KIBANA_INDEX,
            status = deleted.status,
            "Index not deleted; continuing"
        ),
        _ if deleted.is_success() => info!(index = KIBANA_INDEX, "Index deleted"),
        status => {
            return Err(AgentError::Index {
                message: format!(
                    "Deleting {} returned HTTP {}: {}",
                    KIBANA_INDEX, status, deleted.body
                ),
            })
        }
    }

    if documents.is_empty() {
        return Ok(0);
    }

    let loaded = client.bulk(body)?;
    if !loaded.is_success() {
        return Err(AgentError::Index {
            message: format!("Bulk load returned HTTP {}: {}", loaded.status, loaded.body),
        });
    }
    let summary: BulkSummary = serde_json::from_str(&loaded.body)?;
    if summary.errors {
        return Err(AgentError::Index {
            message: format!("Bulk load reported item errors: {}", loaded.body),
        });
    }

    info!(
        index = KIBANA_INDEX,
        documents = documents.len(),
        "Dashboard loaded"
    );
    Ok(documents.len())
}
