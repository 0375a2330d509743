use serde::{Deserialize, Serialize};

use crate::store::{self, Store};

pub mod batch;
pub mod entry;
pub mod error;
pub mod ingest;
pub mod project;
pub mod sanitize;
pub mod shape;
#[cfg(test)]
pub(crate) mod test_util;

/// The four views derived from a raw QC table bundle. Each one gets its own
/// per-dashboard index.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::VariantArray,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DatasetType {
    Qc,
    Segs,
    Bins,
    GcBias,
}

impl DatasetType {
    /// Dashboard ids are case-normalized for index names but preserved
    /// verbatim everywhere else.
    #[must_use]
    pub fn index_name(self, dashboard_id: &str) -> String {
        format!("{}_{self}", dashboard_id.to_lowercase())
    }
}

/// Create `index` with the default mapping unless it already exists. Must
/// complete before the first write targeting the index; the orchestrator
/// sequences this immediately ahead of each dataset's first chunk.
///
/// # Errors
pub async fn ensure_index<S: Store>(store: &S, index: &str) -> error::Result<()> {
    if store.index_exists(index).await? {
        return Ok(());
    }

    tracing::info!(index, "no index found, creating");
    store.create_index(index, &store::default_mapping()).await?;

    Ok(())
}
