//! The per-dashboard catalog record. Its presence in the master index is the
//! authoritative proof that a dashboard finished loading.

use serde::{Deserialize, Serialize};

use crate::{
    engine::{ensure_index, error},
    store::{self, DASHBOARD_ENTRY_INDEX, Store},
};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DashboardType {
    Single,
    Merged,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardEntry {
    pub dashboard_id: String,
    /// Historically a duplicate of the dashboard id; kept for readers that
    /// still query it.
    pub jira_id: String,
    pub sample_id: String,
    pub description: String,
    pub dashboard_type: DashboardType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Vec<String>>,
}

impl DashboardEntry {
    /// Build and validate an entry from caller-supplied metadata. A
    /// `libraries` key marks the dashboard as merged; otherwise `library_id`
    /// is required. Missing required keys are a precondition failure, so
    /// this runs before any data is written.
    ///
    /// # Errors
    pub fn from_metadata(
        dashboard_id: &str,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> error::Result<Self> {
        let sample_id = required_str(metadata, "sample_id")?;
        let description = required_str(metadata, "description")?;

        let (dashboard_type, library_id, libraries) = if metadata.contains_key("libraries") {
            (
                DashboardType::Merged,
                None,
                Some(required_str_list(metadata, "libraries")?),
            )
        } else {
            (
                DashboardType::Single,
                Some(required_str(metadata, "library_id")?),
                None,
            )
        };

        Ok(Self {
            dashboard_id: dashboard_id.to_string(),
            jira_id: dashboard_id.to_string(),
            sample_id,
            description,
            dashboard_type,
            library_id,
            libraries,
        })
    }
}

fn required_str(
    metadata: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> error::Result<String> {
    metadata
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| error::Error::MissingMetadata {
            field: field.to_string(),
        })
}

fn required_str_list(
    metadata: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> error::Result<Vec<String>> {
    metadata
        .get(field)
        .and_then(serde_json::Value::as_array)
        .map(|values| {
            values
                .iter()
                .map(|value| {
                    value
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| error::Error::MissingMetadata {
                            field: field.to_string(),
                        })
                })
                .collect()
        })
        .ok_or_else(|| error::Error::MissingMetadata {
            field: field.to_string(),
        })?
}

pub struct EntryTracker<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> EntryTracker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// True iff exactly one entry document exists for this dashboard.
    ///
    /// # Errors
    pub async fn is_loaded(&self, dashboard_id: &str) -> error::Result<bool> {
        let count = self
            .store
            .count_term(DASHBOARD_ENTRY_INDEX, "dashboard_id", dashboard_id)
            .await?;

        Ok(count == 1)
    }

    /// Upsert the entry under its verbatim dashboard id, creating the master
    /// index first if needed.
    ///
    /// # Errors
    pub async fn write(&self, entry: &DashboardEntry) -> error::Result<()> {
        ensure_index(self.store, DASHBOARD_ENTRY_INDEX).await?;

        tracing::info!(dashboard_id = %entry.dashboard_id, "writing dashboard entry");
        let doc = serde_json::to_value(entry).map_err(store::error::Error::from)?;
        self.store
            .write_doc(DASHBOARD_ENTRY_INDEX, &entry.dashboard_id, &doc)
            .await?;

        Ok(())
    }

    /// # Errors
    pub async fn delete(&self, dashboard_id: &str) -> error::Result<()> {
        self.store
            .delete_by_term(DASHBOARD_ENTRY_INDEX, "dashboard_id", dashboard_id)
            .await?;

        Ok(())
    }
}
