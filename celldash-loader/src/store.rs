use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

pub mod elastic;
pub mod error;

pub use elastic::ElasticStore;

/// The master index holding one catalog document per dashboard.
pub const DASHBOARD_ENTRY_INDEX: &str = "dashboard_entries";

const ROLE_SUFFIX: &str = "_dashboardReader";

#[must_use]
pub fn role_name(project: &str) -> String {
    format!("{project}{ROLE_SUFFIX}")
}

#[must_use]
pub fn project_from_role(role: &str) -> Option<&str> {
    role.strip_suffix(ROLE_SUFFIX)
}

/// The mapping every index is created with: a raised result window so whole
/// dashboards can be scanned in one query, and every string field indexed as
/// an exact-match keyword rather than tokenized text.
#[must_use]
pub fn default_mapping() -> serde_json::Value {
    json!({
        "settings": {
            "index": {
                "max_result_window": 100_000
            }
        },
        "mappings": {
            "dynamic_templates": [
                {
                    "string_values": {
                        "match": "*",
                        "match_mapping_type": "string",
                        "mapping": {
                            "type": "keyword"
                        }
                    }
                }
            ]
        }
    })
}

/// A read-access role: the store's access control is index-scoped, so a
/// project's reading privilege is exactly a list of index names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub indices: Vec<RoleIndices>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoleIndices {
    pub names: Vec<String>,
    pub privileges: Vec<String>,
}

impl Role {
    #[must_use]
    pub fn read_only(names: Vec<String>) -> Self {
        Self {
            indices: vec![RoleIndices {
                names,
                privileges: vec!["read".to_string()],
            }],
        }
    }

    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        self.indices
            .first()
            .map(|indices| indices.names.clone())
            .unwrap_or_default()
    }
}

/// One document the bulk endpoint rejected. Individual rejections are
/// non-fatal; the bulk protocol proceeds past them.
#[derive(Clone, Debug)]
pub struct DocFailure {
    pub id: Option<String>,
    pub reason: String,
}

/// Outcome of one bulk submission.
#[derive(Clone, Debug, Default)]
pub struct BulkOutcome {
    pub submitted: usize,
    pub failures: Vec<DocFailure>,
}

impl BulkOutcome {
    pub fn absorb(&mut self, other: Self) {
        self.submitted += other.submitted;
        self.failures.extend(other.failures);
    }
}

/// The document store as the engine sees it. `ElasticStore` is the real
/// implementation; tests inject an in-memory fake.
#[allow(async_fn_in_trait)]
pub trait Store {
    async fn index_exists(&self, index: &str) -> error::Result<bool>;

    async fn create_index(&self, index: &str, mapping: &serde_json::Value) -> error::Result<()>;

    /// Deleting an absent index is a no-op.
    async fn delete_index(&self, index: &str) -> error::Result<()>;

    /// Bulk-write documents with store-generated ids.
    async fn write_docs(
        &self,
        index: &str,
        docs: Vec<serde_json::Value>,
    ) -> error::Result<BulkOutcome>;

    /// Upsert one document under a caller-supplied id.
    async fn write_doc(&self, index: &str, id: &str, doc: &serde_json::Value)
    -> error::Result<()>;

    /// Number of documents whose `field` exactly equals `value`. An absent
    /// index counts as zero.
    async fn count_term(&self, index: &str, field: &str, value: &str) -> error::Result<u64>;

    async fn delete_by_term(&self, index: &str, field: &str, value: &str) -> error::Result<()>;

    async fn fetch_role(&self, name: &str) -> error::Result<Option<Role>>;

    async fn fetch_roles(&self) -> error::Result<BTreeMap<String, Role>>;

    async fn put_role(&self, name: &str, role: &Role) -> error::Result<()>;
}
