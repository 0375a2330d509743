use serde::Serialize;
use valuable::Valuable;

use crate::store;

#[derive(thiserror::Error, Debug, Serialize, Valuable, Clone)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Error {
    #[error(transparent)]
    Store(#[from] store::error::Error),
    #[error("dashboard {dashboard_id} is already loaded; clean it before reloading")]
    AlreadyLoaded { dashboard_id: String },
    #[error("project {name} does not exist")]
    ProjectNotFound { name: String },
    #[error("project {name} already exists")]
    ProjectExists { name: String },
    #[error("missing {field} in dashboard metadata")]
    MissingMetadata { field: String },
    #[error("{index}: wrote {written} rows but the source table has {expected}")]
    RowCountMismatch {
        index: String,
        written: u64,
        expected: u64,
    },
    #[error("table {table} is missing column {column}")]
    MissingColumn { table: String, column: String },
    #[error("table {table}, column {column}: {message}")]
    InvalidValue {
        table: String,
        column: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
