//! Composition of the engine: precondition checks, per-dataset shape/ensure/
//! write, then the catalog entry and project enrollment. There is no
//! multi-index transaction primitive, so nothing rolls back; the entry is
//! written last so a failed attempt leaves `is_loaded` false and a retry (or
//! an explicit clean) is safe.

use strum::VariantArray;

use crate::{
    engine::{
        DatasetType, ensure_index,
        batch::BatchWriter,
        entry::{DashboardEntry, EntryTracker},
        error,
        project::ProjectManager,
        shape::{CellOrdering, RawTables, apply_cell_ordering, shape},
    },
    store::{DASHBOARD_ENTRY_INDEX, Store},
};

pub const DEFAULT_PROJECT: &str = "DLP";

pub struct IngestRequest {
    pub dashboard_id: String,
    pub raw: RawTables,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub projects: Vec<String>,
    /// External cell ordering / clone assignment; supplied for merged
    /// dashboards that were re-ordered against a fitness run.
    pub ordering: Option<CellOrdering>,
}

/// Load one dashboard end to end.
///
/// # Errors
///
/// Precondition failures (already loaded, unknown project, malformed
/// metadata) surface before anything is written. A failure mid-way through
/// the dataset writes leaves orphaned dataset indices behind; `clean`
/// removes them.
pub async fn ingest<S: Store>(store: &S, request: IngestRequest) -> error::Result<DashboardEntry> {
    let IngestRequest {
        dashboard_id,
        raw,
        metadata,
        projects,
        ordering,
    } = request;

    tracing::info!(%dashboard_id, "loading analysis");

    let tracker = EntryTracker::new(store);
    if tracker.is_loaded(&dashboard_id).await? {
        return Err(error::Error::AlreadyLoaded { dashboard_id });
    }

    let entry = DashboardEntry::from_metadata(&dashboard_id, &metadata)?;

    let project_manager = ProjectManager::new(store);
    for project in &projects {
        if !project_manager.exists(project).await? {
            return Err(error::Error::ProjectNotFound {
                name: project.clone(),
            });
        }
    }

    let writer = BatchWriter::new(store);
    for dataset in DatasetType::VARIANTS {
        let mut table = shape(*dataset, &raw)?;

        if *dataset == DatasetType::Qc {
            if let Some(ordering) = &ordering {
                // Post-join count is the one the batch writer verifies.
                (table, _) = apply_cell_ordering(table, ordering);
            }
        }

        let index = dataset.index_name(&dashboard_id);
        ensure_index(store, &index).await?;
        tracing::info!(index, rows = table.len(), "loading dataset");
        writer.write(table, &index).await?;
    }

    tracker.write(&entry).await?;
    project_manager.add_dashboard(&dashboard_id, &projects).await?;

    tracing::info!(%dashboard_id, "done");

    Ok(entry)
}

/// Delete a dashboard's four dataset indices, its catalog entry, and its
/// project memberships (every project's, when none are named). Works whether
/// or not the entry exists, so it also recovers half-written ingests.
///
/// # Errors
pub async fn clean<S: Store>(
    store: &S,
    dashboard_id: &str,
    projects: &[String],
) -> error::Result<()> {
    tracing::info!(dashboard_id, "cleaning dashboard");

    for dataset in DatasetType::VARIANTS {
        let index = dataset.index_name(dashboard_id);
        tracing::info!(index, "deleting dataset index");
        store.delete_index(&index).await?;
    }

    EntryTracker::new(store).delete(dashboard_id).await?;
    ProjectManager::new(store)
        .remove_dashboard(dashboard_id, projects)
        .await?;

    Ok(())
}

/// First-time store setup: the master index and the default project.
///
/// # Errors
pub async fn initialize<S: Store>(store: &S) -> error::Result<()> {
    tracing::info!("initializing search store");

    ensure_index(store, DASHBOARD_ENTRY_INDEX).await?;

    let projects = ProjectManager::new(store);
    if !projects.exists(DEFAULT_PROJECT).await? {
        projects.create(DEFAULT_PROJECT, &[]).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{
        engine::{shape::OrderedCell, test_util::FakeStore},
        table::{Cell, Record, Table},
    };

    fn annotation_row(cell_id: &str) -> Record {
        let mut row = Record::new();
        row.insert("cell_id", cell_id);
        row.insert("total_reads", 1000.0);
        row.insert("unmapped_reads", 100.0);
        row.insert("is_contaminated", false);
        row.insert("order", 1_i64);
        row
    }

    fn chrom_row(chr: &str) -> Record {
        let mut row = Record::new();
        row.insert("chr", chr);
        row.insert("start", 1_i64);
        row.insert("end", 500_000_i64);
        row
    }

    fn gc_row(cell_id: &str) -> Record {
        let mut row = Record::new();
        row.insert("cell_id", cell_id);
        for n in 0_i64..=100 {
            row.insert(n.to_string(), 0.5);
        }
        row
    }

    fn raw_tables(cell_ids: &[&str]) -> RawTables {
        RawTables {
            annotation_metrics: cell_ids.iter().map(|id| annotation_row(id)).collect(),
            hmmcopy_segs: Table::from_rows(vec![chrom_row("1"), chrom_row("X")]),
            hmmcopy_reads: Table::from_rows(vec![chrom_row("2")]),
            gc_metrics: cell_ids.iter().map(|id| gc_row(id)).collect(),
        }
    }

    fn single_metadata() -> serde_json::Map<String, serde_json::Value> {
        json!({
            "sample_id": "SA921",
            "library_id": "A90554B",
            "description": "patient 921 timepoint 3"
        })
        .as_object()
        .unwrap()
        .clone()
    }

    async fn store_with_default_project() -> FakeStore {
        let store = FakeStore::new();
        initialize(&store).await.unwrap();
        store
    }

    fn request(store_cells: &[&str]) -> IngestRequest {
        IngestRequest {
            dashboard_id: "SC-1234".to_string(),
            raw: raw_tables(store_cells),
            metadata: single_metadata(),
            projects: vec![DEFAULT_PROJECT.to_string()],
            ordering: None,
        }
    }

    const CELLS: [&str; 3] = [
        "SA921-A90554B-R03-C01",
        "SA921-A90554B-R03-C02",
        "SA921-A90554B-R03-C03",
    ];

    #[tokio::test]
    async fn three_cell_scenario() {
        let store = store_with_default_project().await;

        let entry = ingest(&store, request(&CELLS)).await.unwrap();

        assert_eq!(store.doc_count("sc-1234_qc"), 3);
        assert_eq!(store.doc_count("sc-1234_gc_bias"), 303);
        assert_eq!(store.doc_count("sc-1234_segs"), 2);
        assert_eq!(store.doc_count("sc-1234_bins"), 1);

        let doc = store.keyed_doc(DASHBOARD_ENTRY_INDEX, "SC-1234").unwrap();
        assert_eq!(doc["dashboard_type"], json!("single"));
        assert_eq!(entry.sample_id, "SA921");

        // Enrolled in the default project.
        let names = store.role("DLP_dashboardReader").unwrap().index_names();
        assert!(names.contains(&"SC-1234".to_string()));
    }

    #[tokio::test]
    async fn load_state_gates_reingestion() {
        let store = store_with_default_project().await;

        ingest(&store, request(&CELLS)).await.unwrap();
        assert!(
            EntryTracker::new(&store)
                .is_loaded("SC-1234")
                .await
                .unwrap()
        );

        let qc_docs_before = store.doc_count("sc-1234_qc");
        let err = ingest(&store, request(&CELLS)).await.unwrap_err();

        assert!(matches!(err, error::Error::AlreadyLoaded { .. }));
        // The gate fired before any write.
        assert_eq!(store.doc_count("sc-1234_qc"), qc_docs_before);
    }

    #[tokio::test]
    async fn unknown_project_fails_before_any_write() {
        let store = store_with_default_project().await;

        let mut req = request(&CELLS);
        req.projects.push("nope".to_string());
        let err = ingest(&store, req).await.unwrap_err();

        assert!(matches!(err, error::Error::ProjectNotFound { .. }));
        assert!(!store.has_index("sc-1234_qc"));
    }

    #[tokio::test]
    async fn malformed_metadata_fails_before_any_write() {
        let store = store_with_default_project().await;

        let mut req = request(&CELLS);
        req.metadata.remove("library_id");
        let err = ingest(&store, req).await.unwrap_err();

        assert!(matches!(err, error::Error::MissingMetadata { .. }));
        assert!(!store.has_index("sc-1234_qc"));
    }

    #[tokio::test]
    async fn merged_ingest_applies_cell_ordering() {
        let store = store_with_default_project().await;

        let mut metadata = single_metadata();
        metadata.remove("library_id");
        metadata.insert("libraries".to_string(), json!(["A90554A", "A90554B"]));

        let mut ordering = crate::engine::shape::CellOrdering::default();
        ordering.insert(OrderedCell {
            cell_id: "SC1234-A90554B-R03-C01".to_string(),
            order: Cell::Int(5),
            clone_id: Cell::Str("B".to_string()),
        });

        let req = IngestRequest {
            dashboard_id: "SC-1234".to_string(),
            raw: raw_tables(&["SA921-A90554B-R03-C01", "SA921-A90554B-R03-C02"]),
            metadata,
            projects: vec![DEFAULT_PROJECT.to_string()],
            ordering: Some(ordering),
        };

        ingest(&store, req).await.unwrap();

        // One of two cells matched the ordering; the other was dropped, and
        // the count check ran against the post-join table.
        assert_eq!(store.doc_count("sc-1234_qc"), 1);
        let doc = store.keyed_doc(DASHBOARD_ENTRY_INDEX, "SC-1234").unwrap();
        assert_eq!(doc["dashboard_type"], json!("merged"));
    }

    #[tokio::test]
    async fn clean_reverses_a_load() {
        let store = store_with_default_project().await;
        ingest(&store, request(&CELLS)).await.unwrap();

        clean(&store, "SC-1234", &[]).await.unwrap();

        assert!(!store.has_index("sc-1234_qc"));
        assert!(!store.has_index("sc-1234_gc_bias"));
        assert!(
            !EntryTracker::new(&store)
                .is_loaded("SC-1234")
                .await
                .unwrap()
        );
        let names = store.role("DLP_dashboardReader").unwrap().index_names();
        assert!(!names.contains(&"SC-1234".to_string()));

        // And a reload goes through.
        ingest(&store, request(&CELLS)).await.unwrap();
        assert_eq!(store.doc_count("sc-1234_qc"), 3);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let store = FakeStore::new();

        initialize(&store).await.unwrap();
        initialize(&store).await.unwrap();

        assert!(store.has_index(DASHBOARD_ENTRY_INDEX));
        assert!(store.role("DLP_dashboardReader").is_some());
    }
}
