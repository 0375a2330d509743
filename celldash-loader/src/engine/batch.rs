//! Chunked bulk writes with a count-integrity check. Chunking bounds memory
//! and narrows partial-failure blast radius; it is not pipeline parallelism,
//! so each chunk completes before the next is submitted.

use crate::{
    engine::{error, sanitize},
    store::{self, Store},
    table::Table,
};

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

pub struct BatchWriter<'a, S> {
    store: &'a S,
    chunk_size: usize,
}

impl<'a, S: Store> BatchWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(store: &'a S, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Write every row of `table` to `index`, in chunks.
    ///
    /// Per-document rejections from the store are logged and do not abort;
    /// the bulk protocol proceeds past them. A submitted-row total that does
    /// not match the table's length is a programming error (silent row loss
    /// during reshape or partitioning) and aborts the ingestion.
    ///
    /// # Errors
    pub async fn write(&self, table: Table, index: &str) -> error::Result<u64> {
        let expected = table.len() as u64;
        let mut rows = table.into_rows();
        let mut written = 0_u64;

        for chunk in rows.chunks_mut(self.chunk_size) {
            sanitize::sanitize_batch(chunk);

            let docs = chunk
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()
                .map_err(store::error::Error::from)?;

            let outcome = self.store.write_docs(index, docs).await?;
            for failure in &outcome.failures {
                tracing::warn!(
                    index,
                    id = failure.id.as_deref().unwrap_or_default(),
                    reason = %failure.reason,
                    "document failed in bulk write"
                );
            }

            written += chunk.len() as u64;
            tracing::info!(index, written, expected, "wrote chunk");
        }

        if written == expected {
            Ok(written)
        } else {
            Err(error::Error::RowCountMismatch {
                index: index.to_string(),
                written,
                expected,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{
        engine::{ensure_index, test_util::FakeStore},
        table::Record,
    };

    fn rows(n: usize) -> Table {
        (0..n)
            .map(|i| {
                let mut row = Record::new();
                row.insert("cell_id", format!("SA921-A90554B-R0{i}-C01"));
                row.insert("reads", i as i64);
                row
            })
            .collect()
    }

    #[rstest]
    #[case(250, 100, 3)]
    #[case(250, 250, 1)]
    #[case(3, 100, 1)]
    #[tokio::test]
    async fn count_invariant_holds_across_chunk_sizes(
        #[case] n: usize,
        #[case] chunk_size: usize,
        #[case] expected_bulk_calls: usize,
    ) {
        let store = FakeStore::new();
        ensure_index(&store, "sc-1_qc").await.unwrap();

        let written = BatchWriter::with_chunk_size(&store, chunk_size)
            .write(rows(n), "sc-1_qc")
            .await
            .unwrap();

        assert_eq!(written, n as u64);
        assert_eq!(store.doc_count("sc-1_qc"), n);
        assert_eq!(store.bulk_calls(), expected_bulk_calls);
    }

    #[tokio::test]
    async fn empty_table_submits_no_chunks() {
        let store = FakeStore::new();
        ensure_index(&store, "sc-1_qc").await.unwrap();

        let written = BatchWriter::new(&store)
            .write(Table::new(), "sc-1_qc")
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert_eq!(store.bulk_calls(), 0);
    }

    #[tokio::test]
    async fn rows_are_sanitized_before_write() {
        let store = FakeStore::new();
        ensure_index(&store, "sc-1_qc").await.unwrap();

        let mut row = Record::new();
        row.insert("a.b", 1.0);
        row.insert("c", f64::NAN);

        BatchWriter::new(&store)
            .write(Table::from_rows(vec![row]), "sc-1_qc")
            .await
            .unwrap();

        let docs = store.docs("sc-1_qc");
        assert_eq!(docs, vec![serde_json::json!({"a_b": 1.0})]);
    }
}
