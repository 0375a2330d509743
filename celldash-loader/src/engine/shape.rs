//! Derivation of the four dataset views from a raw QC table bundle, plus the
//! cell re-ordering join used by merged dashboards.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::{
    engine::{DatasetType, error},
    table::{Cell, Record, Table},
};

/// The raw bundle, keyed by the upstream pipeline's table names.
#[derive(Clone, Debug, Default)]
pub struct RawTables {
    pub annotation_metrics: Table,
    pub hmmcopy_segs: Table,
    pub hmmcopy_reads: Table,
    pub gc_metrics: Table,
}

/// # Errors
pub fn shape(dataset: DatasetType, raw: &RawTables) -> error::Result<Table> {
    match dataset {
        DatasetType::Qc => qc_table(&raw.annotation_metrics),
        DatasetType::Segs => with_chrom_number(&raw.hmmcopy_segs, "hmmcopy_segs"),
        DatasetType::Bins => with_chrom_number(&raw.hmmcopy_reads, "hmmcopy_reads"),
        DatasetType::GcBias => gc_bias_table(&raw.gc_metrics),
    }
}

/// The per-cell metrics the qc view computes from. Extraction here is the
/// schema validation boundary; downstream components assume these fields.
struct QcMetrics {
    total_reads: f64,
    unmapped_reads: f64,
    is_contaminated: bool,
}

impl QcMetrics {
    const TABLE: &'static str = "annotation_metrics";

    fn extract(row: &Record) -> error::Result<Self> {
        Ok(Self {
            total_reads: required_f64(row, Self::TABLE, "total_reads")?,
            unmapped_reads: required_f64(row, Self::TABLE, "unmapped_reads")?,
            is_contaminated: contamination_flag(row)?,
        })
    }
}

fn qc_table(annotation_metrics: &Table) -> error::Result<Table> {
    let mut out = Table::new();

    for row in annotation_metrics.rows() {
        let metrics = QcMetrics::extract(row)?;

        let mut row = row.clone();
        row.insert(
            "percent_unmapped_reads",
            metrics.unmapped_reads / metrics.total_reads,
        );
        // Boolean-as-string keeps the keyword mapping unambiguous across
        // write batches.
        row.insert(
            "is_contaminated",
            if metrics.is_contaminated { "true" } else { "false" },
        );

        out.push(row);
    }

    Ok(out)
}

fn required_f64(row: &Record, table: &str, column: &str) -> error::Result<f64> {
    let cell = row.get(column).ok_or_else(|| error::Error::MissingColumn {
        table: table.to_string(),
        column: column.to_string(),
    })?;

    cell.as_f64().ok_or_else(|| error::Error::InvalidValue {
        table: table.to_string(),
        column: column.to_string(),
        message: format!("expected a number, found {cell:?}"),
    })
}

fn contamination_flag(row: &Record) -> error::Result<bool> {
    let column = "is_contaminated";
    let cell = row.get(column).ok_or_else(|| error::Error::MissingColumn {
        table: QcMetrics::TABLE.to_string(),
        column: column.to_string(),
    })?;

    match cell {
        Cell::Bool(flag) => Ok(*flag),
        Cell::Str(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Cell::Str(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(error::Error::InvalidValue {
            table: QcMetrics::TABLE.to_string(),
            column: column.to_string(),
            message: format!("expected a boolean, found {other:?}"),
        }),
    }
}

/// Zero-pad single-digit chromosome labels so string sort order matches
/// numeric chromosome order. Everything else (X, Y, 10–22) passes through.
#[must_use]
pub fn chrom_number(label: &str) -> String {
    match label {
        "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9" => format!("0{label}"),
        _ => label.to_string(),
    }
}

fn with_chrom_number(source: &Table, table_name: &str) -> error::Result<Table> {
    let mut out = Table::new();

    for row in source.rows() {
        let chr = row.get("chr").ok_or_else(|| error::Error::MissingColumn {
            table: table_name.to_string(),
            column: "chr".to_string(),
        })?;

        let label = match chr {
            Cell::Str(s) => s.clone(),
            Cell::Int(i) => i.to_string(),
            other => {
                return Err(error::Error::InvalidValue {
                    table: table_name.to_string(),
                    column: "chr".to_string(),
                    message: format!("expected a chromosome label, found {other:?}"),
                });
            }
        };

        let mut row = row.clone();
        row.insert("chrom_number", chrom_number(&label));
        out.push(row);
    }

    Ok(out)
}

/// One long-format gc_bias row.
struct GcBiasRow {
    cell_id: String,
    gc_percent: i64,
    value: Cell,
}

impl GcBiasRow {
    fn into_record(self) -> Record {
        let mut record = Record::new();
        record.insert("cell_id", self.cell_id);
        record.insert("gc_percent", self.gc_percent);
        record.insert("value", self.value);
        record
    }
}

/// Wide-to-long reshape: the gc_metrics table has one column per GC
/// percentage bucket 0–100; the output has one row per (cell, gc_percent).
/// Output is gc-bucket-major, matching the original reshape order.
fn gc_bias_table(gc_metrics: &Table) -> error::Result<Table> {
    (0_i64..=100)
        .cartesian_product(gc_metrics.rows())
        .map(|(gc_percent, row)| {
            let cell_id = row
                .get("cell_id")
                .and_then(Cell::as_str)
                .ok_or_else(|| error::Error::MissingColumn {
                    table: "gc_metrics".to_string(),
                    column: "cell_id".to_string(),
                })?
                .to_string();

            let column = gc_percent.to_string();
            let value = row
                .get(&column)
                .cloned()
                .ok_or_else(|| error::Error::MissingColumn {
                    table: "gc_metrics".to_string(),
                    column,
                })?;

            Ok(GcBiasRow {
                cell_id,
                gc_percent,
                value,
            }
            .into_record())
        })
        .collect()
}

/// External cell ordering / clone assignment for merged dashboards, keyed by
/// the sub-key after the first `-` of each cell identifier.
#[derive(Clone, Debug, Default)]
pub struct CellOrdering {
    by_subkey: BTreeMap<String, OrderedCell>,
}

#[derive(Clone, Debug)]
pub struct OrderedCell {
    pub cell_id: String,
    pub order: Cell,
    pub clone_id: Cell,
}

impl CellOrdering {
    /// # Errors
    pub fn from_table(table: &Table) -> error::Result<Self> {
        let mut ordering = Self::default();

        for row in table.rows() {
            let cell_id = row
                .get("cell_id")
                .and_then(Cell::as_str)
                .ok_or_else(|| error::Error::MissingColumn {
                    table: "cell_ordering".to_string(),
                    column: "cell_id".to_string(),
                })?
                .to_string();

            let field = |column: &str| {
                row.get(column)
                    .cloned()
                    .ok_or_else(|| error::Error::MissingColumn {
                        table: "cell_ordering".to_string(),
                        column: column.to_string(),
                    })
            };

            ordering.insert(OrderedCell {
                cell_id,
                order: field("order")?,
                clone_id: field("clone_id")?,
            });
        }

        Ok(ordering)
    }

    pub fn insert(&mut self, cell: OrderedCell) {
        self.by_subkey
            .insert(subkey(&cell.cell_id).to_string(), cell);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_subkey.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_subkey.is_empty()
    }
}

fn subkey(cell_id: &str) -> &str {
    cell_id.split_once('-').map_or(cell_id, |(_, rest)| rest)
}

/// Inner-join the qc table against an external ordering: re-key `cell_id`,
/// replace the dashboard-computed `order`, attach `clone_id`. Cells absent
/// from the ordering are dropped; the count is returned and logged so the
/// shrink is observable rather than silent. Callers must compare write
/// counts against the post-join table.
#[must_use]
pub fn apply_cell_ordering(qc: Table, ordering: &CellOrdering) -> (Table, usize) {
    let total = qc.len();
    let mut out = Table::new();

    for mut row in qc.into_rows() {
        let Some(matched) = row
            .get("cell_id")
            .and_then(Cell::as_str)
            .and_then(|cell_id| ordering.by_subkey.get(subkey(cell_id)))
        else {
            continue;
        };

        row.insert("cell_id", matched.cell_id.clone());
        row.insert("order", matched.order.clone());
        row.insert("clone_id", matched.clone_id.clone());
        out.push(row);
    }

    let dropped = total - out.len();
    if dropped > 0 {
        tracing::warn!(
            dropped,
            total,
            "qc cells missing from the external ordering were dropped"
        );
    }

    (out, dropped)
}
