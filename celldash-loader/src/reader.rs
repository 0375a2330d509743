//! Analysis-directory reading: four CSV tables plus a `metadata.json`, and
//! optionally a cell-ordering CSV for merged dashboards. This is I/O glue;
//! the engine only ever sees the in-memory tables.

use std::fs;

use anyhow::Context;
use camino::Utf8Path;

use crate::{
    engine::shape::{CellOrdering, RawTables},
    table::{Cell, Record, Table},
};

pub const METADATA_FILENAME: &str = "metadata.json";

pub struct AnalysisDirectory {
    pub raw: RawTables,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// # Errors
pub fn read_analysis_directory(directory: &Utf8Path) -> anyhow::Result<AnalysisDirectory> {
    let table = |name: &str| read_table(&directory.join(format!("{name}.csv")));

    let raw = RawTables {
        annotation_metrics: table("annotation_metrics")?,
        hmmcopy_segs: table("hmmcopy_segs")?,
        hmmcopy_reads: table("hmmcopy_reads")?,
        gc_metrics: table("gc_metrics")?,
    };

    let metadata_path = directory.join(METADATA_FILENAME);
    let metadata = serde_json::from_str(
        &fs::read_to_string(&metadata_path)
            .context(format!("failed to read {metadata_path}"))?,
    )
    .context(format!("failed to parse {metadata_path}"))?;

    Ok(AnalysisDirectory { raw, metadata })
}

/// # Errors
pub fn read_cell_ordering(path: &Utf8Path) -> anyhow::Result<CellOrdering> {
    let table = read_table(path)?;

    Ok(CellOrdering::from_table(&table)
        .context(format!("malformed cell ordering in {path}"))?)
}

/// # Errors
pub fn read_table(path: &Utf8Path) -> anyhow::Result<Table> {
    let mut reader =
        csv::Reader::from_path(path).context(format!("failed to open {path}"))?;
    let headers = reader.headers()?.clone();

    let mut table = Table::new();
    for row in reader.records() {
        let row = row.context(format!("malformed row in {path}"))?;
        table.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(column, field)| (column.to_string(), parse_field(field)))
                .collect::<Record>(),
        );
    }

    Ok(table)
}

/// CSV fields are untyped; mirror the upstream dataframe semantics: empty
/// means missing (NaN), numbers stay numbers, booleans stay booleans.
fn parse_field(field: &str) -> Cell {
    if field.is_empty() {
        return Cell::Float(f64::NAN);
    }
    if let Ok(int) = field.parse::<i64>() {
        return Cell::Int(int);
    }
    if let Ok(float) = field.parse::<f64>() {
        return Cell::Float(float);
    }

    match field {
        "True" | "true" | "TRUE" => Cell::Bool(true),
        "False" | "false" | "FALSE" => Cell::Bool(false),
        _ => Cell::Str(field.to_string()),
    }
}
