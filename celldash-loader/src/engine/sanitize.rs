//! Record cleanup before write: column names the store can index, and no
//! missing values. The store treats explicit null inconsistently across
//! numeric and keyword fields, so absence represents "no value".

use std::collections::BTreeMap;

use crate::table::Record;

/// Characters that are structurally significant to the store and may not
/// appear in field names.
const INVALID_CHARS: &[char] = &['.'];

/// Rename map for every column containing a disallowed character. Computed
/// once per batch so all records in an index share a schema.
pub fn column_renames<'a>(columns: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    columns
        .into_iter()
        .filter(|column| column.contains(INVALID_CHARS))
        .map(|column| (column.to_string(), column.replace(INVALID_CHARS, "_")))
        .collect()
}

/// Sanitize a whole batch in place: renames computed against the batch's
/// column union, missing values dropped per record.
pub fn sanitize_batch(rows: &mut [Record]) {
    let columns: std::collections::BTreeSet<String> = rows
        .iter()
        .flat_map(|row| row.keys().map(str::to_string))
        .collect();
    let renames = column_renames(columns.iter().map(String::as_str));

    for row in rows {
        sanitize_record(row, &renames);
    }
}

pub fn sanitize_record(record: &mut Record, renames: &BTreeMap<String, String>) {
    for (from, to) in renames {
        record.rename(from, to);
    }

    record.retain(|_, cell| !cell.is_missing());
}
