//! Table operations layered on any `TableService`.

use std::collections::{BTreeSet, HashMap};

use super::{Fields, Record, TableLocator, TableService, DEFAULT_MATCH_KEY};
use crate::error::RemoteServiceError;

/// Rows of `locator` for which `predicate` holds, in view order.
pub async fn fetch_and_filter<T, P>(
    service: &T,
    locator: &TableLocator,
    predicate: P,
) -> Result<Vec<Record>, RemoteServiceError>
where
    T: TableService + ?Sized,
    P: Fn(&Record) -> bool,
{
    let rows = service.fetch_rows(locator).await?;
    Ok(rows.into_iter().filter(|r| predicate(r)).collect())
}

/// Maps each row's `sample_id` to its record id. Rows without a sample id are skipped.
pub async fn map_sample_ids_to_record_ids<T>(
    service: &T,
    locator: &TableLocator,
) -> Result<HashMap<String, String>, RemoteServiceError>
where
    T: TableService + ?Sized,
{
    let rows = service.fetch_rows(locator).await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            let sample_id = r.get_str(DEFAULT_MATCH_KEY)?.to_string();
            Some((sample_id, r.id))
        })
        .collect())
}

/// Rows that have no value in `column`, with their record ids.
pub async fn missing_records<T>(
    service: &T,
    locator: &TableLocator,
    column: &str,
) -> Result<(Vec<Fields>, Vec<String>), RemoteServiceError>
where
    T: TableService + ?Sized,
{
    let rows = service.fetch_rows(locator).await?;
    Ok(rows
        .into_iter()
        .filter(|r| !column.is_empty() && !r.fields.contains_key(column))
        .map(|r| (r.fields, r.id))
        .unzip())
}

/// Joins two tables row by row (by position) and keeps the left table's
/// value when both tables have a column of the same name.
///
/// A column counts as belonging to the left table if any left row has it,
/// so a right value never fills a gap in a column the left table owns.
pub fn inner_join(left: Vec<Record>, right: Vec<Record>) -> Vec<Fields> {
    let left_columns: BTreeSet<String> = left
        .iter()
        .flat_map(|r| r.fields.keys().cloned())
        .collect();

    left.into_iter()
        .zip(right)
        .map(|(l, r)| {
            let mut joined = l.fields;
            for (column, value) in r.fields {
                if !left_columns.contains(&column) {
                    joined.insert(column, value);
                }
            }
            joined
        })
        .collect()
}
