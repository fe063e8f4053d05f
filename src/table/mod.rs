//! Hosted table access (Airtable).
//!
//! - **TableService**: the seam every caller goes through; fetch and write rows
//! - **AirtableClient**: REST implementation of `TableService`
//! - **ops**: filtering, id mapping, missing-value lookup and table joins
//!   built on top of any `TableService`

pub mod client;
pub mod ops;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteServiceError;

pub use client::AirtableClient;
pub use ops::{fetch_and_filter, inner_join, map_sample_ids_to_record_ids, missing_records};

/// Column values of one row, keyed by column name.
pub type Fields = serde_json::Map<String, Value>;

/// Column the upsert mode matches on unless told otherwise.
pub const DEFAULT_MATCH_KEY: &str = "sample_id";

/// Addresses one view of one table: (base, table, view).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableLocator {
    pub base_id: String,
    pub table_id: String,
    pub view_id: Option<String>,
}

impl TableLocator {
    pub fn new(base_id: &str, table_id: &str, view_id: Option<&str>) -> Self {
        Self {
            base_id: base_id.to_string(),
            table_id: table_id.to_string(),
            view_id: view_id.map(str::to_string),
        }
    }
}

impl fmt::Display for TableLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.view_id {
            Some(view) => write!(f, "{}/{} (view {})", self.base_id, self.table_id, view),
            None => write!(f, "{}/{}", self.base_id, self.table_id),
        }
    }
}

/// One table row as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            created_time: None,
            fields,
        }
    }

    /// String value of `column`, or `None` when absent, null or not a string.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(Value::as_str)
    }
}

/// How `write_rows` treats rows that may already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Always create new rows (re-sequenced samples get a second row).
    Insert,
    /// Update the row whose `match_keys` columns equal the new values, or
    /// create it. With `replace`, columns not supplied are cleared.
    Upsert {
        match_keys: Vec<String>,
        replace: bool,
    },
}

impl Default for WriteMode {
    fn default() -> Self {
        Self::Upsert {
            match_keys: vec![DEFAULT_MATCH_KEY.to_string()],
            replace: false,
        }
    }
}

/// Read/write access to a hosted table.
#[async_trait]
pub trait TableService: Send + Sync {
    /// All rows of the locator's view, in view order.
    async fn fetch_rows(&self, locator: &TableLocator) -> Result<Vec<Record>, RemoteServiceError>;

    /// Writes `rows` and returns the created or updated records.
    async fn write_rows(
        &self,
        locator: &TableLocator,
        rows: &[Fields],
        mode: &WriteMode,
    ) -> Result<Vec<Record>, RemoteServiceError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_airtable_shape() {
        let json = r#"{"id":"rec1","createdTime":"2024-01-01T00:00:00.000Z","fields":{"sample_id":"RDG-1","reads":12}}"#;
        let record: Record = serde_json::from_str(json).expect("valid record");
        assert_eq!(record.id, "rec1");
        assert_eq!(record.get_str("sample_id"), Some("RDG-1"));
        assert_eq!(record.get_str("reads"), None);
        assert_eq!(record.get_str("tissue"), None);
    }

    #[test]
    fn test_record_without_fields() {
        let record: Record = serde_json::from_str(r#"{"id":"rec2"}"#).expect("valid record");
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_locator_display() {
        let with_view = TableLocator::new("app", "tbl", Some("viw"));
        assert_eq!(with_view.to_string(), "app/tbl (view viw)");
        assert_eq!(TableLocator::new("app", "tbl", None).to_string(), "app/tbl");
    }

    #[test]
    fn test_default_write_mode_matches_on_sample_id() {
        assert_eq!(
            WriteMode::default(),
            WriteMode::Upsert {
                match_keys: vec!["sample_id".to_string()],
                replace: false
            }
        );
    }
}
