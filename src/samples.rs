//! Sample selection: turns raw table rows into the cohorts to process.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::table::Record;

/// Column holding sample identifiers.
pub const SAMPLE_ID_COL: &str = "sample_id";
/// Column holding tissue types.
pub const TISSUE_COL: &str = "tissue";
/// Column holding BAM object paths.
pub const BAM_COL: &str = "bam_path";
/// Identifier prefix of reference (GTEx) samples.
pub const REFERENCE_PREFIX: &str = "GTEX";

/// One sample to process, read from one table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRecord {
    pub sample_id: String,
    pub tissue: Option<String>,
    pub bam_path: String,
}

impl SampleRecord {
    pub fn new(sample_id: &str, tissue: Option<&str>, bam_path: &str) -> Self {
        Self {
            sample_id: sample_id.to_string(),
            tissue: tissue.map(str::to_string),
            bam_path: bam_path.to_string(),
        }
    }

    /// `None` when the row has no identifier or no BAM path.
    pub fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            sample_id: record.get_str(SAMPLE_ID_COL)?.to_string(),
            tissue: record.get_str(TISSUE_COL).map(str::to_string),
            bam_path: record.get_str(BAM_COL)?.to_string(),
        })
    }

    pub fn is_reference(&self) -> bool {
        self.sample_id.starts_with(REFERENCE_PREFIX)
    }
}

/// Converts rows to samples, dropping rows without an identifier or BAM path.
///
/// Dropped rows are not an error, but they are counted in a warning so that
/// incomplete table entries do not go unnoticed.
pub fn sample_records(rows: &[Record]) -> Vec<SampleRecord> {
    let samples: Vec<SampleRecord> = rows.iter().filter_map(SampleRecord::from_record).collect();
    let dropped = rows.len() - samples.len();
    if dropped > 0 {
        let record_ids: Vec<&str> = rows
            .iter()
            .filter(|r| SampleRecord::from_record(r).is_none())
            .map(|r| r.id.as_str())
            .collect();
        warn!(
            dropped,
            ?record_ids,
            "Skipping rows without a {} or {}",
            SAMPLE_ID_COL,
            BAM_COL
        );
    }
    samples
}

/// Which identity and input staging a cohort's jobs use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortKind {
    /// Samples readable by the batch service account; inputs are localized by the service.
    Primary,
    /// Reference samples; jobs switch to the user account and copy inputs themselves.
    Reference,
}

impl fmt::Display for CohortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CohortKind::Primary => write!(f, "primary"),
            CohortKind::Reference => write!(f, "reference"),
        }
    }
}

/// An ordered group of samples sharing a selection criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cohort {
    pub kind: CohortKind,
    pub samples: Vec<SampleRecord>,
}

impl Cohort {
    pub fn new(kind: CohortKind, samples: Vec<SampleRecord>) -> Self {
        Self { kind, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Samples whose identifier is in `ids`, in input order.
pub fn select_by_id(records: &[SampleRecord], ids: &[String]) -> Vec<SampleRecord> {
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    records
        .iter()
        .filter(|s| wanted.contains(s.sample_id.as_str()))
        .cloned()
        .collect()
}

/// Samples whose tissue equals `tissue` exactly (case-sensitive).
pub fn select_by_tissue(records: &[SampleRecord], tissue: &str) -> Vec<SampleRecord> {
    records
        .iter()
        .filter(|s| s.tissue.as_deref() == Some(tissue))
        .cloned()
        .collect()
}

/// Splits samples into `(reference, primary)` by the `GTEX` identifier prefix.
pub fn split_reference_cohort(records: Vec<SampleRecord>) -> (Vec<SampleRecord>, Vec<SampleRecord>) {
    records.into_iter().partition(SampleRecord::is_reference)
}

/// Trims surrounding whitespace and replaces `.` with `-`.
pub fn normalize_sample_id(sample_id: &str) -> String {
    sample_id.trim().replace('.', "-")
}
