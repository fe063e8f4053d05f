//! Job specifications handed to the batch driver.

use std::fmt;

use serde::Serialize;

use crate::samples::CohortKind;

/// The three analyses run for every sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// FastQC report.
    QcReport,
    /// Picard MarkDuplicates metrics.
    MarkDuplicates,
    /// `samtools view -c` totals.
    ReadCount,
}

impl JobKind {
    /// Build order for one sample.
    pub const ALL: [JobKind; 3] = [JobKind::QcReport, JobKind::MarkDuplicates, JobKind::ReadCount];

    fn name_suffix(&self) -> &'static str {
        match self {
            JobKind::QcReport => "fastqc",
            JobKind::MarkDuplicates => "md",
            JobKind::ReadCount => "read_count",
        }
    }

    pub fn job_name(&self, sample_id: &str) -> String {
        format!("{}_{}", sample_id, self.name_suffix())
    }

    /// File name of the artifact in the output directory.
    pub fn output_file_name(&self, sample_id: &str) -> String {
        match self {
            JobKind::QcReport => format!("{sample_id}.html"),
            JobKind::MarkDuplicates => format!("{sample_id}_marked_dup_metrics.txt"),
            JobKind::ReadCount => format!("{sample_id}_read_counts.txt"),
        }
    }

    pub fn output_destination(&self, out_dir: &str, sample_id: &str) -> String {
        format!(
            "{}/{}",
            out_dir.trim_end_matches('/'),
            self.output_file_name(sample_id)
        )
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::QcReport => write!(f, "qc-report"),
            JobKind::MarkDuplicates => write!(f, "duplicate-marking"),
            JobKind::ReadCount => write!(f, "read-count"),
        }
    }
}

/// Resource requests; `None` falls back to the batch defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resources {
    pub cpu: Option<u32>,
    pub storage_bytes: Option<u64>,
}

/// A file copied between object storage and the job container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileBinding {
    pub source: String,
    pub destination: String,
}

impl FileBinding {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// A constructed, not yet submitted, unit of batch work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    pub name: String,
    pub sample_id: String,
    pub kind: JobKind,
    pub cohort: CohortKind,
    pub commands: Vec<String>,
    pub resources: Resources,
    /// Object-storage files the service copies in before the commands run.
    pub inputs: Vec<FileBinding>,
    /// Container file the service copies out after the commands succeed.
    pub output: FileBinding,
}

impl JobSpec {
    /// Shell script run by the job: `set -ex` followed by the commands, one per line.
    pub fn script(&self) -> String {
        let mut script = String::from("set -ex\n");
        script.push_str(&self.commands.join("\n"));
        script
    }

    pub fn output_destination(&self) -> &str {
        &self.output.destination
    }
}
