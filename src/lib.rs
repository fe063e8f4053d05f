//! rnaseq-qc: RNA-seq quality-control batch orchestration.
//!
//! Reads sample metadata from Airtable, selects the samples to process and
//! submits duplicate marking, FastQC and read-count jobs for each of them to
//! Hail Batch.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod object_store;
pub mod pipeline;
pub mod samples;
pub mod table;

// Re-export commonly used error types
pub use error::{ConfigError, PipelineError, RemoteServiceError};
