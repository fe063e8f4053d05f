//! Submission to the external batch-execution service (Hail Batch).
//!
//! - **BatchUnit**: job specs enqueued for one batch
//! - **BatchDriver**: turns a unit into a created, populated and closed batch
//! - **BatchService**: the REST seam, implemented by `HailBatchClient`

pub mod client;
pub mod driver;

pub use client::{BatchRequest, BatchService, FileSpec, HailBatchClient, JobRequest};
pub use driver::{BatchDriver, BatchSettings, BatchUnit};
