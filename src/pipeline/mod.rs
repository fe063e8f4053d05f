//! QC pipeline orchestration.
//!
//! # Pipeline Flow
//!
//! 1. **Validation**: run options are checked against the config file
//! 2. **Selection**: rows are fetched and split into cohorts
//! 3. **Job building**: three jobs per sample, staged per cohort
//! 4. **Submission**: all jobs go to one Hail Batch, which then owns them
//!
//! # Example
//!
//! ```rust,ignore
//! use rnaseq_qc::pipeline::{Pipeline, RunOptions};
//!
//! let options = RunOptions::new()
//!     .with_tissue("Muscle")
//!     .with_out_dir("gs://bucket/qc")
//!     .with_billing_project("my-billing")
//!     .with_requester_pays_project("my-project")
//!     .with_file_dir("gs://bucket/tmp");
//!
//! let pipeline = Pipeline::new(&config, &options, table, storage)?;
//! let driver = pipeline.batch_driver(batch);
//! let (_plan, summary) = pipeline.execute(driver.as_ref()).await?;
//! println!("Submitted {} jobs", summary.jobs);
//! ```

pub mod config;
pub mod runner;

pub use config::{RunOptions, Selection, Submission, ValidatedRun};
pub use runner::{Pipeline, RunPlan, RunSummary, BATCH_NAME};
