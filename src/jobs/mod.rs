//! Job construction for the QC pipeline.
//!
//! - **JobSpec**: one analysis of one sample, ready for submission
//! - **InputStaging**: how a job obtains its BAM (identity + copy method)
//! - **JobBuilder**: builds the three jobs of every sample

pub mod builder;
pub mod spec;
pub mod staging;

pub use builder::{JobBuilder, OUTPUT_HANDLE, WORKING_DIR};
pub use spec::{FileBinding, JobKind, JobSpec, Resources};
pub use staging::{DirectRemoteCopy, InputStaging, LocalReferenceCopy, StagedInput};
