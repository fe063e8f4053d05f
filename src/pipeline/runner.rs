//! The QC workflow: fetch rows, select cohorts, build jobs, submit.
//!
//! Everything runs in sequence, one remote call at a time. Errors are not
//! caught here; the first failure ends the run.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::config::{RunOptions, Selection, ValidatedRun};
use crate::batch::{BatchDriver, BatchService, BatchSettings, BatchUnit};
use crate::config::AppConfig;
use crate::error::{PipelineError, RemoteServiceError};
use crate::jobs::{DirectRemoteCopy, InputStaging, JobBuilder, JobSpec, LocalReferenceCopy};
use crate::object_store::ObjectStore;
use crate::samples::{
    sample_records, select_by_id, select_by_tissue, split_reference_cohort, Cohort, CohortKind,
    SampleRecord,
};
use crate::table::TableService;

/// Batch name shown in the Hail Batch UI.
pub const BATCH_NAME: &str = "rnaseq-qc";

/// Cohorts and jobs of a run, before submission.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub cohorts: Vec<Cohort>,
    pub unit: BatchUnit,
}

impl RunPlan {
    pub fn jobs(&self) -> &[JobSpec] {
        self.unit.jobs()
    }
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub cohorts: Vec<(CohortKind, usize)>,
    pub jobs: usize,
    /// `None` for dry runs and empty runs.
    pub batch_id: Option<u64>,
}

/// A validated run bound to its remote services.
pub struct Pipeline {
    config: AppConfig,
    run: ValidatedRun,
    table: Arc<dyn TableService>,
    storage: Arc<dyn ObjectStore>,
}

impl Pipeline {
    /// Validates `options` before any service is contacted.
    pub fn new(
        config: &AppConfig,
        options: &RunOptions,
        table: Arc<dyn TableService>,
        storage: Arc<dyn ObjectStore>,
    ) -> Result<Self, PipelineError> {
        let run = options.validate(config)?;
        Ok(Self {
            config: config.clone(),
            run,
            table,
            storage,
        })
    }

    pub fn validated(&self) -> &ValidatedRun {
        &self.run
    }

    /// Driver for this run's batch, or `None` for a dry run.
    pub fn batch_driver(&self, service: Arc<dyn BatchService>) -> Option<BatchDriver> {
        let submission = self.run.submission.as_ref()?;
        Some(BatchDriver::new(
            service,
            BatchSettings {
                name: BATCH_NAME.to_string(),
                billing_project: submission.billing_project.clone(),
                remote_tmpdir: submission.remote_tmpdir.clone(),
                requester_pays_project: submission.requester_pays_project.clone(),
                defaults: self.config.batch.clone(),
            },
        ))
    }

    /// Reads the tables and derives the cohorts, reference cohort first.
    pub async fn select_cohorts(&self) -> Result<Vec<Cohort>, RemoteServiceError> {
        let rows = self.table.fetch_rows(&self.config.data_paths).await?;
        let samples = sample_records(&rows);

        match &self.run.selection {
            Selection::Samples(ids) => {
                let selected = select_by_id(&samples, ids);
                info!(requested = ids.len(), selected = selected.len(), "Selected samples by id");
                Ok(vec![Cohort::new(CohortKind::Primary, selected)])
            }
            Selection::Tissue { tissue, .. } => {
                let (local_reference, primary) =
                    split_reference_cohort(select_by_tissue(&samples, tissue));

                let reference = if self.config.reference_samples == self.config.data_paths {
                    local_reference
                } else {
                    if !local_reference.is_empty() {
                        debug!(
                            count = local_reference.len(),
                            "Reference samples in the data paths table are read from the reference table instead"
                        );
                    }
                    let rows = self.table.fetch_rows(&self.config.reference_samples).await?;
                    split_reference_cohort(select_by_tissue(&sample_records(&rows), tissue)).0
                };

                info!(
                    %tissue,
                    reference = reference.len(),
                    primary = primary.len(),
                    "Selected samples by tissue"
                );
                Ok(vec![
                    Cohort::new(CohortKind::Reference, reference),
                    Cohort::new(CohortKind::Primary, primary),
                ])
            }
        }
    }

    /// Only reference inputs live in requester-pays buckets.
    fn billed_project(&self, kind: CohortKind) -> Option<&str> {
        match (kind, &self.run.selection) {
            (
                CohortKind::Reference,
                Selection::Tissue {
                    requester_pays_project,
                    ..
                },
            ) => Some(requester_pays_project.as_str()),
            _ => None,
        }
    }

    fn staging_for(&self, kind: CohortKind) -> Box<dyn InputStaging> {
        match (kind, &self.run.selection) {
            (
                CohortKind::Reference,
                Selection::Tissue {
                    requester_pays_project,
                    identity,
                    ..
                },
            ) => Box::new(DirectRemoteCopy::new(
                requester_pays_project.clone(),
                identity.clone(),
            )),
            _ => Box::new(LocalReferenceCopy),
        }
    }

    /// Builds three jobs per sample. Only input sizes are looked up remotely.
    pub async fn build_jobs(&self, cohorts: &[Cohort]) -> Result<BatchUnit, RemoteServiceError> {
        let builder = JobBuilder::new(&self.run.out_dir);
        let mut unit = BatchUnit::new();

        for cohort in cohorts {
            let staging = self.staging_for(cohort.kind);
            let billed = self.billed_project(cohort.kind);
            for sample in &cohort.samples {
                unit.submit(
                    self.build_sample(&builder, sample, staging.as_ref(), billed)
                        .await?,
                );
            }
            info!(cohort = %cohort.kind, samples = cohort.len(), "Built cohort jobs");
        }

        Ok(unit)
    }

    async fn build_sample(
        &self,
        builder: &JobBuilder,
        sample: &SampleRecord,
        staging: &dyn InputStaging,
        billed: Option<&str>,
    ) -> Result<Vec<JobSpec>, RemoteServiceError> {
        let input_bytes = self.storage.size(&sample.bam_path, billed).await?;
        debug!(sample = %sample.sample_id, input_bytes, "Building jobs");
        Ok(builder.build_sample_jobs(sample, staging, input_bytes))
    }

    pub async fn plan(&self) -> Result<RunPlan, RemoteServiceError> {
        let cohorts = self.select_cohorts().await?;
        let unit = self.build_jobs(&cohorts).await?;
        Ok(RunPlan { cohorts, unit })
    }

    /// Plans the run and, unless `driver` is `None`, submits the batch.
    pub async fn execute(&self, driver: Option<&BatchDriver>) -> Result<(RunPlan, RunSummary), RemoteServiceError> {
        let plan = self.plan().await?;
        let batch_id = match driver {
            Some(driver) => driver.run(plan.unit.clone()).await?,
            None => None,
        };
        let summary = RunSummary {
            cohorts: plan.cohorts.iter().map(|c| (c.kind, c.len())).collect(),
            jobs: plan.unit.len(),
            batch_id,
        };
        Ok((plan, summary))
    }
}
