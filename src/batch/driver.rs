//! Collects job specs into one batch and hands it to the batch service.
//!
//! The driver creates the batch, uploads the jobs and closes the batch. It
//! does not wait for, poll, or retry anything; job state belongs to the
//! service from that point on.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::client::{
    BatchRequest, BatchService, FileSpec, JobRequest, ProcessSpec, ResourceSpec,
};
use crate::config::BatchConfig;
use crate::error::RemoteServiceError;
use crate::jobs::{FileBinding, JobSpec};

/// Maximum jobs per `jobs/create` request.
pub const JOBS_PER_REQUEST: usize = 1024;

/// Settings shared by every job of one run.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub name: String,
    pub billing_project: String,
    pub remote_tmpdir: String,
    pub requester_pays_project: Option<String>,
    pub defaults: BatchConfig,
}

/// Jobs enqueued for a single batch submission.
#[derive(Debug, Clone, Default)]
pub struct BatchUnit {
    jobs: Vec<JobSpec>,
}

impl BatchUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, jobs: impl IntoIterator<Item = JobSpec>) {
        self.jobs.extend(jobs);
    }

    pub fn jobs(&self) -> &[JobSpec] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Submits batch units to a `BatchService`.
pub struct BatchDriver {
    service: Arc<dyn BatchService>,
    settings: BatchSettings,
}

impl BatchDriver {
    pub fn new(service: Arc<dyn BatchService>, settings: BatchSettings) -> Self {
        Self { service, settings }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Wire form of `job`, filling unset resources from the batch defaults.
    pub fn job_request(&self, job_id: usize, job: &JobSpec) -> JobRequest {
        let defaults = &self.settings.defaults;
        let attributes = BTreeMap::from([
            ("name".to_string(), job.name.clone()),
            ("sample_id".to_string(), job.sample_id.clone()),
            ("kind".to_string(), job.kind.to_string()),
            ("cohort".to_string(), job.cohort.to_string()),
        ]);

        JobRequest {
            job_id,
            parent_ids: Vec::new(),
            attributes,
            process: ProcessSpec {
                process_type: "docker".to_string(),
                image: defaults.image.clone(),
                command: vec!["/bin/bash".to_string(), "-c".to_string(), job.script()],
            },
            resources: ResourceSpec {
                cpu: job.resources.cpu.unwrap_or(defaults.cpu).to_string(),
                memory: defaults.memory.clone(),
                storage: job
                    .resources
                    .storage_bytes
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| defaults.storage.clone()),
            },
            input_files: job.inputs.iter().map(file_spec).collect(),
            output_files: vec![file_spec(&job.output)],
            regions: defaults.regions.clone(),
            requester_pays_project: self.settings.requester_pays_project.clone(),
            always_run: false,
        }
    }

    fn batch_request(&self, n_jobs: usize) -> BatchRequest {
        BatchRequest {
            billing_project: self.settings.billing_project.clone(),
            n_jobs,
            token: uuid::Uuid::new_v4().simple().to_string(),
            attributes: BTreeMap::from([("name".to_string(), self.settings.name.clone())]),
            remote_tmpdir: self.settings.remote_tmpdir.clone(),
        }
    }

    /// Submits the unit and returns the batch id once the service accepts it.
    ///
    /// An empty unit is not sent and yields `None`.
    pub async fn run(&self, unit: BatchUnit) -> Result<Option<u64>, RemoteServiceError> {
        if unit.is_empty() {
            info!("No jobs to submit");
            return Ok(None);
        }

        let requests: Vec<JobRequest> = unit
            .jobs()
            .iter()
            .enumerate()
            .map(|(i, job)| self.job_request(i + 1, job))
            .collect();

        let batch_id = self
            .service
            .create_batch(&self.batch_request(requests.len()))
            .await?;
        info!(batch_id, jobs = requests.len(), "Created batch");

        for chunk in requests.chunks(JOBS_PER_REQUEST) {
            self.service.create_jobs(batch_id, chunk).await?;
        }

        self.service.close_batch(batch_id).await?;
        info!(batch_id, "Batch submitted");
        Ok(Some(batch_id))
    }
}

fn file_spec(binding: &FileBinding) -> FileSpec {
    FileSpec::new(&binding.source, &binding.destination)
}
