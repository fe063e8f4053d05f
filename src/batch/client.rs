//! Hail Batch REST API client and wire types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RemoteServiceError;

const SERVICE: &str = "Batch";

/// Batch-level request body for `batches/create`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchRequest {
    pub billing_project: String,
    pub n_jobs: usize,
    /// Client-chosen idempotency token.
    pub token: String,
    pub attributes: BTreeMap<String, String>,
    pub remote_tmpdir: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessSpec {
    #[serde(rename = "type")]
    pub process_type: String,
    pub image: String,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceSpec {
    pub cpu: String,
    pub memory: String,
    pub storage: String,
}

/// A file copied between object storage and the job container.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileSpec {
    pub from: String,
    pub to: String,
}

impl FileSpec {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// One job of `batches/{id}/jobs/create`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobRequest {
    /// 1-based position within the batch.
    pub job_id: usize,
    pub parent_ids: Vec<usize>,
    pub attributes: BTreeMap<String, String>,
    pub process: ProcessSpec,
    pub resources: ResourceSpec,
    /// Copied in before the job starts.
    pub input_files: Vec<FileSpec>,
    /// Copied out after the job succeeds.
    pub output_files: Vec<FileSpec>,
    pub regions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_pays_project: Option<String>,
    pub always_run: bool,
}

#[derive(Debug, Deserialize)]
struct CreateBatchResponse {
    id: u64,
}

/// The batch service operations the driver needs.
#[async_trait]
pub trait BatchService: Send + Sync {
    /// Creates an open batch and returns its id.
    async fn create_batch(&self, request: &BatchRequest) -> Result<u64, RemoteServiceError>;

    async fn create_jobs(&self, batch_id: u64, jobs: &[JobRequest]) -> Result<(), RemoteServiceError>;

    /// Closes the batch, which lets the service start scheduling its jobs.
    async fn close_batch(&self, batch_id: u64) -> Result<(), RemoteServiceError>;
}

/// Client for the Hail Batch REST API.
#[derive(Debug, Clone)]
pub struct HailBatchClient {
    url: String,
    token: String,
    http_client: Client,
}

impl HailBatchClient {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http_client: Client::builder()
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1alpha/{}", self.url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteServiceError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(RemoteServiceError::from_response(SERVICE, response).await)
        }
    }
}

#[async_trait]
impl BatchService for HailBatchClient {
    async fn create_batch(&self, request: &BatchRequest) -> Result<u64, RemoteServiceError> {
        let response = self
            .http_client
            .post(self.endpoint("batches/create"))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| RemoteServiceError::request(SERVICE, e))?;

        let created: CreateBatchResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteServiceError::parse(SERVICE, e))?;
        Ok(created.id)
    }

    async fn create_jobs(&self, batch_id: u64, jobs: &[JobRequest]) -> Result<(), RemoteServiceError> {
        debug!(batch_id, count = jobs.len(), "Uploading job specs");
        let response = self
            .http_client
            .post(self.endpoint(&format!("batches/{batch_id}/jobs/create")))
            .bearer_auth(&self.token)
            .json(jobs)
            .send()
            .await
            .map_err(|e| RemoteServiceError::request(SERVICE, e))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn close_batch(&self, batch_id: u64) -> Result<(), RemoteServiceError> {
        let response = self
            .http_client
            .patch(self.endpoint(&format!("batches/{batch_id}/close")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| RemoteServiceError::request(SERVICE, e))?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint() {
        let client = HailBatchClient::new("https://batch.hail.is/", "tok");
        assert_eq!(
            client.endpoint("batches/12/close"),
            "https://batch.hail.is/api/v1alpha/batches/12/close"
        );
    }

    #[test]
    fn test_job_request_wire_shape() {
        let job = JobRequest {
            job_id: 1,
            parent_ids: Vec::new(),
            attributes: BTreeMap::from([("name".to_string(), "S1_md".to_string())]),
            process: ProcessSpec {
                process_type: "docker".to_string(),
                image: "img".to_string(),
                command: vec!["/bin/bash".to_string(), "-c".to_string(), "true".to_string()],
            },
            resources: ResourceSpec {
                cpu: "16".to_string(),
                memory: "standard".to_string(),
                storage: "50G".to_string(),
            },
            input_files: vec![FileSpec::new("gs://a", "/io/input/a")],
            output_files: vec![FileSpec::new("/io/ofile", "gs://out/S1_marked_dup_metrics.txt")],
            regions: vec!["us-central1".to_string()],
            requester_pays_project: None,
            always_run: false,
        };
        let value = serde_json::to_value(&job).expect("serializable");
        assert_eq!(value["process"]["type"], json!("docker"));
        assert_eq!(value["input_files"], json!([{"from": "gs://a", "to": "/io/input/a"}]));
        assert_eq!(
            value["output_files"],
            json!([{"from": "/io/ofile", "to": "gs://out/S1_marked_dup_metrics.txt"}])
        );
        assert!(value.get("requester_pays_project").is_none());
    }

    #[test]
    fn test_create_batch_response() {
        let created: CreateBatchResponse =
            serde_json::from_str(r#"{"id": 9876, "update_id": 1}"#).expect("valid response");
        assert_eq!(created.id, 9876);
    }
}
