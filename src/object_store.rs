//! Cloud Storage metadata lookups.
//!
//! Only object sizes are needed: the read-count job reserves exactly as much
//! disk as its input BAM occupies.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::RemoteServiceError;

const SERVICE: &str = "Cloud Storage";
const GCS_API_BASE: &str = "https://storage.googleapis.com/storage/v1";

/// Bucket and object name of a `gs://` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    pub bucket: String,
    pub object: String,
}

impl ObjectPath {
    pub fn parse(uri: &str) -> Result<Self, RemoteServiceError> {
        let rest = uri
            .strip_prefix("gs://")
            .ok_or_else(|| RemoteServiceError::InvalidObjectPath(uri.to_string()))?;
        match rest.split_once('/') {
            Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => Ok(Self {
                bucket: bucket.to_string(),
                object: object.to_string(),
            }),
            _ => Err(RemoteServiceError::InvalidObjectPath(uri.to_string())),
        }
    }
}

/// Read-only metadata access to object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size of the object in bytes. `user_project` is billed when the bucket
    /// is requester-pays; pass `None` for buckets the caller can read directly.
    async fn size(&self, uri: &str, user_project: Option<&str>) -> Result<u64, RemoteServiceError>;
}

#[derive(Debug, Deserialize)]
struct ObjectMetadata {
    /// The JSON API reports sizes as decimal strings.
    size: String,
}

/// Cloud Storage JSON API client.
///
/// The access token is minted once, on first use, by the `gcloud` CLI from
/// the configured service-account key.
pub struct GcsClient {
    http_client: Client,
    credentials: PathBuf,
    token: OnceCell<String>,
}

impl GcsClient {
    pub fn new(credentials: impl Into<PathBuf>) -> Self {
        Self {
            http_client: Client::builder()
                .build()
                .unwrap_or_else(|_| Client::new()),
            credentials: credentials.into(),
            token: OnceCell::new(),
        }
    }

    fn metadata_url(path: &ObjectPath, user_project: Option<&str>) -> String {
        let mut url = format!(
            "{}/b/{}/o/{}?fields=size",
            GCS_API_BASE,
            urlencoding::encode(&path.bucket),
            urlencoding::encode(&path.object)
        );
        if let Some(project) = user_project {
            url.push_str(&format!("&userProject={}", urlencoding::encode(project)));
        }
        url
    }

    async fn access_token(&self) -> Result<&str, RemoteServiceError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let output = Command::new("gcloud")
                    .args(["auth", "application-default", "print-access-token"])
                    .env("GOOGLE_APPLICATION_CREDENTIALS", &self.credentials)
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(|e| RemoteServiceError::Credentials(e.to_string()))?;
                if !output.status.success() {
                    return Err(RemoteServiceError::Credentials(
                        String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    ));
                }
                Ok::<_, RemoteServiceError>(
                    String::from_utf8_lossy(&output.stdout).trim().to_string(),
                )
            })
            .await?;
        Ok(token.as_str())
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn size(&self, uri: &str, user_project: Option<&str>) -> Result<u64, RemoteServiceError> {
        let path = ObjectPath::parse(uri)?;
        let token = self.access_token().await?;

        let response = self
            .http_client
            .get(Self::metadata_url(&path, user_project))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RemoteServiceError::request(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(RemoteServiceError::from_response(SERVICE, response).await);
        }

        let metadata: ObjectMetadata = response
            .json()
            .await
            .map_err(|e| RemoteServiceError::parse(SERVICE, e))?;
        let size = metadata
            .size
            .parse::<u64>()
            .map_err(|e| RemoteServiceError::parse(SERVICE, e))?;

        debug!(uri, size, ?user_project, "Stat object");
        Ok(size)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gs_uri() {
        let path = ObjectPath::parse("gs://bucket/dir/a b.bam").expect("valid uri");
        assert_eq!(path.bucket, "bucket");
        assert_eq!(path.object, "dir/a b.bam");
    }

    #[test]
    fn test_parse_rejects_other_uris() {
        for uri in ["s3://bucket/a.bam", "gs://bucket", "gs://bucket/", "gs:///a.bam", "/local/a.bam"] {
            assert!(
                matches!(ObjectPath::parse(uri), Err(RemoteServiceError::InvalidObjectPath(_))),
                "{uri} should be rejected"
            );
        }
    }

    #[test]
    fn test_metadata_url_encodes_object_and_user_project() {
        let path = ObjectPath::parse("gs://bkt/dir/x.bam").expect("valid uri");

        assert_eq!(
            GcsClient::metadata_url(&path, None),
            "https://storage.googleapis.com/storage/v1/b/bkt/o/dir%2Fx.bam?fields=size"
        );
        assert!(GcsClient::metadata_url(&path, Some("my-proj"))
            .ends_with("?fields=size&userProject=my-proj"));
    }

    #[test]
    fn test_metadata_size_is_string() {
        let metadata: ObjectMetadata =
            serde_json::from_str(r#"{"size":"123456789012"}"#).expect("valid metadata");
        assert_eq!(metadata.size.parse::<u64>().ok(), Some(123_456_789_012));
    }
}
