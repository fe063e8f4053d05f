//! Run configuration loaded from the local YAML config file.
//!
//! The file holds the service-account credentials path and the Airtable
//! token (both required), plus the table locators, the identity used for
//! reference (GTEx) samples and the Hail Batch connection settings.
//!
//! ```yaml
//! service_account_credentials: ~/.config/rnaseq-qc/service-account.json
//! airtable_token: patXXXXXXXX
//! airtable:
//!   base_id: appXXXXXXXX
//!   data_paths: { table: tblXXXXXXXX, view: viwXXXXXXXX }
//!   reference_samples: { table: tblYYYYYYYY, view: viwYYYYYYYY }
//! reference_identity:
//!   credentials_path: gs://my-bucket/gcloud-user
//!   user_account: someone@example.org
//!   project: my-gcp-project
//! batch:
//!   token: XXXXXXXX
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::table::TableLocator;

/// Config file location relative to the home directory.
const DEFAULT_CONFIG_PATH: &str = ".config/rnaseq-qc/config.yaml";

pub const DEFAULT_AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";
pub const DEFAULT_BATCH_URL: &str = "https://batch.hail.is";
pub const DEFAULT_IMAGE: &str =
    "gcr.io/cmg-analysis/qc@sha256:612a6432e6365c7ea2156bab03d7e434bec9e5e7642399dc2270381c202cad55";
pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_CPU: u32 = 16;
pub const DEFAULT_MEMORY: &str = "standard";
pub const DEFAULT_STORAGE: &str = "50G";

/// Airtable view of one table, as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct TableRef {
    pub table: String,
    pub view: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawAirtable {
    api_url: Option<String>,
    base_id: Option<String>,
    data_paths: Option<TableRef>,
    reference_samples: Option<TableRef>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawConfig {
    service_account_credentials: Option<String>,
    airtable_token: Option<String>,
    #[serde(default)]
    airtable: RawAirtable,
    reference_identity: Option<IdentityConfig>,
    #[serde(default)]
    batch: BatchConfig,
}

/// Google account that can read reference (GTEx) BAMs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IdentityConfig {
    /// Object-storage prefix holding the account's `.config` directory.
    pub credentials_path: String,
    pub user_account: String,
    pub project: String,
}

impl IdentityConfig {
    /// Every field is interpolated into shell commands, so none may be empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("reference_identity.credentials_path", &self.credentials_path),
            ("reference_identity.user_account", &self.user_account),
            ("reference_identity.project", &self.project),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyValue {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Hail Batch connection and per-batch job defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub url: String,
    pub token: Option<String>,
    pub image: String,
    pub regions: Vec<String>,
    pub cpu: u32,
    pub memory: String,
    pub storage: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BATCH_URL.to_string(),
            token: None,
            image: DEFAULT_IMAGE.to_string(),
            regions: vec![DEFAULT_REGION.to_string()],
            cpu: DEFAULT_CPU,
            memory: DEFAULT_MEMORY.to_string(),
            storage: DEFAULT_STORAGE.to_string(),
        }
    }
}

/// Fully resolved configuration, built once in `main` and passed by reference.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service-account key file, with `~` expanded.
    pub service_account_credentials: PathBuf,
    pub airtable_token: String,
    pub airtable_api_url: String,
    pub data_paths: TableLocator,
    /// Table the reference cohort is read from. Same as `data_paths` unless configured.
    pub reference_samples: TableLocator,
    pub reference_identity: Option<IdentityConfig>,
    pub batch: BatchConfig,
}

impl AppConfig {
    /// Loads the config from `path`, or from `~/.config/rnaseq-qc/config.yaml`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        Self::load_from(path, home.as_deref())
    }

    /// The home directory is only required for the default location and `~` paths.
    fn load_from(path: Option<&Path>, home: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => resolve_home(&p.to_string_lossy(), home)?,
            None => home.ok_or(ConfigError::NoHomeDir)?.join(DEFAULT_CONFIG_PATH),
        };
        if !path.is_file() {
            return Err(ConfigError::NotFound(path));
        }
        let content = fs::read_to_string(&path)?;
        Self::parse(&content, &path, home)
    }

    /// Parses config text. `path` is only used in error messages.
    pub fn from_yaml(content: &str, path: &Path, home: &Path) -> Result<Self, ConfigError> {
        Self::parse(content, path, Some(home))
    }

    fn parse(content: &str, path: &Path, home: Option<&Path>) -> Result<Self, ConfigError> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };

        let missing = |key: &str| ConfigError::MissingKey {
            path: path.to_path_buf(),
            key: key.to_string(),
        };

        let credentials = raw
            .service_account_credentials
            .ok_or_else(|| missing("service_account_credentials"))?;
        let airtable_token = raw
            .airtable_token
            .ok_or_else(|| missing("airtable_token"))?;
        let base_id = raw
            .airtable
            .base_id
            .ok_or_else(|| missing("airtable.base_id"))?;
        let data_paths = raw
            .airtable
            .data_paths
            .ok_or_else(|| missing("airtable.data_paths"))?;

        let data_paths = TableLocator::new(&base_id, &data_paths.table, data_paths.view.as_deref());
        let reference_samples = match raw.airtable.reference_samples {
            Some(r) => TableLocator::new(&base_id, &r.table, r.view.as_deref()),
            None => data_paths.clone(),
        };

        Ok(Self {
            service_account_credentials: resolve_home(&credentials, home)?,
            airtable_token,
            airtable_api_url: raw
                .airtable
                .api_url
                .unwrap_or_else(|| DEFAULT_AIRTABLE_API_URL.to_string()),
            data_paths,
            reference_samples,
            reference_identity: raw.reference_identity,
            batch: raw.batch,
        })
    }

    /// The identity for reference samples; required once such a cohort may be built.
    pub fn require_reference_identity(&self) -> Result<&IdentityConfig, ConfigError> {
        let identity = self
            .reference_identity
            .as_ref()
            .ok_or_else(|| ConfigError::MissingArgument("reference_identity".to_string()))?;
        identity.validate()?;
        Ok(identity)
    }

    pub fn require_batch_token(&self) -> Result<&str, ConfigError> {
        self.batch
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::MissingArgument("batch.token".to_string()))
    }
}

fn resolve_home(path: &str, home: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match home {
        Some(home) => Ok(expand_home(path, home)),
        None if path == "~" || path.starts_with("~/") => Err(ConfigError::NoHomeDir),
        None => Ok(PathBuf::from(path)),
    }
}

/// Expands a leading `~` the way a shell would.
pub fn expand_home(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}
