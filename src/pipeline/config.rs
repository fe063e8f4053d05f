//! Per-run options and their up-front validation.
//!
//! Every option is checked here, before the first remote call, so a run
//! either fails immediately with a `ConfigError` or has everything it needs.

use crate::config::{AppConfig, IdentityConfig};
use crate::error::ConfigError;

/// Options for one run, usually taken from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Hail Batch billing project.
    pub billing_project: Option<String>,
    /// Project billed for requester-pays reads of reference samples.
    pub requester_pays_project: Option<String>,
    /// Remote temporary directory for the batch.
    pub file_dir: Option<String>,
    /// Tissue to select when no explicit samples are given.
    pub tissue: Option<String>,
    /// Object-storage directory receiving the QC artifacts.
    pub out_dir: Option<String>,
    /// Explicit sample identifiers; overrides tissue selection.
    pub samples: Vec<String>,
    /// Build jobs without submitting them.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_billing_project(mut self, project: impl Into<String>) -> Self {
        self.billing_project = Some(project.into());
        self
    }

    pub fn with_requester_pays_project(mut self, project: impl Into<String>) -> Self {
        self.requester_pays_project = Some(project.into());
        self
    }

    pub fn with_file_dir(mut self, dir: impl Into<String>) -> Self {
        self.file_dir = Some(dir.into());
        self
    }

    pub fn with_tissue(mut self, tissue: impl Into<String>) -> Self {
        self.tissue = Some(tissue.into());
        self
    }

    pub fn with_out_dir(mut self, dir: impl Into<String>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    pub fn with_samples(mut self, samples: Vec<String>) -> Self {
        self.samples = samples;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Checks the options against `config` and resolves the selection mode.
    pub fn validate(&self, config: &AppConfig) -> Result<ValidatedRun, ConfigError> {
        let out_dir = required(&self.out_dir, "--out-dir")?;

        let selection = if self.samples.is_empty() {
            let tissue = required(&self.tissue, "--tissue (or -s)")?;
            let requester_pays = required(&self.requester_pays_project, "--requester-pays-project")?;
            let identity = config.require_reference_identity()?.clone();
            Selection::Tissue {
                tissue,
                requester_pays_project: requester_pays,
                identity,
            }
        } else {
            Selection::Samples(self.samples.clone())
        };

        let submission = if self.dry_run {
            None
        } else {
            config.require_batch_token()?;
            Some(Submission {
                billing_project: required(&self.billing_project, "--billing-project")?,
                remote_tmpdir: required(&self.file_dir, "--file-dir")?,
                requester_pays_project: self.requester_pays_project.clone(),
            })
        };

        Ok(ValidatedRun {
            selection,
            out_dir,
            submission,
        })
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingArgument(name.to_string()))
}

/// How samples are chosen for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Exactly these identifiers, all treated as primary samples.
    Samples(Vec<String>),
    /// Every sample of a tissue, split into reference and primary cohorts.
    Tissue {
        tissue: String,
        requester_pays_project: String,
        identity: IdentityConfig,
    },
}

/// Batch submission settings taken from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub billing_project: String,
    pub remote_tmpdir: String,
    pub requester_pays_project: Option<String>,
}

/// Options that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRun {
    pub selection: Selection,
    pub out_dir: String,
    /// `None` for dry runs.
    pub submission: Option<Submission>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config(with_identity: bool, with_token: bool) -> AppConfig {
        let mut yaml = String::from(
            "service_account_credentials: /sa.json\nairtable_token: t\nairtable:\n  base_id: app\n  data_paths:\n    table: tbl\n",
        );
        if with_identity {
            yaml.push_str(
                "reference_identity:\n  credentials_path: gs://c\n  user_account: u@x.org\n  project: p\n",
            );
        }
        if with_token {
            yaml.push_str("batch:\n  token: bt\n");
        }
        AppConfig::from_yaml(&yaml, Path::new("/cfg.yaml"), Path::new("/home/me"))
            .expect("valid config")
    }

    fn full_options() -> RunOptions {
        RunOptions::new()
            .with_billing_project("bp")
            .with_requester_pays_project("rp")
            .with_file_dir("gs://tmp")
            .with_out_dir("gs://out")
    }

    #[test]
    fn test_samples_take_precedence_over_tissue() {
        let options = full_options()
            .with_tissue("Muscle")
            .with_samples(vec!["RDG-007".to_string()]);
        let run = options.validate(&config(false, true)).expect("valid options");
        assert_eq!(run.selection, Selection::Samples(vec!["RDG-007".to_string()]));
        assert_eq!(run.out_dir, "gs://out");
        let submission = run.submission.expect("submission settings");
        assert_eq!(submission.billing_project, "bp");
        assert_eq!(submission.remote_tmpdir, "gs://tmp");
    }

    #[test]
    fn test_tissue_mode_needs_identity_and_requester_pays() {
        let options = full_options().with_tissue("Muscle");
        assert!(matches!(
            options.validate(&config(false, true)),
            Err(ConfigError::MissingArgument(ref a)) if a == "reference_identity"
        ));

        let run = options.validate(&config(true, true)).expect("valid options");
        match run.selection {
            Selection::Tissue {
                tissue,
                requester_pays_project,
                identity,
            } => {
                assert_eq!(tissue, "Muscle");
                assert_eq!(requester_pays_project, "rp");
                assert_eq!(identity.user_account, "u@x.org");
            }
            other => panic!("unexpected selection {other:?}"),
        }

        let mut no_rp = options.clone();
        no_rp.requester_pays_project = None;
        assert!(matches!(
            no_rp.validate(&config(true, true)),
            Err(ConfigError::MissingArgument(ref a)) if a == "--requester-pays-project"
        ));
    }

    #[test]
    fn test_missing_selection_and_out_dir() {
        let err = full_options().validate(&config(true, true)).unwrap_err();
        assert!(err.to_string().contains("--tissue"));

        let err = RunOptions::new()
            .with_tissue("Muscle")
            .validate(&config(true, true))
            .unwrap_err();
        assert!(err.to_string().contains("--out-dir"));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let options = full_options().with_samples(vec!["S1".to_string()]).with_file_dir("  ");
        let err = options.validate(&config(false, true)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingArgument(ref a) if a == "--file-dir"));
    }

    #[test]
    fn test_dry_run_skips_submission_checks() {
        let options = RunOptions::new()
            .with_out_dir("gs://out")
            .with_samples(vec!["S1".to_string()])
            .dry_run(true);
        let run = options.validate(&config(false, false)).expect("valid options");
        assert!(run.submission.is_none());

        let err = options.dry_run(false).validate(&config(false, false)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingArgument(ref a) if a == "batch.token"));
    }
}
