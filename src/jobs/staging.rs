//! Input staging strategies.
//!
//! A strategy decides how a job gets its BAM into the working directory and
//! which identity it runs under. One strategy is picked per cohort.

use std::borrow::Cow;

use crate::config::IdentityConfig;
use crate::samples::CohortKind;

use super::spec::FileBinding;

/// Directory the service localizes bound input files into.
pub const INPUT_DIR: &str = "/io/input";

/// Key file of the service account the batch service mounts into every job.
pub const BATCH_SERVICE_ACCOUNT_KEY: &str = "/gsa-key/key.json";

/// Quotes `value` as one POSIX shell word. Plain words pass through unchanged.
pub(crate) fn shell_quote(value: &str) -> String {
    shell_escape::unix::escape(Cow::Borrowed(value)).into_owned()
}

/// Commands and service-side bindings that put one input file in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedInput {
    pub commands: Vec<String>,
    pub inputs: Vec<FileBinding>,
}

pub trait InputStaging: Send + Sync {
    fn cohort(&self) -> CohortKind;

    /// Commands run before anything else in the job.
    fn prelude(&self) -> Vec<String>;

    /// Makes `source` available as `link_name` in the working directory.
    fn stage(&self, source: &str, link_name: &str) -> StagedInput;
}

/// Switches to a user account and copies inputs directly, billing the
/// requester-pays project.
#[derive(Debug, Clone)]
pub struct DirectRemoteCopy {
    requester_pays_project: String,
    identity: IdentityConfig,
}

impl DirectRemoteCopy {
    pub fn new(requester_pays_project: impl Into<String>, identity: IdentityConfig) -> Self {
        Self {
            requester_pays_project: requester_pays_project.into(),
            identity,
        }
    }
}

impl InputStaging for DirectRemoteCopy {
    fn cohort(&self) -> CohortKind {
        CohortKind::Reference
    }

    /// Each step depends on the previous one: the user `.config` must be in
    /// place before account and project are set, and those before the
    /// application-default credentials are looked up.
    fn prelude(&self) -> Vec<String> {
        let config_dir = format!(
            "{}/.config",
            self.identity.credentials_path.trim_end_matches('/')
        );
        vec![
            format!("gcloud auth activate-service-account --key-file {BATCH_SERVICE_ACCOUNT_KEY}"),
            format!("gsutil -m cp -r {} /tmp/", shell_quote(&config_dir)),
            "rm -rf ~/.config".to_string(),
            "mv /tmp/.config ~/".to_string(),
            format!(
                "gcloud config set account {}",
                shell_quote(&self.identity.user_account)
            ),
            format!("gcloud config set project {}", shell_quote(&self.identity.project)),
            "export GOOGLE_APPLICATION_CREDENTIALS=$(find ~/.config/ -name 'adc.json')".to_string(),
        ]
    }

    fn stage(&self, source: &str, link_name: &str) -> StagedInput {
        StagedInput {
            commands: vec![format!(
                "gsutil -u {} -m cp {} {}",
                shell_quote(&self.requester_pays_project),
                shell_quote(source),
                shell_quote(link_name)
            )],
            inputs: Vec::new(),
        }
    }
}

/// Lets the batch service localize the input and links to the local copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalReferenceCopy;

impl InputStaging for LocalReferenceCopy {
    fn cohort(&self) -> CohortKind {
        CohortKind::Primary
    }

    fn prelude(&self) -> Vec<String> {
        Vec::new()
    }

    fn stage(&self, source: &str, link_name: &str) -> StagedInput {
        let file_name = source.rsplit('/').next().unwrap_or(source);
        let localized = format!("{INPUT_DIR}/{file_name}");
        StagedInput {
            commands: vec![format!(
                "ln -s {} {}",
                shell_quote(&localized),
                shell_quote(link_name)
            )],
            inputs: vec![FileBinding::new(source, localized)],
        }
    }
}
