//! CLI definition and entry point for rnaseq-qc.
//!
//! A single command: select samples, build the QC jobs and submit them to
//! Hail Batch (or print them with `--dry-run`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::batch::HailBatchClient;
use crate::config::AppConfig;
use crate::object_store::GcsClient;
use crate::pipeline::{Pipeline, RunOptions, RunSummary};
use crate::table::AirtableClient;

/// RNA-seq QC batch submission.
#[derive(Parser, Debug)]
#[command(name = "rnaseq-qc")]
#[command(about = "Submit duplicate marking, FastQC and read-count jobs for RNA-seq samples")]
#[command(version)]
#[command(
    long_about = "rnaseq-qc reads sample metadata from Airtable and submits three QC jobs per sample to Hail Batch.\n\nExample usage:\n  rnaseq-qc --billing-project my-billing --requester-pays-project my-project \\\n    --file-dir gs://bucket/tmp --tissue Muscle --out-dir gs://bucket/qc"
)]
pub struct Cli {
    /// Project to bill under.
    #[arg(long)]
    pub billing_project: Option<String>,

    /// Requester pays project to bill under.
    #[arg(long)]
    pub requester_pays_project: Option<String>,

    /// The temporary directory for Hail Batch.
    #[arg(long)]
    pub file_dir: Option<String>,

    /// Tissue type of the samples.
    #[arg(long)]
    pub tissue: Option<String>,

    /// The output directory in Cloud Storage.
    #[arg(long)]
    pub out_dir: Option<String>,

    /// IDs of specific samples to process (processed as non-GTEx samples).
    #[arg(short = 's', value_name = "SAMPLE_ID", num_args = 1..)]
    pub samples: Vec<String>,

    /// Config file with credentials and table locators.
    #[arg(long, env = "RNASEQ_QC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the job specs as JSON instead of submitting them.
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            billing_project: self.billing_project.clone(),
            requester_pays_project: self.requester_pays_project.clone(),
            file_dir: self.file_dir.clone(),
            tissue: self.tissue.clone(),
            out_dir: self.out_dir.clone(),
            samples: self.samples.clone(),
            dry_run: self.dry_run,
        }
    }
}

/// Parses the process arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses the process arguments and runs.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Runs with already parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let options = cli.run_options();

    let table = Arc::new(AirtableClient::from_config(&config));
    let storage = Arc::new(GcsClient::new(config.service_account_credentials.clone()));
    let pipeline = Pipeline::new(&config, &options, table, storage)?;

    let driver = if options.dry_run {
        None
    } else {
        let token = config.require_batch_token()?;
        pipeline.batch_driver(Arc::new(HailBatchClient::new(&config.batch.url, token)))
    };

    let (plan, summary) = pipeline.execute(driver.as_ref()).await?;

    if options.dry_run {
        println!("{}", serde_json::to_string_pretty(plan.jobs())?);
    }
    report(&summary);
    Ok(())
}

fn report(summary: &RunSummary) {
    for (kind, samples) in &summary.cohorts {
        info!(cohort = %kind, samples, "Cohort");
    }
    match summary.batch_id {
        Some(id) => info!(batch_id = id, jobs = summary.jobs, "Submitted batch"),
        None => info!(jobs = summary.jobs, "No batch submitted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "rnaseq-qc",
            "--billing-project",
            "bp",
            "--requester-pays-project",
            "rp",
            "--file-dir",
            "gs://tmp",
            "--tissue",
            "Muscle",
            "--out-dir",
            "gs://out",
        ])
        .expect("valid arguments");

        let options = cli.run_options();
        assert_eq!(options.billing_project.as_deref(), Some("bp"));
        assert_eq!(options.requester_pays_project.as_deref(), Some("rp"));
        assert_eq!(options.file_dir.as_deref(), Some("gs://tmp"));
        assert_eq!(options.tissue.as_deref(), Some("Muscle"));
        assert_eq!(options.out_dir.as_deref(), Some("gs://out"));
        assert!(options.samples.is_empty());
        assert!(!options.dry_run);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_parse_multiple_samples() {
        let cli = Cli::try_parse_from([
            "rnaseq-qc",
            "-s",
            "RDG-007",
            "RDG-008",
            "--out-dir",
            "gs://out",
            "--dry-run",
        ])
        .expect("valid arguments");
        assert_eq!(cli.samples, vec!["RDG-007", "RDG-008"]);
        assert!(cli.dry_run);
    }

    #[test]
    fn test_flags_are_optional_at_parse_time() {
        let cli = Cli::try_parse_from(["rnaseq-qc"]).expect("valid arguments");
        assert_eq!(cli.run_options(), RunOptions::default());
    }

    #[test]
    fn test_sample_flag_needs_a_value() {
        assert!(Cli::try_parse_from(["rnaseq-qc", "-s"]).is_err());
    }
}
