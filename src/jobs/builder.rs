//! Per-sample job construction.
//!
//! Construction only: nothing here runs a command or checks that it would
//! succeed. Failures surface later as failed jobs in the batch service.

use crate::samples::SampleRecord;

use super::spec::{FileBinding, JobKind, JobSpec, Resources};
use super::staging::{shell_quote, InputStaging};

/// Working directory of every job.
pub const WORKING_DIR: &str = "/io";

/// Container path the service copies to the job's output destination.
pub const OUTPUT_HANDLE: &str = "/io/ofile";

const PICARD_JAR: &str = "/base/usr/picard/picard.jar";

/// Builds the three jobs of each sample, writing results under `out_dir`.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    out_dir: String,
}

impl JobBuilder {
    pub fn new(out_dir: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &str {
        &self.out_dir
    }

    /// Builds one job. `input_bytes` is the BAM size; only the read-count job uses it.
    pub fn build_job(
        &self,
        sample: &SampleRecord,
        kind: JobKind,
        staging: &dyn InputStaging,
        input_bytes: u64,
    ) -> JobSpec {
        let id = &sample.sample_id;
        let bam = format!("{id}.bam");
        let bam_arg = shell_quote(&bam);

        let mut commands = staging.prelude();
        commands.push(format!("cd {WORKING_DIR}"));

        let staged = staging.stage(&sample.bam_path, &bam);
        let stage_commands = staged.commands;

        let resources = match kind {
            JobKind::MarkDuplicates => {
                commands.push("ls -lh .".to_string());
                commands.extend(stage_commands);
                commands.push(format!(
                    "java -jar {PICARD_JAR} MarkDuplicates {} {} M=marked_dup_metrics.txt",
                    shell_quote(&format!("I={bam}")),
                    shell_quote(&format!("O={id}.mark_dup.bam"))
                ));
                commands.push("ls -lh .".to_string());
                commands.push(format!("cp marked_dup_metrics.txt {OUTPUT_HANDLE}"));
                Resources::default()
            }
            JobKind::QcReport => {
                commands.extend(stage_commands);
                commands.push(format!("fastqc {bam_arg}"));
                commands.push("ls -lh .".to_string());
                commands.push(format!("cp *.html {OUTPUT_HANDLE}"));
                Resources::default()
            }
            JobKind::ReadCount => {
                commands.extend(stage_commands);
                commands.push(format!("samtools view -c {bam_arg} > {OUTPUT_HANDLE}"));
                commands.push(format!("samtools view -c -F 260 {bam_arg} >> {OUTPUT_HANDLE}"));
                Resources {
                    cpu: Some(1),
                    storage_bytes: Some(input_bytes),
                }
            }
        };

        JobSpec {
            name: kind.job_name(id),
            sample_id: id.clone(),
            kind,
            cohort: staging.cohort(),
            commands,
            resources,
            inputs: staged.inputs,
            output: FileBinding::new(OUTPUT_HANDLE, kind.output_destination(&self.out_dir, id)),
        }
    }

    /// All three jobs of one sample, in `JobKind::ALL` order.
    pub fn build_sample_jobs(
        &self,
        sample: &SampleRecord,
        staging: &dyn InputStaging,
        input_bytes: u64,
    ) -> Vec<JobSpec> {
        JobKind::ALL
            .iter()
            .map(|kind| self.build_job(sample, *kind, staging, input_bytes))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;
    use crate::jobs::staging::{DirectRemoteCopy, LocalReferenceCopy};
    use crate::samples::CohortKind;
    use std::collections::HashSet;

    fn sample() -> SampleRecord {
        SampleRecord::new("RDG-007", Some("Muscle"), "gs://x/b.bam")
    }

    fn direct() -> DirectRemoteCopy {
        DirectRemoteCopy::new(
            "billing-proj",
            IdentityConfig {
                credentials_path: "gs://creds".to_string(),
                user_account: "me@example.org".to_string(),
                project: "proj".to_string(),
            },
        )
    }

    #[test]
    fn test_three_jobs_with_distinct_outputs() {
        let builder = JobBuilder::new("gs://out");
        let jobs = builder.build_sample_jobs(&sample(), &LocalReferenceCopy, 42);
        assert_eq!(jobs.len(), 3);

        let outputs: HashSet<_> = jobs.iter().map(|j| j.output_destination()).collect();
        assert_eq!(outputs.len(), 3);
        assert!(outputs.contains("gs://out/RDG-007_marked_dup_metrics.txt"));
        assert!(outputs.contains("gs://out/RDG-007.html"));
        assert!(outputs.contains("gs://out/RDG-007_read_counts.txt"));

        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["RDG-007_fastqc", "RDG-007_md", "RDG-007_read_count"]);
    }

    #[test]
    fn test_read_count_storage_is_exact_input_size() {
        let builder = JobBuilder::new("gs://out");
        let size = 7_340_032_001;
        let job = builder.build_job(&sample(), JobKind::ReadCount, &LocalReferenceCopy, size);
        assert_eq!(job.resources.storage_bytes, Some(size));
        assert_eq!(job.resources.cpu, Some(1));

        for kind in [JobKind::QcReport, JobKind::MarkDuplicates] {
            let job = builder.build_job(&sample(), kind, &LocalReferenceCopy, size);
            assert_eq!(job.resources, Resources::default());
        }
    }

    #[test]
    fn test_primary_mark_duplicates_commands() {
        let builder = JobBuilder::new("gs://out");
        let job = builder.build_job(&sample(), JobKind::MarkDuplicates, &LocalReferenceCopy, 1);
        assert_eq!(
            job.commands,
            vec![
                "cd /io",
                "ls -lh .",
                "ln -s /io/input/b.bam RDG-007.bam",
                "java -jar /base/usr/picard/picard.jar MarkDuplicates I=RDG-007.bam O=RDG-007.mark_dup.bam M=marked_dup_metrics.txt",
                "ls -lh .",
                "cp marked_dup_metrics.txt /io/ofile",
            ]
        );
        assert_eq!(job.cohort, CohortKind::Primary);
        assert_eq!(job.inputs.len(), 1);
    }

    #[test]
    fn test_reference_read_count_switches_identity_first() {
        let builder = JobBuilder::new("gs://out");
        let gtex = SampleRecord::new("GTEX-001", Some("Muscle"), "gs://x/a.bam");
        let job = builder.build_job(&gtex, JobKind::ReadCount, &direct(), 10);

        assert!(job.commands[0].starts_with("gcloud auth activate-service-account"));
        let cd = job.commands.iter().position(|c| c == "cd /io").expect("cd present");
        assert_eq!(cd, 7);
        assert_eq!(
            &job.commands[cd + 1..],
            &[
                format!("gsutil -u billing-proj -m cp {} GTEX-001.bam", shell_quote("gs://x/a.bam")),
                "samtools view -c GTEX-001.bam > /io/ofile".to_string(),
                "samtools view -c -F 260 GTEX-001.bam >> /io/ofile".to_string(),
            ]
        );
        assert!(job.inputs.is_empty());
        assert_eq!(job.cohort, CohortKind::Reference);
    }

    #[test]
    fn test_unusual_sample_ids_stay_single_words() {
        let builder = JobBuilder::new("gs://out");
        let odd = SampleRecord::new("RDG 7;x", Some("Muscle"), "gs://x/b.bam");

        let job = builder.build_job(&odd, JobKind::ReadCount, &LocalReferenceCopy, 1);
        assert!(job.commands.contains(&"ln -s /io/input/b.bam 'RDG 7;x.bam'".to_string()));
        assert!(job
            .commands
            .contains(&"samtools view -c 'RDG 7;x.bam' > /io/ofile".to_string()));

        let job = builder.build_job(&odd, JobKind::MarkDuplicates, &LocalReferenceCopy, 1);
        assert!(job.commands.iter().any(|c| c.ends_with(
            "MarkDuplicates 'I=RDG 7;x.bam' 'O=RDG 7;x.mark_dup.bam' M=marked_dup_metrics.txt"
        )));
    }

    #[test]
    fn test_qc_report_copies_html() {
        let builder = JobBuilder::new("gs://out/");
        let job = builder.build_job(&sample(), JobKind::QcReport, &LocalReferenceCopy, 1);
        assert!(job.commands.contains(&"fastqc RDG-007.bam".to_string()));
        assert_eq!(job.commands.last().map(String::as_str), Some("cp *.html /io/ofile"));
        assert_eq!(job.output, FileBinding::new("/io/ofile", "gs://out/RDG-007.html"));
    }
}
