use crate::{
    client::JobClient,
    report::{ArtifactReport, RunReport},
    transport::{ArtifactKind, Transport},
    util::{ensure_parent, now_rfc3339},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RunPaths {
    pub sequence: PathBuf,
    pub genbank_out: PathBuf,
    pub tab_out: PathBuf,
}

impl RunPaths {
    pub fn for_sample(sample: &str, indir: &Path, outdir: &Path) -> Self {
        Self {
            sequence: indir.join(format!("{sample}-genome.gbk")),
            genbank_out: outdir.join(format!(
                "{sample}{}",
                ArtifactKind::Genbank.sample_suffix()
            )),
            tab_out: outdir.join(format!("{sample}{}", ArtifactKind::Tab.sample_suffix())),
        }
    }

    fn dest(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Genbank => &self.genbank_out,
            ArtifactKind::Tab => &self.tab_out,
        }
    }
}

pub struct Pipeline<T: Transport> {
    client: JobClient<T>,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(client: JobClient<T>) -> Self {
        Self { client }
    }

    pub fn run_job(
        &self,
        paths: &RunPaths,
        reference_accession: Option<&str>,
    ) -> Result<RunReport> {
        let wall = Instant::now();
        let started = now_rfc3339();

        for kind in [ArtifactKind::Genbank, ArtifactKind::Tab] {
            ensure_parent(paths.dest(kind))?;
        }

        let job = self
            .client
            .submit(&paths.sequence, reference_accession)
            .context("Error submitting genome to IslandViewer")?;
        let mut report = RunReport::for_job(&job, started);

        let outcome = self
            .client
            .wait_for_completion(&job)
            .with_context(|| format!("waiting for job {}", job.token))?;
        report.status_calls = outcome.status_calls;
        report.waited_seconds = outcome.waited.as_secs();

        for kind in [ArtifactKind::Genbank, ArtifactKind::Tab] {
            let got = self
                .client
                .download(&job, kind, paths.dest(kind))
                .with_context(|| format!("downloading {kind} result for job {}", job.token))?;
            report.artifacts.push(ArtifactReport::from(&got));
        }

        report.finished = now_rfc3339();
        info!(
            "job {} finished in {:.1}s ({} status calls)",
            job.token,
            wall.elapsed().as_secs_f64(),
            report.status_calls
        );
        Ok(report)
    }
}
