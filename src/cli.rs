use crate::{
    choices::{self, ChoiceSinks},
    client::JobClient,
    config::{Config, SubmitFallback},
    pipeline::{Pipeline, RunPaths},
    report::RunReport,
    transport::{curl::CurlSubmitter, http::HttpTransport},
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_CONFIG: &str = "islandviewer-client.toml";

#[derive(Parser, Debug)]
#[command(name = "islandviewer-client")]
#[command(version)]
#[command(about = "Submit a genome to IslandViewer and download its genomic island predictions")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./islandviewer-client.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the effective configuration and check the curl fallback.
    Doctor {},
    /// Submit one GenBank file and write both results to explicit paths.
    Run {
        /// API token (IslandViewer: JOBS > HTTP API Token; valid for 30 days).
        #[arg(long)]
        token: String,
        /// GenBank file to submit.
        #[arg(long = "sequence", visible_alias = "seq")]
        sequence: PathBuf,
        /// Output: reordered GenBank file with predicted islands.
        #[arg(long)]
        gbk: PathBuf,
        /// Output: tab-delimited island summary.
        #[arg(long)]
        tab: PathBuf,
        /// RefSeq accession of the reference genome used to reorder contigs
        /// (needed for draft genomes).
        #[arg(long)]
        accession: Option<String>,
    },
    /// Submit `<indir>/<sample>-genome.gbk` and write results into `<outdir>`.
    RunSample {
        #[arg(short, long)]
        token: String,
        #[arg(short, long)]
        sample: String,
        #[arg(short, long)]
        indir: PathBuf,
        #[arg(short, long)]
        outdir: PathBuf,
        /// For draft genomes, the accession of the reference genome.
        #[arg(short, long)]
        reference: Option<String>,
    },
    /// Query the status of an existing job once.
    Status {
        #[arg(long)]
        token: String,
        /// Job token returned at submission.
        #[arg(long)]
        job: String,
    },
    /// List the reference genomes the service offers.
    Genomes {
        #[arg(long)]
        token: String,
    },
    /// Write the reference-genome choice list and message properties.
    Choices {
        #[arg(long)]
        token: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;

    check_run_inputs(&args.cmd)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Run {
            token,
            sequence,
            gbk,
            tab,
            accession,
        } => {
            let paths = RunPaths {
                sequence: sequence.clone(),
                genbank_out: gbk.clone(),
                tab_out: tab.clone(),
            };
            run(&cfg, token, &paths, accession.as_deref())
        }
        Command::RunSample {
            token,
            sample,
            indir,
            outdir,
            reference,
        } => {
            let paths = RunPaths::for_sample(sample, indir, outdir);
            ensure_dir(outdir)?;
            run(&cfg, token, &paths, reference.as_deref())
        }
        Command::Status { token, job } => status(&cfg, token, job),
        Command::Genomes { token } => genomes(&cfg, token),
        Command::Choices { token, out_dir } => write_choices(&cfg, token, out_dir),
    }
}

/// Fails before any network call when a run's input is missing.
pub fn check_run_inputs(cmd: &Command) -> Result<()> {
    match cmd {
        Command::Run { sequence, .. } => validate_input(sequence),
        Command::RunSample {
            sample,
            indir,
            outdir,
            ..
        } => {
            if !indir.is_dir() {
                return Err(anyhow!(
                    "input directory does not exist: {}",
                    indir.display()
                ));
            }
            validate_input(&RunPaths::for_sample(sample, indir, outdir).sequence)
        }
        _ => Ok(()),
    }
}

pub fn fatal_message(err: &anyhow::Error) -> String {
    format!("error: {:#}", err)
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from(DEFAULT_CONFIG);
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command results, so logs go to stderr.
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let file_path = resolve_log_path(cfg);
    let (file_layer, guard) = if let Some(path) = file_path.as_deref() {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from("islandviewer-client.log"))
}

pub fn build_client(cfg: &Config, token: &str) -> Result<JobClient<HttpTransport>> {
    let transport = HttpTransport::new(cfg, token)?;
    let client = JobClient::new(cfg, transport);
    Ok(match cfg.submit.fallback {
        SubmitFallback::Curl => client.with_fallback(Box::new(CurlSubmitter::new(cfg, token))),
        SubmitFallback::None => client,
    })
}

fn validate_input(input: &Path) -> Result<()> {
    if !input.is_file() {
        return Err(anyhow!("could not find file '{}'", input.display()));
    }
    if let Some(ext) = input.extension().and_then(|s| s.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if !matches!(ext.as_str(), "gbk" | "gb" | "gbff" | "genbank") {
            warn!("input does not look like GenBank: {}", input.display());
        }
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let curl = CurlSubmitter::new(cfg, "");
    let curl_status = match curl.version() {
        Ok(v) => serde_json::json!({"ok": true, "version": v}),
        Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "config": cfg,
            "curl_fallback": curl_status,
        }))?
    );
    Ok(())
}

fn run(cfg: &Config, token: &str, paths: &RunPaths, accession: Option<&str>) -> Result<()> {
    let client = build_client(cfg, token)?;
    let pipeline = Pipeline::new(client);
    let report = pipeline.run_job(paths, accession)?;

    if cfg.output.write_report_json {
        let path = report_path(&paths.genbank_out);
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing report: {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    if cfg.output.print_summary {
        print_summary(&report)?;
    }
    Ok(())
}

fn report_path(genbank_out: &Path) -> PathBuf {
    let mut name = genbank_out
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".report.json");
    genbank_out.with_file_name(name)
}

fn print_summary(report: &RunReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn status(cfg: &Config, token: &str, job: &str) -> Result<()> {
    let client = build_client(cfg, token)?;
    let status = client
        .poll_token(job)
        .with_context(|| format!("querying job {job}"))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "job": job,
            "status": status.as_str(),
            "terminal": status.is_terminal(),
        }))?
    );
    Ok(())
}

fn genomes(cfg: &Config, token: &str) -> Result<()> {
    let client = build_client(cfg, token)?;
    let genomes = client.list_genomes().context("listing reference genomes")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for e in choices::entries(&genomes) {
        writeln!(out, "{}\t{}", e.accession, e.name)?;
    }
    Ok(())
}

fn write_choices(cfg: &Config, token: &str, out_dir: &Path) -> Result<()> {
    let client = build_client(cfg, token)?;
    let genomes = client.list_genomes().context("listing reference genomes")?;

    let mut choices_buf = Vec::new();
    let mut properties_buf = Vec::new();
    let stdout = std::io::stdout();
    let mut listing = stdout.lock();
    let count = choices::render(
        &genomes,
        &mut ChoiceSinks {
            choices: &mut choices_buf,
            properties: &mut properties_buf,
            listing: &mut listing,
        },
    )?;

    ensure_dir(out_dir)?;
    let choices_path = out_dir.join(&cfg.choices.choices_filename);
    let properties_path = out_dir.join(&cfg.choices.properties_filename);
    std::fs::write(&choices_path, choices_buf)
        .with_context(|| format!("writing {}", choices_path.display()))?;
    std::fs::write(&properties_path, properties_buf)
        .with_context(|| format!("writing {}", properties_path.display()))?;

    info!(
        "wrote {} reference genomes to {} and {}",
        count,
        choices_path.display(),
        properties_path.display()
    );
    Ok(())
}
