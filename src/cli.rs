use crate::{
    config::Config,
    engine::{self, EngineLayout},
    job::{ConversionRequest, JobLanguage, OcrOptions, OutputDirPolicy},
    orchestrator::{Orchestrator, EXIT_FATAL},
    util::{ensure_dir, install_dir},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use time::UtcOffset;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const CONFIG_FILE_NAME: &str = "pdl2pdf.toml";

#[derive(Parser, Debug)]
#[command(name = "pdl2pdf", version)]
#[command(about = "Convert a PCL or PostScript print job to PDF using GhostPCL/Ghostscript")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses pdl2pdf.toml beside the executable if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Make a PDF file in OUTPUT_DIR out of print job file INPUT.
    Convert {
        /// Print job language: PCL or PS (case-insensitive).
        #[arg(long)]
        job_language: JobLanguage,
        /// Optional text to append to the output file name.
        #[arg(long)]
        title: Option<String>,
        /// Optional time limit (in seconds) for the conversion to run.
        #[arg(long, value_name = "S", value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,
        /// OCR language code (e.g. eng); enables OCR.
        #[arg(long)]
        ocr_language: Option<String>,
        /// Keep vector output and always add an OCR text layer.
        #[arg(long)]
        ocr_text_only: bool,
        /// Create OUTPUT_DIR if it does not exist.
        #[arg(long)]
        create_output_dir: bool,
        /// Print job file, or - for stdin.
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,
    },
    /// Check that both converters can be started.
    SelfTest {},
}

/// `offset` must be resolved before any thread (including the log writer) starts.
pub fn dispatch(args: Args, offset: Option<UtcOffset>) -> Result<ExitCode> {
    let install_dir = install_dir()?;
    let cfg = match resolve_config_path(args.config.as_deref(), &install_dir) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;
    let offset = offset.unwrap_or_else(|| {
        warn!("local UTC offset unavailable; output names use UTC");
        UtcOffset::UTC
    });
    let layout = EngineLayout::new(install_dir, cfg.engines.clone());

    let result = run(args.cmd, &cfg, layout, offset);
    if let Err(err) = &result {
        error!("{:#}", err);
    }
    result
}

fn run(cmd: Command, cfg: &Config, layout: EngineLayout, offset: UtcOffset) -> Result<ExitCode> {
    match cmd {
        Command::Convert {
            job_language,
            title,
            timeout,
            ocr_language,
            ocr_text_only,
            create_output_dir,
            input,
            output_dir,
        } => {
            let policy = if create_output_dir {
                OutputDirPolicy::CreateIfMissing
            } else {
                OutputDirPolicy::MustExist
            };
            let timeout = timeout.or(match cfg.limits.timeout_seconds {
                0 => None,
                s => Some(s),
            });
            let req = ConversionRequest::new(job_language, &input, &output_dir, policy)?
                .with_title(title)
                .with_ocr(OcrOptions {
                    language: ocr_language,
                    text_only: ocr_text_only,
                })
                .with_timeout_secs(timeout)?;
            convert(layout, offset, &req)
        }
        Command::SelfTest {} => self_test(&layout),
    }
}

fn convert(layout: EngineLayout, offset: UtcOffset, req: &ConversionRequest) -> Result<ExitCode> {
    let orchestrator = Orchestrator::new(layout, offset);
    let outcome = orchestrator.convert(req)?;
    info!("outcome: {outcome:?}");
    println!("{outcome}");
    Ok(outcome.exit_code())
}

fn self_test(layout: &EngineLayout) -> Result<ExitCode> {
    println!("self-test started");
    let results = engine::self_test(layout);
    println!("{}", serde_json::to_string_pretty(&results)?);
    if results.iter().all(|r| r.ok) {
        println!("self-test OK");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("self-test FAILED");
        Ok(ExitCode::from(EXIT_FATAL))
    }
}

fn resolve_config_path(user: Option<&Path>, install_dir: &Path) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = install_dir.join(CONFIG_FILE_NAME);
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the status line; logs go to stderr.
    let stderr_layer = if cfg.logging.json {
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

    let (file_layer, guard) = if cfg.logging.file_path.is_empty() {
        (None, None)
    } else {
        let path = Path::new(&cfg.logging.file_path);
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}
