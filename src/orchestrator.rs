use crate::{
    engine::{process, EngineInvocation, EngineLayout, ProcessExit},
    job::ConversionRequest,
    naming::OutputTarget,
    scratch::ScratchDir,
};
use anyhow::{Context, Result};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use time::UtcOffset;
use tracing::{debug, info, warn};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_OUTPUT_MISSING: u8 = 1;
pub const EXIT_TIMED_OUT: u8 = 2;
pub const EXIT_ENGINE_FAILED: u8 = 3;
pub const EXIT_FATAL: u8 = 4;
pub const EXIT_USAGE: u8 = 5;

const DETAIL_TAIL_LINES: usize = 20;

/// How a conversion ended, once the converter has exited or been killed.
/// Setup and resource failures are `Err` from [`Orchestrator::convert`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Succeeded(PathBuf),
    TimedOut { after: Duration },
    /// `code` is `None` when the converter was killed by a signal.
    ProcessFailed { code: Option<i32>, detail: String },
    /// The converter exited 0 but never wrote this file.
    OutputMissing(PathBuf),
}

impl ConversionOutcome {
    pub fn exit_status(&self) -> u8 {
        match self {
            ConversionOutcome::Succeeded(_) => EXIT_SUCCESS,
            ConversionOutcome::OutputMissing(_) => EXIT_OUTPUT_MISSING,
            ConversionOutcome::TimedOut { .. } => EXIT_TIMED_OUT,
            ConversionOutcome::ProcessFailed { .. } => EXIT_ENGINE_FAILED,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Succeeded(_))
    }
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionOutcome::Succeeded(path) => {
                write!(f, "Successfully produced {}", path.display())
            }
            ConversionOutcome::TimedOut { after } => {
                write!(f, "Timed out after {}s; conversion abandoned", after.as_secs())
            }
            ConversionOutcome::ProcessFailed { code, detail } => {
                match code {
                    Some(code) => write!(f, "Converter failed with exit code {code}")?,
                    None => write!(f, "Converter was terminated by a signal")?,
                }
                if detail.is_empty() {
                    Ok(())
                } else {
                    write!(f, ": {detail}")
                }
            }
            ConversionOutcome::OutputMissing(path) => write!(
                f,
                "No output produced: converter exited successfully but {} does not exist",
                path.display()
            ),
        }
    }
}

/// Runs one conversion per [`Orchestrator::convert`] call. Never retries.
pub struct Orchestrator {
    layout: EngineLayout,
    offset: UtcOffset,
}

impl Orchestrator {
    pub fn new(layout: EngineLayout, offset: UtcOffset) -> Self {
        Self { layout, offset }
    }

    pub fn convert(&self, req: &ConversionRequest) -> Result<ConversionOutcome> {
        // Preparing
        let target = OutputTarget::now(&req.output_dir, req.title.as_deref(), self.offset)?;
        info!(
            "Converting from {} file {} to {}",
            req.language,
            req.input.display(),
            target.path().display()
        );
        let scratch = ScratchDir::create_in(&req.output_dir)?;
        let inv = EngineInvocation::build(&self.layout, req, &target, scratch.path());
        debug!(?inv, "converter invocation");

        // Running
        let started = Instant::now();
        let exit = process::run(&inv, req.timeout);
        let released = scratch.release();
        debug!("converter finished in {:?}", started.elapsed());

        finish(exit, released, target)
    }
}

/// Partial output from a timed-out run is removed even when the scratch
/// release failed; the release error is reported after that.
fn finish(
    exit: Result<ProcessExit>,
    released: Result<()>,
    target: OutputTarget,
) -> Result<ConversionOutcome> {
    let outcome = classify(exit?, target)?;
    released?;
    Ok(outcome)
}

fn classify(exit: ProcessExit, target: OutputTarget) -> Result<ConversionOutcome> {
    match exit {
        ProcessExit::TimedOut { after, stderr } => {
            log_stream("stderr", &stderr);
            remove_partial_output(target.path())?;
            Ok(ConversionOutcome::TimedOut { after })
        }
        ProcessExit::Exited {
            status,
            stdout,
            stderr,
        } => {
            log_stream("stdout", &stdout);
            log_stream("stderr", &stderr);
            if !status.success() {
                warn!("converter exited with {status}");
                return Ok(ConversionOutcome::ProcessFailed {
                    code: status.code(),
                    detail: failure_detail(&stderr, &stdout),
                });
            }
            if target.path().is_file() {
                Ok(ConversionOutcome::Succeeded(target.into_path()))
            } else {
                warn!("converter exited 0 without writing {}", target.path().display());
                Ok(ConversionOutcome::OutputMissing(target.into_path()))
            }
        }
    }
}

/// A missing file is fine; anything else that stops the delete is fatal.
fn remove_partial_output(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("removed partial output {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing partial output {}", path.display())),
    }
}

fn log_stream(name: &str, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    debug!("converter {name}: {}", String::from_utf8_lossy(bytes).trim());
}

// Ghostscript reports most errors on stdout.
fn failure_detail(stderr: &[u8], stdout: &[u8]) -> String {
    let tail = output_tail(stderr);
    if tail.is_empty() {
        output_tail(stdout)
    } else {
        tail
    }
}

fn output_tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(DETAIL_TAIL_LINES);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use time::macros::datetime;

    fn partial_target(dir: &Path) -> OutputTarget {
        let target = OutputTarget::new(dir, None, datetime!(2024-02-03 04:05:06.007 UTC)).unwrap();
        std::fs::write(target.path(), b"%PDF-1.7\n").unwrap();
        target
    }

    #[test]
    fn timed_out_output_removed_even_if_scratch_release_failed() {
        let dir = tempfile::tempdir().unwrap();
        let target = partial_target(dir.path());
        let path = target.path().to_path_buf();

        let exit = ProcessExit::TimedOut {
            after: Duration::from_secs(1),
            stderr: Vec::new(),
        };
        let err = finish(Ok(exit), Err(anyhow!("checking scratch dir")), target).unwrap_err();

        assert!(err.to_string().contains("checking scratch dir"));
        assert!(!path.exists());
    }

    #[test]
    fn spawn_error_wins_over_release_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = partial_target(dir.path());
        let err = finish(
            Err(anyhow!("spawning converter")),
            Err(anyhow!("checking scratch dir")),
            target,
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawning converter"));
    }

    #[test]
    fn failure_detail_keeps_last_lines_on_one_line() {
        let stderr: String = (1..=30).map(|i| format!("line {i}\n\n")).collect();
        let detail = failure_detail(stderr.as_bytes(), b"ignored");
        assert!(detail.starts_with("line 11 | "));
        assert!(detail.ends_with("line 30"));
        assert!(!detail.contains('\n'));
    }
}
