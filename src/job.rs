use crate::util::ensure_dir;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Input path meaning "read the job from stdin".
pub const STDIN_SENTINEL: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobLanguage {
    Pcl,
    Ps,
}

impl JobLanguage {
    pub const ALL: [JobLanguage; 2] = [JobLanguage::Pcl, JobLanguage::Ps];

    pub fn name(self) -> &'static str {
        match self {
            JobLanguage::Pcl => "PCL",
            JobLanguage::Ps => "PS",
        }
    }
}

impl fmt::Display for JobLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobLanguage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        JobLanguage::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("unknown job language: {s:?} (expected PCL or PS)"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOptions {
    /// Tesseract language code; presence enables OCR.
    pub language: Option<String>,
    /// Keep vector output and always add an OCR text layer.
    pub text_only: bool,
}

/// Whether the output directory has to exist up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDirPolicy {
    MustExist,
    CreateIfMissing,
}

/// One validated conversion job. Built once by [`ConversionRequest::new`].
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub language: JobLanguage,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub title: Option<String>,
    pub ocr: OcrOptions,
    pub timeout: Option<Duration>,
}

impl ConversionRequest {
    pub fn new(
        language: JobLanguage,
        input: &Path,
        output_dir: &Path,
        policy: OutputDirPolicy,
    ) -> Result<Self> {
        Ok(Self {
            language,
            input: resolve_input(input)?,
            output_dir: resolve_output_dir(output_dir, policy)?,
            title: None,
            ocr: OcrOptions::default(),
            timeout: None,
        })
    }

    /// An empty title counts as no title.
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.is_empty());
        self
    }

    /// An empty OCR language counts as no OCR language.
    pub fn with_ocr(mut self, mut ocr: OcrOptions) -> Self {
        ocr.language = ocr.language.filter(|l| !l.is_empty());
        self.ocr = ocr;
        self
    }

    pub fn with_timeout_secs(mut self, secs: Option<u64>) -> Result<Self> {
        self.timeout = match secs {
            Some(0) => bail!("timeout must be at least 1 second"),
            Some(s) => Some(Duration::from_secs(s)),
            None => None,
        };
        Ok(self)
    }

    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == STDIN_SENTINEL
    }
}

fn resolve_input(input: &Path) -> Result<PathBuf> {
    if input.as_os_str() == STDIN_SENTINEL {
        return Ok(input.to_path_buf());
    }
    let meta = std::fs::metadata(input)
        .with_context(|| format!("input does not exist: {}", input.display()))?;
    if !meta.is_file() {
        bail!("input is not a regular file: {}", input.display());
    }
    input
        .canonicalize()
        .with_context(|| format!("canonicalize input: {}", input.display()))
}

fn resolve_output_dir(dir: &Path, policy: OutputDirPolicy) -> Result<PathBuf> {
    if policy == OutputDirPolicy::CreateIfMissing {
        ensure_dir(dir)?;
    }
    if !dir.is_dir() {
        bail!("output directory does not exist or is not a directory: {}", dir.display());
    }
    dir.canonicalize()
        .with_context(|| format!("canonicalize output dir: {}", dir.display()))
}
