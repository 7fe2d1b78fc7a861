use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engines: Engines,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing TOML: {}", path.display()))?;
        Ok(cfg)
    }
}

/// Where the bundled converters live. Relative paths are resolved against the
/// directory holding the `pdl2pdf` executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engines {
    pub pcl: String,
    pub ps: String,
    pub ocr_data: String,
    pub paper_size: String,
    pub fixed_media: bool,
    pub env: BTreeMap<String, String>,
}
impl Default for Engines {
    fn default() -> Self {
        Self {
            pcl: default_pcl_exe().into(),
            ps: default_ps_exe().into(),
            ocr_data: "tessdata".into(),
            paper_size: "a4".into(),
            fixed_media: true,
            env: Default::default(),
        }
    }
}

#[cfg(windows)]
fn default_pcl_exe() -> &'static str {
    "gpcl/gpcl6win64.exe"
}
#[cfg(not(windows))]
fn default_pcl_exe() -> &'static str {
    "gpcl/gpcl6"
}

#[cfg(windows)]
fn default_ps_exe() -> &'static str {
    "gs/bin/gswin64c.exe"
}
#[cfg(not(windows))]
fn default_ps_exe() -> &'static str {
    "gs/bin/gs"
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// 0 disables the limit.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            file_path: "".into(),
        }
    }
}
