pub mod invocation;
pub mod process;

use crate::{config::Engines, job::JobLanguage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

pub use invocation::EngineInvocation;
pub use process::ProcessExit;

/// Bundled converters, located relative to the install directory.
#[derive(Debug, Clone)]
pub struct EngineLayout {
    pub install_dir: PathBuf,
    pub engines: Engines,
}

impl EngineLayout {
    pub fn new(install_dir: impl Into<PathBuf>, engines: Engines) -> Self {
        Self {
            install_dir: install_dir.into(),
            engines,
        }
    }

    /// No existence check; a missing binary shows up when it is spawned.
    pub fn locate(&self, language: JobLanguage) -> PathBuf {
        let rel = match language {
            JobLanguage::Pcl => &self.engines.pcl,
            JobLanguage::Ps => &self.engines.ps,
        };
        self.resolve(rel)
    }

    pub fn ocr_data_dir(&self) -> PathBuf {
        self.resolve(&self.engines.ocr_data)
    }

    // Path::join keeps absolute configured paths as they are.
    fn resolve(&self, configured: &str) -> PathBuf {
        self.install_dir.join(Path::new(configured))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfTestResult {
    pub language: JobLanguage,
    pub program: PathBuf,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run each converter once with a harmless command line and report whether it
/// started and exited cleanly.
pub fn self_test(layout: &EngineLayout) -> Vec<SelfTestResult> {
    JobLanguage::ALL
        .into_iter()
        .map(|language| {
            let program = layout.locate(language);
            let args: &[&str] = match language {
                JobLanguage::Pcl => &[],
                JobLanguage::Ps => &["-h"],
            };
            debug!("self-test {language}: {} {:?}", program.display(), args);
            let error = match Command::new(&program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                Ok(status) if status.success() => None,
                Ok(status) => Some(format!("exited with {status}")),
                Err(e) => Some(format!("failed to start: {e}")),
            };
            if let Some(err) = &error {
                warn!("self-test {language} failed: {err}");
            }
            SelfTestResult {
                language,
                program,
                ok: error.is_none(),
                error,
            }
        })
        .collect()
}
