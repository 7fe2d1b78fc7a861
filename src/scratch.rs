use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const PREFIX: &str = ".pdl2pdf-";

/// Private temp directory for one converter run, placed in the output
/// directory so it lives on the same volume. Removed by [`ScratchDir::release`],
/// or on drop if a run is abandoned early.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn create_in(output_dir: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(output_dir)
            .with_context(|| format!("creating scratch dir in {}", output_dir.display()))?;
        debug!("scratch dir {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A failed removal is only logged. It becomes an error when we can no
    /// longer tell whether the directory is still there.
    pub fn release(self) -> Result<()> {
        let path: PathBuf = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!("removed scratch dir {}", path.display());
                Ok(())
            }
            Err(e) => {
                warn!("failed to remove scratch dir {}: {e}", path.display());
                let exists = path
                    .try_exists()
                    .with_context(|| format!("checking scratch dir {}", path.display()))?;
                if exists {
                    warn!("scratch dir left behind: {}", path.display());
                }
                Ok(())
            }
        }
    }
}

pub fn is_scratch_name(name: &str) -> bool {
    name.starts_with(PREFIX)
}
