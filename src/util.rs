use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use time::UtcOffset;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

/// Directory holding the running executable, with symlinks resolved.
pub fn install_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().with_context(|| "current_exe")?;
    let exe = exe
        .canonicalize()
        .with_context(|| format!("canonicalize {}", exe.display()))?;
    exe.parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("executable has no parent dir: {}", exe.display()))
}

/// Must be called before any threads are spawned; the `time` crate refuses to
/// read the local offset from a multi-threaded process on some platforms.
pub fn local_offset() -> Option<UtcOffset> {
    UtcOffset::current_local_offset().ok()
}
