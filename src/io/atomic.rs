use std::{fs::File, io::Write, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Write-then-rename wrapper: the target is replaced only when `finalize` succeeds,
/// so a failed or interrupted write leaves the previous file in place.
pub(crate) struct PendingWrite {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl PendingWrite {
    /// Open a temporary file next to `target`.
    pub(crate) fn open(target: &Path) -> Result<Self> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("[io::atomic] create dir {}", parent.display()))?;
        let tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("[io::atomic] create temp file in {}", parent.display()))?;

        Ok(Self { target: target.to_path_buf(), tmp })
    }

    /// Flush, fsync and atomically move the temporary file over the target.
    pub(crate) fn finalize(mut self) -> Result<()> {
        self.tmp.flush().context("[io::atomic] flush temp file")?;
        self.tmp.as_file().sync_all().ok(); // best-effort fsync file
        self.tmp.persist(&self.target)
            .with_context(|| format!("[io::atomic] rename to {}", self.target.display()))?;
        if let Some(dir) = self.target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            let _ = File::open(dir).and_then(|f| f.sync_all());
        }
        Ok(())
    }
}

impl Write for PendingWrite {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.tmp.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.tmp.flush()
    }
}

/// Replace `target` with `bytes` atomically.
pub(crate) fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let mut sink = PendingWrite::open(target)?;
    sink.write_all(bytes)
        .with_context(|| format!("[io::atomic] write {}", target.display()))?;
    sink.finalize()
}
