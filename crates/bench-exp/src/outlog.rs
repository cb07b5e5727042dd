use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::plan::LogMode;

/// Keeps the captured text of individual attempts on disk for diagnosis.
///
/// Logging never fails a sweep: write errors are reported as warnings.
#[derive(Debug, Clone)]
pub struct OutputLog {
    mode: LogMode,
    dir: PathBuf,
}

impl OutputLog {
    /// Logs go to `<root>/<run_id>/`.
    pub fn new(mode: LogMode, root: &Path, run_id: &str) -> Self {
        Self {
            mode,
            dir: root.join(run_id),
        }
    }

    fn wants(&self, failed: bool) -> bool {
        match self.mode {
            LogMode::None => false,
            LogMode::Fail => failed,
            LogMode::All => true,
        }
    }

    /// Writes `<stem>_rep<index>.log` when the mode asks for it and returns
    /// the path written.
    pub fn record(&self, stem: &str, index: u32, failed: bool, text: &str) -> Option<PathBuf> {
        if !self.wants(failed) {
            return None;
        }
        let path = self.dir.join(format!("{stem}_rep{index}.log"));
        let written = fs::create_dir_all(&self.dir).and_then(|_| fs::write(&path, text));
        match written {
            Ok(()) => Some(path),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to write run log");
                None
            }
        }
    }
}
