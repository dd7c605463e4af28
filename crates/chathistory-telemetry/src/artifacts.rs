//! Per-request debug files.
//!
//! Artifacts describe the last request only: every session overwrites them.
//! Failing to write one is logged and otherwise ignored.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use tracing::warn;

pub const PROCESSED_CONFIG: &str = "_processed_config.yaml";
pub const PROCESSED_CHATHISTORY: &str = "_processed_chathistory.txt";
pub const REQUEST: &str = "_request.json";
pub const RESPONSE: &str = "_response.txt";
pub const THINKING: &str = "_thinking.txt";

/// Writes artifacts into a directory, or nowhere when disabled.
#[derive(Clone, Debug, Default)]
pub struct ArtifactLog {
    dir: Option<PathBuf>,
}

impl ArtifactLog {
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Replace artifact `name` with `contents`.
    pub fn write(&self, name: &str, contents: &str) {
        let Some(path) = self.prepare(name) else {
            return;
        };
        if let Err(e) = std::fs::write(&path, contents) {
            warn!(path = %path.display(), error = %e, "failed to write debug artifact");
        }
    }

    /// Truncate artifact `name` and return a handle that appends to it.
    pub fn stream(&self, name: &str) -> ArtifactStream {
        let file = self.prepare(name).and_then(|path| match File::create(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to create debug artifact");
                None
            }
        });
        ArtifactStream { file }
    }

    fn prepare(&self, name: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "failed to create debug directory");
            return None;
        }
        Some(dir.join(name))
    }
}

/// Append-only handle to one artifact. Silently inert when disabled.
#[derive(Debug)]
pub struct ArtifactStream {
    file: Option<File>,
}

impl ArtifactStream {
    pub fn append(&mut self, text: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = file.write_all(text.as_bytes()) {
            warn!(error = %e, "failed to append to debug artifact; disabling it");
            self.file = None;
        }
    }
}
