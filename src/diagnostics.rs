use std::fs;
use std::path::{Path, PathBuf};

/// Mirrors the message of the placeholder currently on screen into a file,
/// so it can be read after the fact. Write failures are logged and dropped.
pub struct DiagnosticsSink {
    path: Option<PathBuf>,
}

impl DiagnosticsSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// A sink that records nothing
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// `~/Library/Logs/CameraOverlay.last.txt` on macOS, the user cache
    /// directory elsewhere
    pub fn default_path() -> Option<PathBuf> {
        if cfg!(target_os = "macos") {
            dirs::home_dir().map(|home| home.join("Library").join("Logs").join("CameraOverlay.last.txt"))
        } else {
            dirs::cache_dir().map(|cache| cache.join("camera-overlay").join("last-error.txt"))
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = Self::write(path, message) {
            tracing::warn!("Failed to write diagnostics to {}: {}", path.display(), err);
        }
    }

    fn write(path: &Path, message: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrites_previous_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("last.txt");
        let sink = DiagnosticsSink::new(path.clone());

        sink.record("first failure");
        sink.record("camera unavailable");

        assert_eq!(fs::read_to_string(&path).unwrap(), "camera unavailable");
    }

    #[test]
    fn unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let sink = DiagnosticsSink::new(blocker.join("nested").join("last.txt"));
        sink.record("message");

        assert!(!blocker.join("nested").exists());
    }

    #[test]
    fn disabled_sink_has_no_path() {
        let sink = DiagnosticsSink::disabled();
        sink.record("ignored");
        assert!(sink.path().is_none());
    }
}
