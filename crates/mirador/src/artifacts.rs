//! Failure artifacts: screenshots and HTML dumps.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::result::MiradorResult;

/// A directory failure artifacts are written into.
///
/// Creation is idempotent; file names are timestamped so repeated
/// failures of one test never overwrite each other.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    /// Open (creating if needed) the artifact directory at `root`
    pub fn new(root: impl Into<PathBuf>) -> MiradorResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn target(&self, name: &str, extension: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
        self.root.join(format!("{name}-{stamp}.{extension}"))
    }

    /// Persist a screenshot, returning the written path
    pub fn screenshot(&self, name: &str, png: &[u8]) -> MiradorResult<PathBuf> {
        let path = self.target(name, "png");
        fs::write(&path, png)?;
        tracing::info!(path = %path.display(), "screenshot saved");
        Ok(path)
    }

    /// Persist a page's HTML, returning the written path
    pub fn html_dump(&self, name: &str, html: &str) -> MiradorResult<PathBuf> {
        let path = self.target(name, "html");
        fs::write(&path, html)?;
        tracing::info!(path = %path.display(), "html dump saved");
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("artifacts");
        let _ = ArtifactDir::new(&nested).unwrap();
        let again = ArtifactDir::new(&nested).unwrap();
        assert!(again.path().is_dir());
    }

    #[test]
    fn test_screenshot_written_with_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path()).unwrap();
        let path = artifacts.screenshot("nav-failed", b"\x89PNG").unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("nav-failed-"));
        assert_eq!(fs::read(&path).unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_html_dump_written() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::new(dir.path()).unwrap();
        let path = artifacts.html_dump("error-page", "<html></html>").unwrap();
        assert!(path.extension().unwrap() == "html");
    }
}
