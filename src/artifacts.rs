use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, warn};

/// Failure-time page dumps for offline diagnosis.
///
/// This is a side channel: every operation is best-effort and must never
/// fail or block the scrape that triggered it.
#[derive(Debug, Clone, Default)]
pub struct DebugArtifacts {
    dir: Option<PathBuf>,
}

impl DebugArtifacts {
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn from_config(artifacts_dir: Option<&str>) -> Self {
        match artifacts_dir {
            Some(dir) => Self::new(dir),
            None => Self::disabled(),
        }
    }

    pub fn dump_html(&self, slug: &str, html: &str) {
        self.write(slug, "html", html.as_bytes());
    }

    pub fn dump_screenshot(&self, slug: &str, png: &[u8]) {
        self.write(slug, "png", png);
    }

    fn write(&self, slug: &str, extension: &str, bytes: &[u8]) {
        let Some(dir) = &self.dir else {
            return;
        };

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!(
            "{}_{}_{}.{}",
            slug,
            timestamp,
            uuid::Uuid::new_v4().simple(),
            extension
        );
        let path = dir.join(filename);

        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Failed to create artifact directory {:?}: {}", dir, e);
            return;
        }
        match std::fs::write(&path, bytes) {
            Ok(()) => debug!("Wrote debug artifact {:?}", path),
            Err(e) => warn!("Failed to write debug artifact {:?}: {}", path, e),
        }
    }
}
