use crate::app::ports::DocumentSource;
use crate::error::{EtlError, Result};
use std::fs;
use tracing::info;

/// Reads the document from a local file; the locator is a filesystem path.
pub struct FileDocumentSource;

impl DocumentSource for FileDocumentSource {
    fn fetch(&self, path: &str) -> Result<String> {
        info!("📄 Reading document from {}", path);
        fs::read_to_string(path)
            .map_err(|e| EtlError::SourceUnavailable(format!("failed to read '{}': {}", path, e)))
    }
}
