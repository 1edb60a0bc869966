//! Delivery channels backed by the local filesystem and standard output.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tanapaste_core::{DeliveryFailure, FallbackChannel, PrimaryChannel};
use tempfile::NamedTempFile;

/// Writes the outline to a target file.
///
/// As a primary channel the file is written in place. As a fallback the text
/// goes to a temporary file next to the target, which is then renamed over it.
#[derive(Debug, Clone)]
pub struct FileDelivery {
    target: PathBuf,
}

impl FileDelivery {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self { target: target.into() }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    fn directory(&self) -> &Path {
        match self.target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl PrimaryChannel for FileDelivery {
    fn is_available(&self) -> bool {
        self.directory().is_dir()
    }

    async fn write(&self, text: &str) -> Result<(), DeliveryFailure> {
        fs::write(&self.target, text).map_err(DeliveryFailure::from)
    }
}

impl FallbackChannel for FileDelivery {
    /// `None` once the staged file has been persisted.
    type Artifact = Option<NamedTempFile>;

    fn is_available(&self) -> bool {
        self.directory().is_dir()
    }

    fn stage(&self) -> Result<Self::Artifact, DeliveryFailure> {
        let file = NamedTempFile::new_in(self.directory()).map_err(DeliveryFailure::from)?;
        tracing::debug!(path = %file.path().display(), "staged fallback file");
        Ok(Some(file))
    }

    fn write_fallback(&self, artifact: &mut Self::Artifact, text: &str) -> bool {
        let Some(mut file) = artifact.take() else {
            return false;
        };

        if let Err(err) = file.write_all(text.as_bytes()).and_then(|()| file.flush()) {
            tracing::warn!(error = %err, "failed to write fallback file");
            *artifact = Some(file);
            return false;
        }

        match file.persist(&self.target) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err.error, "failed to persist fallback file");
                *artifact = Some(err.file);
                false
            }
        }
    }

    fn remove(&self, artifact: Self::Artifact) {
        if let Some(file) = artifact
            && let Err(err) = file.close()
        {
            tracing::warn!(error = %err, "failed to remove fallback file");
        }
    }
}

/// Prints the outline on standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutDelivery;

impl PrimaryChannel for StdoutDelivery {
    fn is_available(&self) -> bool {
        true
    }

    async fn write(&self, text: &str) -> Result<(), DeliveryFailure> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{text}").and_then(|()| stdout.flush())?;
        Ok(())
    }
}
