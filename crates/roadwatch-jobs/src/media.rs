//! Loading still frames for captioning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use roadwatch_core::{defaults, Error, ImageFrame, Result};

use crate::worker_client::WorkerApi;

/// Resolves snapshot references to image bytes.
///
/// - `/data/...` is served by the worker (realtime captures) and downloaded.
/// - Anything else is looked up under the data directory, then as given.
#[derive(Clone)]
pub struct FrameLoader {
    data_dir: PathBuf,
    worker: Arc<dyn WorkerApi>,
}

impl FrameLoader {
    pub fn new(data_dir: impl Into<PathBuf>, worker: Arc<dyn WorkerApi>) -> Self {
        Self {
            data_dir: data_dir.into(),
            worker,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Local path a non-worker reference resolves to.
    pub fn resolve_local(&self, reference: &str) -> PathBuf {
        let under_data = self.data_dir.join(reference);
        if under_data.exists() {
            under_data
        } else {
            PathBuf::from(reference)
        }
    }

    /// Load a frame reference as stored on a task or supplied by a caller.
    pub async fn load(&self, reference: &str) -> Result<ImageFrame> {
        if reference.starts_with(defaults::WORKER_DATA_PREFIX) {
            debug!(
                subsystem = "jobs",
                component = "media",
                reference,
                "Fetching snapshot from worker"
            );
            let bytes = self.worker.fetch_file(reference).await?;
            return Ok(ImageFrame::new(bytes));
        }

        self.load_local(reference).await
    }

    /// Read a frame from disk only, e.g. paths the worker wrote into its metadata.
    pub async fn load_local(&self, reference: &str) -> Result<ImageFrame> {
        let path = self.resolve_local(reference);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            Error::NotFound(format!("Snapshot {} ({}): {}", reference, path.display(), e))
        })?;
        Ok(ImageFrame::new(bytes))
    }

    /// Load several frames, keeping order.
    pub async fn load_all<S: AsRef<str>>(&self, references: &[S]) -> Result<Vec<ImageFrame>> {
        let mut frames = Vec::with_capacity(references.len());
        for reference in references {
            frames.push(self.load(reference.as_ref()).await?);
        }
        Ok(frames)
    }
}
