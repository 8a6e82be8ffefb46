//! File-aware operations over the record store and the media directory.
//!
//! The store only knows about rows; [`SimulationRepository`] keeps the
//! uploaded bytes in step with them. Rows are the source of truth: a blob is
//! written before its row and removed again if the row cannot be inserted,
//! and blobs of deleted rows are removed after the delete commits.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::{
    RuntimeStatRecord, RuntimeStatStore, SimStore, SpiceFileRecord, SpiceFileStore, TaskRecord,
    TaskStore,
};
use crate::error::StoreError;
use crate::media::MediaStorage;

/// Store plus media directory, shared across callers.
#[derive(Debug, Clone)]
pub struct SimulationRepository {
    store: SimStore,
    media: MediaStorage,
}

impl SimulationRepository {
    pub fn new(store: SimStore, media: MediaStorage) -> Self {
        Self { store, media }
    }

    /// Connect to the configured database and media root.
    pub async fn open(cfg: &Config) -> Result<Self, StoreError> {
        let store = SimStore::connect(&cfg.database_url, cfg.max_connections).await?;
        tokio::fs::create_dir_all(&cfg.media_root).await?;
        info!(media_root = %cfg.media_root.display(), "media storage ready");
        Ok(Self::new(store, MediaStorage::new(&cfg.media_root)))
    }

    pub fn store(&self) -> &SimStore {
        &self.store
    }

    pub fn media(&self) -> &MediaStorage {
        &self.media
    }

    /// Register a newly submitted simulation.
    pub async fn create_task(&self) -> Result<TaskRecord, StoreError> {
        self.store.insert_task(TaskRecord::new()).await
    }

    /// Store an uploaded file and attach it to `task_id`.
    pub async fn attach_file(
        &self,
        task_id: Uuid,
        name: &str,
        bytes: &[u8],
    ) -> Result<SpiceFileRecord, StoreError> {
        let stored = self.media.save(name, bytes).await?;
        match self.store.insert_file(SpiceFileRecord::new(task_id, stored.clone())).await {
            Ok(record) => Ok(record),
            Err(e) => {
                if let Err(cleanup) = self.media.delete(&stored).await {
                    warn!(file = %stored, error = %cleanup, "failed to remove orphaned upload");
                }
                Err(e)
            }
        }
    }

    /// Contents of an attached file.
    pub async fn read_file(&self, file_id: Uuid) -> Result<Vec<u8>, StoreError> {
        let record = self
            .store
            .get_file(file_id)
            .await?
            .ok_or_else(|| StoreError::not_found("spice file", file_id))?;
        self.media.read(&record.file).await
    }

    pub async fn delete_file(&self, file_id: Uuid) -> Result<SpiceFileRecord, StoreError> {
        let record = self.store.delete_file(file_id).await?;
        self.remove_blobs(std::slice::from_ref(&record)).await;
        Ok(record)
    }

    /// Delete a task, its file records and their stored bytes.
    pub async fn delete_task(&self, task_id: Uuid) -> Result<Vec<SpiceFileRecord>, StoreError> {
        let files = self.store.delete_task(task_id).await?;
        self.remove_blobs(&files).await;
        Ok(files)
    }

    /// Delete every task last written before `cutoff`; returns how many files went with them.
    pub async fn purge_tasks_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let files = self.store.purge_tasks_before(cutoff).await?;
        self.remove_blobs(&files).await;
        Ok(files.len())
    }

    /// Count one finished simulation in its execution-time bucket.
    pub async fn record_runtime(&self, elapsed: Duration) -> Result<RuntimeStatRecord, StoreError> {
        let bucket = RuntimeStatRecord::bucket_for(elapsed);
        self.store.increment_runtime_stat(bucket, 1).await
    }

    /// The full execution-time histogram, ascending by bucket.
    pub async fn runtime_histogram(&self) -> Result<Vec<RuntimeStatRecord>, StoreError> {
        self.store.list_runtime_stats().await
    }

    // Rows are already gone; a blob that cannot be removed is only logged.
    async fn remove_blobs(&self, files: &[SpiceFileRecord]) {
        for file in files {
            if let Err(e) = self.media.delete(&file.file).await {
                warn!(file_id = %file.file_id, file = %file.file, error = %e, "failed to remove stored file");
            }
        }
    }
}
