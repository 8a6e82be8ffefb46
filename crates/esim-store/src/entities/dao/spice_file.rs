use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row in the `spicefile` table: one uploaded input file of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiceFileRecord {
    pub file_id: Uuid,
    /// Path of the stored bytes, relative to the media root.
    pub file: String,
    /// Time of the last write. Assigned by the store on every insert/save.
    pub upload_time: DateTime<Utc>,
    /// Owning task. Deleting the task deletes this record.
    pub task_id: Uuid,
}

impl SpiceFileRecord {
    /// A fresh file record for `task_id` pointing at the stored name `file`.
    pub fn new(task_id: Uuid, file: impl Into<String>) -> Self {
        Self {
            file_id: Uuid::new_v4(),
            file: file.into(),
            upload_time: Utc::now(),
            task_id,
        }
    }
}
