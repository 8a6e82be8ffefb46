use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row in the `task` table: one submitted simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    /// Time of the last write. Assigned by the store on every insert/save.
    pub task_time: DateTime<Utc>,
}

impl TaskRecord {
    /// A fresh task with a newly generated identifier.
    pub fn new() -> Self {
        Self {
            task_id: Uuid::new_v4(),
            task_time: Utc::now(),
        }
    }
}

impl Default for TaskRecord {
    fn default() -> Self {
        Self::new()
    }
}
