use crate::entities::{SimStore, decode_time, decode_uuid, encode_time, now};
use crate::entities::dao::{SpiceFileRecord, TaskRecord};
use crate::entities::spice_file::{FILE_COLUMNS, FileRow, file_from_row};
use crate::error::StoreError;

use chrono::{DateTime, Utc};
use std::future::Future;
use tracing::{debug, info};
use uuid::Uuid;

pub trait TaskStore: Send + Sync + 'static {
    /// Persist a new task. `task_time` is overwritten with the write time.
    fn insert_task(
        &self,
        record: TaskRecord,
    ) -> impl Future<Output = Result<TaskRecord, StoreError>> + Send;
    /// Refresh `task_time` of an existing task.
    fn save_task(
        &self,
        task_id: Uuid,
    ) -> impl Future<Output = Result<TaskRecord, StoreError>> + Send;
    fn get_task(
        &self,
        task_id: Uuid,
    ) -> impl Future<Output = Result<Option<TaskRecord>, StoreError>> + Send;
    /// All tasks, most recently written first.
    fn list_tasks(&self) -> impl Future<Output = Result<Vec<TaskRecord>, StoreError>> + Send;
    /// Delete a task together with its files; returns the removed files.
    fn delete_task(
        &self,
        task_id: Uuid,
    ) -> impl Future<Output = Result<Vec<SpiceFileRecord>, StoreError>> + Send;
    /// Delete every task last written before `cutoff`, cascading to files.
    fn purge_tasks_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<SpiceFileRecord>, StoreError>> + Send;
}

type TaskRow = (String, String);

fn task_from_row((task_id, task_time): TaskRow) -> Result<TaskRecord, StoreError> {
    Ok(TaskRecord {
        task_id: decode_uuid("task_id", task_id)?,
        task_time: decode_time("task_time", task_time)?,
    })
}

impl TaskStore for SimStore {
    async fn insert_task(&self, mut record: TaskRecord) -> Result<TaskRecord, StoreError> {
        record.task_time = now();
        sqlx::query("INSERT INTO task (task_id, task_time) VALUES (?1, ?2)")
            .bind(record.task_id.to_string())
            .bind(encode_time(&record.task_time))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_insert(e, "task", record.task_id, None))?;
        debug!(task_id = %record.task_id, "task inserted");
        Ok(record)
    }

    async fn save_task(&self, task_id: Uuid) -> Result<TaskRecord, StoreError> {
        let task_time = now();
        let result = sqlx::query("UPDATE task SET task_time = ?1 WHERE task_id = ?2")
            .bind(encode_time(&task_time))
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("task", task_id));
        }
        Ok(TaskRecord { task_id, task_time })
    }

    async fn get_task(&self, task_id: Uuid) -> Result<Option<TaskRecord>, StoreError> {
        let row: Option<TaskRow> =
            sqlx::query_as("SELECT task_id, task_time FROM task WHERE task_id = ?1")
                .bind(task_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(task_from_row).transpose()
    }

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT task_id, task_time FROM task ORDER BY task_time DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(task_from_row).collect()
    }

    async fn delete_task(&self, task_id: Uuid) -> Result<Vec<SpiceFileRecord>, StoreError> {
        let id = task_id.to_string();
        // Every statement in these transactions writes, so the write lock is
        // held from the first one and no snapshot is read before it.
        let mut tx = self.pool.begin().await?;

        let rows: Vec<FileRow> = sqlx::query_as(&format!(
            "DELETE FROM spicefile WHERE task_id = ?1 RETURNING {FILE_COLUMNS}"
        ))
        .bind(&id)
        .fetch_all(&mut *tx)
        .await?;
        let files = rows.into_iter().map(file_from_row).collect::<Result<Vec<_>, _>>()?;

        let result = sqlx::query("DELETE FROM task WHERE task_id = ?1")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            // Dropping `tx` rolls back.
            return Err(StoreError::not_found("task", task_id));
        }

        tx.commit().await?;
        debug!(task_id = %task_id, files = files.len(), "task deleted");
        Ok(files)
    }

    async fn purge_tasks_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<SpiceFileRecord>, StoreError> {
        let cutoff_str = encode_time(&cutoff);
        let mut tx = self.pool.begin().await?;

        let rows: Vec<FileRow> = sqlx::query_as(&format!(
            "DELETE FROM spicefile \
             WHERE task_id IN (SELECT task_id FROM task WHERE task_time < ?1) \
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(&cutoff_str)
        .fetch_all(&mut *tx)
        .await?;
        let files = rows.into_iter().map(file_from_row).collect::<Result<Vec<_>, _>>()?;

        let result = sqlx::query("DELETE FROM task WHERE task_time < ?1")
            .bind(&cutoff_str)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(
            cutoff = %cutoff_str,
            tasks = result.rows_affected(),
            files = files.len(),
            "purged expired tasks"
        );
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{SpiceFileStore, memory_store};
    use chrono::SubsecRound;
    use std::collections::HashSet;

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = memory_store().await;
        let before = Utc::now().trunc_subsecs(6);

        let task = store.insert_task(TaskRecord::new()).await.unwrap();
        let loaded = store.get_task(task.task_id).await.unwrap().expect("task exists");

        assert_eq!(loaded.task_id, task.task_id);
        assert_eq!(loaded.task_time, task.task_time);
        assert!(loaded.task_time >= before);
    }

    #[tokio::test]
    async fn generated_ids_are_unique() {
        let store = memory_store().await;
        for _ in 0..50 {
            store.insert_task(TaskRecord::new()).await.unwrap();
        }
        let ids: HashSet<_> = store
            .list_tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.task_id)
            .collect();
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let store = memory_store().await;
        let task = store.insert_task(TaskRecord::new()).await.unwrap();
        let err = store.insert_task(task.clone()).await.unwrap_err();
        assert!(err.is_conflict(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn save_refreshes_task_time() {
        let store = memory_store().await;
        let task = store.insert_task(TaskRecord::new()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let saved = store.save_task(task.task_id).await.unwrap();
        assert!(saved.task_time > task.task_time);
        let loaded = store.get_task(task.task_id).await.unwrap().unwrap();
        assert_eq!(loaded.task_time, saved.task_time);
    }

    #[tokio::test]
    async fn save_missing_task_is_not_found() {
        let store = memory_store().await;
        let err = store.save_task(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = memory_store().await;
        let first = store.insert_task(TaskRecord::new()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.insert_task(TaskRecord::new()).await.unwrap();

        let ids: Vec<_> = store.list_tasks().await.unwrap().into_iter().map(|t| t.task_id).collect();
        assert_eq!(ids, [second.task_id, first.task_id]);
    }

    #[tokio::test]
    async fn delete_cascades_to_files() {
        let store = memory_store().await;
        let task = store.insert_task(TaskRecord::new()).await.unwrap();
        let file = store
            .insert_file(SpiceFileRecord::new(task.task_id, "rc.cir"))
            .await
            .unwrap();

        let removed = store.delete_task(task.task_id).await.unwrap();
        assert_eq!(removed, [file.clone()]);
        assert!(store.get_task(task.task_id).await.unwrap().is_none());
        assert!(store.get_file(file.file_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_task_is_not_found() {
        let store = memory_store().await;
        let err = store.delete_task(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn purge_only_touches_older_tasks() {
        let store = memory_store().await;
        let old = store.insert_task(TaskRecord::new()).await.unwrap();
        let old_file = store
            .insert_file(SpiceFileRecord::new(old.task_id, "old.cir"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let cutoff = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let fresh = store.insert_task(TaskRecord::new()).await.unwrap();

        let removed = store.purge_tasks_before(cutoff).await.unwrap();
        assert_eq!(removed, [old_file]);
        assert!(store.get_task(old.task_id).await.unwrap().is_none());
        assert!(store.get_task(fresh.task_id).await.unwrap().is_some());
    }
}
