use crate::entities::{SimStore, decode_time, decode_uuid, encode_time, now};
use crate::entities::dao::SpiceFileRecord;
use crate::error::StoreError;

use std::future::Future;
use tracing::debug;
use uuid::Uuid;

pub trait SpiceFileStore: Send + Sync + 'static {
    /// Persist a new file record. The owning task must already exist
    /// (`NotFound` otherwise); `upload_time` is overwritten with the write time.
    fn insert_file(
        &self,
        record: SpiceFileRecord,
    ) -> impl Future<Output = Result<SpiceFileRecord, StoreError>> + Send;
    /// Refresh `upload_time` of an existing file record.
    fn save_file(
        &self,
        file_id: Uuid,
    ) -> impl Future<Output = Result<SpiceFileRecord, StoreError>> + Send;
    fn get_file(
        &self,
        file_id: Uuid,
    ) -> impl Future<Output = Result<Option<SpiceFileRecord>, StoreError>> + Send;
    /// Files of one task, oldest upload first.
    fn list_files_for_task(
        &self,
        task_id: Uuid,
    ) -> impl Future<Output = Result<Vec<SpiceFileRecord>, StoreError>> + Send;
    fn delete_file(
        &self,
        file_id: Uuid,
    ) -> impl Future<Output = Result<SpiceFileRecord, StoreError>> + Send;
}

pub(crate) const FILE_COLUMNS: &str = "file_id, file_ref, upload_time, task_id";

pub(crate) type FileRow = (String, String, String, String);

pub(crate) fn file_from_row(
    (file_id, file_ref, upload_time, task_id): FileRow,
) -> Result<SpiceFileRecord, StoreError> {
    Ok(SpiceFileRecord {
        file_id: decode_uuid("file_id", file_id)?,
        file: file_ref,
        upload_time: decode_time("upload_time", upload_time)?,
        task_id: decode_uuid("task_id", task_id)?,
    })
}

impl SpiceFileStore for SimStore {
    async fn insert_file(&self, mut record: SpiceFileRecord) -> Result<SpiceFileRecord, StoreError> {
        record.upload_time = now();
        let task_id = record.task_id.to_string();
        // Single statement; the foreign key rejects a missing task.
        sqlx::query(
            "INSERT INTO spicefile (file_id, file_ref, upload_time, task_id) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(record.file_id.to_string())
        .bind(&record.file)
        .bind(encode_time(&record.upload_time))
        .bind(&task_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            StoreError::from_insert(e, "spice file", record.file_id, Some(("task", task_id.clone())))
        })?;

        debug!(file_id = %record.file_id, task_id = %record.task_id, file = %record.file, "spice file inserted");
        Ok(record)
    }

    async fn save_file(&self, file_id: Uuid) -> Result<SpiceFileRecord, StoreError> {
        let upload_time = encode_time(&now());
        let row: Option<FileRow> = sqlx::query_as(&format!(
            "UPDATE spicefile SET upload_time = ?1 WHERE file_id = ?2 RETURNING {FILE_COLUMNS}"
        ))
        .bind(&upload_time)
        .bind(file_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => file_from_row(row),
            None => Err(StoreError::not_found("spice file", file_id)),
        }
    }

    async fn get_file(&self, file_id: Uuid) -> Result<Option<SpiceFileRecord>, StoreError> {
        let row: Option<FileRow> = sqlx::query_as(&format!(
            "SELECT {FILE_COLUMNS} FROM spicefile WHERE file_id = ?1"
        ))
        .bind(file_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(file_from_row).transpose()
    }

    async fn list_files_for_task(&self, task_id: Uuid) -> Result<Vec<SpiceFileRecord>, StoreError> {
        let rows: Vec<FileRow> = sqlx::query_as(&format!(
            "SELECT {FILE_COLUMNS} FROM spicefile WHERE task_id = ?1 ORDER BY upload_time ASC"
        ))
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(file_from_row).collect()
    }

    async fn delete_file(&self, file_id: Uuid) -> Result<SpiceFileRecord, StoreError> {
        let row: Option<FileRow> = sqlx::query_as(&format!(
            "DELETE FROM spicefile WHERE file_id = ?1 RETURNING {FILE_COLUMNS}"
        ))
        .bind(file_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => file_from_row(row),
            None => Err(StoreError::not_found("spice file", file_id)),
        }
    }
}
