use crate::entities::SimStore;
use crate::entities::dao::RuntimeStatRecord;
use crate::error::StoreError;

use std::future::Future;
use tracing::debug;

pub trait RuntimeStatStore: Send + Sync + 'static {
    /// Add `by` simulations to bucket `exec_time`, creating it if needed.
    ///
    /// The increment is a single atomic upsert, so concurrent callers never
    /// lose updates. A bucket already too full to take `by` more is left
    /// unchanged and reported as [`StoreError::CounterOverflow`].
    fn increment_runtime_stat(
        &self,
        exec_time: i64,
        by: u32,
    ) -> impl Future<Output = Result<RuntimeStatRecord, StoreError>> + Send;
    fn get_runtime_stat(
        &self,
        exec_time: i64,
    ) -> impl Future<Output = Result<Option<RuntimeStatRecord>, StoreError>> + Send;
    /// Every bucket, ascending by `exec_time`.
    fn list_runtime_stats(
        &self,
    ) -> impl Future<Output = Result<Vec<RuntimeStatRecord>, StoreError>> + Send;
}

impl RuntimeStatStore for SimStore {
    async fn increment_runtime_stat(
        &self,
        exec_time: i64,
        by: u32,
    ) -> Result<RuntimeStatRecord, StoreError> {
        // SQLite turns an overflowing integer sum into a REAL, so the update
        // only fires while the result still fits in an i64.
        let row: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO runtimestat (exec_time, qty) VALUES (?1, ?2) \
             ON CONFLICT(exec_time) DO UPDATE SET qty = runtimestat.qty + excluded.qty \
             WHERE runtimestat.qty <= 9223372036854775807 - excluded.qty \
             RETURNING qty",
        )
        .bind(exec_time)
        .bind(i64::from(by))
        .fetch_optional(&self.pool)
        .await?;
        let Some((qty,)) = row else {
            return Err(StoreError::CounterOverflow { exec_time });
        };
        debug!(exec_time, by, qty, "runtime stat incremented");
        Ok(RuntimeStatRecord { exec_time, qty })
    }

    async fn get_runtime_stat(&self, exec_time: i64) -> Result<Option<RuntimeStatRecord>, StoreError> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT exec_time, qty FROM runtimestat WHERE exec_time = ?1")
                .bind(exec_time)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(exec_time, qty)| RuntimeStatRecord { exec_time, qty }))
    }

    async fn list_runtime_stats(&self) -> Result<Vec<RuntimeStatRecord>, StoreError> {
        let rows: Vec<(i64, i64)> =
            sqlx::query_as("SELECT exec_time, qty FROM runtimestat ORDER BY exec_time ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(exec_time, qty)| RuntimeStatRecord { exec_time, qty })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::memory_store;

    #[tokio::test]
    async fn first_increment_creates_bucket() {
        let store = memory_store().await;
        assert!(store.get_runtime_stat(3).await.unwrap().is_none());

        let stat = store.increment_runtime_stat(3, 1).await.unwrap();
        assert_eq!(stat, RuntimeStatRecord { exec_time: 3, qty: 1 });
        assert_eq!(store.get_runtime_stat(3).await.unwrap(), Some(stat));
    }

    #[tokio::test]
    async fn increments_accumulate_per_bucket() {
        let store = memory_store().await;
        for (exec_time, by) in [(2, 4), (1, 1), (2, 3), (5, 0), (1, 2)] {
            store.increment_runtime_stat(exec_time, by).await.unwrap();
        }

        let stats = store.list_runtime_stats().await.unwrap();
        assert_eq!(
            stats,
            [
                RuntimeStatRecord { exec_time: 1, qty: 3 },
                RuntimeStatRecord { exec_time: 2, qty: 7 },
                RuntimeStatRecord { exec_time: 5, qty: 0 },
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = memory_store().await;
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_runtime_stat(1, 1).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.get_runtime_stat(1).await.unwrap().unwrap().qty, 16);
    }

    #[tokio::test]
    async fn full_bucket_refuses_to_wrap() {
        let store = memory_store().await;
        sqlx::query("INSERT INTO runtimestat (exec_time, qty) VALUES (9, ?1)")
            .bind(i64::MAX - 1)
            .execute(&store.pool)
            .await
            .unwrap();

        let stat = store.increment_runtime_stat(9, 1).await.unwrap();
        assert_eq!(stat.qty, i64::MAX);

        let err = store.increment_runtime_stat(9, 1).await.unwrap_err();
        assert!(
            matches!(err, StoreError::CounterOverflow { exec_time: 9 }),
            "unexpected error: {err}"
        );
        assert_eq!(store.get_runtime_stat(9).await.unwrap().unwrap().qty, i64::MAX);
        // Buckets stay integers, never REAL.
        let (kind,): (String,) =
            sqlx::query_as("SELECT typeof(qty) FROM runtimestat WHERE exec_time = 9")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(kind, "integer");
    }

    #[tokio::test]
    async fn schema_rejects_non_integer_quantities() {
        let store = memory_store().await;
        let err = sqlx::query("INSERT INTO runtimestat (exec_time, qty) VALUES (4, 1.5e19)")
            .execute(&store.pool)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("CHECK"), "unexpected error: {err}");
    }
}
