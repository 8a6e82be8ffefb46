use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A row in the `runtimestat` table: one execution-time histogram bucket.
///
/// Bucket `n` counts simulations that took more than `n - 1` and at most `n`
/// seconds, e.g. a 0.5 s run lands in `exec_time = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStatRecord {
    pub exec_time: i64,
    pub qty: i64,
}

impl RuntimeStatRecord {
    /// Bucket key for a measured execution time.
    ///
    /// Zero-length runs are counted in bucket 1.
    pub fn bucket_for(elapsed: Duration) -> i64 {
        let secs = elapsed.as_secs();
        let bucket = if elapsed.subsec_nanos() > 0 { secs.saturating_add(1) } else { secs };
        i64::try_from(bucket.max(1)).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for RuntimeStatRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.exec_time)
    }
}
