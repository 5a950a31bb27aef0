use std::time::Instant;

use tracing::{debug, info};

use crate::db::operations::sessions;
use crate::db::{now_ms, Database};

const MS_PER_HOUR: i64 = 3_600_000;

/// Abandon in-progress sessions idle for longer than `stale_hours`.
///
/// Abandoned sessions are never folded into topic or mistake aggregates.
pub async fn abandon_stale_sessions(db: &Database, stale_hours: u64) -> Result<u64, super::WorkerError> {
    let start = Instant::now();
    debug!("Starting stale session cleanup cycle");

    let now = now_ms();
    let window = i64::try_from(stale_hours).unwrap_or(i64::MAX / MS_PER_HOUR);
    let cutoff = now.saturating_sub(window.saturating_mul(MS_PER_HOUR));

    let abandoned = sessions::abandon_stale_sessions(db.pool(), cutoff, now).await?;

    info!(
        abandoned,
        stale_hours,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Stale session cleanup completed"
    );

    Ok(abandoned)
}
