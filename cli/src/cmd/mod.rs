pub mod classify;
pub mod fit;
pub mod simulate;

use std::time::{SystemTime, UNIX_EPOCH};

/// A seed derived from wall time, used when the user doesn't pin one down
/// with `--seed`.
pub fn wall_time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
