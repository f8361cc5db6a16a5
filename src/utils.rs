use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch by this process's clock.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}
