/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Seconds elapsed between `earlier_unix` and `now_unix`, zero if the clock went backwards.
pub fn seconds_since(earlier_unix: u64, now_unix: u64) -> u64 {
    now_unix.saturating_sub(earlier_unix)
}
