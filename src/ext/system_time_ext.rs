use std::time::{Duration, SystemTime};

pub trait SystemTimeExt {
    /// Whole seconds since the Unix epoch; times before it clamp to zero.
    fn unix_seconds(&self) -> u64;
}

impl SystemTimeExt for SystemTime {
    fn unix_seconds(&self) -> u64 {
        self.duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}
