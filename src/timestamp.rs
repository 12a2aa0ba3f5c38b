use std::time::{Duration, SystemTime};
use libc::{clock_gettime, timespec, CLOCK_REALTIME};

/// Wall-clock seconds since the unix epoch, as carried in echo payloads.
pub fn epoch_seconds() -> f64 {
    unsafe {
        let mut ts: timespec = std::mem::zeroed();
        if clock_gettime(CLOCK_REALTIME, &mut ts) == 0 {
            ts.tv_sec as f64 + ts.tv_nsec as f64 / 1_000_000_000.0
        } else {
            // fallback
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_else(|_| Duration::from_secs(0))
                .as_secs_f64()
        }
    }
}
