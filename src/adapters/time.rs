//! Gateway clock adapter.
//!
//! - **`target_os = "espidf"`** wraps `esp_timer_get_time()` for the
//!   monotonic clock and `gettimeofday()` (SNTP-synced) for wall time.
//! - **`not(target_os = "espidf")`** uses `std::time::Instant` and
//!   `SystemTime` for host-side testing and simulation.

use crate::app::ports::ClockPort;

/// Wall time before SNTP sync reads as the 1970 epoch; anything earlier
/// than 2020-01-01 is treated as unsynced.
#[cfg(target_os = "espidf")]
const EPOCH_2020_SECS: i64 = 1_577_836_800;

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Whether wall time has been set by SNTP.
    #[cfg(target_os = "espidf")]
    pub fn is_synced(&self) -> bool {
        wall_secs().is_some_and(|s| s >= EPOCH_2020_SECS)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn is_synced(&self) -> bool {
        true
    }
}

#[cfg(target_os = "espidf")]
fn wall_secs() -> Option<i64> {
    let mut tv = esp_idf_sys::timeval {
        tv_sec: 0,
        tv_usec: 0,
    };
    // SAFETY: `tv` is a valid out-pointer; a null timezone is permitted.
    if unsafe { esp_idf_sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
        return None;
    }
    Some(tv.tv_sec as i64)
}

#[cfg(target_os = "espidf")]
impl ClockPort for SystemClock {
    fn now_ms(&self) -> u64 {
        let mut tv = esp_idf_sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: as in `wall_secs`.
        if unsafe { esp_idf_sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        (tv.tv_sec as u64) * 1000 + (tv.tv_usec as u64) / 1000
    }

    fn uptime_ms(&self) -> u64 {
        // SAFETY: reads the monotonic high-resolution timer.
        (unsafe { esp_idf_sys::esp_timer_get_time() }) as u64 / 1000
    }
}

#[cfg(not(target_os = "espidf"))]
impl ClockPort for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }

    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
