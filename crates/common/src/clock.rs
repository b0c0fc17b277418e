//! Clock and timing utilities.
//!
//! Scoring durations always come from frame timestamps (milliseconds since
//! the detector started). The wall clock is only used to stamp reports and
//! to pace live display output. This module provides utilities for:
//! - Stamping reports with the wall-clock time
//! - Converting between milliseconds and seconds
//! - Throttling display updates to a fixed cadence

/// Current wall-clock time as RFC 3339, for report stamps.
pub fn now_wall() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Convert a millisecond value to seconds.
pub fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Seconds between two frame timestamps; zero if `to` precedes `from`.
pub fn elapsed_secs(from_ms: u64, to_ms: u64) -> f64 {
    ms_to_secs(to_ms.saturating_sub(from_ms))
}

/// Fixed-cadence ticker for display updates.
///
/// Only the presentation layer consults this; analyzers never do.
#[derive(Debug)]
pub struct RateController {
    target_interval_ms: u64,
    last_tick_ms: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ms: 1000 / target_hz.max(1) as u64,
            last_tick_ms: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ms: u64) -> bool {
        match self.last_tick_ms {
            None => {
                self.last_tick_ms = Some(current_ms);
                true
            }
            Some(last) if current_ms >= last + self.target_interval_ms => {
                self.last_tick_ms = Some(current_ms);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_wall_is_rfc3339() {
        let stamp = now_wall();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }

    #[test]
    fn test_ms_secs_conversion() {
        assert!((ms_to_secs(1500) - 1.5).abs() < 1e-9);
        assert_eq!(ms_to_secs(0), 0.0);
    }

    #[test]
    fn test_elapsed_secs_saturates() {
        assert!((elapsed_secs(1000, 11_400) - 10.4).abs() < 1e-9);
        assert_eq!(elapsed_secs(5000, 1000), 0.0);
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(4);
        assert!(ctrl.should_tick(0)); // first tick always fires
        assert!(!ctrl.should_tick(100)); // too soon at 4Hz
        assert!(!ctrl.should_tick(249));
        assert!(ctrl.should_tick(250));
    }
}
