//! Idle detection from two independent sources.
//!
//! The in-process hook timestamp and the OS-wide last-input counter can
//! disagree (hook attached late, input consumed elsewhere before attach).
//! Either one reaching the threshold is enough to call the user idle.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::classifier::Classification;
use crate::error::PlatformError;

pub const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 60;

/// OS-wide "time since last input", independent of our hook.
pub trait SystemIdleSource {
    fn last_input_age(&self) -> Result<Duration, PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleThreshold(Duration);

impl IdleThreshold {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    /// Zero disables idle gating.
    pub fn is_bypass(self) -> bool {
        self.0.is_zero()
    }
}

impl Default for IdleThreshold {
    fn default() -> Self {
        Self::from_secs(DEFAULT_IDLE_THRESHOLD_SECS)
    }
}

#[derive(Debug, Clone)]
pub struct IdleMonitor {
    threshold: IdleThreshold,
    last_meaningful_input: DateTime<Utc>,
}

impl IdleMonitor {
    /// Starts the clock at `now`, so a fresh agent is never idle before the
    /// threshold elapses unless the OS counter says otherwise.
    pub fn new(threshold: IdleThreshold, now: DateTime<Utc>) -> Self {
        Self {
            threshold,
            last_meaningful_input: now,
        }
    }

    pub fn threshold(&self) -> IdleThreshold {
        self.threshold
    }

    pub fn last_meaningful_input(&self) -> DateTime<Utc> {
        self.last_meaningful_input
    }

    /// Records a classified hook event. Returns whether the timestamp moved.
    pub fn observe(&mut self, classification: Classification, at: DateTime<Utc>) -> bool {
        if classification.is_synthetic || !classification.is_meaningful {
            return false;
        }
        if at <= self.last_meaningful_input {
            return false;
        }
        self.last_meaningful_input = at;
        true
    }

    pub fn hook_idle_age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_meaningful_input)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_idle(&self, now: DateTime<Utc>, system: &dyn SystemIdleSource) -> bool {
        if self.threshold.is_bypass() {
            return true;
        }
        let threshold = self.threshold.as_duration();
        let hook_age = self.hook_idle_age(now);

        let system_age = match system.last_input_age() {
            Ok(age) => age,
            Err(err) => {
                tracing::warn!(error = %err, "System idle query failed; treating user as idle");
                return true;
            }
        };

        let idle = hook_age >= threshold || system_age >= threshold;
        tracing::debug!(
            hook_ms = hook_age.as_millis() as u64,
            system_ms = system_age.as_millis() as u64,
            threshold_ms = threshold.as_millis() as u64,
            idle,
            "Idle check"
        );
        idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    struct FixedAge(Result<Duration, PlatformError>);

    impl SystemIdleSource for FixedAge {
        fn last_input_age(&self) -> Result<Duration, PlatformError> {
            self.0.clone()
        }
    }

    fn human() -> Classification {
        Classification {
            is_synthetic: false,
            is_meaningful: true,
        }
    }

    #[test]
    fn zero_threshold_is_always_idle() {
        let now = Utc::now();
        let monitor = IdleMonitor::new(IdleThreshold::from_secs(0), now);
        assert!(monitor.is_idle(now, &FixedAge(Ok(Duration::ZERO))));
    }

    #[test]
    fn both_sources_below_threshold_is_not_idle() {
        let now = Utc::now();
        let monitor = IdleMonitor::new(IdleThreshold::from_secs(60), now - ChronoDuration::seconds(30));
        assert!(!monitor.is_idle(now, &FixedAge(Ok(Duration::from_secs(30)))));
    }

    #[test]
    fn either_source_at_threshold_is_idle() {
        let now = Utc::now();
        let hook_idle = IdleMonitor::new(IdleThreshold::from_secs(60), now - ChronoDuration::seconds(60));
        assert!(hook_idle.is_idle(now, &FixedAge(Ok(Duration::from_secs(1)))));

        let hook_busy = IdleMonitor::new(IdleThreshold::from_secs(60), now);
        assert!(hook_busy.is_idle(now, &FixedAge(Ok(Duration::from_secs(60)))));
    }

    #[test]
    fn system_failure_fails_open() {
        let now = Utc::now();
        let monitor = IdleMonitor::new(IdleThreshold::from_secs(60), now);
        let failing = FixedAge(Err(PlatformError::call("GetLastInputInfo", "denied")));
        assert!(monitor.is_idle(now, &failing));
    }

    #[test]
    fn synthetic_and_non_meaningful_events_do_not_reset_the_clock() {
        let start = Utc::now() - ChronoDuration::seconds(120);
        let mut monitor = IdleMonitor::new(IdleThreshold::default(), start);
        let later = start + ChronoDuration::seconds(100);

        let injected = Classification {
            is_synthetic: true,
            is_meaningful: true,
        };
        let key_up = Classification {
            is_synthetic: false,
            is_meaningful: false,
        };
        assert!(!monitor.observe(injected, later));
        assert!(!monitor.observe(key_up, later));
        assert_eq!(monitor.last_meaningful_input(), start);

        assert!(monitor.observe(human(), later));
        assert_eq!(monitor.last_meaningful_input(), later);
    }

    #[test]
    fn out_of_order_stamp_never_moves_clock_backwards() {
        let now = Utc::now();
        let mut monitor = IdleMonitor::new(IdleThreshold::default(), now);
        assert!(!monitor.observe(human(), now - ChronoDuration::seconds(5)));
        assert!(!monitor.observe(human(), now));
        assert_eq!(monitor.last_meaningful_input(), now);
        assert!(monitor.observe(human(), now + ChronoDuration::seconds(1)));
    }
}
