//! Debounced condition gate.
//!
//! Every analyzer needs the same latch: a condition must hold for
//! `enter_ms` before it counts, and may drop out for up to `exit_ms`
//! before the latch releases. Reversals shorter than either window are
//! absorbed.
//!
//! ```text
//!          cond            held enter_ms
//!   Idle ───────▶ Pending ──────────────▶ Active
//!    ▲              │ !cond                │ ▲ !cond    cond
//!    │              ▼                      ▼ │
//!    └──────────── Idle ◀── exit_ms ──── Grace
//! ```

use serde::{Deserialize, Serialize};
use stride_pose_model::landmark::TimestampMs;

/// Dwell windows for a [`DebouncedGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateTiming {
    /// How long the condition must hold before the gate opens.
    pub enter_ms: u64,
    /// How long the condition may be lost before the gate closes.
    pub exit_ms: u64,
}

impl GateTiming {
    pub const fn new(enter_ms: u64, exit_ms: u64) -> Self {
        Self { enter_ms, exit_ms }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Pending {
        since: TimestampMs,
    },
    Active {
        since: TimestampMs,
    },
    Grace {
        since: TimestampMs,
        lost_at: TimestampMs,
    },
}

/// What an update changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    None,
    /// The gate opened; the condition has held since `since`.
    Entered { since: TimestampMs },
    /// The gate closed; the condition held from `since` until `until`.
    Exited {
        since: TimestampMs,
        until: TimestampMs,
    },
}

/// A condition latch with entry debounce and exit grace.
#[derive(Debug, Clone)]
pub struct DebouncedGate {
    timing: GateTiming,
    state: GateState,
}

impl DebouncedGate {
    pub fn new(enter_ms: u64, exit_ms: u64) -> Self {
        Self::with_timing(GateTiming::new(enter_ms, exit_ms))
    }

    pub fn with_timing(timing: GateTiming) -> Self {
        Self {
            timing,
            state: GateState::Idle,
        }
    }

    /// Feed the condition observed at `now`.
    pub fn update(&mut self, condition: bool, now: TimestampMs) -> GateEvent {
        let (next, event) = match (self.state, condition) {
            (GateState::Idle, false) => (GateState::Idle, GateEvent::None),
            (GateState::Idle, true) => {
                if self.timing.enter_ms == 0 {
                    (
                        GateState::Active { since: now },
                        GateEvent::Entered { since: now },
                    )
                } else {
                    (GateState::Pending { since: now }, GateEvent::None)
                }
            }
            (GateState::Pending { .. }, false) => (GateState::Idle, GateEvent::None),
            (GateState::Pending { since }, true) => {
                if now.saturating_sub(since) >= self.timing.enter_ms {
                    (GateState::Active { since }, GateEvent::Entered { since })
                } else {
                    (GateState::Pending { since }, GateEvent::None)
                }
            }
            (GateState::Active { since }, true) => (GateState::Active { since }, GateEvent::None),
            (GateState::Active { since }, false) => {
                if self.timing.exit_ms == 0 {
                    (GateState::Idle, GateEvent::Exited { since, until: now })
                } else {
                    (GateState::Grace { since, lost_at: now }, GateEvent::None)
                }
            }
            (GateState::Grace { since, .. }, true) => {
                (GateState::Active { since }, GateEvent::None)
            }
            (GateState::Grace { since, lost_at }, false) => {
                if now.saturating_sub(lost_at) >= self.timing.exit_ms {
                    (
                        GateState::Idle,
                        GateEvent::Exited {
                            since,
                            until: lost_at,
                        },
                    )
                } else {
                    (GateState::Grace { since, lost_at }, GateEvent::None)
                }
            }
        };
        self.state = next;
        event
    }

    /// Whether the gate is open (including while in grace).
    pub fn is_active(&self) -> bool {
        matches!(self.state, GateState::Active { .. } | GateState::Grace { .. })
    }

    /// Whether the condition is currently lost but still within grace.
    pub fn in_grace(&self) -> bool {
        matches!(self.state, GateState::Grace { .. })
    }

    /// When the condition started holding, for an open gate.
    pub fn active_since(&self) -> Option<TimestampMs> {
        match self.state {
            GateState::Active { since } | GateState::Grace { since, .. } => Some(since),
            _ => None,
        }
    }

    /// How long the open gate's condition has held as of `now`.
    ///
    /// In grace, the hold is frozen at the moment the condition was lost.
    pub fn held_ms(&self, now: TimestampMs) -> u64 {
        match self.state {
            GateState::Active { since } => now.saturating_sub(since),
            GateState::Grace { since, lost_at } => lost_at.saturating_sub(since),
            _ => 0,
        }
    }

    pub fn reset(&mut self) {
        self.state = GateState::Idle;
    }

    /// Open the gate at `now` without waiting out the entry dwell.
    pub fn open(&mut self, now: TimestampMs) {
        self.state = GateState::Active { since: now };
    }

    pub fn timing(&self) -> GateTiming {
        self.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_enter_requires_dwell() {
        let mut gate = DebouncedGate::new(300, 500);
        assert_eq!(gate.update(true, 0), GateEvent::None);
        assert_eq!(gate.update(true, 200), GateEvent::None);
        assert!(!gate.is_active());
        assert_eq!(gate.update(true, 300), GateEvent::Entered { since: 0 });
        assert!(gate.is_active());
        assert_eq!(gate.held_ms(1000), 1000);
    }

    #[test]
    fn test_open_skips_entry_dwell() {
        let mut gate = DebouncedGate::new(300, 0);
        gate.open(1000);
        assert!(gate.is_active());
        assert_eq!(gate.update(true, 1100), GateEvent::None);
        assert_eq!(gate.held_ms(1100), 100);
        assert_eq!(
            gate.update(false, 1200),
            GateEvent::Exited {
                since: 1000,
                until: 1200
            }
        );
    }

    #[test]
    fn test_pending_resets_on_drop() {
        let mut gate = DebouncedGate::new(300, 500);
        gate.update(true, 0);
        gate.update(false, 100);
        gate.update(true, 200);
        assert_eq!(gate.update(true, 400), GateEvent::None);
        assert_eq!(gate.update(true, 500), GateEvent::Entered { since: 200 });
    }

    #[test]
    fn test_grace_absorbs_short_loss() {
        let mut gate = DebouncedGate::new(0, 500);
        assert_eq!(gate.update(true, 0), GateEvent::Entered { since: 0 });
        gate.update(false, 1000);
        assert!(gate.in_grace());
        assert_eq!(gate.held_ms(1200), 1000);
        gate.update(true, 1300);
        assert!(!gate.in_grace());
        assert_eq!(gate.held_ms(2000), 2000);
    }

    #[test]
    fn test_exit_reports_hold_until_loss() {
        let mut gate = DebouncedGate::new(100, 600);
        gate.update(true, 0);
        gate.update(true, 100);
        gate.update(false, 10_400);
        assert_eq!(gate.update(false, 10_700), GateEvent::None);
        assert_eq!(
            gate.update(false, 11_000),
            GateEvent::Exited {
                since: 0,
                until: 10_400
            }
        );
        assert!(!gate.is_active());
        assert_eq!(gate.held_ms(11_000), 0);
    }

    #[test]
    fn test_reset() {
        let mut gate = DebouncedGate::new(0, 0);
        gate.update(true, 0);
        gate.reset();
        assert!(!gate.is_active());
        assert_eq!(gate.active_since(), None);
    }

    proptest! {
        #[test]
        fn prop_hold_never_exceeds_elapsed(conds in proptest::collection::vec(any::<bool>(), 1..200)) {
            let mut gate = DebouncedGate::new(150, 600);
            for (i, cond) in conds.iter().enumerate() {
                let now = i as u64 * 33;
                gate.update(*cond, now);
                prop_assert!(gate.held_ms(now) <= now);
                if let Some(since) = gate.active_since() {
                    prop_assert!(since <= now);
                }
            }
        }
    }
}
