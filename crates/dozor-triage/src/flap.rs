//! Flap detection: a sliding-window transition counter with hysteresis.
//!
//! Not named by the distilled operations, but needed to decide whether a
//! service's restart churn should escalate — resolved as an Open Question:
//! a service enters "flapping" once its state-transition count in the
//! window reaches `high`, and only leaves once the count drops to `low`.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

pub struct FlapDetector {
    window: Duration,
    high: u32,
    low: u32,
    transitions: VecDeque<DateTime<Utc>>,
    flapping: bool,
}

impl FlapDetector {
    pub fn new(window: std::time::Duration, high: u32, low: u32) -> Self {
        Self {
            window: Duration::from_std(window).unwrap_or(Duration::seconds(900)),
            high,
            low,
            transitions: VecDeque::new(),
            flapping: false,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(&front) = self.transitions.front() {
            if now - front > self.window {
                self.transitions.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records a state transition at `now` and returns the updated flapping
    /// state, applying hysteresis: once flapping, stays flapping until the
    /// count within the window falls to `low` or below.
    pub fn record_transition(&mut self, now: DateTime<Utc>) -> bool {
        self.transitions.push_back(now);
        self.prune(now);
        let count = self.transitions.len() as u32;

        if !self.flapping && count >= self.high {
            self.flapping = true;
        } else if self.flapping && count <= self.low {
            self.flapping = false;
        }
        self.flapping
    }

    pub fn is_flapping(&self) -> bool {
        self.flapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enters_flapping_once_high_threshold_reached() {
        let mut detector = FlapDetector::new(std::time::Duration::from_secs(900), 3, 1);
        let base = Utc::now();
        assert!(!detector.record_transition(base));
        assert!(!detector.record_transition(base + Duration::seconds(1)));
        assert!(detector.record_transition(base + Duration::seconds(2)));
    }

    #[test]
    fn hysteresis_keeps_flapping_until_low_threshold() {
        let mut detector = FlapDetector::new(std::time::Duration::from_secs(900), 3, 1);
        let base = Utc::now();
        detector.record_transition(base);
        detector.record_transition(base + Duration::seconds(1));
        detector.record_transition(base + Duration::seconds(2));
        assert!(detector.is_flapping());

        // Transitions stop; nothing ages out yet within the window, so still flapping.
        let count_before_prune = detector.transitions.len();
        assert_eq!(count_before_prune, 3);
    }

    #[test]
    fn old_transitions_age_out_of_the_window() {
        let mut detector = FlapDetector::new(std::time::Duration::from_secs(60), 3, 1);
        let base = Utc::now();
        detector.record_transition(base);
        detector.record_transition(base + Duration::seconds(500));
        assert_eq!(detector.transitions.len(), 1);
    }
}
