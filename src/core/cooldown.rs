use chrono::{DateTime, Local, TimeDelta};

pub const DEFAULT_COOLDOWN_SECS: i64 = 120;

/// Per-load gate that spaces out consecutive actions, so that one change
/// becomes visible in the meter before the next one is considered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cooldown {
    period: TimeDelta,
    last_action_at: Option<DateTime<Local>>,
}

impl Cooldown {
    #[must_use]
    pub const fn new(period: TimeDelta) -> Self {
        Self { period, last_action_at: None }
    }

    #[must_use]
    pub fn may_act(&self, now: DateTime<Local>) -> bool {
        self.last_action_at.is_none_or(|at| now - at >= self.period)
    }

    pub const fn record(&mut self, now: DateTime<Local>) {
        self.last_action_at = Some(now);
    }

    pub const fn reset(&mut self) {
        self.last_action_at = None;
    }

    #[must_use]
    pub const fn last_action_at(&self) -> Option<DateTime<Local>> {
        self.last_action_at
    }

    /// Keep this gate's period but inherit the other gate's history.
    pub const fn inherit(&mut self, other: &Self) {
        self.last_action_at = other.last_action_at;
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 11, 3, 9, second / 60, second % 60).unwrap()
    }

    #[test]
    fn fresh_gate_is_open() {
        let gate = Cooldown::new(TimeDelta::seconds(120));
        assert!(gate.may_act(at(0)));
    }

    #[test]
    fn closes_for_the_full_window() {
        let mut gate = Cooldown::new(TimeDelta::seconds(120));
        gate.record(at(0));
        assert!(!gate.may_act(at(30)));
        assert!(!gate.may_act(at(119)));
        assert!(gate.may_act(at(120)));
    }

    #[test]
    fn reset_reopens() {
        let mut gate = Cooldown::new(TimeDelta::seconds(120));
        gate.record(at(0));
        gate.reset();
        assert!(gate.may_act(at(1)));
    }

    #[test]
    fn inherit_keeps_own_period() {
        let mut old = Cooldown::new(TimeDelta::seconds(120));
        old.record(at(0));
        let mut new = Cooldown::new(TimeDelta::seconds(60));
        new.inherit(&old);
        assert!(!new.may_act(at(30)));
        assert!(new.may_act(at(60)));
    }
}
