use foundation::time::Time;

/// Why a pass was not allowed to start.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ThrottleReason {
    /// A collaborator asked to hold passes until a later time.
    Deferred,
    /// The minimum interval since the last pass has not elapsed.
    Throttled,
}

/// Gate deciding whether a pass may start at a given time.
///
/// Times come from the caller's frame clock, never the wall clock, so the
/// gate replays deterministically.
#[derive(Debug, Clone, PartialEq)]
pub struct PassThrottle {
    min_interval_s: f64,
    last_pass: Option<Time>,
    deferred_until: Option<Time>,
}

impl PassThrottle {
    pub fn new(min_interval_s: f64) -> Self {
        Self {
            min_interval_s: min_interval_s.max(0.0),
            last_pass: None,
            deferred_until: None,
        }
    }

    pub fn min_interval_s(&self) -> f64 {
        self.min_interval_s
    }

    pub fn set_min_interval(&mut self, seconds: f64) {
        self.min_interval_s = seconds.max(0.0);
    }

    /// Holds passes while `now < until`. A later call replaces the earlier one.
    pub fn defer_until(&mut self, until: Time) {
        self.deferred_until = Some(until);
    }

    pub fn deferred_until(&self) -> Option<Time> {
        self.deferred_until
    }

    pub fn last_pass(&self) -> Option<Time> {
        self.last_pass
    }

    pub fn check(&self, now: Time) -> Result<(), ThrottleReason> {
        if let Some(until) = self.deferred_until
            && now.0 < until.0
        {
            return Err(ThrottleReason::Deferred);
        }

        if let Some(last) = self.last_pass
            && now.0 >= last.0
            && now.0 - last.0 < self.min_interval_s
        {
            return Err(ThrottleReason::Throttled);
        }

        // A clock that moved backwards (scene reload, replay) is never throttled.
        Ok(())
    }

    /// Records a completed pass. Clears an expired deferral.
    pub fn record_pass(&mut self, now: Time) {
        self.last_pass = Some(now);
        if let Some(until) = self.deferred_until
            && now.0 >= until.0
        {
            self.deferred_until = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PassThrottle, ThrottleReason};
    use foundation::time::Time;

    #[test]
    fn first_pass_is_never_throttled() {
        let t = PassThrottle::new(1.0);
        assert_eq!(t.check(Time(0.0)), Ok(()));
    }

    #[test]
    fn enforces_min_interval() {
        let mut t = PassThrottle::new(0.5);
        t.record_pass(Time(1.0));
        assert_eq!(t.check(Time(1.2)), Err(ThrottleReason::Throttled));
        assert_eq!(t.check(Time(1.5)), Ok(()));
    }

    #[test]
    fn deferral_wins_until_it_expires() {
        let mut t = PassThrottle::new(0.0);
        t.defer_until(Time(3.0));
        assert_eq!(t.check(Time(2.9)), Err(ThrottleReason::Deferred));
        assert_eq!(t.check(Time(3.0)), Ok(()));
        t.record_pass(Time(3.0));
        assert_eq!(t.deferred_until(), None);
    }

    #[test]
    fn backwards_clock_is_allowed() {
        let mut t = PassThrottle::new(10.0);
        t.record_pass(Time(100.0));
        assert_eq!(t.check(Time(1.0)), Ok(()));
    }
}
