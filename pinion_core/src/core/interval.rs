/// Per-entity countdown deciding on which loop iterations an entity is due.
///
/// With a period of `n` the entity fires on the `n`-th call to [`Interval::expired`]
/// and every `n` calls after that. Without a period it fires on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    period: Option<u32>,
    count_down: u32,
}

impl Interval {
    pub fn new(period: Option<u32>) -> Self {
        Self {
            period,
            count_down: period.unwrap_or(0),
        }
    }

    /// An interval that is due on every iteration.
    pub fn every_tick() -> Self {
        Self::new(None)
    }

    pub fn period(&self) -> Option<u32> {
        self.period
    }

    /// Iterations left before the next firing.
    pub fn remaining(&self) -> u32 {
        self.count_down
    }

    /// Advance the countdown by one iteration, returning whether the entity is due now.
    pub fn expired(&mut self) -> bool {
        let Some(period) = self.period else {
            return true;
        };

        self.count_down = self.count_down.saturating_sub(1);
        if self.count_down > 0 {
            return false;
        }

        self.count_down = period;
        true
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::every_tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firings(interval: &mut Interval, calls: usize) -> Vec<bool> {
        (0..calls).map(|_| interval.expired()).collect()
    }

    #[test]
    fn test_period_three_fires_on_third_call() {
        let mut interval = Interval::new(Some(3));
        assert_eq!(
            firings(&mut interval, 7),
            vec![false, false, true, false, false, true, false]
        );
    }

    #[test]
    fn test_period_one_fires_every_call() {
        let mut interval = Interval::new(Some(1));
        assert!(firings(&mut interval, 5).into_iter().all(|due| due));
    }

    #[test]
    fn test_no_period_fires_every_call() {
        let mut interval = Interval::every_tick();
        assert!(firings(&mut interval, 5).into_iter().all(|due| due));
        assert_eq!(interval.period(), None);
    }

    #[test]
    fn test_countdown_resets_after_firing() {
        let mut interval = Interval::new(Some(2));
        assert_eq!(interval.remaining(), 2);
        assert!(!interval.expired());
        assert_eq!(interval.remaining(), 1);
        assert!(interval.expired());
        assert_eq!(interval.remaining(), 2);
    }
}
