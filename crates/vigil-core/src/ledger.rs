use chrono::NaiveDate;

/// Day-scoped cumulative usage counter against a configured ceiling.
///
/// The ledger is the one piece of state shared across sessions: ticks accrue
/// only while a session is running and unpaused, the balance survives
/// session boundaries, and everything resets on a calendar-day rollover.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageLedger {
    day: NaiveDate,
    seconds_used_today: f64,
    base_ceiling_seconds: f64,
    extension_seconds: f64,
    extensions_granted: u32,
}

impl UsageLedger {
    #[must_use]
    pub fn new(base_ceiling_seconds: f64, today: NaiveDate) -> Self {
        Self {
            day: today,
            seconds_used_today: 0.0,
            base_ceiling_seconds,
            extension_seconds: 0.0,
            extensions_granted: 0,
        }
    }

    /// Rebuild a ledger from a persisted day row.
    #[must_use]
    pub fn restore(
        day: NaiveDate,
        seconds_used_today: f64,
        base_ceiling_seconds: f64,
        extension_seconds: f64,
        extensions_granted: u32,
    ) -> Self {
        Self {
            day,
            seconds_used_today,
            base_ceiling_seconds,
            extension_seconds,
            extensions_granted,
        }
    }

    /// Accrue active seconds. Callers gate this on the session being
    /// running, unpaused, and not already exhausted.
    pub fn tick(&mut self, seconds: f64) {
        self.seconds_used_today += seconds;
    }

    /// Seconds left before the ceiling, never negative.
    #[must_use]
    pub fn remaining(&self) -> f64 {
        (self.ceiling_seconds() - self.seconds_used_today).max(0.0)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.seconds_used_today >= self.ceiling_seconds()
    }

    /// Extend today's ceiling. Un-exhausts a locked ledger.
    pub fn grant_extension(&mut self, seconds: f64) {
        self.extension_seconds += seconds;
        self.extensions_granted += 1;
        log::info!(
            "usage extension granted: +{seconds:.0}s (total extensions: {})",
            self.extensions_granted
        );
    }

    /// Reset the counters when the calendar day has changed. Returns whether
    /// a rollover happened.
    pub fn rollover(&mut self, today: NaiveDate) -> bool {
        if today == self.day {
            return false;
        }
        log::info!("usage ledger rollover: {} -> {today}", self.day);
        self.day = today;
        self.seconds_used_today = 0.0;
        self.extension_seconds = 0.0;
        self.extensions_granted = 0;
        true
    }

    #[must_use]
    pub fn ceiling_seconds(&self) -> f64 {
        self.base_ceiling_seconds + self.extension_seconds
    }

    #[must_use]
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    #[must_use]
    pub fn seconds_used_today(&self) -> f64 {
        self.seconds_used_today
    }

    #[must_use]
    pub fn extension_seconds(&self) -> f64 {
        self.extension_seconds
    }

    #[must_use]
    pub fn extensions_granted(&self) -> u32 {
        self.extensions_granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn tick_past_the_ceiling_exhausts_and_clamps_remaining() {
        let mut ledger = UsageLedger::restore(day(1), 7199.0, 7200.0, 0.0, 0);
        assert!(!ledger.is_exhausted());

        ledger.tick(2.0);
        assert!(ledger.is_exhausted());
        assert!((ledger.remaining() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fresh_ledger_has_full_balance() {
        let ledger = UsageLedger::new(7200.0, day(1));
        assert!((ledger.remaining() - 7200.0).abs() < f64::EPSILON);
        assert!(!ledger.is_exhausted());
    }

    #[test]
    fn extension_unlocks_an_exhausted_ledger() {
        let mut ledger = UsageLedger::restore(day(1), 7200.0, 7200.0, 0.0, 0);
        assert!(ledger.is_exhausted());

        ledger.grant_extension(1800.0);
        assert!(!ledger.is_exhausted());
        assert!((ledger.remaining() - 1800.0).abs() < f64::EPSILON);
        assert_eq!(ledger.extensions_granted(), 1);
    }

    #[test]
    fn rollover_resets_usage_and_extensions() {
        let mut ledger = UsageLedger::restore(day(1), 5000.0, 7200.0, 900.0, 2);
        assert!(!ledger.rollover(day(1)));
        assert!(ledger.rollover(day(2)));

        assert_eq!(ledger.day(), day(2));
        assert!((ledger.seconds_used_today() - 0.0).abs() < f64::EPSILON);
        assert_eq!(ledger.extensions_granted(), 0);
        assert!((ledger.remaining() - 7200.0).abs() < f64::EPSILON);
    }
}
