//! Clock abstraction, civil timezone conversion and duration formatting.
//!
//! # Invariants
//! - Every timestamp the core produces is expressed in one fixed civil
//!   offset, so values from different components compare directly.
//! - "Now" is always obtained through a [`Clock`], never read ad hoc.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, SubsecRound, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic "now".
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.lock();
        *current += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned guard still holds a valid instant.
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// The single civil timezone shared by all components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilZone {
    offset: FixedOffset,
}

impl CivilZone {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current instant in the civil zone.
    pub fn now(&self, clock: &dyn Clock) -> DateTime<FixedOffset> {
        self.localize(clock.now())
    }

    pub fn localize<Tz: TimeZone>(&self, instant: DateTime<Tz>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Converts stored epoch milliseconds; `None` when out of chrono range.
    pub fn from_millis(&self, millis: i64) -> Option<DateTime<FixedOffset>> {
        DateTime::from_timestamp_millis(millis).map(|instant| self.localize(instant))
    }

    pub fn to_millis<Tz: TimeZone>(instant: &DateTime<Tz>) -> i64 {
        instant.timestamp_millis()
    }

    /// Calendar day of an instant as observed in the civil zone.
    pub fn day_of<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Civil midnight opening `day`.
    pub fn start_of_day(&self, day: NaiveDate) -> Option<DateTime<FixedOffset>> {
        day.and_hms_opt(0, 0, 0)?
            .and_local_timezone(self.offset)
            .single()
    }
}

/// A clock paired with the civil zone; the one source of "now" for services.
///
/// Instants are truncated to milliseconds, the storage precision, so a value
/// handed out here survives a store round-trip unchanged.
#[derive(Clone)]
pub struct CivilClock {
    zone: CivilZone,
    clock: Arc<dyn Clock>,
}

impl CivilClock {
    pub fn new(zone: CivilZone, clock: Arc<dyn Clock>) -> Self {
        Self { zone, clock }
    }

    pub fn system(zone: CivilZone) -> Self {
        Self::new(zone, Arc::new(SystemClock))
    }

    pub fn zone(&self) -> CivilZone {
        self.zone
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.zone.now(self.clock.as_ref()).trunc_subsecs(3)
    }
}

impl std::fmt::Debug for CivilClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CivilClock")
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

/// Renders a duration for display, truncating to whole units.
///
/// - under a minute: `"{s}s"`
/// - under an hour: `"{m}m {s}s"`
/// - otherwise: `"{h}h {m}m"`
///
/// Negative input renders as `"0s"`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_uses_unit_thresholds() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(60), "1m 0s");
        assert_eq!(format_duration(300), "5m 0s");
        assert_eq!(format_duration(3599), "59m 59s");
        assert_eq!(format_duration(3600), "1h 0m");
        assert_eq!(format_duration(7322), "2h 2m");
    }

    #[test]
    fn format_duration_truncates_instead_of_rounding() {
        assert_eq!(format_duration(3659), "1h 0m");
        assert_eq!(format_duration(119), "1m 59s");
    }

    #[test]
    fn format_duration_clamps_negative_values() {
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn day_of_uses_civil_offset_not_utc() {
        let zone = CivilZone::new(FixedOffset::east_opt(330 * 60).unwrap());
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        assert_eq!(
            zone.day_of(&instant),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn start_of_day_is_civil_midnight() {
        let zone = CivilZone::new(FixedOffset::east_opt(330 * 60).unwrap());
        let midnight = zone
            .start_of_day(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
            .unwrap();
        assert_eq!(
            midnight.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap()
        );
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(10));
        assert_eq!(clock.now(), start + Duration::seconds(10));
    }

    #[test]
    fn civil_clock_truncates_to_millis() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + Duration::nanoseconds(1_234_567);
        let clock = CivilClock::new(CivilZone::utc(), Arc::new(ManualClock::new(start)));
        assert_eq!(clock.now().timestamp_subsec_nanos(), 1_000_000);
    }

    #[test]
    fn millis_roundtrip_keeps_civil_offset() {
        let zone = CivilZone::new(FixedOffset::east_opt(330 * 60).unwrap());
        let instant = zone.from_millis(1_700_000_000_000).unwrap();
        assert_eq!(instant.offset().local_minus_utc(), 330 * 60);
        assert_eq!(CivilZone::to_millis(&instant), 1_700_000_000_000);
    }
}
