use chrono::{DateTime, FixedOffset, Utc};

/// Fixed regional offset used for every wall-clock computation (UTC+9).
pub const REGION_OFFSET_SECS: i32 = 9 * 3600;

pub fn region_offset() -> FixedOffset {
    FixedOffset::east_opt(REGION_OFFSET_SECS).unwrap()
}

/// Source of "now" in the fixed regional offset. Injected so attendance and
/// scheduling logic are deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&region_offset())
    }
}

/// Always returns the instant it was constructed with.
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn system_clock_reports_regional_offset() {
        let now = SystemClock.now();
        assert_eq!(now.offset().local_minus_utc(), REGION_OFFSET_SECS);
    }

    #[test]
    fn fixed_clock_returns_preset_instant() {
        let instant = DateTime::parse_from_rfc3339("2024-06-03T09:05:00+09:00").unwrap();
        let clock = FixedClock(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now().hour(), 9);
    }
}
