//! Confirmation window math: business-hours aware deadlines and countdowns.
//!
//! Everything here is pure. The `_at` variants take an explicit `now` so the
//! scan and the tests can pin the clock; the plain variants read `Utc::now()`.

use chrono::{ DateTime, Duration, Timelike, Utc };
use chrono_tz::Tz;
use serde::{ Deserialize, Serialize };

use crate::enums::Urgency;

/// First local hour (inclusive) counted as business hours.
pub const BUSINESS_HOURS_START: u32 = 8;
/// Local hour (exclusive) at which business hours end.
pub const BUSINESS_HOURS_END: u32 = 22;

pub const BUSINESS_HOURS_WINDOW_HOURS: i64 = 12;
pub const OFF_HOURS_WINDOW_HOURS: i64 = 24;

pub const APPROACHING_THRESHOLD_MINUTES: u64 = 120;
pub const CRITICAL_THRESHOLD_MINUTES: u64 = 30;

/// Remaining time until a deadline. All numeric fields are zero once expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRemaining {
    pub expired: bool,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub total_minutes: u64,
}

impl TimeRemaining {
    const EXPIRED: TimeRemaining = TimeRemaining {
        expired: true,
        hours: 0,
        minutes: 0,
        seconds: 0,
        total_minutes: 0,
    };

    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

/// Resolve an IANA timezone name, e.g. `"Europe/Berlin"`.
pub fn resolve_timezone(timezone: &str) -> Option<Tz> {
    timezone.trim().parse::<Tz>().ok()
}

/// Whether `instant` falls in `[08:00, 22:00)` local time in `timezone`.
///
/// Local time is resolved through the IANA database, so DST shifts are
/// honoured. An unknown timezone counts as business hours.
pub fn is_within_business_hours(instant: DateTime<Utc>, timezone: &str) -> bool {
    let Some(tz) = resolve_timezone(timezone) else {
        tracing::warn!(timezone, "Unknown timezone, treating instant as business hours");
        return true;
    };

    let local_hour = instant.with_timezone(&tz).hour();
    (BUSINESS_HOURS_START..BUSINESS_HOURS_END).contains(&local_hour)
}

/// Length of the confirmation window for a payment notified at `notified_at`.
pub fn confirmation_window(notified_at: DateTime<Utc>, timezone: &str) -> Duration {
    if is_within_business_hours(notified_at, timezone) {
        Duration::hours(BUSINESS_HOURS_WINDOW_HOURS)
    } else {
        Duration::hours(OFF_HOURS_WINDOW_HOURS)
    }
}

/// Deadline for the seller to confirm a payment notified at `notified_at`.
///
/// Computed once when the payment is recorded and persisted; never recomputed.
pub fn calculate_deadline(notified_at: DateTime<Utc>, timezone: &str) -> DateTime<Utc> {
    notified_at + confirmation_window(notified_at, timezone)
}

pub fn time_remaining(deadline: DateTime<Utc>) -> TimeRemaining {
    time_remaining_at(deadline, Utc::now())
}

pub fn time_remaining_at(deadline: DateTime<Utc>, now: DateTime<Utc>) -> TimeRemaining {
    if deadline <= now {
        return TimeRemaining::EXPIRED;
    }

    // Positive here, so truncation is a floor
    let total_seconds = (deadline - now).num_seconds().max(0) as u64;

    TimeRemaining {
        expired: false,
        hours: total_seconds / 3600,
        minutes: (total_seconds % 3600) / 60,
        seconds: total_seconds % 60,
        total_minutes: total_seconds / 60,
    }
}

pub fn format_remaining(deadline: DateTime<Utc>) -> String {
    format_remaining_at(deadline, Utc::now())
}

/// Render the countdown using the largest non-zero unit pair.
pub fn format_remaining_at(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = time_remaining_at(deadline, now);

    if remaining.expired {
        "Expired".to_string()
    } else if remaining.hours > 0 {
        format!("{}h {}m remaining", remaining.hours, remaining.minutes)
    } else if remaining.minutes > 0 {
        format!("{}m {}s remaining", remaining.minutes, remaining.seconds)
    } else {
        format!("{}s remaining", remaining.seconds)
    }
}

pub fn is_approaching(deadline: DateTime<Utc>) -> bool {
    is_approaching_at(deadline, Utc::now())
}

pub fn is_approaching_at(deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let remaining = time_remaining_at(deadline, now);
    !remaining.expired && remaining.total_minutes < APPROACHING_THRESHOLD_MINUTES
}

pub fn is_critical(deadline: DateTime<Utc>) -> bool {
    is_critical_at(deadline, Utc::now())
}

pub fn is_critical_at(deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let remaining = time_remaining_at(deadline, now);
    !remaining.expired && remaining.total_minutes < CRITICAL_THRESHOLD_MINUTES
}

pub fn urgency_at(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Urgency {
    if deadline <= now {
        Urgency::Expired
    } else if is_critical_at(deadline, now) {
        Urgency::Critical
    } else if is_approaching_at(deadline, now) {
        Urgency::Approaching
    } else {
        Urgency::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    /// Builds a UTC instant from a local wall-clock time in `tz`.
    fn local(tz: &str, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        let tz: Tz = tz.parse().unwrap();
        tz.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_business_hours_boundaries() {
        assert!(!is_within_business_hours(local("Europe/Berlin", 2024, 3, 12, 7, 59), "Europe/Berlin"));
        assert!(is_within_business_hours(local("Europe/Berlin", 2024, 3, 12, 8, 0), "Europe/Berlin"));
        assert!(is_within_business_hours(local("Europe/Berlin", 2024, 3, 12, 21, 59), "Europe/Berlin"));
        assert!(!is_within_business_hours(local("Europe/Berlin", 2024, 3, 12, 22, 0), "Europe/Berlin"));
    }

    #[test]
    fn test_business_hours_uses_local_time_not_utc() {
        // 03:00 UTC is 22:00 the previous evening in New York (EST)
        let instant = utc(2024, 1, 15, 3, 0, 0);
        assert!(!is_within_business_hours(instant, "America/New_York"));
        // and 12:00 in Tokyo
        assert!(is_within_business_hours(instant, "Asia/Tokyo"));
    }

    #[test]
    fn test_business_hours_follows_dst() {
        // 12:30 UTC is 07:30 EST in winter and 08:30 EDT in summer
        assert!(!is_within_business_hours(utc(2024, 1, 15, 12, 30, 0), "America/New_York"));
        assert!(is_within_business_hours(utc(2024, 7, 15, 12, 30, 0), "America/New_York"));
    }

    #[test]
    fn test_unknown_timezone_fails_open() {
        let midnight_utc = utc(2024, 1, 15, 0, 0, 0);
        assert!(!is_within_business_hours(midnight_utc, "UTC"));
        assert!(is_within_business_hours(midnight_utc, "Mars/Olympus_Mons"));
        assert!(is_within_business_hours(midnight_utc, ""));
    }

    #[test]
    fn test_deadline_during_business_hours_is_twelve_hours() {
        let notified = local("Europe/London", 2024, 5, 2, 9, 0);
        assert_eq!(calculate_deadline(notified, "Europe/London"), notified + Duration::hours(12));
    }

    #[test]
    fn test_deadline_outside_business_hours_is_twenty_four_hours() {
        let notified = local("Europe/London", 2024, 5, 2, 23, 0);
        assert_eq!(calculate_deadline(notified, "Europe/London"), notified + Duration::hours(24));
    }

    #[test]
    fn test_deadline_is_always_after_notification() {
        let base = utc(2024, 3, 31, 0, 0, 0);
        for tz in ["UTC", "Europe/Berlin", "America/Los_Angeles", "Asia/Kolkata", "bogus"] {
            for hour in 0..24 {
                let notified = base + Duration::hours(hour);
                let deadline = calculate_deadline(notified, tz);
                let window = deadline - notified;
                assert!(deadline > notified);
                if is_within_business_hours(notified, tz) {
                    assert_eq!(window, Duration::hours(12));
                } else {
                    assert_eq!(window, Duration::hours(24));
                }
            }
        }
    }

    #[test]
    fn test_time_remaining_expired_is_all_zero() {
        let now = utc(2024, 6, 1, 12, 0, 0);
        for deadline in [now, now - Duration::seconds(1), now - Duration::days(3)] {
            let remaining = time_remaining_at(deadline, now);
            assert!(remaining.expired);
            assert_eq!(remaining.hours, 0);
            assert_eq!(remaining.minutes, 0);
            assert_eq!(remaining.seconds, 0);
            assert_eq!(remaining.total_minutes, 0);
        }
    }

    #[test]
    fn test_time_remaining_breakdown() {
        let now = utc(2024, 6, 1, 12, 0, 0);
        let deadline = now + Duration::hours(5) + Duration::minutes(7) + Duration::seconds(9);
        let remaining = time_remaining_at(deadline, now);

        assert!(!remaining.expired);
        assert_eq!((remaining.hours, remaining.minutes, remaining.seconds), (5, 7, 9));
        assert_eq!(remaining.total_minutes, 307);
        assert_eq!(remaining.total_seconds(), 5 * 3600 + 7 * 60 + 9);
    }

    #[test]
    fn test_time_remaining_floors_subsecond_remainder() {
        let now = utc(2024, 6, 1, 12, 0, 0);
        let deadline = now + Duration::milliseconds(90_750);
        let remaining = time_remaining_at(deadline, now);
        assert_eq!(remaining.total_seconds(), 90);
    }

    #[test]
    fn test_format_remaining_prefers_largest_units() {
        let now = utc(2024, 6, 1, 12, 0, 0);
        assert_eq!(format_remaining_at(now + Duration::minutes(119), now), "1h 59m remaining");
        assert_eq!(format_remaining_at(now + Duration::seconds(125), now), "2m 5s remaining");
        assert_eq!(format_remaining_at(now + Duration::seconds(42), now), "42s remaining");
        assert_eq!(format_remaining_at(now, now), "Expired");
        assert_eq!(format_remaining_at(now - Duration::hours(1), now), "Expired");
    }

    #[test]
    fn test_approaching_and_critical_thresholds() {
        let now = utc(2024, 6, 1, 12, 0, 0);

        assert!(!is_approaching_at(now + Duration::minutes(120), now));
        assert!(is_approaching_at(now + Duration::minutes(119), now));
        assert!(!is_critical_at(now + Duration::minutes(30), now));
        assert!(is_critical_at(now + Duration::minutes(29), now));

        assert!(!is_approaching_at(now - Duration::minutes(1), now));
        assert!(!is_critical_at(now, now));
    }

    #[test]
    fn test_urgency_levels() {
        let now = utc(2024, 6, 1, 12, 0, 0);
        assert_eq!(urgency_at(now + Duration::hours(6), now), Urgency::Normal);
        assert_eq!(urgency_at(now + Duration::minutes(90), now), Urgency::Approaching);
        assert_eq!(urgency_at(now + Duration::minutes(10), now), Urgency::Critical);
        assert_eq!(urgency_at(now, now), Urgency::Expired);
    }

    #[test]
    fn test_wall_clock_variants_agree_on_far_deadlines() {
        let far = Utc::now() + Duration::days(2);
        assert!(!time_remaining(far).expired);
        assert!(format_remaining(far).ends_with("remaining"));
        assert!(!is_approaching(far));
        assert!(!is_critical(far));

        let past = Utc::now() - Duration::minutes(1);
        assert!(time_remaining(past).expired);
        assert_eq!(format_remaining(past), "Expired");
    }
}
