use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Compute a duration from nanoseconds with saturation at [`Duration::MAX`].
///
/// Returns the saturated duration along with a flag indicating whether the
/// input exceeded the representable range.
pub fn saturating_duration_from_nanos(nanos: u128) -> (Duration, bool) {
    let seconds = nanos / NANOS_PER_SECOND;
    if seconds > u64::MAX as u128 {
        return (Duration::MAX, true);
    }

    let nanos_remainder = (nanos % NANOS_PER_SECOND) as u32;
    (Duration::new(seconds as u64, nanos_remainder), false)
}

/// Convert SystemTime to nanoseconds since UNIX_EPOCH
pub fn system_time_to_nanos(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos()
}

/// Wall-clock time elapsed between a stored timestamp and `now`.
///
/// Timestamps in the future (clock skew between CI machines) count as zero
/// age.
pub fn age_since(last_update_nanos: u128, now: SystemTime) -> Duration {
    let now_nanos = system_time_to_nanos(now);
    saturating_duration_from_nanos(now_nanos.saturating_sub(last_update_nanos)).0
}

/// Whether a record of the given age has outlived the rebuild interval.
///
/// The comparison is strict: a record exactly `interval_secs` old is still
/// fresh.
pub fn is_stale(age: Duration, interval_secs: u64) -> bool {
    age > Duration::from_secs(interval_secs)
}

/// Renders a duration as a short human string such as `2d 3h` or `45s`.
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    let (days, hours, minutes, seconds) = (
        secs / 86_400,
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60,
        secs % 60,
    );
    match (days, hours, minutes) {
        (0, 0, 0) => format!("{seconds}s"),
        (0, 0, _) => format!("{minutes}m {seconds}s"),
        (0, _, _) => format!("{hours}h {minutes}m"),
        _ => format!("{days}d {hours}h"),
    }
}
