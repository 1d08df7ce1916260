//! Round Clock
//! Mission: Derive canonical round ids from wall-clock time
//!
//! Every invocation recomputes its round from scratch - there is no retained
//! "current round" state anywhere in the process. Round ids are the local-time
//! bucket start formatted as `YYYYMMDDHHMM`, so lexicographic order over ids
//! equals chronological order over buckets.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, Timelike, Utc};

/// Round id wire format, e.g. `202509172227`.
pub const ROUND_ID_FORMAT: &str = "%Y%m%d%H%M";

/// Current time in the configured game timezone (a fixed UTC offset in
/// minutes; the production deployment uses +330 for IST). An out-of-range
/// offset falls back to UTC rather than failing the invocation.
pub fn local_now(tz_offset_minutes: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(tz_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

/// Start of the bucket containing `at`.
pub fn bucket_start(at: DateTime<FixedOffset>, bucket_minutes: u32) -> DateTime<FixedOffset> {
    let width = bucket_minutes.max(1);
    let truncated = at
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at);
    let excess = truncated.minute() % width;
    truncated - Duration::minutes(excess as i64)
}

/// Round id of the bucket containing `at`.
pub fn round_id(at: DateTime<FixedOffset>, bucket_minutes: u32) -> String {
    bucket_start(at, bucket_minutes)
        .format(ROUND_ID_FORMAT)
        .to_string()
}

/// Round id of a bucket that has already closed: `buckets_back = 1` is the
/// bucket that ended most recently relative to `now`, 2 the one before it,
/// and so on. Acting on `buckets_back >= 1` never touches a bucket that is
/// still open for play.
pub fn closed_round_id(now: DateTime<FixedOffset>, bucket_minutes: u32, buckets_back: u32) -> String {
    let width = bucket_minutes.max(1);
    let start = bucket_start(now, width) - Duration::minutes((width * buckets_back) as i64);
    start.format(ROUND_ID_FORMAT).to_string()
}

/// Seconds elapsed since the most recent bucket boundary. Used by the grace
/// gate: invocations arriving before the grace period elapses are no-ops.
pub fn seconds_past_boundary(now: DateTime<FixedOffset>, bucket_minutes: u32) -> i64 {
    (now - bucket_start(now, bucket_minutes)).num_seconds()
}

/// Seconds until the bucket containing `now` closes.
pub fn seconds_until_close(now: DateTime<FixedOffset>, bucket_minutes: u32) -> i64 {
    let width = bucket_minutes.max(1) as i64;
    width * 60 - seconds_past_boundary(now, bucket_minutes)
}

/// Validate a caller-supplied round id: exactly 12 digits, a real calendar
/// timestamp, and aligned to the game's bucket width.
pub fn validate_round_id(id: &str, bucket_minutes: u32) -> Result<(), String> {
    if id.len() != 12 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("round id '{id}' must be 12 digits (YYYYMMDDHHMM)"));
    }
    let parsed = NaiveDateTime::parse_from_str(id, ROUND_ID_FORMAT)
        .map_err(|_| format!("round id '{id}' is not a valid timestamp"))?;
    let width = bucket_minutes.max(1);
    if parsed.minute() % width != 0 {
        return Err(format!(
            "round id '{id}' is not aligned to a {width}-minute bucket"
        ));
    }
    Ok(())
}
