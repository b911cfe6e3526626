/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use chrono::{DateTime, Utc};

const NANOS_PER_SEC: i128 = 1_000_000_000;

pub const DEFAULT_PRECISION: Duration = Duration::from_nanos(1);

/// Round `time` to the nearest multiple of `precision` since the unix epoch.
///
/// Halfway values round up. A zero precision, or a result that is out of the
/// range of `DateTime<Utc>`, leaves the time untouched.
pub fn round_time(time: DateTime<Utc>, precision: Duration) -> DateTime<Utc> {
    let p = precision.as_nanos() as i128;
    if p <= 1 {
        return time;
    }

    let total = time.timestamp() as i128 * NANOS_PER_SEC + time.timestamp_subsec_nanos() as i128;
    let r = total.rem_euclid(p);
    if r == 0 {
        return time;
    }
    let rounded = if r + r < p { total - r } else { total + (p - r) };

    let secs = rounded.div_euclid(NANOS_PER_SEC);
    let nanos = rounded.rem_euclid(NANOS_PER_SEC) as u32;
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, nanos))
        .unwrap_or(time)
}

/// The precision a collector running at `interval` should use when none is
/// configured explicitly.
pub fn precision_for_interval(interval: Duration) -> Duration {
    if interval >= Duration::from_secs(1) {
        Duration::from_secs(1)
    } else if interval >= Duration::from_millis(1) {
        Duration::from_millis(1)
    } else if interval >= Duration::from_micros(1) {
        Duration::from_micros(1)
    } else {
        Duration::from_nanos(1)
    }
}
