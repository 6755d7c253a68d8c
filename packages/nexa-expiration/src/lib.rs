//! Expiration times for batching updates.
//!
//! An [`ExpirationTime`] is a coarse, *inverted* reading of the monotonic
//! clock: it counts down in units of [`UNIT_SIZE`] milliseconds from
//! [`MAGIC_NUMBER_OFFSET`], so a larger value means a higher priority.
//!
//! This is the opposite of the convention used by `nexa-scheduler`, whose
//! deadlines are plain clock readings in milliseconds where a smaller value
//! expires sooner. Convert with [`expiration_time_to_ms`] before handing a
//! bucketed deadline to the scheduler.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Inverted, bucketed point in time. Larger = more urgent.
pub type ExpirationTime = u32;

/// Largest integer that fits in a signed 31 bit slot. Every expiration time
/// stays below this so it can be packed next to a sign bit by callers.
pub const MAX_SIGNED_31_BIT_INT: u32 = 1_073_741_823;

/// No pending work.
pub const NO_WORK: ExpirationTime = 0;
/// Work that may be deferred forever.
pub const NEVER: ExpirationTime = 1;
/// Work that must run synchronously. Outranks every clock-derived value.
pub const SYNC: ExpirationTime = MAX_SIGNED_31_BIT_INT;

/// Milliseconds per expiration-time unit.
pub const UNIT_SIZE: u32 = 10;

/// Keeps clock-derived values clear of [`SYNC`].
pub const MAGIC_NUMBER_OFFSET: u32 = MAX_SIGNED_31_BIT_INT - 1;

/// Window and bucket granularity used by [`compute_expiration_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ExpirationPolicy {
    /// How far in the future the deadline lands, in milliseconds.
    pub expiration_ms: u32,
    /// Granularity deadlines are rounded up to, in milliseconds.
    pub bucket_size_ms: u32,
}

impl ExpirationPolicy {
    /// Low urgency: 5s window, 250ms buckets.
    pub const LOW_PRIORITY: Self = Self {
        expiration_ms: LOW_PRIORITY_EXPIRATION,
        bucket_size_ms: LOW_PRIORITY_BATCH_SIZE,
    };

    /// High urgency: a short window with 100ms buckets.
    pub const HIGH_PRIORITY: Self = Self {
        expiration_ms: HIGH_PRIORITY_EXPIRATION,
        bucket_size_ms: HIGH_PRIORITY_BATCH_SIZE,
    };

    pub fn compute(&self, current_time: ExpirationTime) -> ExpirationTime {
        compute_expiration_bucket(current_time, self.expiration_ms, self.bucket_size_ms)
    }
}

pub const LOW_PRIORITY_EXPIRATION: u32 = 5000;
pub const LOW_PRIORITY_BATCH_SIZE: u32 = 250;

// Debug builds run slower, so interactive updates get a longer window there.
// A blocked main thread then shows up as jank to fix instead of a flood of
// expired work. Release builds expire fast for better UX.
#[cfg(debug_assertions)]
pub const HIGH_PRIORITY_EXPIRATION: u32 = 500;
#[cfg(not(debug_assertions))]
pub const HIGH_PRIORITY_EXPIRATION: u32 = 150;
pub const HIGH_PRIORITY_BATCH_SIZE: u32 = 100;

/// Converts a monotonic clock reading (milliseconds) into an expiration time.
///
/// Readings are truncated to whole units, so anything inside the same 10ms
/// slot maps to the same value.
pub fn ms_to_expiration_time(ms: f64) -> ExpirationTime {
    // `as` saturates: negative readings clamp to 0, huge ones to u32::MAX.
    let units = (ms / UNIT_SIZE as f64) as u32;
    MAGIC_NUMBER_OFFSET.saturating_sub(units)
}

/// Inverse of [`ms_to_expiration_time`], back to milliseconds on the clock.
///
/// [`SYNC`] lies above the offset and comes back negative.
pub fn expiration_time_to_ms(expiration_time: ExpirationTime) -> f64 {
    (MAGIC_NUMBER_OFFSET as f64 - expiration_time as f64) * UNIT_SIZE as f64
}

/// Rounds `num` up to the next multiple of `precision`.
///
/// An exact multiple still advances to the following one:
/// `ceiling(1000, 25) == 1025`. A `precision` of zero counts as one.
pub fn ceiling(num: u32, precision: u32) -> u32 {
    let precision = precision.max(1);
    (num / precision).saturating_add(1).saturating_mul(precision)
}

/// Places a deadline `expiration_in_ms` after `current_time` and rounds it
/// into a bucket of `bucket_size_ms`, so updates requested close together
/// share the same expiration time.
///
/// Durations need not be multiples of [`UNIT_SIZE`]: the bucket math runs on
/// fractional units and the bucketed deadline is rounded up to the next whole
/// unit, so it never lands earlier than the bucket boundary. A zero bucket
/// size is treated as 1ms.
pub fn compute_expiration_bucket(
    current_time: ExpirationTime,
    expiration_in_ms: u32,
    bucket_size_ms: u32,
) -> ExpirationTime {
    let unit = UNIT_SIZE as f64;
    let elapsed_units = MAGIC_NUMBER_OFFSET.saturating_sub(current_time) as f64;
    let deadline_units = elapsed_units + expiration_in_ms as f64 / unit;
    let bucket_units = bucket_size_ms.max(1) as f64 / unit;
    let bucketed = ((deadline_units / bucket_units).floor() + 1.0) * bucket_units;
    // `as` saturates, so a deadline past the offset clamps to NO_WORK below.
    MAGIC_NUMBER_OFFSET.saturating_sub(bucketed.ceil() as u32)
}

/// Low urgency deadline, see [`ExpirationPolicy::LOW_PRIORITY`].
pub fn compute_async_expiration(current_time: ExpirationTime) -> ExpirationTime {
    ExpirationPolicy::LOW_PRIORITY.compute(current_time)
}

/// High urgency deadline, see [`ExpirationPolicy::HIGH_PRIORITY`].
pub fn compute_interactive_expiration(current_time: ExpirationTime) -> ExpirationTime {
    ExpirationPolicy::HIGH_PRIORITY.compute(current_time)
}
