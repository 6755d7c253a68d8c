#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Largest signed 31 bit integer. Idle callbacks expire this far in the future.
pub const MAX_SIGNED_31_BIT_INT: f64 = 1_073_741_823.0;

/// Per-priority expiration offsets, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct SchedulerConfig {
    pub immediate_timeout: f64,
    pub user_blocking_timeout: f64,
    pub normal_timeout: f64,
    pub low_timeout: f64,
    pub idle_timeout: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            // Negative so immediate work is expired the moment it is scheduled.
            immediate_timeout: -1.0,
            user_blocking_timeout: 250.0,
            normal_timeout: 5000.0,
            low_timeout: 10000.0,
            idle_timeout: MAX_SIGNED_31_BIT_INT,
        }
    }
}

/// Tuning for the frame-aligned host.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct FrameConfig {
    /// Starting frame time estimate. 33ms assumes 30fps until measured.
    pub initial_frame_time: f64,
    /// Floor for the estimate. Anything faster than ~120Hz is treated as noise.
    pub min_frame_time: f64,
    /// How long to wait for a frame callback before the fallback timer fires.
    pub animation_frame_timeout: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            initial_frame_time: 33.0,
            min_frame_time: 8.0,
            animation_frame_timeout: 100.0,
        }
    }
}
