use crate::config::SchedulerConfig;
use crate::error::SchedulerError;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Relative urgency of a scheduled callback. Lower ordinal = more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PriorityLevel {
    /// Already expired when scheduled; drained before control returns to the caller.
    Immediate = 1,
    /// Input handling and other work the user is waiting on.
    UserBlocking = 2,
    #[default]
    Normal = 3,
    Low = 4,
    /// Never expires.
    Idle = 5,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 5] = [
        PriorityLevel::Immediate,
        PriorityLevel::UserBlocking,
        PriorityLevel::Normal,
        PriorityLevel::Low,
        PriorityLevel::Idle,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Maps an ordinal to a level, falling back to [`PriorityLevel::Normal`]
    /// for anything out of range.
    pub fn from_ordinal(ordinal: u8) -> Self {
        Self::try_from(ordinal).unwrap_or_default()
    }

    /// Offset added to the start time to get a callback's expiration time.
    pub fn timeout(self, config: &SchedulerConfig) -> f64 {
        match self {
            PriorityLevel::Immediate => config.immediate_timeout,
            PriorityLevel::UserBlocking => config.user_blocking_timeout,
            PriorityLevel::Normal => config.normal_timeout,
            PriorityLevel::Low => config.low_timeout,
            PriorityLevel::Idle => config.idle_timeout,
        }
    }
}

impl TryFrom<u8> for PriorityLevel {
    type Error = SchedulerError;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        match ordinal {
            1 => Ok(PriorityLevel::Immediate),
            2 => Ok(PriorityLevel::UserBlocking),
            3 => Ok(PriorityLevel::Normal),
            4 => Ok(PriorityLevel::Low),
            5 => Ok(PriorityLevel::Idle),
            other => Err(SchedulerError::InvalidPriority(other)),
        }
    }
}
