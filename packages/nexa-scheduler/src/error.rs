use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("invalid priority level {0}, expected 1..=5")]
    InvalidPriority(u8),
    #[error("host platform does not support {0}, falling back to timers")]
    MissingPrimitive(&'static str),
}
