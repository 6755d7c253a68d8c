//! Cooperative, priority-aware scheduling for Nexa.
//!
//! Work is submitted as callbacks tagged with a [`PriorityLevel`]. The
//! [`Scheduler`] keeps them ordered by expiration time and interleaves them
//! with the host's own frame loop: each flush runs until the frame budget is
//! spent, except that callbacks whose deadline already passed run regardless,
//! so nothing starves under load.
//!
//! ```ignore
//! let scheduler = Scheduler::from_platform(platform);
//! scheduler.run_with_priority(PriorityLevel::UserBlocking, || {
//!     scheduler.schedule_callback(|_did_timeout| render_input());
//! });
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod priority;
pub mod queue;
pub mod scheduler;
pub mod task;

pub use config::{FrameConfig, MAX_SIGNED_31_BIT_INT, SchedulerConfig};
pub use error::SchedulerError;
pub use host::{
    Capabilities, FlushCallback, FrameBudget, FrameHost, Host, InjectedHost, Platform,
    TimerHandle, TimerHost, select_host,
};
pub use priority::PriorityLevel;
pub use scheduler::Scheduler;
pub use task::{CallbackOptions, TaskCallback, TaskHandle, TaskResult};

#[cfg(feature = "web")]
pub use host::WebPlatform;
