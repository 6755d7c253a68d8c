//! Host integration.
//!
//! The scheduler only talks to a [`Host`]: something that can tell the time,
//! arrange a future call to the scheduler's flush entry point and say whether
//! the current frame is used up. Three hosts ship with the crate:
//!
//! - [`FrameHost`] aligns flushes with the display refresh and measures the
//!   frame rate to budget each flush.
//! - [`TimerHost`] is the fallback when a [`Platform`] lacks frame callbacks.
//!   It never asks callbacks to yield.
//! - [`InjectedHost`] is assembled from closures, for embedders and tests that
//!   drive the scheduler by hand.

use crate::config::FrameConfig;
use crate::error::SchedulerError;
use std::cell::Cell;
use std::rc::Rc;

pub mod frame;
pub mod injected;
pub mod timer;
#[cfg(feature = "web")]
pub mod web;

pub use frame::{FrameBudget, FrameHost};
pub use injected::InjectedHost;
pub use timer::TimerHost;
#[cfg(feature = "web")]
pub use web::WebPlatform;

/// The scheduler's flush entry point. The argument tells the scheduler the
/// wake-up happened because the requested deadline passed.
pub type FlushCallback = Rc<dyn Fn(bool)>;

pub trait Host {
    /// Monotonic time in milliseconds.
    fn now(&self) -> f64;

    /// Arranges for `callback` to run later. `absolute_timeout` is the
    /// expiration time of the most urgent pending task; once it passes the
    /// host should invoke the callback with `true`.
    ///
    /// Replaces any previously requested callback.
    fn request_host_callback(&self, callback: FlushCallback, absolute_timeout: f64);

    /// Drops the pending callback. Must be a no-op if it already ran.
    fn cancel_host_callback(&self);

    /// Whether the host needs control back, e.g. the frame budget is spent.
    fn should_yield_to_host(&self) -> bool;
}

/// Opaque id for a frame callback or timer issued by a [`Platform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// Primitives of the environment the scheduler is embedded in.
///
/// Callbacks passed in are invoked at most once, on the same thread.
pub trait Platform {
    fn now(&self) -> f64;

    /// Calls `callback` with the frame timestamp before the next repaint.
    fn request_frame_callback(&self, callback: Box<dyn FnOnce(f64)>) -> TimerHandle;

    fn cancel_frame_callback(&self, handle: TimerHandle);

    /// Runs `callback` after the current synchronous work, before paint.
    fn post_soon(&self, callback: Box<dyn FnOnce()>);

    fn set_timer(&self, callback: Box<dyn FnOnce()>, delay: f64) -> TimerHandle;

    /// Cancelling a timer that already fired is a no-op.
    fn cancel_timer(&self, handle: TimerHandle);

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}

/// Which optional primitives a [`Platform`] really provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub frame_callbacks: bool,
    pub cancel_frame_callbacks: bool,
    pub post_soon: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            frame_callbacks: true,
            cancel_frame_callbacks: true,
            post_soon: true,
        }
    }
}

impl Capabilities {
    pub fn check(&self) -> Result<(), SchedulerError> {
        if !self.frame_callbacks {
            return Err(SchedulerError::MissingPrimitive("frame callbacks"));
        }
        if !self.cancel_frame_callbacks {
            return Err(SchedulerError::MissingPrimitive("cancelling frame callbacks"));
        }
        if !self.post_soon {
            return Err(SchedulerError::MissingPrimitive("post-soon callbacks"));
        }
        Ok(())
    }
}

/// Picks the best host the platform supports.
///
/// A missing primitive is reported once here; the scheduler then runs on
/// plain timers.
pub fn select_host(platform: Rc<dyn Platform>, config: FrameConfig) -> Rc<dyn Host> {
    match FrameHost::try_new(platform.clone(), config) {
        Ok(host) => host,
        Err(err) => {
            tracing::error!(%err, "frame-aligned scheduling unavailable");
            TimerHost::new(platform)
        }
    }
}

/// Clears a flag when dropped, so it is reset even if a callback panics.
pub(crate) struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    pub(crate) fn set(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
