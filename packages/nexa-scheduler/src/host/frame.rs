use super::{FlagGuard, FlushCallback, Host, Platform, TimerHandle};
use crate::config::FrameConfig;
use crate::error::SchedulerError;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Rolling estimate of the display's frame time.
///
/// Starts from [`FrameConfig::initial_frame_time`] and only moves towards a
/// faster rate after two consecutive frames come in shorter than the current
/// estimate, so one early frame does not shrink the budget.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBudget {
    frame_deadline: f64,
    previous_frame_time: f64,
    active_frame_time: f64,
    min_frame_time: f64,
}

impl FrameBudget {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            frame_deadline: 0.0,
            previous_frame_time: config.initial_frame_time,
            active_frame_time: config.initial_frame_time,
            min_frame_time: config.min_frame_time,
        }
    }

    /// Records a frame starting at `frame_time` and moves the deadline to
    /// `frame_time + active_frame_time`.
    pub fn on_animation_frame(&mut self, frame_time: f64) {
        // The last deadline was the last frame time plus the estimate, so
        // this is the measured time since the last frame.
        let mut next_frame_time = frame_time - self.frame_deadline + self.active_frame_time;

        if next_frame_time < self.active_frame_time
            && self.previous_frame_time < self.active_frame_time
        {
            if next_frame_time < self.min_frame_time {
                next_frame_time = self.min_frame_time;
            }
            let revised = next_frame_time.max(self.previous_frame_time);
            tracing::debug!(
                from = self.active_frame_time,
                to = revised,
                "revised frame time estimate"
            );
            self.active_frame_time = revised;
        } else {
            self.previous_frame_time = next_frame_time;
        }

        self.frame_deadline = frame_time + self.active_frame_time;
    }

    pub fn frame_deadline(&self) -> f64 {
        self.frame_deadline
    }

    pub fn active_frame_time(&self) -> f64 {
        self.active_frame_time
    }

    pub fn time_remaining(&self, now: f64) -> f64 {
        self.frame_deadline - now
    }

    pub fn is_expired(&self, now: f64) -> bool {
        now > self.frame_deadline
    }
}

/// Host that runs flushes right after a frame callback, within that frame's
/// budget.
///
/// A frame callback arms the budget and posts a message; the message handler
/// runs the flush. Each frame request is paired with a fallback timer so
/// work still progresses when the platform stops delivering frames, such as
/// in a background tab. Whichever fires first cancels the other.
pub struct FrameHost {
    platform: Rc<dyn Platform>,
    config: FrameConfig,
    this: Weak<FrameHost>,

    scheduled_host_callback: RefCell<Option<FlushCallback>>,
    timeout_time: Cell<Option<f64>>,
    is_message_event_scheduled: Cell<bool>,
    is_animation_frame_scheduled: Cell<bool>,
    is_flushing_host_callback: Cell<bool>,

    budget: RefCell<FrameBudget>,
    frame_handle: Cell<Option<TimerHandle>>,
    fallback_timer: Cell<Option<TimerHandle>>,
}

impl FrameHost {
    /// Fails if the platform cannot deliver or cancel frame callbacks, or
    /// cannot post messages.
    pub fn try_new(
        platform: Rc<dyn Platform>,
        config: FrameConfig,
    ) -> Result<Rc<Self>, SchedulerError> {
        platform.capabilities().check()?;

        Ok(Rc::new_cyclic(|this| Self {
            budget: RefCell::new(FrameBudget::new(&config)),
            platform,
            config,
            this: this.clone(),
            scheduled_host_callback: RefCell::new(None),
            timeout_time: Cell::new(None),
            is_message_event_scheduled: Cell::new(false),
            is_animation_frame_scheduled: Cell::new(false),
            is_flushing_host_callback: Cell::new(false),
            frame_handle: Cell::new(None),
            fallback_timer: Cell::new(None),
        }))
    }

    pub fn budget(&self) -> FrameBudget {
        self.budget.borrow().clone()
    }

    fn post_message(&self) {
        let this = self.this.clone();
        self.platform.post_soon(Box::new(move || {
            if let Some(host) = this.upgrade() {
                host.on_message();
            }
        }));
    }

    fn on_message(&self) {
        self.is_message_event_scheduled.set(false);

        let previous_callback = self.scheduled_host_callback.borrow_mut().take();
        let previous_timeout = self.timeout_time.take();

        let current_time = self.platform.now();
        let mut did_timeout = false;

        if self.budget.borrow().time_remaining(current_time) <= 0.0 {
            // No time left in this frame.
            if previous_timeout.is_some_and(|timeout| timeout <= current_time) {
                // The deadline passed too, so flush anyway.
                did_timeout = true;
            } else {
                // Try again next frame.
                if !self.is_animation_frame_scheduled.replace(true) {
                    self.request_animation_frame_with_timeout();
                }
                *self.scheduled_host_callback.borrow_mut() = previous_callback;
                self.timeout_time.set(previous_timeout);
                return;
            }
        }

        if let Some(callback) = previous_callback {
            let _flushing = FlagGuard::set(&self.is_flushing_host_callback);
            callback(did_timeout);
        }
    }

    fn animation_tick(&self, frame_time: f64) {
        if self.scheduled_host_callback.borrow().is_some() {
            // Ask for the next frame now; this one may be cut short.
            self.request_animation_frame_with_timeout();
        } else {
            self.is_animation_frame_scheduled.set(false);
            return;
        }

        self.budget.borrow_mut().on_animation_frame(frame_time);

        if !self.is_message_event_scheduled.replace(true) {
            self.post_message();
        }
    }

    fn request_animation_frame_with_timeout(&self) {
        let this = self.this.clone();
        let frame = self.platform.request_frame_callback(Box::new(move |timestamp| {
            if let Some(host) = this.upgrade() {
                host.frame_handle.set(None);
                if let Some(timer) = host.fallback_timer.take() {
                    host.platform.cancel_timer(timer);
                }
                host.animation_tick(timestamp);
            }
        }));
        self.frame_handle.set(Some(frame));

        let this = self.this.clone();
        let timer = self.platform.set_timer(
            Box::new(move || {
                if let Some(host) = this.upgrade() {
                    host.fallback_timer.set(None);
                    if let Some(frame) = host.frame_handle.take() {
                        host.platform.cancel_frame_callback(frame);
                    }
                    tracing::debug!("frame callback timed out, ticking from timer");
                    let now = host.platform.now();
                    host.animation_tick(now);
                }
            }),
            self.config.animation_frame_timeout,
        );
        self.fallback_timer.set(Some(timer));
    }
}

impl Host for FrameHost {
    fn now(&self) -> f64 {
        self.platform.now()
    }

    fn request_host_callback(&self, callback: FlushCallback, absolute_timeout: f64) {
        *self.scheduled_host_callback.borrow_mut() = Some(callback);
        self.timeout_time.set(Some(absolute_timeout));

        if self.is_flushing_host_callback.get() || absolute_timeout < 0.0 {
            // Mid-flush, or already expired: don't wait for the next frame.
            self.post_message();
        } else if !self.is_animation_frame_scheduled.replace(true) {
            self.request_animation_frame_with_timeout();
        }
    }

    fn cancel_host_callback(&self) {
        self.scheduled_host_callback.borrow_mut().take();
        self.is_message_event_scheduled.set(false);
        self.timeout_time.set(None);
    }

    fn should_yield_to_host(&self) -> bool {
        self.budget.borrow().is_expired(self.platform.now())
    }
}
