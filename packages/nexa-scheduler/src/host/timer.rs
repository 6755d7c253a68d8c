use super::{FlagGuard, FlushCallback, Host, Platform, TimerHandle};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Host for platforms without frame callbacks.
///
/// Every wake-up is a zero-delay timer and flushes never yield, so a flush
/// drains the whole queue. Yielding granularity is whatever the callbacks
/// themselves decide.
pub struct TimerHost {
    platform: Rc<dyn Platform>,
    this: Weak<TimerHost>,
    scheduled_callback: RefCell<Option<FlushCallback>>,
    timeout_time: Cell<f64>,
    timer: Cell<Option<TimerHandle>>,
    /// Re-request parked while a flush was running. Any newer request or a
    /// cancel supersedes it.
    deferred: Cell<Option<TimerHandle>>,
    is_flushing: Cell<bool>,
}

impl TimerHost {
    pub fn new(platform: Rc<dyn Platform>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            platform,
            this: this.clone(),
            scheduled_callback: RefCell::new(None),
            timeout_time: Cell::new(-1.0),
            timer: Cell::new(None),
            deferred: Cell::new(None),
            is_flushing: Cell::new(false),
        })
    }

    fn flush(&self) {
        self.timer.set(None);
        let Some(callback) = self.scheduled_callback.borrow_mut().take() else {
            return;
        };
        let did_timeout = self.timeout_time.get() <= self.platform.now();

        let _flushing = FlagGuard::set(&self.is_flushing);
        callback(did_timeout);
    }

    fn drop_deferred(&self) {
        if let Some(deferred) = self.deferred.take() {
            self.platform.cancel_timer(deferred);
        }
    }
}

impl Host for TimerHost {
    fn now(&self) -> f64 {
        self.platform.now()
    }

    fn request_host_callback(&self, callback: FlushCallback, absolute_timeout: f64) {
        self.drop_deferred();

        if self.is_flushing.get() {
            // Still unwinding the current flush; ask again on the next turn.
            let this = self.this.clone();
            let handle = self.platform.set_timer(
                Box::new(move || {
                    if let Some(host) = this.upgrade() {
                        host.deferred.set(None);
                        host.request_host_callback(callback, absolute_timeout);
                    }
                }),
                0.0,
            );
            self.deferred.set(Some(handle));
            return;
        }

        *self.scheduled_callback.borrow_mut() = Some(callback);
        self.timeout_time.set(absolute_timeout);

        if let Some(previous) = self.timer.take() {
            self.platform.cancel_timer(previous);
        }
        let this = self.this.clone();
        let handle = self.platform.set_timer(
            Box::new(move || {
                if let Some(host) = this.upgrade() {
                    host.flush();
                }
            }),
            0.0,
        );
        self.timer.set(Some(handle));
    }

    fn cancel_host_callback(&self) {
        self.drop_deferred();
        self.scheduled_callback.borrow_mut().take();
    }

    fn should_yield_to_host(&self) -> bool {
        false
    }
}
