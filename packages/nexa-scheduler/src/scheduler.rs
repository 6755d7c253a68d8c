use crate::config::{FrameConfig, SchedulerConfig};
use crate::host::{FlushCallback, Host, Platform, select_host};
use crate::priority::PriorityLevel;
use crate::queue::{Placement, TaskList};
use crate::task::{CallbackOptions, Task, TaskHandle, TaskResult, boxed};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Ambient state shared by every entry point.
///
/// Only ever touched from the scheduler's own thread, so plain cells are
/// enough. Every entry point that changes a field restores it through a
/// drop guard.
struct RunState {
    current_priority_level: Cell<PriorityLevel>,
    /// Start time of the enclosing `run_with_priority` scope, if any. Work
    /// scheduled inside one scope shares this as its notion of "now".
    current_event_start_time: Cell<Option<f64>>,
    /// Expiration time of the callback currently running.
    current_expiration_time: Cell<Option<f64>>,
    current_did_timeout: Cell<bool>,
    /// Set while a flush runs; wake-ups are re-armed when it finishes.
    is_executing_callback: Cell<bool>,
    is_host_callback_scheduled: Cell<bool>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            current_priority_level: Cell::new(PriorityLevel::Normal),
            current_event_start_time: Cell::new(None),
            current_expiration_time: Cell::new(None),
            current_did_timeout: Cell::new(false),
            is_executing_callback: Cell::new(false),
            is_host_callback_scheduled: Cell::new(false),
        }
    }
}

/// Cooperative scheduler for deferrable work.
///
/// Callbacks are ordered by expiration time, which is derived from the
/// ambient priority level when they are scheduled. The host decides when to
/// flush; a flush runs callbacks until the host wants control back, or, if
/// the flush was forced by a deadline, until nothing expired is left.
///
/// Nothing preempts a running callback. Long work should poll
/// [`should_yield`](Self::should_yield) and return a continuation.
pub struct Scheduler {
    host: Rc<dyn Host>,
    config: SchedulerConfig,
    tasks: RefCell<TaskList>,
    state: RunState,
    flush_callback: FlushCallback,
}

impl Scheduler {
    pub fn new(host: Rc<dyn Host>) -> Rc<Self> {
        Self::with_config(host, SchedulerConfig::default())
    }

    pub fn with_config(host: Rc<dyn Host>, config: SchedulerConfig) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let this = this.clone();
            let flush_callback: FlushCallback = Rc::new(move |did_timeout| {
                if let Some(scheduler) = this.upgrade() {
                    scheduler.flush_work(did_timeout);
                }
            });

            Self {
                host,
                config,
                tasks: RefCell::new(TaskList::new()),
                state: RunState::default(),
                flush_callback,
            }
        })
    }

    /// Builds a scheduler on the best host `platform` supports.
    pub fn from_platform(platform: Rc<dyn Platform>) -> Rc<Self> {
        Self::new(select_host(platform, FrameConfig::default()))
    }

    pub fn now(&self) -> f64 {
        self.host.now()
    }

    pub fn get_current_priority_level(&self) -> PriorityLevel {
        self.state.current_priority_level.get()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn first_expiration_time(&self) -> Option<f64> {
        self.tasks.borrow().first_expiration_time()
    }

    pub fn is_host_callback_scheduled(&self) -> bool {
        self.state.is_host_callback_scheduled.get()
    }

    /// Queues `callback` at the current priority level.
    pub fn schedule_callback<F, R>(&self, callback: F) -> TaskHandle
    where
        F: FnOnce(bool) -> R + 'static,
        R: Into<TaskResult>,
    {
        self.schedule_callback_with_options(callback, CallbackOptions::default())
    }

    pub fn schedule_callback_with_options<F, R>(
        &self,
        callback: F,
        options: CallbackOptions,
    ) -> TaskHandle
    where
        F: FnOnce(bool) -> R + 'static,
        R: Into<TaskResult>,
    {
        let start_time = match self.state.current_event_start_time.get() {
            Some(start_time) => start_time,
            None => self.host.now(),
        };
        let priority_level = self.state.current_priority_level.get();
        let timeout = options
            .timeout
            .unwrap_or_else(|| priority_level.timeout(&self.config));
        let expiration_time = start_time + timeout;

        let inserted = self.tasks.borrow_mut().insert(
            Task {
                callback: boxed(callback),
                priority_level,
                expiration_time,
            },
            Placement::AfterPeers,
        );
        tracing::trace!(
            id = ?inserted.id,
            ?priority_level,
            expiration_time,
            is_first = inserted.is_first,
            "scheduled callback"
        );

        if inserted.is_first {
            self.ensure_host_callback_is_scheduled();
        }

        TaskHandle(inserted.id)
    }

    /// Removes a pending callback. Does nothing if it already ran or was
    /// cancelled. Any wake-up already arranged for it stays armed.
    pub fn cancel_callback(&self, handle: TaskHandle) {
        let removed = self.tasks.borrow_mut().remove(handle.0);
        if removed.is_some() {
            tracing::trace!(id = ?handle.0, "cancelled callback");
        }
    }

    /// Runs `event_handler` at `priority_level`.
    ///
    /// Callbacks scheduled inside share one start time. When the outermost
    /// scope exits, even by panic, any immediate priority work at the head of
    /// the queue is run before returning.
    pub fn run_with_priority<F, R>(&self, priority_level: PriorityLevel, event_handler: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _scope = EventScope::enter(self, priority_level);
        event_handler()
    }

    /// Like [`run_with_priority`](Self::run_with_priority), taking a raw
    /// ordinal. Unknown ordinals run at normal priority.
    pub fn run_with_priority_ordinal<F, R>(&self, ordinal: u8, event_handler: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.run_with_priority(PriorityLevel::from_ordinal(ordinal), event_handler)
    }

    /// Captures the current priority level. The returned function always
    /// runs `callback` at that level, whatever is current when it is called.
    pub fn wrap_callback<F, R>(self: &Rc<Self>, mut callback: F) -> impl FnMut() -> R + use<F, R>
    where
        F: FnMut() -> R + 'static,
    {
        let scheduler = Rc::clone(self);
        let parent_priority_level = self.state.current_priority_level.get();
        move || scheduler.run_with_priority(parent_priority_level, || callback())
    }

    /// Whether the running callback should return and let something else go.
    ///
    /// Never true inside a deadline-forced flush. Otherwise true when a more
    /// urgent callback is waiting or the host wants control back.
    pub fn should_yield(&self) -> bool {
        if self.state.current_did_timeout.get() {
            return false;
        }

        let preempted = match (
            self.first_expiration_time(),
            self.state.current_expiration_time.get(),
        ) {
            (Some(first), Some(current)) => first < current,
            _ => false,
        };

        preempted || self.host.should_yield_to_host()
    }

    /// Flush entry point handed to the host.
    ///
    /// With `did_timeout`, runs every callback whose deadline has passed,
    /// re-reading the clock after each batch since running them takes time.
    /// Otherwise runs callbacks in order until the host asks to yield.
    pub fn flush_work(&self, did_timeout: bool) {
        self.state.is_executing_callback.set(true);
        let previous_did_timeout = self.state.current_did_timeout.replace(did_timeout);
        let _flush = FlushScope {
            scheduler: self,
            previous_did_timeout,
        };

        tracing::debug!(did_timeout, pending = self.pending_count(), "flushing work");

        if did_timeout {
            while let Some(first) = self.first_expiration_time() {
                let current_time = self.host.now();
                if first > current_time {
                    break;
                }
                // Drain everything expired as of this reading.
                loop {
                    self.flush_first_callback();
                    match self.first_expiration_time() {
                        Some(next) if next <= current_time => continue,
                        _ => break,
                    }
                }
            }
        } else {
            while !self.tasks.borrow().is_empty() {
                self.flush_first_callback();
                if self.host.should_yield_to_host() {
                    break;
                }
            }
        }
    }

    fn ensure_host_callback_is_scheduled(&self) {
        if self.state.is_executing_callback.get() {
            // The running flush re-arms when it finishes.
            return;
        }

        let Some(expiration_time) = self.first_expiration_time() else {
            return;
        };

        if self.state.is_host_callback_scheduled.replace(true) {
            tracing::debug!(expiration_time, "preempting arranged host callback");
            self.host.cancel_host_callback();
        }

        tracing::debug!(expiration_time, "requesting host callback");
        self.host
            .request_host_callback(self.flush_callback.clone(), expiration_time);
    }

    fn reschedule_or_go_idle(&self) {
        if self.tasks.borrow().is_empty() {
            self.state.is_host_callback_scheduled.set(false);
        } else {
            self.ensure_host_callback_is_scheduled();
        }
    }

    fn flush_first_callback(&self) {
        let first = self.tasks.borrow_mut().pop_first();
        let Some(Task {
            callback,
            priority_level,
            expiration_time,
        }) = first
        else {
            return;
        };

        tracing::trace!(?priority_level, expiration_time, "running callback");

        let result = {
            let _callback_scope = CallbackScope {
                scheduler: self,
                previous_priority_level: self.state.current_priority_level.replace(priority_level),
                previous_expiration_time: self
                    .state
                    .current_expiration_time
                    .replace(Some(expiration_time)),
            };
            callback(self.state.current_did_timeout.get())
        };

        let TaskResult::Continue(continuation) = result else {
            return;
        };

        let inserted = self.tasks.borrow_mut().insert(
            Task {
                callback: continuation,
                priority_level,
                expiration_time,
            },
            Placement::BeforePeers,
        );
        tracing::trace!(id = ?inserted.id, expiration_time, "queued continuation");

        if inserted.is_first && !inserted.was_empty {
            self.ensure_host_callback_is_scheduled();
        }
    }

    fn flush_immediate_work(&self) {
        // Only the outermost scope drains.
        if self.state.current_event_start_time.get().is_some() || !self.first_is_immediate() {
            return;
        }

        let _drain = ImmediateScope {
            scheduler: self,
            previous_executing: self.state.is_executing_callback.replace(true),
        };
        loop {
            self.flush_first_callback();
            if !self.first_is_immediate() {
                break;
            }
        }
    }

    fn first_is_immediate(&self) -> bool {
        self.tasks.borrow().first_priority_level() == Some(PriorityLevel::Immediate)
    }
}

/// Restores the ambient priority and expiration time after a callback.
struct CallbackScope<'a> {
    scheduler: &'a Scheduler,
    previous_priority_level: PriorityLevel,
    previous_expiration_time: Option<f64>,
}

impl Drop for CallbackScope<'_> {
    fn drop(&mut self) {
        let state = &self.scheduler.state;
        state.current_priority_level.set(self.previous_priority_level);
        state.current_expiration_time.set(self.previous_expiration_time);
    }
}

struct EventScope<'a> {
    scheduler: &'a Scheduler,
    previous_priority_level: PriorityLevel,
    previous_event_start_time: Option<f64>,
}

impl<'a> EventScope<'a> {
    fn enter(scheduler: &'a Scheduler, priority_level: PriorityLevel) -> Self {
        let state = &scheduler.state;
        let now = scheduler.host.now();
        Self {
            scheduler,
            previous_priority_level: state.current_priority_level.replace(priority_level),
            previous_event_start_time: state.current_event_start_time.replace(Some(now)),
        }
    }
}

impl Drop for EventScope<'_> {
    fn drop(&mut self) {
        let state = &self.scheduler.state;
        state.current_priority_level.set(self.previous_priority_level);
        state
            .current_event_start_time
            .set(self.previous_event_start_time);
        self.scheduler.flush_immediate_work();
    }
}

struct FlushScope<'a> {
    scheduler: &'a Scheduler,
    previous_did_timeout: bool,
}

impl Drop for FlushScope<'_> {
    fn drop(&mut self) {
        let scheduler = self.scheduler;
        scheduler.state.is_executing_callback.set(false);
        scheduler
            .state
            .current_did_timeout
            .set(self.previous_did_timeout);
        scheduler.reschedule_or_go_idle();
        scheduler.flush_immediate_work();
    }
}

struct ImmediateScope<'a> {
    scheduler: &'a Scheduler,
    previous_executing: bool,
}

impl Drop for ImmediateScope<'_> {
    fn drop(&mut self) {
        let state = &self.scheduler.state;
        state.is_executing_callback.set(self.previous_executing);
        // Nested inside a flush: that flush re-arms when it finishes.
        if !self.previous_executing {
            self.scheduler.reschedule_or_go_idle();
        }
    }
}
