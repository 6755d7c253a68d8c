#![allow(dead_code)]

use nexa_scheduler::{Capabilities, FlushCallback, InjectedHost, Platform, Scheduler, TimerHandle};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub type Log = Rc<RefCell<Vec<&'static str>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Request(f64),
    Cancel,
}

#[derive(Default)]
pub struct HostState {
    pub time: Cell<f64>,
    pub yield_to_host: Cell<bool>,
    pub pending: RefCell<Option<(FlushCallback, f64)>>,
    pub calls: RefCell<Vec<HostCall>>,
}

/// Scheduler on an [`InjectedHost`] whose clock, budget and wake-ups are
/// driven by the test.
pub struct TestHost {
    pub state: Rc<HostState>,
    pub scheduler: Rc<Scheduler>,
}

impl TestHost {
    pub fn new() -> Self {
        init_tracing();
        let state = Rc::new(HostState::default());

        let host = InjectedHost::new(
            {
                let state = state.clone();
                move || state.time.get()
            },
            {
                let state = state.clone();
                move |callback, timeout| {
                    state.calls.borrow_mut().push(HostCall::Request(timeout));
                    *state.pending.borrow_mut() = Some((callback, timeout));
                }
            },
            {
                let state = state.clone();
                move || {
                    state.calls.borrow_mut().push(HostCall::Cancel);
                    state.pending.borrow_mut().take();
                }
            },
            {
                let state = state.clone();
                move || state.yield_to_host.get()
            },
        );

        let scheduler = Scheduler::new(Rc::new(host));
        Self { state, scheduler }
    }

    pub fn set_time(&self, time: f64) {
        self.state.time.set(time);
    }

    pub fn advance(&self, ms: f64) {
        self.state.time.set(self.state.time.get() + ms);
    }

    pub fn set_yield(&self, should_yield: bool) {
        self.state.yield_to_host.set(should_yield);
    }

    pub fn has_pending_flush(&self) -> bool {
        self.state.pending.borrow().is_some()
    }

    pub fn pending_timeout(&self) -> Option<f64> {
        self.state.pending.borrow().as_ref().map(|(_, timeout)| *timeout)
    }

    pub fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut *self.state.calls.borrow_mut())
    }

    /// Runs the arranged wake-up, if any, with the given timeout flag.
    pub fn flush(&self, did_timeout: bool) -> bool {
        let pending = self.state.pending.borrow_mut().take();
        match pending {
            Some((callback, _)) => {
                callback(did_timeout);
                true
            }
            None => false,
        }
    }

    /// Runs the arranged wake-up as a host would: timed out if its deadline
    /// has passed.
    pub fn flush_due(&self) -> bool {
        let did_timeout = self
            .pending_timeout()
            .is_some_and(|timeout| timeout <= self.state.time.get());
        self.flush(did_timeout)
    }
}

/// In-memory [`Platform`] with a manual clock, frames fired on demand,
/// timers fired by advancing time, and a post-soon queue.
pub struct FakePlatform {
    time: Cell<f64>,
    next_handle: Cell<u64>,
    frames: RefCell<Vec<(u64, Box<dyn FnOnce(f64)>)>>,
    timers: RefCell<FxHashMap<u64, (f64, Box<dyn FnOnce()>)>>,
    soon: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    capabilities: Cell<Capabilities>,
    pub cancelled_frames: Cell<usize>,
    pub cancelled_timers: Cell<usize>,
}

impl FakePlatform {
    pub fn new() -> Rc<Self> {
        Self::with_capabilities(Capabilities::default())
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Rc<Self> {
        init_tracing();
        Rc::new(Self {
            time: Cell::new(0.0),
            next_handle: Cell::new(1),
            frames: RefCell::new(Vec::new()),
            timers: RefCell::new(FxHashMap::default()),
            soon: RefCell::new(VecDeque::new()),
            capabilities: Cell::new(capabilities),
            cancelled_frames: Cell::new(0),
            cancelled_timers: Cell::new(0),
        })
    }

    fn handle(&self) -> u64 {
        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        id
    }

    pub fn time(&self) -> f64 {
        self.time.get()
    }

    pub fn set_time(&self, time: f64) {
        self.time.set(time);
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn pending_soon(&self) -> usize {
        self.soon.borrow().len()
    }

    /// Delivers every requested frame callback at `timestamp`.
    pub fn fire_frame(&self, timestamp: f64) -> usize {
        self.time.set(timestamp);
        let frames = std::mem::take(&mut *self.frames.borrow_mut());
        let fired = frames.len();
        for (_, callback) in frames {
            callback(timestamp);
        }
        fired
    }

    /// Runs post-soon callbacks until the queue is empty.
    pub fn run_soon(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.soon.borrow_mut().pop_front();
            let Some(callback) = next else {
                return ran;
            };
            callback();
            ran += 1;
        }
    }

    /// Moves the clock forward, firing due timers in order.
    pub fn advance(&self, ms: f64) {
        let target = self.time.get() + ms;
        loop {
            let due = {
                let timers = self.timers.borrow();
                timers
                    .iter()
                    .filter(|(_, (fire_at, _))| *fire_at <= target)
                    .min_by(|a, b| a.1.0.total_cmp(&b.1.0).then(a.0.cmp(b.0)))
                    .map(|(id, _)| *id)
            };
            let Some(id) = due else {
                break;
            };
            let timer = self.timers.borrow_mut().remove(&id);
            if let Some((fire_at, callback)) = timer {
                self.time.set(self.time.get().max(fire_at));
                callback();
            }
        }
        self.time.set(self.time.get().max(target));
    }
}

impl Platform for FakePlatform {
    fn now(&self) -> f64 {
        self.time.get()
    }

    fn request_frame_callback(&self, callback: Box<dyn FnOnce(f64)>) -> TimerHandle {
        let id = self.handle();
        self.frames.borrow_mut().push((id, callback));
        TimerHandle(id)
    }

    fn cancel_frame_callback(&self, handle: TimerHandle) {
        let mut frames = self.frames.borrow_mut();
        let before = frames.len();
        frames.retain(|(id, _)| *id != handle.0);
        if frames.len() != before {
            self.cancelled_frames.set(self.cancelled_frames.get() + 1);
        }
    }

    fn post_soon(&self, callback: Box<dyn FnOnce()>) {
        self.soon.borrow_mut().push_back(callback);
    }

    fn set_timer(&self, callback: Box<dyn FnOnce()>, delay: f64) -> TimerHandle {
        let id = self.handle();
        let fire_at = self.time.get() + delay;
        self.timers.borrow_mut().insert(id, (fire_at, callback));
        TimerHandle(id)
    }

    fn cancel_timer(&self, handle: TimerHandle) {
        let removed = self.timers.borrow_mut().remove(&handle.0);
        if removed.is_some() {
            self.cancelled_timers.set(self.cancelled_timers.get() + 1);
        }
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.get()
    }
}
