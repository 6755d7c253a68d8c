use super::{FlushCallback, Host};

/// A [`Host`] made of caller-supplied functions.
///
/// This is the seam for driving the scheduler deterministically: the caller
/// keeps the flush callback it is handed and decides when to invoke it, with
/// what timeout flag, and what the clock and frame budget report meanwhile.
pub struct InjectedHost {
    now: Box<dyn Fn() -> f64>,
    request_host_callback: Box<dyn Fn(FlushCallback, f64)>,
    cancel_host_callback: Box<dyn Fn()>,
    should_yield_to_host: Box<dyn Fn() -> bool>,
}

impl InjectedHost {
    pub fn new(
        now: impl Fn() -> f64 + 'static,
        request_host_callback: impl Fn(FlushCallback, f64) + 'static,
        cancel_host_callback: impl Fn() + 'static,
        should_yield_to_host: impl Fn() -> bool + 'static,
    ) -> Self {
        Self {
            now: Box::new(now),
            request_host_callback: Box::new(request_host_callback),
            cancel_host_callback: Box::new(cancel_host_callback),
            should_yield_to_host: Box::new(should_yield_to_host),
        }
    }
}

impl Host for InjectedHost {
    fn now(&self) -> f64 {
        (self.now)()
    }

    fn request_host_callback(&self, callback: FlushCallback, absolute_timeout: f64) {
        (self.request_host_callback)(callback, absolute_timeout)
    }

    fn cancel_host_callback(&self) {
        (self.cancel_host_callback)()
    }

    fn should_yield_to_host(&self) -> bool {
        (self.should_yield_to_host)()
    }
}
