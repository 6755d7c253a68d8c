use super::{Capabilities, Platform, TimerHandle};
use crate::error::SchedulerError;
use js_sys::{Function, Reflect};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{MessageChannel, Performance, Window};

type PendingQueue = Rc<RefCell<VecDeque<Box<dyn FnOnce()>>>>;

/// [`Platform`] backed by the browser: `requestAnimationFrame`, `setTimeout`,
/// a `MessageChannel` for post-soon callbacks and `performance.now()`.
pub struct WebPlatform {
    window: Window,
    performance: Option<Performance>,
    channel: Option<MessageChannel>,
    pending: PendingQueue,
    _on_message: Option<Closure<dyn FnMut()>>,
    capabilities: Capabilities,
}

impl WebPlatform {
    pub fn new() -> Result<Self, SchedulerError> {
        let window = web_sys::window().ok_or(SchedulerError::MissingPrimitive("window"))?;

        let has = |name: &str| Reflect::has(&window, &JsValue::from_str(name)).unwrap_or(false);
        let capabilities = Capabilities {
            frame_callbacks: has("requestAnimationFrame"),
            cancel_frame_callbacks: has("cancelAnimationFrame"),
            post_soon: has("MessageChannel"),
        };

        let pending: PendingQueue = Rc::default();
        let mut channel = None;
        let mut on_message = None;
        if capabilities.post_soon {
            match MessageChannel::new() {
                Ok(created) => {
                    let queue = pending.clone();
                    let handler = Closure::<dyn FnMut()>::new(move || {
                        let task = queue.borrow_mut().pop_front();
                        if let Some(task) = task {
                            task();
                        }
                    });
                    created
                        .port1()
                        .set_onmessage(Some(handler.as_ref().unchecked_ref()));
                    channel = Some(created);
                    on_message = Some(handler);
                }
                Err(err) => tracing::warn!(?err, "MessageChannel construction failed"),
            }
        }

        let capabilities = Capabilities {
            post_soon: channel.is_some(),
            ..capabilities
        };

        Ok(Self {
            performance: window.performance(),
            window,
            channel,
            pending,
            _on_message: on_message,
            capabilities,
        })
    }
}

impl Platform for WebPlatform {
    fn now(&self) -> f64 {
        match &self.performance {
            Some(performance) => performance.now(),
            None => js_sys::Date::now(),
        }
    }

    fn request_frame_callback(&self, callback: Box<dyn FnOnce(f64)>) -> TimerHandle {
        let callback = Closure::once_into_js(move |timestamp: f64| callback(timestamp));
        match self
            .window
            .request_animation_frame(callback.unchecked_ref::<Function>())
        {
            Ok(id) => TimerHandle(id as u64),
            Err(err) => {
                tracing::warn!(?err, "requestAnimationFrame failed");
                TimerHandle(0)
            }
        }
    }

    fn cancel_frame_callback(&self, handle: TimerHandle) {
        if let Err(err) = self.window.cancel_animation_frame(handle.0 as i32) {
            tracing::warn!(?err, "cancelAnimationFrame failed");
        }
    }

    fn post_soon(&self, callback: Box<dyn FnOnce()>) {
        let Some(channel) = &self.channel else {
            self.set_timer(callback, 0.0);
            return;
        };

        self.pending.borrow_mut().push_back(callback);
        if let Err(err) = channel.port2().post_message(&JsValue::UNDEFINED) {
            tracing::warn!(?err, "postMessage failed, using a timer instead");
            let callback = self.pending.borrow_mut().pop_back();
            if let Some(callback) = callback {
                self.set_timer(callback, 0.0);
            }
        }
    }

    fn set_timer(&self, callback: Box<dyn FnOnce()>, delay: f64) -> TimerHandle {
        let callback = Closure::once_into_js(move || callback());
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref::<Function>(),
                delay.max(0.0) as i32,
            ) {
            Ok(id) => TimerHandle(id as u64),
            Err(err) => {
                tracing::warn!(?err, "setTimeout failed");
                TimerHandle(0)
            }
        }
    }

    fn cancel_timer(&self, handle: TimerHandle) {
        self.window.clear_timeout_with_handle(handle.0 as i32);
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
