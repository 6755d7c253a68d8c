use crate::priority::PriorityLevel;
use crate::queue::TaskId;

/// Work handed to the scheduler. The argument is `true` when the flush
/// running it was forced by an expired deadline.
pub type TaskCallback = Box<dyn FnOnce(bool) -> TaskResult>;

/// What a callback asks the scheduler to do once it returns.
///
/// A callback that ran out of time (see [`Scheduler::should_yield`]) returns
/// [`TaskResult::Continue`] with the rest of its work. The continuation keeps
/// the parent's priority and expiration time and is queued ahead of tasks
/// with the same deadline.
///
/// [`Scheduler::should_yield`]: crate::Scheduler::should_yield
pub enum TaskResult {
    Done,
    Continue(TaskCallback),
}

impl TaskResult {
    pub fn continue_with<F, R>(callback: F) -> Self
    where
        F: FnOnce(bool) -> R + 'static,
        R: Into<TaskResult>,
    {
        TaskResult::Continue(boxed(callback))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskResult::Done)
    }
}

impl From<()> for TaskResult {
    fn from(_: ()) -> Self {
        TaskResult::Done
    }
}

impl std::fmt::Debug for TaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskResult::Done => f.write_str("Done"),
            TaskResult::Continue(_) => f.write_str("Continue(..)"),
        }
    }
}

pub(crate) fn boxed<F, R>(callback: F) -> TaskCallback
where
    F: FnOnce(bool) -> R + 'static,
    R: Into<TaskResult>,
{
    Box::new(move |did_timeout| callback(did_timeout).into())
}

/// A queued unit of work, detached from any list position.
pub struct Task {
    pub callback: TaskCallback,
    pub priority_level: PriorityLevel,
    /// Absolute clock reading in milliseconds. Smaller expires sooner.
    pub expiration_time: f64,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("priority_level", &self.priority_level)
            .field("expiration_time", &self.expiration_time)
            .finish_non_exhaustive()
    }
}

/// Opaque handle returned by `schedule_callback`, used to cancel.
///
/// Stays valid to pass around after the task ran or was cancelled;
/// cancelling it then does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub(crate) TaskId);

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.0
    }
}

/// Overrides for a single `schedule_callback` call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CallbackOptions {
    /// Milliseconds from the start time until the callback expires. Replaces
    /// the offset derived from the current priority level.
    pub timeout: Option<f64>,
}

impl CallbackOptions {
    pub fn timeout(timeout: f64) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}
