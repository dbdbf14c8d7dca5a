//! Task context and completion plumbing shared by every engine.

use tracing::trace;

/// Completion callback supplied by the caller of a submit operation.
///
/// The status is 0 on success; nonzero values are engine-defined, except for
/// compare where the status carries the three-way comparison result.
pub type CompletionFn = Box<dyn FnOnce(i32) + Send + 'static>;

/// Caller-owned context for one in-flight operation.
///
/// Carries the pending completion callback and a scratch buffer engines may
/// use for per-call private state. Size the scratch with
/// [`Accel::task_size`](crate::framework::Accel::task_size) so it satisfies
/// the largest registered module.
pub struct AccelTask {
    callback: Option<CompletionFn>,
    offload_ctx: Box<[u8]>,
}

impl AccelTask {
    /// Create a task with `ctx_size` bytes of engine scratch space.
    pub fn new(ctx_size: usize) -> Self {
        Self {
            callback: None,
            offload_ctx: vec![0u8; ctx_size].into_boxed_slice(),
        }
    }

    /// Record the caller's completion callback for the operation being
    /// submitted. Any callback left over from a previous submission is
    /// replaced.
    pub(crate) fn install(&mut self, cb: CompletionFn) {
        self.callback = Some(cb);
    }

    /// Take the recorded callback and wrap it in the framework trampoline
    /// handed to the engine.
    pub(crate) fn completion(&mut self) -> TaskCompletion {
        TaskCompletion {
            cb: self.callback.take(),
        }
    }

    /// Engine-private scratch space for the current call.
    pub fn offload_ctx_mut(&mut self) -> &mut [u8] {
        &mut self.offload_ctx
    }

    /// Scratch capacity this task was allocated with.
    pub fn ctx_size(&self) -> usize {
        self.offload_ctx.len()
    }
}

impl std::fmt::Debug for AccelTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccelTask")
            .field("pending", &self.callback.is_some())
            .field("ctx_size", &self.offload_ctx.len())
            .finish()
    }
}

/// Framework-internal completion handed to engines in place of the caller's
/// callback.
///
/// An engine must call [`complete`](TaskCompletion::complete) exactly once,
/// after the operation's data movement is fully visible. The consuming
/// signature makes a second invocation impossible; dropping the handle
/// without completing means the submission failed synchronously and the
/// caller's callback never runs.
pub struct TaskCompletion {
    cb: Option<CompletionFn>,
}

impl TaskCompletion {
    /// Deliver the engine's completion status to the original caller.
    pub fn complete(mut self, status: i32) {
        trace!(status, "operation completion");
        if let Some(cb) = self.cb.take() {
            cb(status);
        }
    }
}

impl Drop for TaskCompletion {
    fn drop(&mut self) {
        if self.cb.is_some() {
            trace!("completion dropped without firing; submission was rejected");
        }
    }
}

impl std::fmt::Debug for TaskCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCompletion")
            .field("armed", &self.cb.is_some())
            .finish()
    }
}
