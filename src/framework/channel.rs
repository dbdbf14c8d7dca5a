//! Per-thread channel binding.
//!
//! An [`AccelChannel`] pairs one engine with that engine's execution context
//! for the owning thread. The hardware-versus-software decision is made once,
//! at [`Accel::io_channel`](crate::framework::Accel::io_channel), and is
//! final: a channel created before a hardware engine existed stays bound to
//! software for its whole lifetime.

use std::sync::Arc;

use crate::engine::{Capabilities, Engine, EngineChannel};

/// A thread's binding to one engine. Not shareable across threads; create
/// one channel per thread and keep it for the thread's lifetime.
pub struct AccelChannel {
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) inner: Box<dyn EngineChannel>,
}

impl AccelChannel {
    pub(crate) fn bind(engine: Arc<dyn Engine>, inner: Box<dyn EngineChannel>) -> Self {
        Self { engine, inner }
    }

    /// The bound engine's capability mask, verbatim. Check it before
    /// submitting: capabilities are reported here, never enforced by the
    /// dispatcher.
    pub fn capabilities(&self) -> Capabilities {
        self.engine.capabilities()
    }

    /// Name of the engine this channel is bound to.
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Drain completions an asynchronous engine has parked on this channel.
    /// Returns the number of completions delivered. The software engine
    /// completes in-line, so this is a no-op for software-bound channels.
    pub fn poll(&mut self) -> usize {
        self.inner.poll()
    }
}

impl std::fmt::Debug for AccelChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccelChannel")
            .field("engine", &self.engine.name())
            .finish()
    }
}
