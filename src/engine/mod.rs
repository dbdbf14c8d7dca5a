//! Engine contract -- capability mask, operation entry points, channels.
//!
//! Every backend, hardware offload or the built-in software fallback,
//! implements the same closed [`Engine`] method set. The dispatcher never
//! inspects which kind it is talking to.

pub mod software;

use std::any::Any;

use thiserror::Error;

use crate::task::TaskCompletion;

bitflags::bitflags! {
    /// Operations an engine claims to support.
    ///
    /// Reported verbatim by the dispatcher, never enforced by it: callers are
    /// expected to check the mask before submitting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u64 {
        const COPY = 1 << 0;
        const FILL = 1 << 1;
        const CRC32C = 1 << 2;
        const COMPARE = 1 << 3;
        const DUALCAST = 1 << 4;
        const BATCH = 1 << 5;
    }
}

#[derive(Debug, Error)]
pub enum AccelError {
    #[error("dualcast requires 4 KiB alignment on both destination addresses")]
    MisalignedDualcast,

    #[error("buffer length mismatch: destination {dst} bytes, source {src} bytes")]
    SizeMismatch { dst: usize, src: usize },

    #[error("operation not supported by the bound engine")]
    NotSupported,

    #[error("batch is full: the bound engine accepts at most {max} operations")]
    BatchFull { max: usize },
}

/// Per-thread execution context handed out by an engine.
///
/// A channel is owned by exactly one thread. Engines that complete work
/// asynchronously park their finished completions here until the owning
/// thread drains them via [`poll`](EngineChannel::poll); the software engine
/// completes in-line and its channel is stateless.
pub trait EngineChannel: Send {
    /// Deliver any parked completions. Returns the number delivered.
    fn poll(&mut self) -> usize {
        0
    }

    /// Downcast hook so an engine can recover its own channel type from the
    /// `dyn EngineChannel` the dispatcher passes back.
    fn as_any(&mut self) -> &mut dyn Any;
}

/// One prepared operation inside a batch, carried to the engine at submit.
pub struct BatchOp<'buf> {
    pub dst: &'buf mut [u8],
    pub src: &'buf [u8],
    pub done: TaskCompletion,
}

impl std::fmt::Debug for BatchOp<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOp")
            .field("dst_len", &self.dst.len())
            .field("src_len", &self.src.len())
            .finish()
    }
}

/// The fixed operation set every backend implements.
///
/// Submit methods must either return an error synchronously (no data moved,
/// completion never fires) or arrange for `done` to fire exactly once after
/// the operation's effect is fully visible. Synchronous engines fire it
/// before returning; asynchronous engines park it on their channel and fire
/// it from [`EngineChannel::poll`] on the owning thread.
pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Capability mask, reported to callers unmodified.
    fn capabilities(&self) -> Capabilities;

    /// Hand out a channel for the calling thread, or `None` if the engine
    /// cannot serve one (a hardware engine out of queue pairs, for example).
    fn io_channel(&self) -> Option<Box<dyn EngineChannel>>;

    fn copy(
        &self,
        chan: &mut dyn EngineChannel,
        ctx: &mut [u8],
        dst: &mut [u8],
        src: &[u8],
        done: TaskCompletion,
    ) -> Result<(), AccelError>;

    fn dualcast(
        &self,
        chan: &mut dyn EngineChannel,
        ctx: &mut [u8],
        dst1: &mut [u8],
        dst2: &mut [u8],
        src: &[u8],
        done: TaskCompletion,
    ) -> Result<(), AccelError>;

    fn compare(
        &self,
        chan: &mut dyn EngineChannel,
        ctx: &mut [u8],
        src1: &[u8],
        src2: &[u8],
        done: TaskCompletion,
    ) -> Result<(), AccelError>;

    fn fill(
        &self,
        chan: &mut dyn EngineChannel,
        ctx: &mut [u8],
        dst: &mut [u8],
        value: u8,
        done: TaskCompletion,
    ) -> Result<(), AccelError>;

    fn crc32c(
        &self,
        chan: &mut dyn EngineChannel,
        ctx: &mut [u8],
        dst: &mut u32,
        src: &[u8],
        seed: u32,
        done: TaskCompletion,
    ) -> Result<(), AccelError>;

    /// Largest number of operations one batch may carry.
    fn batch_get_max(&self) -> Result<usize, AccelError> {
        Err(AccelError::NotSupported)
    }

    /// Execute a prepared batch. Each operation's completion fires as it
    /// finishes; `done` fires once after the whole batch.
    fn batch_submit(
        &self,
        _chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        _ops: Vec<BatchOp<'_>>,
        _done: TaskCompletion,
    ) -> Result<(), AccelError> {
        Err(AccelError::NotSupported)
    }
}
