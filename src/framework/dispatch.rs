//! Operation dispatch -- the public submit surface.
//!
//! Each submit records the caller's callback in the task, swaps in the
//! framework trampoline, and forwards to the bound engine. Whether the
//! engine completes in-line (software) or later from a poll (hardware), the
//! caller's callback fires through the same path with the engine's status
//! passed through untouched.

use tracing::error;

use crate::engine::{AccelError, BatchOp};
use crate::framework::channel::AccelChannel;
use crate::task::AccelTask;

const ALIGN_4K: usize = 0x1000;

fn is_4k_aligned(buf: &[u8]) -> bool {
    buf.as_ptr() as usize & (ALIGN_4K - 1) == 0
}

/// A batch of prepared operations, built one prep call at a time and handed
/// to the engine in a single submit. Holds borrows of every buffer involved
/// until the batch is submitted or dropped.
pub struct AccelBatch<'buf> {
    max: usize,
    ops: Vec<BatchOp<'buf>>,
}

impl AccelBatch<'_> {
    /// Operations prepared so far.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Most operations the bound engine accepts in one batch.
    pub fn max_ops(&self) -> usize {
        self.max
    }
}

impl AccelChannel {
    /// Copy `src` into `dst`.
    pub fn submit_copy(
        &mut self,
        task: &mut AccelTask,
        dst: &mut [u8],
        src: &[u8],
        cb: impl FnOnce(i32) + Send + 'static,
    ) -> Result<(), AccelError> {
        task.install(Box::new(cb));
        let done = task.completion();
        self.engine
            .copy(self.inner.as_mut(), task.offload_ctx_mut(), dst, src, done)
    }

    /// Copy `src` into both destinations. Both destination base addresses
    /// must sit on a 4 KiB boundary; misalignment fails synchronously and
    /// moves no data.
    pub fn submit_dualcast(
        &mut self,
        task: &mut AccelTask,
        dst1: &mut [u8],
        dst2: &mut [u8],
        src: &[u8],
        cb: impl FnOnce(i32) + Send + 'static,
    ) -> Result<(), AccelError> {
        if !is_4k_aligned(dst1) || !is_4k_aligned(dst2) {
            error!("dualcast requires 4 KiB alignment on both destination addresses");
            return Err(AccelError::MisalignedDualcast);
        }

        task.install(Box::new(cb));
        let done = task.completion();
        self.engine.dualcast(
            self.inner.as_mut(),
            task.offload_ctx_mut(),
            dst1,
            dst2,
            src,
            done,
        )
    }

    /// Compare two buffers. The completion status is the three-way result:
    /// 0 when equal, nonzero when the buffers differ.
    pub fn submit_compare(
        &mut self,
        task: &mut AccelTask,
        src1: &[u8],
        src2: &[u8],
        cb: impl FnOnce(i32) + Send + 'static,
    ) -> Result<(), AccelError> {
        task.install(Box::new(cb));
        let done = task.completion();
        self.engine.compare(
            self.inner.as_mut(),
            task.offload_ctx_mut(),
            src1,
            src2,
            done,
        )
    }

    /// Set every byte of `dst` to `value`.
    pub fn submit_fill(
        &mut self,
        task: &mut AccelTask,
        dst: &mut [u8],
        value: u8,
        cb: impl FnOnce(i32) + Send + 'static,
    ) -> Result<(), AccelError> {
        task.install(Box::new(cb));
        let done = task.completion();
        self.engine.fill(
            self.inner.as_mut(),
            task.offload_ctx_mut(),
            dst,
            value,
            done,
        )
    }

    /// CRC-32C of `src`, seeded with `seed`, written to `dst` before the
    /// completion fires.
    pub fn submit_crc32c(
        &mut self,
        task: &mut AccelTask,
        dst: &mut u32,
        src: &[u8],
        seed: u32,
        cb: impl FnOnce(i32) + Send + 'static,
    ) -> Result<(), AccelError> {
        task.install(Box::new(cb));
        let done = task.completion();
        self.engine.crc32c(
            self.inner.as_mut(),
            task.offload_ctx_mut(),
            dst,
            src,
            seed,
            done,
        )
    }

    /// Most operations the bound engine accepts in one batch.
    pub fn batch_get_max(&self) -> Result<usize, AccelError> {
        self.engine.batch_get_max()
    }

    /// Start an empty batch sized from the bound engine. Fails with
    /// [`AccelError::NotSupported`] on engines without batching, the
    /// software engine included.
    pub fn batch_create<'buf>(&self) -> Result<AccelBatch<'buf>, AccelError> {
        let max = self.engine.batch_get_max()?;
        Ok(AccelBatch {
            max,
            ops: Vec::new(),
        })
    }

    /// Append a copy to the batch. The per-operation callback fires when the
    /// engine completes this entry during batch execution.
    pub fn batch_prep_copy<'buf>(
        &mut self,
        task: &mut AccelTask,
        batch: &mut AccelBatch<'buf>,
        dst: &'buf mut [u8],
        src: &'buf [u8],
        cb: impl FnOnce(i32) + Send + 'static,
    ) -> Result<(), AccelError> {
        if batch.ops.len() >= batch.max {
            return Err(AccelError::BatchFull { max: batch.max });
        }

        task.install(Box::new(cb));
        batch.ops.push(BatchOp {
            dst,
            src,
            done: task.completion(),
        });
        Ok(())
    }

    /// Hand the whole batch to the engine. `cb` fires once, after every
    /// operation in the batch has completed.
    pub fn batch_submit(
        &mut self,
        task: &mut AccelTask,
        batch: AccelBatch<'_>,
        cb: impl FnOnce(i32) + Send + 'static,
    ) -> Result<(), AccelError> {
        task.install(Box::new(cb));
        let done = task.completion();
        self.engine.batch_submit(
            self.inner.as_mut(),
            task.offload_ctx_mut(),
            batch.ops,
            done,
        )
    }
}
