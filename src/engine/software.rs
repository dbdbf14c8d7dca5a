//! Built-in software engine -- the synchronous in-memory fallback.
//!
//! Always registered, used whenever no hardware engine is available or the
//! hardware engine refuses a channel. Every operation completes in-line
//! before the submit call returns, so the channel carries no state.

use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::engine::{AccelError, Capabilities, Engine, EngineChannel};
use crate::framework::{AccelModule, EngineSlots};
use crate::task::TaskCompletion;

pub struct SoftwareEngine;

struct SoftwareChannel;

impl EngineChannel for SoftwareChannel {
    fn as_any(&mut self) -> &mut dyn Any {
        self
    }
}

fn check_len(dst: usize, src: usize) -> Result<(), AccelError> {
    if dst != src {
        return Err(AccelError::SizeMismatch { dst, src });
    }
    Ok(())
}

impl Engine for SoftwareEngine {
    fn name(&self) -> &'static str {
        "software"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::COPY
            | Capabilities::FILL
            | Capabilities::CRC32C
            | Capabilities::COMPARE
            | Capabilities::DUALCAST
    }

    fn io_channel(&self) -> Option<Box<dyn EngineChannel>> {
        Some(Box::new(SoftwareChannel))
    }

    fn copy(
        &self,
        _chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        dst: &mut [u8],
        src: &[u8],
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        check_len(dst.len(), src.len())?;
        dst.copy_from_slice(src);
        done.complete(0);
        Ok(())
    }

    fn dualcast(
        &self,
        _chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        dst1: &mut [u8],
        dst2: &mut [u8],
        src: &[u8],
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        check_len(dst1.len(), src.len())?;
        check_len(dst2.len(), src.len())?;
        dst1.copy_from_slice(src);
        dst2.copy_from_slice(src);
        done.complete(0);
        Ok(())
    }

    fn compare(
        &self,
        _chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        src1: &[u8],
        src2: &[u8],
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        check_len(src1.len(), src2.len())?;
        // The status carries the three-way result: 0 means equal, nonzero
        // means the buffers differ, not that the operation failed.
        let result = match src1.cmp(src2) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        };
        done.complete(result);
        Ok(())
    }

    fn fill(
        &self,
        _chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        dst: &mut [u8],
        value: u8,
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        dst.fill(value);
        done.complete(0);
        Ok(())
    }

    fn crc32c(
        &self,
        _chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        dst: &mut u32,
        src: &[u8],
        seed: u32,
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        // Conventional CRC-32C seeding: the running value starts from the
        // complement of the caller's seed.
        *dst = crc32c::crc32c_append(!seed, src);
        done.complete(0);
        Ok(())
    }

    // Batch entry points are deliberately not overridden: the software
    // engine reports NotSupported and never advertises Capabilities::BATCH.
}

/// Module descriptor registering the software engine with the framework.
pub struct SoftwareModule;

#[async_trait::async_trait]
impl AccelModule for SoftwareModule {
    fn name(&self) -> &'static str {
        "software"
    }

    fn init(&self, slots: &mut EngineSlots) {
        slots.register_software(Arc::new(SoftwareEngine));
    }
}
