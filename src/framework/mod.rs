//! Framework core -- module registry, engine slots, lifecycle sequencing.

pub mod channel;
pub mod dispatch;

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::software::SoftwareModule;
use crate::engine::Engine;
use crate::task::AccelTask;

pub use channel::AccelChannel;
pub use dispatch::AccelBatch;

/// A pluggable accelerator module.
///
/// Modules register engines from their `init` hook and tear themselves down
/// in `fini`, which may await in-flight hardware work. Hooks run in
/// registration order, one module at a time.
#[async_trait::async_trait]
pub trait AccelModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Synchronous startup hook, called once during framework
    /// initialization. Engines are registered here.
    fn init(&self, slots: &mut EngineSlots);

    /// Asynchronous teardown hook. The next module is not finalized until
    /// this future resolves.
    async fn fini(&self) {}

    /// Per-call private context bytes this module's engine needs inside an
    /// [`AccelTask`]. The framework sizes tasks to the largest answer across
    /// all registered modules.
    fn ctx_size(&self) -> usize {
        0
    }

    /// Module configuration as JSON, if the module has any.
    fn config_json(&self) -> Option<serde_json::Value> {
        None
    }

    /// Human-readable configuration dump, if the module has any.
    fn config_text(&self, _out: &mut dyn fmt::Write) -> fmt::Result {
        Ok(())
    }
}

/// The two active-engine slots, filled during module initialization.
#[derive(Default)]
pub struct EngineSlots {
    hardware: Option<Arc<dyn Engine>>,
    software: Option<Arc<dyn Engine>>,
}

impl EngineSlots {
    /// Claim the hardware slot. Only one hardware engine may be active;
    /// later registrants are logged and discarded, the first one stays.
    pub fn register_hardware(&mut self, engine: Arc<dyn Engine>) {
        if self.hardware.is_some() {
            warn!(engine = engine.name(), "hardware offload engine already enabled");
            return;
        }
        info!(engine = engine.name(), "hardware offload engine enabled");
        self.hardware = Some(engine);
    }

    /// Claim the software slot. Exactly one software engine exists per
    /// process; a second registration is a deployment bug, not a runtime
    /// condition.
    pub fn register_software(&mut self, engine: Arc<dyn Engine>) {
        assert!(
            self.software.is_none(),
            "software engine registered twice"
        );
        self.software = Some(engine);
    }
}

/// Ordered module registry. Registration happens single-threaded at process
/// start; [`initialize`](AccelBuilder::initialize) freezes the list into an
/// [`Accel`] handle.
pub struct AccelBuilder {
    modules: Vec<Arc<dyn AccelModule>>,
    max_ctx_size: usize,
}

impl AccelBuilder {
    /// A registry with the mandatory software module already in place.
    pub fn new() -> Self {
        let mut builder = Self {
            modules: Vec::new(),
            max_ctx_size: 0,
        };
        builder.register(Arc::new(SoftwareModule));
        builder
    }

    /// Append a module. Order is significant: it is both the init order and
    /// the fini order. There is no removal.
    pub fn register(&mut self, module: Arc<dyn AccelModule>) -> &mut Self {
        let ctx = module.ctx_size();
        if ctx > self.max_ctx_size {
            self.max_ctx_size = ctx;
        }
        debug!(module = module.name(), ctx_size = ctx, "accel module registered");
        self.modules.push(module);
        self
    }

    /// Walk the module list front to back, letting each module register its
    /// engines, then hand back the immutable framework handle. Init hooks
    /// are infallible by contract; a deployment without a software engine
    /// panics here.
    pub fn initialize(self) -> Accel {
        let mut slots = EngineSlots::default();
        for module in &self.modules {
            debug!(module = module.name(), "initializing accel module");
            module.init(&mut slots);
        }

        let software = slots
            .software
            .expect("a software engine must be registered");
        info!(
            hardware = slots.hardware.is_some(),
            task_size = self.max_ctx_size,
            "accel framework initialized"
        );

        Accel {
            modules: self.modules,
            hardware: slots.hardware,
            software,
            task_size: self.max_ctx_size,
        }
    }
}

impl Default for AccelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The initialized framework: read-only module list and engine slots.
pub struct Accel {
    modules: Vec<Arc<dyn AccelModule>>,
    hardware: Option<Arc<dyn Engine>>,
    software: Arc<dyn Engine>,
    task_size: usize,
}

impl Accel {
    /// Required [`AccelTask`] scratch size: the largest per-call context any
    /// registered module asked for. Fixed at initialization.
    pub fn task_size(&self) -> usize {
        self.task_size
    }

    /// Allocate a task sized for this framework's modules.
    pub fn task(&self) -> AccelTask {
        AccelTask::new(self.task_size)
    }

    /// Bind the calling thread to an engine. Hardware is preferred when an
    /// engine holds the slot and serves a channel; otherwise the software
    /// engine takes over. The binding never changes for the channel's
    /// lifetime.
    pub fn io_channel(&self) -> AccelChannel {
        if let Some(hw) = &self.hardware {
            if let Some(inner) = hw.io_channel() {
                debug!(engine = hw.name(), "channel bound to hardware engine");
                return AccelChannel::bind(hw.clone(), inner);
            }
            warn!(
                engine = hw.name(),
                "hardware engine refused a channel, falling back to software"
            );
        }

        let inner = self
            .software
            .io_channel()
            .expect("software engine must always provide a channel");
        debug!("channel bound to software engine");
        AccelChannel::bind(self.software.clone(), inner)
    }

    /// Aggregate module configuration as a JSON array. The framework itself
    /// has no configuration; modules without one are skipped.
    pub fn write_config_json<W: io::Write>(&self, writer: W) -> serde_json::Result<()> {
        let configs: Vec<serde_json::Value> = self
            .modules
            .iter()
            .filter_map(|m| m.config_json())
            .collect();
        serde_json::to_writer(writer, &configs)
    }

    /// Concatenate the modules' human-readable configuration dumps.
    pub fn config_text(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        for module in &self.modules {
            module.config_text(out)?;
        }
        Ok(())
    }

    /// Finalize every module, strictly one at a time in registration order,
    /// then return. A module's teardown future fully resolves before the
    /// next module is touched; the call returns exactly once, after the
    /// last module.
    pub async fn finish(self) {
        for module in &self.modules {
            debug!(module = module.name(), "finalizing accel module");
            module.fini().await;
        }
        info!("accel framework finalized");
    }
}
