//! Framework integration tests -- engine selection, deferred completion
//! delivery, batching, and lifecycle sequencing, exercised through a mock
//! hardware engine that behaves the way an offload device driver would:
//! data posted at submit, completions parked until the channel is polled.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use accelerant::{
    AccelBuilder, AccelError, AccelModule, BatchOp, Capabilities, Engine, EngineChannel,
    EngineSlots, TaskCompletion,
};

struct MockHwChannel {
    pending: VecDeque<(TaskCompletion, i32)>,
}

impl MockHwChannel {
    fn park(&mut self, done: TaskCompletion, status: i32) {
        self.pending.push_back((done, status));
    }
}

impl EngineChannel for MockHwChannel {
    fn poll(&mut self) -> usize {
        let mut delivered = 0;
        while let Some((done, status)) = self.pending.pop_front() {
            done.complete(status);
            delivered += 1;
        }
        delivered
    }

    fn as_any(&mut self) -> &mut dyn Any {
        self
    }
}

fn park_on(chan: &mut dyn EngineChannel, done: TaskCompletion, status: i32) {
    chan.as_any()
        .downcast_mut::<MockHwChannel>()
        .expect("mock engine handed a foreign channel")
        .park(done, status);
}

/// Hardware-style engine: moves data at submit, defers completions to poll.
struct MockHwEngine {
    name: &'static str,
    serve_channels: bool,
}

impl Engine for MockHwEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn io_channel(&self) -> Option<Box<dyn EngineChannel>> {
        if !self.serve_channels {
            return None;
        }
        Some(Box::new(MockHwChannel {
            pending: VecDeque::new(),
        }))
    }

    fn copy(
        &self,
        chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        dst: &mut [u8],
        src: &[u8],
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        dst.copy_from_slice(src);
        park_on(chan, done, 0);
        Ok(())
    }

    fn dualcast(
        &self,
        chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        dst1: &mut [u8],
        dst2: &mut [u8],
        src: &[u8],
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        dst1.copy_from_slice(src);
        dst2.copy_from_slice(src);
        park_on(chan, done, 0);
        Ok(())
    }

    fn compare(
        &self,
        chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        src1: &[u8],
        src2: &[u8],
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        let status = if src1 == src2 { 0 } else { 1 };
        park_on(chan, done, status);
        Ok(())
    }

    fn fill(
        &self,
        chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        dst: &mut [u8],
        value: u8,
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        dst.fill(value);
        park_on(chan, done, 0);
        Ok(())
    }

    fn crc32c(
        &self,
        chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        dst: &mut u32,
        src: &[u8],
        seed: u32,
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        *dst = crc32c::crc32c_append(!seed, src);
        park_on(chan, done, 0);
        Ok(())
    }

    fn batch_get_max(&self) -> Result<usize, AccelError> {
        Ok(4)
    }

    fn batch_submit(
        &self,
        chan: &mut dyn EngineChannel,
        _ctx: &mut [u8],
        ops: Vec<BatchOp<'_>>,
        done: TaskCompletion,
    ) -> Result<(), AccelError> {
        for op in ops {
            op.dst.copy_from_slice(op.src);
            park_on(chan, op.done, 0);
        }
        park_on(chan, done, 0);
        Ok(())
    }
}

struct MockHwModule {
    engine_name: &'static str,
    serve_channels: bool,
}

#[async_trait::async_trait]
impl AccelModule for MockHwModule {
    fn name(&self) -> &'static str {
        self.engine_name
    }

    fn init(&self, slots: &mut EngineSlots) {
        slots.register_hardware(Arc::new(MockHwEngine {
            name: self.engine_name,
            serve_channels: self.serve_channels,
        }));
    }

    fn ctx_size(&self) -> usize {
        48
    }
}

fn status_probe() -> (Arc<AtomicI32>, impl FnOnce(i32) + Send + 'static) {
    let status = Arc::new(AtomicI32::new(i32::MIN));
    let s = status.clone();
    (status, move |st| s.store(st, Ordering::SeqCst))
}

#[test]
fn channel_prefers_hardware_when_it_serves() {
    let mut builder = AccelBuilder::new();
    builder.register(Arc::new(MockHwModule {
        engine_name: "mock-hw",
        serve_channels: true,
    }));
    let accel = builder.initialize();

    let chan = accel.io_channel();
    assert_eq!(chan.engine_name(), "mock-hw");
    assert!(chan.capabilities().contains(Capabilities::BATCH));
    assert_eq!(accel.task_size(), 48);
}

#[test]
fn channel_falls_back_when_hardware_refuses() {
    let mut builder = AccelBuilder::new();
    builder.register(Arc::new(MockHwModule {
        engine_name: "mock-hw",
        serve_channels: false,
    }));
    let accel = builder.initialize();

    let chan = accel.io_channel();
    assert_eq!(chan.engine_name(), "software");
}

#[test]
fn channel_binding_is_stable_across_calls() {
    let accel = AccelBuilder::new().initialize();
    assert_eq!(accel.io_channel().engine_name(), "software");
    assert_eq!(accel.io_channel().engine_name(), "software");
}

#[test]
fn duplicate_hardware_registration_keeps_the_first() {
    let mut builder = AccelBuilder::new();
    builder.register(Arc::new(MockHwModule {
        engine_name: "hw-first",
        serve_channels: true,
    }));
    builder.register(Arc::new(MockHwModule {
        engine_name: "hw-second",
        serve_channels: true,
    }));
    let accel = builder.initialize();

    let chan = accel.io_channel();
    assert_eq!(chan.engine_name(), "hw-first");
}

#[test]
fn deferred_completions_are_delivered_by_poll() {
    let mut builder = AccelBuilder::new();
    builder.register(Arc::new(MockHwModule {
        engine_name: "mock-hw",
        serve_channels: true,
    }));
    let accel = builder.initialize();

    let mut chan = accel.io_channel();
    let mut task = accel.task();

    let src = vec![0x3Cu8; 128];
    let mut dst = vec![0u8; 128];
    let (status, cb) = status_probe();
    chan.submit_copy(&mut task, &mut dst, &src, cb).unwrap();

    // Data is posted at submit; the completion waits for the poll.
    assert_eq!(dst, src);
    assert_eq!(status.load(Ordering::SeqCst), i32::MIN);

    assert_eq!(chan.poll(), 1);
    assert_eq!(status.load(Ordering::SeqCst), 0);

    // Nothing left to drain.
    assert_eq!(chan.poll(), 0);
}

#[test]
fn batch_executes_every_prepped_copy() {
    let mut builder = AccelBuilder::new();
    builder.register(Arc::new(MockHwModule {
        engine_name: "mock-hw",
        serve_channels: true,
    }));
    let accel = builder.initialize();

    let mut chan = accel.io_channel();
    let mut task = accel.task();

    assert_eq!(chan.batch_get_max().unwrap(), 4);

    let srcs: Vec<Vec<u8>> = (0..3).map(|i| vec![i as u8 + 1; 32]).collect();
    let mut dsts: Vec<Vec<u8>> = (0..3).map(|_| vec![0u8; 32]).collect();

    let op_hits = Arc::new(AtomicI32::new(0));
    let (batch_status, batch_cb) = status_probe();

    {
        let mut batch = chan.batch_create().unwrap();
        for (dst, src) in dsts.iter_mut().zip(srcs.iter()) {
            let hits = op_hits.clone();
            chan.batch_prep_copy(&mut task, &mut batch, dst, src, move |st| {
                assert_eq!(st, 0);
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        chan.batch_submit(&mut task, batch, batch_cb).unwrap();
    }

    chan.poll();
    assert_eq!(op_hits.load(Ordering::SeqCst), 3);
    assert_eq!(batch_status.load(Ordering::SeqCst), 0);
    for (dst, src) in dsts.iter().zip(srcs.iter()) {
        assert_eq!(dst, src);
    }
}

#[test]
fn batch_rejects_operations_beyond_engine_max() {
    let mut builder = AccelBuilder::new();
    builder.register(Arc::new(MockHwModule {
        engine_name: "mock-hw",
        serve_channels: true,
    }));
    let accel = builder.initialize();

    let mut chan = accel.io_channel();
    let mut task = accel.task();

    let src = vec![0u8; 8];
    let mut dsts: Vec<Vec<u8>> = (0..5).map(|_| vec![0u8; 8]).collect();

    let mut batch = chan.batch_create().unwrap();
    let mut dst_iter = dsts.iter_mut();
    for _ in 0..4 {
        chan.batch_prep_copy(&mut task, &mut batch, dst_iter.next().unwrap(), &src, |_| {})
            .unwrap();
    }
    let err = chan
        .batch_prep_copy(&mut task, &mut batch, dst_iter.next().unwrap(), &src, |_| {})
        .unwrap_err();
    assert!(matches!(err, AccelError::BatchFull { max: 4 }));
}

/// Module whose async teardown records when it ran.
struct RecordingModule {
    name: &'static str,
    delay: Duration,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait::async_trait]
impl AccelModule for RecordingModule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&self, _slots: &mut EngineSlots) {}

    async fn fini(&self) {
        // A later module with a shorter drain would finish first if the
        // sequencer ever overlapped teardowns.
        tokio::time::sleep(self.delay).await;
        self.log.lock().unwrap().push(self.name);
    }
}

#[tokio::test]
async fn finalization_is_strictly_sequential() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut builder = AccelBuilder::new();
    builder.register(Arc::new(RecordingModule {
        name: "m1",
        delay: Duration::from_millis(50),
        log: log.clone(),
    }));
    builder.register(Arc::new(RecordingModule {
        name: "m2",
        delay: Duration::from_millis(20),
        log: log.clone(),
    }));
    builder.register(Arc::new(RecordingModule {
        name: "m3",
        delay: Duration::from_millis(1),
        log: log.clone(),
    }));

    let accel = builder.initialize();
    accel.finish().await;

    assert_eq!(*log.lock().unwrap(), vec!["m1", "m2", "m3"]);
}
