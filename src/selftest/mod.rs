//! Framework self-test -- drives every operation through the dispatcher.
//!
//! Used by the `accelerant self-test` subcommand to verify that the bound
//! engine honors the operation contracts end to end: data movement, status
//! codes, and the invalid-argument paths.

use serde::Serialize;
use tracing::info;

use crate::engine::{AccelError, Capabilities};
use crate::framework::Accel;

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Self-test result for a single operation contract.
#[derive(Debug, Serialize, Clone)]
pub struct CheckResult {
    pub check: String,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct SelfTestReport {
    pub engine: String,
    pub capabilities: Vec<String>,
    pub task_size: usize,
    pub results: Vec<CheckResult>,
}

impl SelfTestReport {
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.status != CheckStatus::Fail)
    }
}

fn check(name: &str, outcome: Result<(), String>) -> CheckResult {
    match outcome {
        Ok(()) => CheckResult {
            check: name.to_string(),
            status: CheckStatus::Pass,
            details: "ok".to_string(),
        },
        Err(details) => CheckResult {
            check: name.to_string(),
            status: CheckStatus::Fail,
            details,
        },
    }
}

fn status_probe() -> (Arc<AtomicI32>, impl FnOnce(i32) + Send + 'static) {
    let status = Arc::new(AtomicI32::new(i32::MIN));
    let s = status.clone();
    (status, move |st| s.store(st, Ordering::SeqCst))
}

#[repr(align(4096))]
struct PageAligned([u8; 4096]);

/// Run the operation checks against whatever engine the framework binds.
pub fn run(accel: &Accel) -> SelfTestReport {
    let mut chan = accel.io_channel();
    let caps = chan.capabilities();
    info!(engine = chan.engine_name(), "self-test: checking accel dispatch");

    let mut results = Vec::new();
    let mut task = accel.task();

    // 1. Fill, then verify every byte.
    results.push(check("fill", {
        let mut buf = vec![0u8; 4096];
        let (status, cb) = status_probe();
        match chan.submit_fill(&mut task, &mut buf, 0xA5, cb) {
            Ok(()) => {
                chan.poll();
                if status.load(Ordering::SeqCst) != 0 {
                    Err(format!("completion status {}", status.load(Ordering::SeqCst)))
                } else if buf.iter().all(|&b| b == 0xA5) {
                    Ok(())
                } else {
                    Err("destination not filled".to_string())
                }
            }
            Err(e) => Err(e.to_string()),
        }
    }));

    // 2. Copy, source must land in the destination.
    results.push(check("copy", {
        let src: Vec<u8> = (0..4096).map(|i| (i % 255) as u8).collect();
        let mut dst = vec![0u8; 4096];
        let (status, cb) = status_probe();
        match chan.submit_copy(&mut task, &mut dst, &src, cb) {
            Ok(()) => {
                chan.poll();
                if status.load(Ordering::SeqCst) != 0 {
                    Err(format!("completion status {}", status.load(Ordering::SeqCst)))
                } else if dst == src {
                    Ok(())
                } else {
                    Err("destination differs from source".to_string())
                }
            }
            Err(e) => Err(e.to_string()),
        }
    }));

    // 3. Dualcast into two page-aligned destinations.
    results.push(check("dualcast", {
        let src: Vec<u8> = (0..4096).rev().map(|i| (i % 253) as u8).collect();
        let mut dst1 = PageAligned([0u8; 4096]);
        let mut dst2 = PageAligned([0u8; 4096]);
        let (status, cb) = status_probe();
        match chan.submit_dualcast(&mut task, &mut dst1.0, &mut dst2.0, &src, cb) {
            Ok(()) => {
                chan.poll();
                if status.load(Ordering::SeqCst) != 0 {
                    Err(format!("completion status {}", status.load(Ordering::SeqCst)))
                } else if dst1.0[..] == src[..] && dst2.0[..] == src[..] {
                    Ok(())
                } else {
                    Err("destinations differ from source".to_string())
                }
            }
            Err(e) => Err(e.to_string()),
        }
    }));

    // 4. Dualcast must reject a misaligned destination.
    results.push(check("dualcast-alignment", {
        let src = vec![0u8; 64];
        let mut dst1 = PageAligned([0u8; 4096]);
        let mut backing = PageAligned([0u8; 4096]);
        let misaligned = &mut backing.0[1..65];
        match chan.submit_dualcast(&mut task, &mut dst1.0[..64], misaligned, &src, |_| {}) {
            Err(AccelError::MisalignedDualcast) => Ok(()),
            Err(e) => Err(format!("unexpected error: {e}")),
            Ok(()) => Err("misaligned dualcast was accepted".to_string()),
        }
    }));

    // 5. Compare equal and differing buffers.
    results.push(check("compare", {
        let a = vec![0x11u8; 1024];
        let mut b = a.clone();
        let (eq_status, cb) = status_probe();
        let first = chan.submit_compare(&mut task, &a, &b, cb);
        chan.poll();
        b[1023] = 0x12;
        let (ne_status, cb) = status_probe();
        let second = chan.submit_compare(&mut task, &a, &b, cb);
        chan.poll();
        match (first, second) {
            (Ok(()), Ok(())) => {
                if eq_status.load(Ordering::SeqCst) == 0 && ne_status.load(Ordering::SeqCst) != 0 {
                    Ok(())
                } else {
                    Err(format!(
                        "equal status {}, differing status {}",
                        eq_status.load(Ordering::SeqCst),
                        ne_status.load(Ordering::SeqCst)
                    ))
                }
            }
            (Err(e), _) | (_, Err(e)) => Err(e.to_string()),
        }
    }));

    // 6. CRC-32C determinism and seed sensitivity.
    results.push(check("crc32c", {
        let src = b"accelerant self-test payload".to_vec();
        let mut first = 0u32;
        let mut second = 0u32;
        let mut reseeded = 0u32;
        let r1 = chan.submit_crc32c(&mut task, &mut first, &src, 0, |_| {});
        chan.poll();
        let r2 = chan.submit_crc32c(&mut task, &mut second, &src, 0, |_| {});
        chan.poll();
        let r3 = chan.submit_crc32c(&mut task, &mut reseeded, &src, 0xFFFF_0000, |_| {});
        chan.poll();
        match (r1, r2, r3) {
            (Ok(()), Ok(()), Ok(())) => {
                if first == second && first != reseeded {
                    Ok(())
                } else {
                    Err(format!(
                        "checksums {first:#010x}/{second:#010x}/{reseeded:#010x}"
                    ))
                }
            }
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => Err(e.to_string()),
        }
    }));

    // Batch checks only apply to engines that advertise batching.
    if caps.contains(Capabilities::BATCH) {
        results.push(check("batch-get-max", match chan.batch_get_max() {
            Ok(max) if max > 0 => Ok(()),
            Ok(_) => Err("engine advertises BATCH with zero max".to_string()),
            Err(e) => Err(e.to_string()),
        }));
    } else {
        results.push(CheckResult {
            check: "batch".to_string(),
            status: CheckStatus::Skipped,
            details: "engine does not advertise batching".to_string(),
        });
    }

    info!("self-test complete: {} check(s) run", results.len());

    SelfTestReport {
        engine: chan.engine_name().to_string(),
        capabilities: caps.iter_names().map(|(n, _)| n.to_string()).collect(),
        task_size: accel.task_size(),
        results,
    }
}
