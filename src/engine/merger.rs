use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{bounded, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, info};

use crate::error::{QuarryError, Result};
use crate::index::{BatchMerger, InvertedIndex, PendingBuffer};
use crate::metrics::EngineMetrics;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergerSignal {
    /// The backlog passed the high-water mark
    Wake,
    Shutdown,
}

/// Everything the merger thread needs, shared with the engine
pub struct MergerContext {
    pub index: Arc<InvertedIndex>,
    pub pending: Arc<PendingBuffer>,
    pub merger: Arc<BatchMerger>,
    pub metrics: EngineMetrics,
    pub batch_size: usize,
    pub interval: Duration,
}

pub struct MergerHandle {
    tx: Sender<MergerSignal>,
    join: Option<thread::JoinHandle<()>>,
}

impl MergerHandle {
    /// Ask for a merge soon; coalesces with an already queued wake-up
    pub fn wake(&self) {
        match self.tx.try_send(MergerSignal::Wake) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => debug!("merger thread already stopped"),
        }
    }

    /// Stop the thread and wait for it
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let join = match self.join.take() {
            Some(join) => join,
            None => return Ok(()),
        };
        let _ = self.tx.send(MergerSignal::Shutdown);
        join.join()
            .map_err(|_| QuarryError::Internal("merger thread panicked".to_string()))
    }
}

impl Drop for MergerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Spawn the background merger
///
/// Every `interval`, or sooner when woken, the thread merges one batch and
/// keeps merging while the backlog stays above the high-water mark.
pub fn spawn_merger(ctx: MergerContext) -> Result<MergerHandle> {
    let (tx, rx) = bounded(1);

    let join = thread::Builder::new()
        .name("quarry-merger".to_string())
        .spawn(move || {
            info!(interval_ms = ctx.interval.as_millis() as u64, "merger thread started");
            loop {
                match rx.recv_timeout(ctx.interval) {
                    Ok(MergerSignal::Wake) | Err(RecvTimeoutError::Timeout) => run_merges(&ctx),
                    Ok(MergerSignal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("merger thread stopped");
        })?;

    Ok(MergerHandle {
        tx,
        join: Some(join),
    })
}

fn run_merges(ctx: &MergerContext) {
    loop {
        let report = ctx.merger.merge(&ctx.index, &ctx.pending, ctx.batch_size);
        ctx.metrics.record_merge(&report);
        if report.is_empty() || !ctx.pending.over_high_water_mark() {
            break;
        }
    }
    ctx.metrics
        .set_sizes(ctx.pending.len(), ctx.index.doc_count());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DocumentVector;
    use crate::models::{OperationKind, WeightClass};
    use crate::tokenizer::Token;
    use std::time::Instant;

    fn context(high_water_mark: usize, interval_ms: u64) -> MergerContext {
        MergerContext {
            index: Arc::new(InvertedIndex::new(4, 4)),
            pending: Arc::new(PendingBuffer::new(high_water_mark)),
            merger: Arc::new(BatchMerger::new()),
            metrics: EngineMetrics::new().unwrap(),
            batch_size: 10,
            interval: Duration::from_millis(interval_ms),
        }
    }

    fn vector() -> DocumentVector {
        DocumentVector::from_tokens(vec![Token {
            term: "alpha".to_string(),
            position: 0,
            class: WeightClass::Body,
        }])
    }

    fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_periodic_merge() {
        let ctx = context(1_000, 10);
        let pending = ctx.pending.clone();
        let index = ctx.index.clone();
        for id in 0..25 {
            pending.stage(id, vector(), OperationKind::Insert);
        }

        let handle = spawn_merger(ctx).unwrap();
        assert!(wait_until(Duration::from_secs(5), || index.doc_count() == 25));
        assert!(pending.is_empty());
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_wake_drains_below_high_water_mark() {
        // Long interval: only the wake-up can trigger merging
        let ctx = context(5, 60_000);
        let pending = ctx.pending.clone();
        let handle = spawn_merger(ctx).unwrap();

        for id in 0..40 {
            pending.stage(id, vector(), OperationKind::Insert);
        }
        handle.wake();

        assert!(wait_until(Duration::from_secs(5), || !pending.over_high_water_mark()));
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_drop_stops_thread() {
        let ctx = context(10, 10);
        let handle = spawn_merger(ctx).unwrap();
        drop(handle);
    }
}
