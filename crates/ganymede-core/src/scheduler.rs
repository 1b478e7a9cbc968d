//! Background decode dispatch.
//!
//! Decodes run on a rayon pool. Each task owns a clone of the decoder handle
//! and reports back over an mpsc channel; all tile state stays on the control
//! thread, which drains the channel with [`DecodeScheduler::drain`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::decoder::SharedDecoder;
use crate::error::{GanymedeError, Result};
use crate::geometry::Rect;
use crate::pixels::PixelBuffer;
use crate::tile::TileKey;

/// Lifecycle of one background task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Running = 0,
    /// Result handed to the channel.
    Completed = 1,
    /// Cancelled by the owner; any result is dropped on the worker.
    Cancelled = 2,
    /// Owner gone before completion; the worker freed the result itself.
    OrphanCleanup = 3,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Running,
            1 => TaskState::Completed,
            2 => TaskState::Cancelled,
            _ => TaskState::OrphanCleanup,
        }
    }
}

#[derive(Debug)]
struct TaskShared {
    state: AtomicU8,
    /// Set by the worker once it has returned, whatever the state.
    finished: AtomicBool,
}

/// Task state shared between the control thread and the worker.
#[derive(Clone, Debug)]
pub struct TaskControl(Arc<TaskShared>);

impl TaskControl {
    pub fn new() -> Self {
        Self(Arc::new(TaskShared {
            state: AtomicU8::new(TaskState::Running as u8),
            finished: AtomicBool::new(false),
        }))
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.0.state.load(Ordering::Acquire))
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// The worker is done with this task. A cancelled task may still be
    /// decoding until this turns true.
    pub fn is_finished(&self) -> bool {
        self.0.finished.load(Ordering::Acquire)
    }

    /// Running -> Cancelled. False if the task already finished.
    pub fn cancel(&self) -> bool {
        self.transition(TaskState::Running, TaskState::Cancelled)
    }

    fn complete(&self) -> bool {
        self.transition(TaskState::Running, TaskState::Completed)
    }

    fn orphan(&self) {
        self.0
            .state
            .store(TaskState::OrphanCleanup as u8, Ordering::Release);
    }

    fn finish(&self) {
        self.0.finished.store(true, Ordering::Release);
    }

    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for TaskControl {
    fn default() -> Self {
        Self::new()
    }
}

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Shared worker pool plus an optional callback fired after each delivered result.
#[derive(Clone)]
pub struct DecodePool {
    pool: Arc<rayon::ThreadPool>,
    waker: Option<Waker>,
}

impl DecodePool {
    /// Build a pool with `threads` workers (0 = rayon's default).
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ganymede-decode-{i}"))
            .build()
            .map_err(|e| GanymedeError::ThreadPool(e.to_string()))?;
        Ok(Self {
            pool: Arc::new(pool),
            waker: None,
        })
    }

    /// Call `waker` from the worker after every result it sends, and after a
    /// cancelled task returns.
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Arc::new(waker));
        self
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn wake(&self) {
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}

impl fmt::Debug for DecodePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodePool")
            .field("threads", &self.threads())
            .field("waker", &self.waker.is_some())
            .finish()
    }
}

/// Run `job` on the pool and send its output over `tx`.
///
/// A task cancelled before it starts never runs `job`. A task cancelled while
/// running drops its output on the worker. If the receiver is gone the task
/// moves to [`TaskState::OrphanCleanup`] and frees the output itself.
pub fn spawn_task<T, F>(pool: &DecodePool, tx: mpsc::Sender<T>, job: F) -> TaskControl
where
    T: Send + 'static,
    F: FnOnce(&TaskControl) -> T + Send + 'static,
{
    let control = TaskControl::new();
    let worker_control = control.clone();
    let worker_pool = pool.clone();

    pool.pool.spawn(move || {
        if worker_control.is_cancelled() {
            worker_control.finish();
            worker_pool.wake();
            return;
        }
        let output = job(&worker_control);
        if !worker_control.complete() {
            debug!("Dropping result of cancelled task");
            drop(output);
            worker_control.finish();
            worker_pool.wake();
            return;
        }
        let sent = tx.send(output);
        worker_control.finish();
        match sent {
            Ok(()) => worker_pool.wake(),
            Err(mpsc::SendError(orphaned)) => {
                worker_control.orphan();
                warn!("Task owner gone, freeing result on worker");
                drop(orphaned);
            }
        }
    });

    control
}

/// Result of one decode task, delivered on the control thread.
#[derive(Debug)]
pub enum DecodeResult {
    Tile {
        key: TileKey,
        result: Result<PixelBuffer>,
    },
    FullLevel {
        sample: u32,
        /// One entry per full-level tile, in grid order.
        results: Vec<Result<PixelBuffer>>,
    },
}

struct DecodeMessage {
    task: u64,
    result: DecodeResult,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum TaskTarget {
    Tile(TileKey),
    FullLevel,
}

struct Outstanding {
    task: u64,
    control: TaskControl,
}

/// Dispatches region decodes for one source, at most one task per tile.
///
/// A cancelled tile task stays in `cancelled` until its worker returns, and
/// the tile cannot be scheduled again before that.
pub struct DecodeScheduler {
    pool: DecodePool,
    decoder: Option<SharedDecoder>,
    tx: mpsc::Sender<DecodeMessage>,
    rx: mpsc::Receiver<DecodeMessage>,
    outstanding: HashMap<TaskTarget, Outstanding>,
    cancelled: HashMap<TileKey, TaskControl>,
    next_task: u64,
}

impl DecodeScheduler {
    pub fn new(pool: DecodePool, decoder: SharedDecoder) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            pool,
            decoder: Some(decoder),
            tx,
            rx,
            outstanding: HashMap::new(),
            cancelled: HashMap::new(),
            next_task: 0,
        }
    }

    /// The decoder, until [`DecodeScheduler::shutdown`] hands it off.
    pub fn decoder(&self) -> Option<&SharedDecoder> {
        self.decoder.as_ref()
    }

    pub fn pending_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_tile_pending(&self, key: TileKey) -> bool {
        self.outstanding.contains_key(&TaskTarget::Tile(key))
    }

    pub fn is_full_level_pending(&self) -> bool {
        self.outstanding.contains_key(&TaskTarget::FullLevel)
    }

    /// Cancelled tile tasks whose worker has not returned yet.
    pub fn cancelled_in_flight(&self) -> usize {
        self.cancelled.len()
    }

    /// Decode of `key` running or queued, cancelled or not.
    pub fn is_tile_in_flight(&self, key: TileKey) -> bool {
        self.is_tile_pending(key)
            || self
                .cancelled
                .get(&key)
                .is_some_and(|c| !c.is_finished())
    }

    /// Forget cancelled tasks whose worker has returned. Returns how many.
    pub fn settle_cancelled(&mut self) -> usize {
        let before = self.cancelled.len();
        self.cancelled.retain(|_, c| !c.is_finished());
        before - self.cancelled.len()
    }

    /// Queue a decode of `rect` for `key`. False if a decode of the tile is
    /// still in flight, even a cancelled one, or the decoder has been handed off.
    pub fn schedule_tile(&mut self, key: TileKey, rect: Rect) -> bool {
        let target = TaskTarget::Tile(key);
        if self.is_tile_in_flight(key) {
            return false;
        }
        self.cancelled.remove(&key);
        let Some(decoder) = self.decoder.clone() else {
            return false;
        };

        let task = self.next_task_id();
        let control = spawn_task(&self.pool, self.tx.clone(), move |_: &TaskControl| {
            DecodeMessage {
                task,
                result: DecodeResult::Tile {
                    key,
                    result: decoder.decode_region(rect, key.sample),
                },
            }
        });
        debug!(sample = key.sample, index = key.index, %rect, "Tile decode scheduled");
        self.outstanding.insert(target, Outstanding { task, control });
        true
    }

    /// Queue one task decoding every full-level tile in order. Replaces any
    /// previous full-level task.
    pub fn schedule_full_level(&mut self, sample: u32, rects: Vec<Rect>) -> bool {
        self.cancel_target(TaskTarget::FullLevel);
        let Some(decoder) = self.decoder.clone() else {
            return false;
        };

        let task = self.next_task_id();
        let count = rects.len();
        let control = spawn_task(&self.pool, self.tx.clone(), move |control: &TaskControl| {
            let mut results = Vec::with_capacity(rects.len());
            for rect in rects {
                if control.is_cancelled() {
                    break;
                }
                results.push(decoder.decode_region(rect, sample));
            }
            DecodeMessage {
                task,
                result: DecodeResult::FullLevel { sample, results },
            }
        });
        debug!(sample, tiles = count, "Full level decode scheduled");
        self.outstanding
            .insert(TaskTarget::FullLevel, Outstanding { task, control });
        true
    }

    pub fn cancel_tile(&mut self, key: TileKey) -> bool {
        self.cancel_target(TaskTarget::Tile(key))
    }

    /// Cancel the outstanding tile tasks matching `pred`.
    pub fn cancel_tiles_where(&mut self, mut pred: impl FnMut(TileKey) -> bool) -> usize {
        let keys: Vec<TaskTarget> = self
            .outstanding
            .keys()
            .filter(|t| matches!(t, TaskTarget::Tile(k) if pred(*k)))
            .copied()
            .collect();
        keys.into_iter()
            .filter(|t| self.cancel_target(*t))
            .count()
    }

    /// Cancel every outstanding task. Returns how many were tracked.
    pub fn cancel_all(&mut self) -> usize {
        let targets: Vec<TaskTarget> = self.outstanding.keys().copied().collect();
        let count = targets.len();
        for target in targets {
            self.cancel_target(target);
        }
        if count > 0 {
            debug!(count, "Cancelled outstanding decodes");
        }
        count
    }

    /// Collect finished results without blocking. Results of cancelled or
    /// superseded tasks are dropped here.
    pub fn drain(&mut self) -> Vec<DecodeResult> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            let target = match &msg.result {
                DecodeResult::Tile { key, .. } => TaskTarget::Tile(*key),
                DecodeResult::FullLevel { .. } => TaskTarget::FullLevel,
            };
            match self.outstanding.get(&target) {
                Some(o) if o.task == msg.task => {
                    self.outstanding.remove(&target);
                    out.push(msg.result);
                }
                _ => debug!(task = msg.task, "Discarding stale decode result"),
            }
        }
        out
    }

    /// Cancel everything and drop this scheduler's decoder handle.
    ///
    /// Returns true if the decoder was released right away; otherwise the last
    /// outstanding task releases it when it finishes.
    pub fn shutdown(&mut self) -> bool {
        self.cancel_all();
        // Nothing can be scheduled again; stragglers only matter for release.
        self.cancelled.clear();
        // Drain so queued results are freed now rather than with the scheduler.
        while self.rx.try_recv().is_ok() {}
        match self.decoder.take() {
            Some(decoder) => {
                let last = decoder.holders() == 1;
                if !last {
                    debug!(
                        holders = decoder.holders() - 1,
                        "Decoder release deferred to outstanding tasks"
                    );
                }
                drop(decoder);
                last
            }
            None => false,
        }
    }

    fn cancel_target(&mut self, target: TaskTarget) -> bool {
        let Some(o) = self.outstanding.remove(&target) else {
            return false;
        };
        // A task that already completed has stopped decoding.
        if o.control.cancel() && !o.control.is_finished() {
            if let TaskTarget::Tile(key) = target {
                self.cancelled.insert(key, o.control);
            }
        }
        true
    }

    fn next_task_id(&mut self) -> u64 {
        self.next_task += 1;
        self.next_task
    }
}

impl fmt::Debug for DecodeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeScheduler")
            .field("pool", &self.pool)
            .field("decoder", &self.decoder)
            .field("outstanding", &self.outstanding.len())
            .field("cancelled", &self.cancelled.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_only_from_running() {
        let c = TaskControl::new();
        assert!(c.complete());
        assert!(!c.cancel());
        assert_eq!(c.state(), TaskState::Completed);
    }

    #[test]
    fn test_orphaned_task_frees_its_result() {
        let pool = DecodePool::new(1).unwrap();
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        drop(rx);
        let control = spawn_task(&pool, tx, |_: &TaskControl| vec![0u8; 16]);
        for _ in 0..200 {
            if control.state() != TaskState::Running {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(control.state(), TaskState::OrphanCleanup);
    }
}
