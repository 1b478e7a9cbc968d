#[allow(dead_code)]
mod common;

use std::sync::mpsc;
use std::sync::Arc;

use common::{pool, wait_until, Gate, MockDecoder};
use ganymede_core::geometry::Rect;
use ganymede_core::scheduler::{spawn_task, DecodeResult, DecodeScheduler, TaskControl, TaskState};
use ganymede_core::tile::TileKey;

const KEY: TileKey = TileKey { sample: 1, index: 0 };
const RECT: Rect = Rect::new(0, 0, 64, 64);

#[test]
fn test_one_task_per_tile() {
    let (decoder, stats) = MockDecoder::new(256, 256).shared();
    let mut scheduler = DecodeScheduler::new(pool(2), decoder);

    assert!(scheduler.schedule_tile(KEY, RECT));
    assert!(!scheduler.schedule_tile(KEY, RECT));
    assert!(scheduler.is_tile_pending(KEY));
    assert_eq!(scheduler.pending_count(), 1);

    let mut results = Vec::new();
    assert!(wait_until(|| {
        results.extend(scheduler.drain());
        !results.is_empty()
    }));
    assert_eq!(stats.decodes(), 1);
    assert!(!scheduler.is_tile_pending(KEY));
    match &results[0] {
        DecodeResult::Tile { key, result } => {
            assert_eq!(*key, KEY);
            assert_eq!(result.as_ref().unwrap().width(), 64);
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_cancelled_tile_result_is_discarded() {
    let gate = Arc::new(Gate::default());
    let (decoder, stats) = MockDecoder::new(256, 256).gated(gate.clone()).shared();
    let mut scheduler = DecodeScheduler::new(pool(1), decoder);

    scheduler.schedule_tile(KEY, RECT);
    assert!(wait_until(|| gate.entered() == 1));
    assert!(scheduler.cancel_tile(KEY));
    assert!(!scheduler.cancel_tile(KEY));
    // Still decoding on the worker, so no second task for the tile.
    assert!(scheduler.is_tile_in_flight(KEY));
    assert!(!scheduler.schedule_tile(KEY, RECT));
    assert_eq!(scheduler.cancelled_in_flight(), 1);
    gate.open();

    assert!(wait_until(|| scheduler.settle_cancelled() == 1));
    assert!(scheduler.drain().is_empty());
    assert_eq!(stats.decodes(), 1);
    // A fresh task for the same tile is allowed again.
    assert!(scheduler.schedule_tile(KEY, RECT));
}

#[test]
fn test_cancel_tiles_where_filters_by_sample() {
    let gate = Arc::new(Gate::default());
    let (decoder, _stats) = MockDecoder::new(256, 256).gated(gate.clone()).shared();
    let mut scheduler = DecodeScheduler::new(pool(1), decoder);

    for index in 0..3 {
        scheduler.schedule_tile(TileKey { sample: 1, index }, RECT);
    }
    scheduler.schedule_tile(TileKey { sample: 2, index: 0 }, RECT);

    assert_eq!(scheduler.cancel_tiles_where(|k| k.sample == 1), 3);
    assert_eq!(scheduler.pending_count(), 1);
    assert_eq!(scheduler.cancel_all(), 1);
    gate.open();
}

#[test]
fn test_full_level_batch_in_order() {
    let (decoder, stats) = MockDecoder::new(256, 256).shared();
    let mut scheduler = DecodeScheduler::new(pool(2), decoder);
    let rects = vec![
        Rect::new(0, 0, 128, 256),
        Rect::new(128, 0, 256, 256),
    ];
    assert!(scheduler.schedule_full_level(2, rects));
    assert!(scheduler.is_full_level_pending());

    let mut results = Vec::new();
    assert!(wait_until(|| {
        results.extend(scheduler.drain());
        !results.is_empty()
    }));
    assert_eq!(stats.decodes(), 2);
    match results.remove(0) {
        DecodeResult::FullLevel { sample, results } => {
            assert_eq!(sample, 2);
            assert_eq!(results.len(), 2);
            assert!(results.iter().all(|r| r.as_ref().unwrap().width() == 64));
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_shutdown_hands_decoder_to_last_task() {
    let gate = Arc::new(Gate::default());
    let (decoder, stats) = MockDecoder::new(256, 256).gated(gate.clone()).shared();
    let mut scheduler = DecodeScheduler::new(pool(1), decoder);
    scheduler.schedule_tile(KEY, RECT);
    assert!(wait_until(|| gate.entered() == 1));

    assert!(!scheduler.shutdown());
    assert!(scheduler.decoder().is_none());
    assert!(!scheduler.schedule_tile(KEY, RECT));
    assert_eq!(stats.releases(), 0);

    gate.open();
    assert!(wait_until(|| stats.releases() == 1));
}

#[test]
fn test_shutdown_when_idle_releases_now() {
    let (decoder, stats) = MockDecoder::new(256, 256).shared();
    let mut scheduler = DecodeScheduler::new(pool(1), decoder);
    assert!(scheduler.shutdown());
    assert_eq!(stats.releases(), 1);
}

#[test]
fn test_task_cancelled_before_start_never_runs() {
    let gate = Arc::new(Gate::default());
    let pool = pool(1);

    // Occupy the only worker so the second task stays queued.
    let (block_tx, _block_rx) = mpsc::channel::<()>();
    let blocker = gate.clone();
    spawn_task(&pool, block_tx, move |_: &TaskControl| blocker.pass());
    assert!(wait_until(|| gate.entered() == 1));

    let (tx, rx) = mpsc::channel::<u32>();
    let control = spawn_task(&pool, tx, |_: &TaskControl| 7);
    assert!(control.cancel());
    assert_eq!(control.state(), TaskState::Cancelled);

    gate.open();
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert!(rx.try_recv().is_err());
}
