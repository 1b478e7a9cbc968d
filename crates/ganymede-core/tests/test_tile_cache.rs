#[allow(dead_code)]
mod common;

use std::sync::Arc;

use common::{pool, wait_until, Gate, MockDecoder, RecordingCanvas};
use ganymede_core::geometry::{Rect, RectF};
use ganymede_core::tile::TileCache;

const WINDOW: RectF = RectF::new(0.0, 0.0, 800.0, 600.0);

/// 8000x6000 image behind an 800x600 window with 512 px tiles, full level loaded.
fn loaded_cache(decoder: MockDecoder) -> (TileCache, Arc<common::DecoderStats>) {
    let (decoder, stats) = decoder.shared();
    let mut cache = TileCache::new(decoder, pool(2));
    assert!(cache.ensure_full_level(800, 600, 512));
    assert!(wait_until(|| {
        cache.poll();
        cache.is_full_ready()
    }));
    (cache, stats)
}

fn settle(cache: &mut TileCache) -> bool {
    let mut invalidated = false;
    assert!(wait_until(|| {
        invalidated |= cache.poll().invalidate;
        cache.pending_decodes() == 0
    }));
    invalidated
}

#[test]
fn test_full_level_layout() {
    let (cache, stats) = loaded_cache(MockDecoder::new(8000, 6000));
    assert_eq!(cache.full_sample(), 8);
    let full = cache.full_level().unwrap();
    // 512 sampled px at sample 8 covers 4096 image px: 2x2 tiles.
    assert_eq!(full.len(), 4);
    assert_eq!(full.resident_count(), 4);
    assert_eq!(full.tiles()[3].rect(), Rect::new(4096, 4096, 8000, 6000));
    assert_eq!(full.tiles()[3].pixels().unwrap().width(), (8000 - 4096) / 8);
    assert_eq!(stats.decodes(), 4);
}

#[test]
fn test_draw_waits_for_full_level() {
    let gate = Arc::new(Gate::default());
    let (decoder, _stats) = MockDecoder::new(8000, 6000).gated(gate.clone()).shared();
    let mut cache = TileCache::new(decoder, pool(1));
    cache.ensure_full_level(800, 600, 512);

    let mut canvas = RecordingCanvas::default();
    let stats = cache.draw(&mut canvas, &RectF::from_size(8000.0, 6000.0), &WINDOW, false);
    assert_eq!(stats.drawn, 0);
    assert_eq!(stats.scheduled, 0);
    assert!(canvas.calls.is_empty());
    assert_eq!(cache.current_sample(), None);

    gate.open();
    assert!(wait_until(|| {
        cache.poll();
        cache.is_full_ready()
    }));
}

#[test]
fn test_ensure_full_level_is_idempotent() {
    let (mut cache, _stats) = loaded_cache(MockDecoder::new(8000, 6000));
    assert!(!cache.ensure_full_level(800, 600, 512));
    assert!(!cache.ensure_full_level(0, 600, 512));

    assert!(cache.ensure_full_level(400, 300, 512));
    assert_eq!(cache.full_sample(), 16);
    assert!(!cache.is_full_ready());
}

#[test]
fn test_fit_draw_uses_full_level() {
    let (mut cache, stats) = loaded_cache(MockDecoder::new(8000, 6000));
    let mut canvas = RecordingCanvas::default();
    let drawn = cache.draw(&mut canvas, &RectF::from_size(8000.0, 6000.0), &WINDOW, false);

    assert_eq!(drawn.sample, 8);
    assert_eq!(drawn.drawn, 4);
    assert_eq!(drawn.scheduled, 0);
    assert_eq!(canvas.calls.len(), 4);
    assert!(cache.level_samples().is_empty());
    assert_eq!(stats.decodes(), 4);
}

#[test]
fn test_zoomed_draw_schedules_each_tile_once() {
    let (mut cache, stats) = loaded_cache(MockDecoder::new(8000, 6000));
    let mut canvas = RecordingCanvas::default();

    let first = cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(first.sample, 1);
    assert_eq!(first.scheduled, 4);
    assert_eq!(first.drawn, 0);
    assert_eq!(first.fallback, 1);

    let second = cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(second.scheduled, 0);

    assert!(settle(&mut cache));
    assert_eq!(stats.decodes(), 4 + 4);

    let third = cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(third.drawn, 4);
    assert_eq!(third.fallback, 0);
    assert_eq!(third.scheduled, 0);
    assert_eq!(cache.level(1).unwrap().resident_count(), 4);
}

#[test]
fn test_animating_draw_only_falls_back() {
    let (mut cache, _stats) = loaded_cache(MockDecoder::new(8000, 6000));
    let mut canvas = RecordingCanvas::default();

    let stats = cache.draw(&mut canvas, &WINDOW, &WINDOW, true);
    assert_eq!(stats.scheduled, 0);
    assert_eq!(stats.fallback, 1);
    assert_eq!(cache.pending_decodes(), 0);

    assert!(cache.on_animation_state_change(false));
    let stats = cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(stats.scheduled, 4);
}

#[test]
fn test_gc_frees_other_levels() {
    let (mut cache, _stats) = loaded_cache(MockDecoder::new(8000, 6000));
    let mut canvas = RecordingCanvas::default();
    cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    settle(&mut cache);
    cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(cache.level(1).unwrap().resident_count(), 4);

    let stats = cache.draw(&mut canvas, &RectF::new(0.0, 0.0, 1600.0, 1200.0), &WINDOW, false);
    assert_eq!(stats.sample, 2);
    assert_eq!(cache.current_sample(), Some(2));
    assert_eq!(cache.level(1).unwrap().resident_count(), 0);
    // Full level survives gc.
    assert_eq!(cache.full_level().unwrap().resident_count(), 4);
}

#[test]
fn test_gc_frees_tiles_panned_out_of_view() {
    let (mut cache, _stats) = loaded_cache(MockDecoder::new(8000, 6000));
    let mut canvas = RecordingCanvas::default();
    cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    settle(&mut cache);

    let far = RectF::new(4000.0, 3000.0, 4800.0, 3600.0);
    cache.draw(&mut canvas, &far, &WINDOW, false);
    let level = cache.level(1).unwrap();
    assert_eq!(level.resident_count(), 0);
    assert!(level.tiles()[0].rect() == Rect::new(0, 0, 512, 512));
    assert!(!level.tiles()[0].is_visible());
}

#[test]
fn test_failed_tile_is_not_retried() {
    let decoder = MockDecoder::new(8000, 6000).failing(Rect::new(0, 0, 512, 512));
    let (mut cache, stats) = loaded_cache(decoder);
    let mut canvas = RecordingCanvas::default();

    cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    settle(&mut cache);
    let decodes = stats.decodes();

    let again = cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(again.scheduled, 0);
    assert_eq!(again.drawn, 3);
    // The failed tile keeps showing the full level.
    assert_eq!(again.fallback, 1);
    assert!(cache.level(1).unwrap().tiles()[0].is_failed());
    assert_eq!(stats.decodes(), decodes);
}

#[test]
fn test_evict_on_demand_keeps_full_level() {
    let (mut cache, _stats) = loaded_cache(MockDecoder::new(8000, 6000));
    let mut canvas = RecordingCanvas::default();
    cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    settle(&mut cache);

    let full_bytes = cache.full_level().unwrap().resident_bytes();
    assert!(cache.resident_bytes() > full_bytes);
    assert_eq!(cache.evict_on_demand(), 4);
    assert_eq!(cache.resident_bytes(), full_bytes);
}

#[test]
fn test_teardown_releases_idle_decoder_now() {
    let (mut cache, stats) = loaded_cache(MockDecoder::new(8000, 6000));
    cache.teardown();
    assert!(cache.is_torn_down());
    assert_eq!(stats.releases(), 1);
    assert_eq!(cache.resident_bytes(), 0);
    assert!(!cache.ensure_full_level(400, 300, 512));
}

#[test]
fn test_teardown_defers_release_to_running_decode() {
    let gate = Arc::new(Gate::default());
    let (decoder, stats) = MockDecoder::new(8000, 6000).gated(gate.clone()).shared();
    let mut cache = TileCache::new(decoder, pool(1));
    cache.ensure_full_level(800, 600, 512);
    assert!(wait_until(|| gate.entered() == 1));

    cache.teardown();
    assert_eq!(stats.releases(), 0);

    gate.open();
    assert!(wait_until(|| stats.releases() == 1));
    // Cancelled between tiles: the batch stops after the one in flight.
    assert_eq!(stats.decodes(), 1);
    assert_eq!(cache.poll().applied, 0);
    assert_eq!(stats.releases(), 1);
}

#[test]
fn test_cancelled_decode_blocks_reschedule_until_it_returns() {
    let gate = Arc::new(Gate::default());
    let decoder = MockDecoder::new(8000, 6000).gated_at(gate.clone(), 1);
    let (decoder, stats) = decoder.shared();
    let mut cache = TileCache::new(decoder, pool(8));
    cache.ensure_full_level(800, 600, 512);
    assert!(wait_until(|| {
        cache.poll();
        cache.is_full_ready()
    }));
    let mut canvas = RecordingCanvas::default();

    let first = cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(first.scheduled, 4);
    assert!(wait_until(|| gate.entered() == 4));

    // Zooming out cancels the sample 1 decodes, which keep running.
    let out = cache.draw(&mut canvas, &RectF::new(0.0, 0.0, 1600.0, 1200.0), &WINDOW, false);
    assert_eq!(out.sample, 2);
    assert!(!cache.level(1).unwrap().tiles()[0].is_loading());

    let back = cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(back.scheduled, 0);
    assert!(cache.pending_decodes() >= 4);

    gate.open();
    assert!(settle(&mut cache));
    let retry = cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(retry.scheduled, 4);
    settle(&mut cache);

    assert_eq!(stats.max_overlap(), 1);
    let done = cache.draw(&mut canvas, &WINDOW, &WINDOW, false);
    assert_eq!(done.drawn, 4);
}
