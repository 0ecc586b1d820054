use std::collections::HashSet;

use approx::assert_abs_diff_eq;

use touch_pipeline::property::PropertyBag;
use touch_pipeline::{
    Blob, BlobDetector, BlobTracker, FrameSource, Image, SyntheticConfig, SyntheticSource,
    TouchRecord, TrackerParams, WorkingMask, FOREGROUND,
};

fn params(max_age: u32) -> TrackerParams {
    TrackerParams {
        min_size: 8,
        max_size: 25,
        min_age: 2,
        max_age,
    }
}

fn frame(width: u32, height: u32, squares: &[(i64, i64)]) -> Image {
    let mut image = Image::new(width, height, 1);
    for &(top, left) in squares {
        image.fill_rect(top, left, 10, 10, FOREGROUND);
    }
    image
}

#[test]
fn single_square_yields_one_touch() {
    let mut tracker = BlobTracker::new(params(3)).unwrap();
    let records = tracker.process(&frame(64, 64, &[(20, 20)])).unwrap();

    assert_eq!(records.len(), 1);
    let touch = records[0];
    assert_eq!(touch.id, 1);
    assert_abs_diff_eq!(touch.x, 0.39, epsilon = 1.0 / 64.0);
    assert_abs_diff_eq!(touch.y, 0.39, epsilon = 1.0 / 64.0);
    assert!((9..=11).contains(&touch.w));
    assert!((9..=11).contains(&touch.h));
}

#[test]
fn vanished_square_persists_for_max_age_frames() {
    let mut tracker = BlobTracker::new(params(3)).unwrap();
    tracker.process(&frame(64, 64, &[(20, 20)])).unwrap();

    let empty = frame(64, 64, &[]);
    let mut sizes = Vec::new();
    for _ in 0..3 {
        let records = tracker.process(&empty).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);
        sizes.push(records[0].w);
    }
    assert!(sizes.windows(2).all(|w| w[1] < w[0]), "shrinks: {:?}", sizes);
    assert!(tracker.process(&empty).unwrap().is_empty());
    assert!(tracker.is_empty());
}

#[test]
fn converging_squares_collapse_into_the_first_id() {
    let mut tracker = BlobTracker::new(params(3)).unwrap();
    for step in 0..=10i64 {
        let image = frame(96, 64, &[(20, 10 + 3 * step), (20, 60 - 3 * step)]);
        let records = tracker.process(&image).unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        if step < 7 {
            assert_eq!(ids, vec![1, 2], "step {}", step);
        } else {
            assert_eq!(ids, vec![1], "step {}", step);
        }
    }
}

#[test]
fn detector_covers_every_square_position() {
    let detector = BlobDetector::new(8, 25).unwrap();
    for side in [8i64, 11, 17, 25] {
        for top in (0..=(48 - side)).step_by(3) {
            for left in (0..=(48 - side)).step_by(5) {
                let mut image = Image::new(48, 48, 1);
                image.fill_rect(top, left, side, side, FOREGROUND);
                let square = Blob::from_bounds(
                    top as i32,
                    left as i32,
                    (top + side - 1) as i32,
                    (left + side - 1) as i32,
                );
                let found = detector.detect(WorkingMask::copy_from(&image).unwrap());
                assert!(
                    found.iter().any(|b| b.overlaps(&square)),
                    "side {} at ({}, {})",
                    side,
                    top,
                    left
                );
            }
        }
    }
}

fn synthetic(config: SyntheticConfig) -> SyntheticSource {
    let mut source = SyntheticSource::new(config);
    let mut properties = PropertyBag::new();
    for (name, property) in source.default_properties() {
        properties.register(name, property);
    }
    source.open(&properties).unwrap();
    source
}

#[test]
fn ids_stay_unique_and_coordinates_in_range() {
    let mut source = synthetic(SyntheticConfig {
        width: 160,
        height: 120,
        blobs: 6,
        size: 12,
        speed: 4,
        seed: 11,
    });
    let mut tracker = BlobTracker::new(params(3)).unwrap();
    let mut last_id = 0;
    for _ in 0..300 {
        let image = source.capture_one_frame().unwrap().unwrap();
        let records: Vec<TouchRecord> = tracker.process(&image).unwrap();

        let ids: HashSet<u64> = tracker.tracked().map(|t| t.id).collect();
        assert_eq!(ids.len(), tracker.len(), "duplicate id in tracked set");
        for record in &records {
            assert!((0.0..=1.0).contains(&record.x));
            assert!((0.0..=1.0).contains(&record.y));
        }
        let max = ids.iter().copied().max().unwrap_or(0);
        assert!(max < tracker.next_id());
        last_id = last_id.max(max);
    }
    assert!(last_id >= 1);
}

#[test]
fn isolated_square_keeps_its_id_while_moving() {
    let mut source = synthetic(SyntheticConfig {
        width: 128,
        height: 96,
        blobs: 1,
        size: 12,
        speed: 2,
        seed: 5,
    });
    let mut tracker = BlobTracker::new(params(3)).unwrap();
    for _ in 0..200 {
        let image = source.capture_one_frame().unwrap().unwrap();
        let records = tracker.process(&image).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);
    }
}
