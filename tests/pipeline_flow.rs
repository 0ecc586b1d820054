use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use touch_pipeline::{
    DataStream, Image, ModuleError, ModuleFactory, Payload, Pipeline, PropertyValue,
    StreamFormat, FOREGROUND,
};

/// Feed hand-made masks into a tracker through a bare stream.
#[test]
fn tracker_module_follows_a_driven_stream() {
    let factory = ModuleFactory::with_builtin();
    let mut tracker = factory.create("SimpleBlobTracker").unwrap();
    tracker.core_mut().assign_id("tracker").unwrap();
    tracker
        .set_property("max_age", PropertyValue::Int(1))
        .unwrap();

    let masks = Arc::new(DataStream::new("masks", StreamFormat::Image));
    tracker.set_input(Some(masks.clone()), 0).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add_element(tracker).unwrap();
    pipeline.start();

    let touches = pipeline.module("tracker").unwrap().output(1).unwrap();
    let mut square = Image::new(64, 64, 1);
    square.fill_rect(20, 20, 10, 10, FOREGROUND);
    let empty = Image::new(64, 64, 1);

    let mut counts = Vec::new();
    for mask in [&square, &square, &empty, &empty, &empty] {
        masks.push(Payload::Image(mask.clone())).unwrap();
        assert_eq!(pipeline.poll(), 1);
        let payload = touches.get_data().unwrap();
        counts.push(payload.as_touches().unwrap().len());
    }
    assert_eq!(counts, vec![1, 1, 1, 0, 0]);

    // Without a new mask the tracker is not dirty and does nothing.
    assert_eq!(pipeline.poll(), 0);
    assert_eq!(touches.sequence(), 5);
}

#[test]
fn color_frames_stop_the_tracker_but_not_the_pipeline() {
    let factory = ModuleFactory::with_builtin();
    let mut tracker = factory.create("SimpleBlobTracker").unwrap();
    tracker.core_mut().assign_id("tracker").unwrap();
    let frames = Arc::new(DataStream::new("frames", StreamFormat::Image));
    tracker.set_input(Some(frames.clone()), 0).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add_element(tracker).unwrap();
    pipeline.start();

    frames.push(Payload::Image(Image::new(32, 32, 3))).unwrap();
    pipeline.poll();

    assert!(pipeline.is_started());
    assert!(pipeline.have_error());
    let (id, error) = pipeline.last_error().unwrap();
    assert_eq!(id, "tracker");
    assert!(matches!(error, ModuleError::Runtime(_)));
    assert!(!pipeline.module("tracker").unwrap().is_started());

    // Acknowledging clears the flag; restarting is explicit.
    let tracker = pipeline.module_mut("tracker").unwrap();
    assert!(tracker.take_error().is_some());
    tracker.start().unwrap();
    assert!(!pipeline.have_error());
}

#[test]
fn touch_stream_can_be_followed_from_another_thread() {
    let factory = ModuleFactory::with_builtin();
    let mut source = factory.create("SyntheticSource").unwrap();
    source.core_mut().assign_id("cam").unwrap();
    source
        .set_property("blobs", PropertyValue::Int(4))
        .unwrap();
    let mut tracker = factory.create("SimpleBlobTracker").unwrap();
    tracker.core_mut().assign_id("tracker").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add_element(source).unwrap();
    pipeline.add_element(tracker).unwrap();
    pipeline.connect("cam", 0, "tracker", 0).unwrap();
    let touches = pipeline.module("tracker").unwrap().output(1).unwrap();
    pipeline.start();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let touches = touches.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut last = 0u64;
            let mut observed = 0u64;
            while !done.load(Ordering::Acquire) {
                let guard = touches.lock();
                assert!(guard.sequence() >= last);
                if guard.sequence() > last {
                    let records = guard.data().and_then(|p| p.as_touches()).unwrap();
                    let json = serde_json::to_value(records).unwrap();
                    assert!(json.as_array().unwrap().iter().all(|r| r["type"] == "touch"));
                    last = guard.sequence();
                    observed += 1;
                }
                drop(guard);
                thread::yield_now();
            }
            (last, observed)
        })
    };

    for _ in 0..200 {
        pipeline.poll();
    }
    done.store(true, Ordering::Release);
    let (last, observed) = reader.join().unwrap();

    assert_eq!(touches.sequence(), 200);
    assert!(last <= 200);
    assert!(observed <= last);
    assert!(!pipeline.have_error());
    pipeline.stop();
}

#[test]
fn status_snapshot_serializes() {
    let factory = ModuleFactory::with_builtin();
    let mut pipeline = Pipeline::new();
    for name in factory.list() {
        pipeline.add_element(factory.create(&name).unwrap()).unwrap();
    }
    let status = serde_json::to_value(pipeline.status()).unwrap();
    assert_eq!(status["size"], 2);
    assert_eq!(status["running"], false);
    let names: Vec<&str> = status["modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["SimpleBlobTracker", "SyntheticSource"]);
}
