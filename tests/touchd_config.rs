use std::io::Write;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use touch_pipeline::config::{TouchdConfig, SOURCE_ID, TRACKER_ID};
use touch_pipeline::ModuleFactory;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "TOUCHD_CONFIG",
        "TOUCHD_MIN_SIZE",
        "TOUCHD_MAX_SIZE",
        "TOUCHD_MIN_AGE",
        "TOUCHD_MAX_AGE",
        "TOUCHD_DELAY_MS",
        "TOUCHD_SOURCE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let cfg = TouchdConfig::load().expect("load defaults");
    assert_eq!(cfg.delay.as_millis(), 5);
    assert_eq!(cfg.source.kind, "synthetic");
    assert_eq!(cfg.tracker.min_size, 8);
    assert_eq!(cfg.tracker.max_size, 25);
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "delay_ms": 20,
        "source": { "kind": "Synthetic", "width": 200, "height": 100, "blobs": 2, "seed": 9 },
        "tracker": { "min_size": 6, "max_size": 30, "min_age": 1, "max_age": 4 }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("TOUCHD_CONFIG", file.path());
    std::env::set_var("TOUCHD_MAX_AGE", "7");
    std::env::set_var("TOUCHD_DELAY_MS", "15");

    let cfg = TouchdConfig::load().expect("load config");
    assert_eq!(cfg.delay.as_millis(), 15);
    assert_eq!(cfg.source.kind, "synthetic");
    assert_eq!(cfg.source.synthetic.width, 200);
    assert_eq!(cfg.source.synthetic.height, 100);
    assert_eq!(cfg.source.synthetic.blobs, 2);
    assert_eq!(cfg.source.synthetic.seed, 9);
    assert_eq!(cfg.tracker.min_size, 6);
    assert_eq!(cfg.tracker.max_size, 30);
    assert_eq!(cfg.tracker.min_age, 1);
    assert_eq!(cfg.tracker.max_age, 7);

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
delay_ms = 1

[tracker]
min_size = 10
max_size = 12
"#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("TOUCHD_CONFIG", file.path());

    let cfg = TouchdConfig::load().expect("load config");
    assert_eq!(cfg.delay.as_millis(), 1);
    assert_eq!(cfg.tracker.min_size, 10);
    assert_eq!(cfg.tracker.max_size, 12);
    assert_eq!(cfg.tracker.max_age, 3);

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    std::env::set_var("TOUCHD_MIN_SIZE", "40");
    assert!(TouchdConfig::load().is_err());
    clear_env();

    std::env::set_var("TOUCHD_MAX_AGE", "soon");
    assert!(TouchdConfig::load().is_err());
    clear_env();

    std::env::set_var("TOUCHD_SOURCE", "v4l2");
    let err = TouchdConfig::load().unwrap_err();
    assert!(err.to_string().contains("source.kind"));
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "tracker": { "min_sise": 4 } }"#)
        .expect("write config");
    std::env::set_var("TOUCHD_CONFIG", file.path());
    assert!(TouchdConfig::load().is_err());
    clear_env();
}

#[test]
fn built_pipeline_carries_the_configuration() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    std::env::set_var("TOUCHD_MIN_SIZE", "9");

    let cfg = TouchdConfig::load().expect("load config");
    let mut pipeline = cfg
        .build_pipeline(&ModuleFactory::with_builtin())
        .expect("build pipeline");
    clear_env();

    let tracker = pipeline.module(TRACKER_ID).unwrap();
    assert_eq!(tracker.property("min_size").unwrap().as_int(), 9);
    assert!(tracker.property("id").unwrap().is_read_only());
    assert!(tracker.input(0).is_some());

    pipeline.start();
    for _ in 0..3 {
        assert_eq!(pipeline.poll(), 2);
    }
    assert!(!pipeline.have_error());
    let source = pipeline.module(SOURCE_ID).unwrap();
    assert_eq!(source.output(0).unwrap().sequence(), 3);
    pipeline.stop();
}
