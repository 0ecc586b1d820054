use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::ingest::{SyntheticConfig, SyntheticSource};
use crate::module::ModuleFactory;
use crate::pipeline::Pipeline;
use crate::property::PropertyValue;
use crate::track::{BlobTrackerModule, TrackerParams};

const DEFAULT_DELAY_MS: u64 = 5;
const MAX_DELAY_MS: u64 = 10_000;
const DEFAULT_SOURCE_KIND: &str = "synthetic";
const SOURCE_KINDS: [&str; 1] = ["synthetic"];

/// Module ids used by `build_pipeline`.
pub const SOURCE_ID: &str = "source";
pub const TRACKER_ID: &str = "tracker";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TouchdConfigFile {
    delay_ms: Option<u64>,
    source: Option<SourceConfigFile>,
    tracker: Option<TrackerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    kind: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    blobs: Option<u32>,
    size: Option<u32>,
    speed: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrackerConfigFile {
    min_size: Option<u32>,
    max_size: Option<u32>,
    min_age: Option<u32>,
    max_age: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TouchdConfig {
    /// Pause between pipeline ticks.
    pub delay: Duration,
    pub source: SourceSettings,
    pub tracker: TrackerParams,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub kind: String,
    pub synthetic: SyntheticConfig,
}

impl TouchdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TOUCHD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TouchdConfigFile) -> Self {
        let synthetic_defaults = SyntheticConfig::default();
        let source = file.source.unwrap_or_default();
        let source = SourceSettings {
            kind: source
                .kind
                .unwrap_or_else(|| DEFAULT_SOURCE_KIND.to_string()),
            synthetic: SyntheticConfig {
                width: source.width.unwrap_or(synthetic_defaults.width),
                height: source.height.unwrap_or(synthetic_defaults.height),
                blobs: source.blobs.unwrap_or(synthetic_defaults.blobs),
                size: source.size.unwrap_or(synthetic_defaults.size),
                speed: source.speed.unwrap_or(synthetic_defaults.speed),
                seed: source.seed.unwrap_or(synthetic_defaults.seed),
            },
        };

        let tracker_defaults = TrackerParams::default();
        let tracker = file.tracker.unwrap_or_default();
        let tracker = TrackerParams {
            min_size: tracker.min_size.unwrap_or(tracker_defaults.min_size),
            max_size: tracker.max_size.unwrap_or(tracker_defaults.max_size),
            min_age: tracker.min_age.unwrap_or(tracker_defaults.min_age),
            max_age: tracker.max_age.unwrap_or(tracker_defaults.max_age),
        };

        Self {
            delay: Duration::from_millis(file.delay_ms.unwrap_or(DEFAULT_DELAY_MS)),
            source,
            tracker,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_u32("TOUCHD_MIN_SIZE")? {
            self.tracker.min_size = v;
        }
        if let Some(v) = env_u32("TOUCHD_MAX_SIZE")? {
            self.tracker.max_size = v;
        }
        if let Some(v) = env_u32("TOUCHD_MIN_AGE")? {
            self.tracker.min_age = v;
        }
        if let Some(v) = env_u32("TOUCHD_MAX_AGE")? {
            self.tracker.max_age = v;
        }
        if let Ok(delay) = std::env::var("TOUCHD_DELAY_MS") {
            let ms: u64 = delay
                .trim()
                .parse()
                .map_err(|_| anyhow!("TOUCHD_DELAY_MS must be an integer number of milliseconds"))?;
            self.delay = Duration::from_millis(ms);
        }
        if let Ok(kind) = std::env::var("TOUCHD_SOURCE") {
            if !kind.trim().is_empty() {
                self.source.kind = kind.trim().to_string();
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.source.kind = self.source.kind.to_lowercase();
        if !SOURCE_KINDS.contains(&self.source.kind.as_str()) {
            return Err(anyhow!(
                "source.kind '{}' is not one of: {}",
                self.source.kind,
                SOURCE_KINDS.join(", ")
            ));
        }
        self.source
            .synthetic
            .validate()
            .map_err(|e| anyhow!("invalid source settings: {}", e))?;
        self.tracker
            .validate()
            .map_err(|e| anyhow!("invalid tracker settings: {}", e))?;
        if self.delay.as_millis() > MAX_DELAY_MS as u128 {
            return Err(anyhow!("delay_ms must be at most {}", MAX_DELAY_MS));
        }
        Ok(())
    }

    /// Factory name of the configured source module.
    pub fn source_module(&self) -> &'static str {
        SyntheticSource::MODULE_NAME
    }

    /// Source feeding a blob tracker, with every configured property applied.
    pub fn build_pipeline(&self, factory: &ModuleFactory) -> Result<Pipeline> {
        let mut source = factory.create(self.source_module())?;
        source.core_mut().assign_id(SOURCE_ID)?;
        let synthetic = &self.source.synthetic;
        for (name, value) in [
            ("width", synthetic.width as i64),
            ("height", synthetic.height as i64),
            ("blobs", synthetic.blobs as i64),
            ("size", synthetic.size as i64),
            ("speed", synthetic.speed as i64),
            ("seed", synthetic.seed as i64),
        ] {
            source
                .set_property(name, PropertyValue::Int(value))
                .map_err(|e| anyhow!("source: {}", e))?;
        }

        let mut tracker = factory.create(BlobTrackerModule::MODULE_NAME)?;
        tracker.core_mut().assign_id(TRACKER_ID)?;
        for (name, value) in [
            ("min_size", self.tracker.min_size),
            ("max_size", self.tracker.max_size),
            ("min_age", self.tracker.min_age),
            ("max_age", self.tracker.max_age),
        ] {
            tracker
                .set_property(name, PropertyValue::Int(value as i64))
                .map_err(|e| anyhow!("tracker: {}", e))?;
        }

        let mut pipeline = Pipeline::new();
        pipeline.add_element(source)?;
        pipeline.add_element(tracker)?;
        pipeline.connect(SOURCE_ID, 0, TRACKER_ID, 0)?;
        Ok(pipeline)
    }
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a non-negative integer", key)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<TouchdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
