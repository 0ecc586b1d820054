//! Synthetic binary-mask source.
//!
//! Renders `blobs` foreground squares on a black single-channel frame. Each
//! square drifts with its own velocity, bounces off the borders and picks up a
//! small random jitter every frame. The generator is seeded, so a given
//! configuration always yields the same frame sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{ModuleError, ModuleResult};
use crate::frame::{Image, FOREGROUND};
use crate::property::{Property, PropertyBag};

use super::FrameSource;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    /// Number of squares.
    pub blobs: u32,
    /// Square side in pixels.
    pub size: u32,
    /// Maximum drift per frame in pixels.
    pub speed: u32,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            blobs: 3,
            size: 14,
            speed: 3,
            seed: 7,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> ModuleResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ModuleError::configuration(
                "synthetic frame dimensions must be non-zero",
            ));
        }
        if self.size == 0 || self.size > self.width.min(self.height) {
            return Err(ModuleError::configuration(format!(
                "synthetic square size {} does not fit a {}x{} frame",
                self.size, self.width, self.height
            )));
        }
        Ok(())
    }

    fn from_properties(properties: &PropertyBag) -> Self {
        let int = |name: &str, fallback: u64| {
            properties
                .get(name)
                .map(|p| p.as_int().max(0) as u64)
                .unwrap_or(fallback)
        };
        let defaults = Self::default();
        Self {
            width: int("width", defaults.width as u64) as u32,
            height: int("height", defaults.height as u64) as u32,
            blobs: int("blobs", defaults.blobs as u64) as u32,
            size: int("size", defaults.size as u64) as u32,
            speed: int("speed", defaults.speed as u64) as u32,
            seed: int("seed", defaults.seed),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Square {
    top: i64,
    left: i64,
    d_row: i64,
    d_col: i64,
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: Option<StdRng>,
    squares: Vec<Square>,
    frame_count: u64,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl SyntheticSource {
    pub const MODULE_NAME: &'static str = "SyntheticSource";

    /// `config` only seeds the property defaults; `open` applies the
    /// module's current values.
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            rng: None,
            squares: Vec::new(),
            frame_count: 0,
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.rng.is_some()
    }

    fn step(&mut self, rng: &mut StdRng) {
        let max_top = (self.config.height - self.config.size) as i64;
        let max_left = (self.config.width - self.config.size) as i64;
        let speed = self.config.speed as i64;
        for square in self.squares.iter_mut() {
            if speed > 0 && rng.gen_bool(0.2) {
                square.d_row = (square.d_row + rng.gen_range(-1..=1)).clamp(-speed, speed);
                square.d_col = (square.d_col + rng.gen_range(-1..=1)).clamp(-speed, speed);
            }
            square.top += square.d_row;
            square.left += square.d_col;
            if square.top < 0 || square.top > max_top {
                square.d_row = -square.d_row;
                square.top = square.top.clamp(0, max_top);
            }
            if square.left < 0 || square.left > max_left {
                square.d_col = -square.d_col;
                square.left = square.left.clamp(0, max_left);
            }
        }
    }

    fn render(&self) -> Image {
        let mut frame = Image::new(self.config.width, self.config.height, 1);
        let side = self.config.size as i64;
        for square in &self.squares {
            frame.fill_rect(square.top, square.left, side, side, FOREGROUND);
        }
        frame
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &'static str {
        Self::MODULE_NAME
    }

    fn description(&self) -> &'static str {
        "Binary frames with seeded moving squares"
    }

    fn default_properties(&self) -> Vec<(&'static str, Property)> {
        let c = &self.config;
        vec![
            (
                "width",
                Property::new(c.width as i64)
                    .with_range(1.0, 4096.0)
                    .with_description("Frame width in pixels"),
            ),
            (
                "height",
                Property::new(c.height as i64)
                    .with_range(1.0, 4096.0)
                    .with_description("Frame height in pixels"),
            ),
            (
                "blobs",
                Property::new(c.blobs as i64)
                    .with_range(0.0, 64.0)
                    .with_description("Number of moving squares"),
            ),
            (
                "size",
                Property::new(c.size as i64)
                    .with_range(1.0, 512.0)
                    .with_description("Square side in pixels"),
            ),
            (
                "speed",
                Property::new(c.speed as i64)
                    .with_range(0.0, 64.0)
                    .with_description("Maximum drift per frame in pixels"),
            ),
            (
                "seed",
                Property::new(c.seed as i64)
                    .with_min(0.0)
                    .with_description("Random generator seed"),
            ),
        ]
    }

    fn open(&mut self, properties: &PropertyBag) -> ModuleResult<()> {
        let config = SyntheticConfig::from_properties(properties);
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let speed = config.speed as i64;
        self.squares = (0..config.blobs)
            .map(|_| Square {
                top: rng.gen_range(0..=(config.height - config.size) as i64),
                left: rng.gen_range(0..=(config.width - config.size) as i64),
                d_row: rng.gen_range(-speed..=speed),
                d_col: rng.gen_range(-speed..=speed),
            })
            .collect();
        log::debug!(
            "synthetic source {}x{} with {} squares (seed {})",
            config.width,
            config.height,
            config.blobs,
            config.seed
        );
        self.config = config;
        self.rng = Some(rng);
        self.frame_count = 0;
        Ok(())
    }

    fn capture_one_frame(&mut self) -> ModuleResult<Option<Image>> {
        let Some(mut rng) = self.rng.take() else {
            return Err(ModuleError::resource("synthetic source is not open"));
        };
        if self.frame_count > 0 {
            self.step(&mut rng);
        }
        self.rng = Some(rng);
        self.frame_count += 1;
        Ok(Some(self.render()))
    }

    fn release(&mut self) {
        self.rng = None;
        self.squares.clear();
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
