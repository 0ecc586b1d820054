use crate::detect::detector::{DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE};
use crate::detect::Blob;
use crate::error::{ModuleError, ModuleResult};
use crate::frame::Image;
use crate::module::{Module, ModuleCore, ModuleInfo, PortInfo};
use crate::property::Property;
use crate::stream::{Payload, StreamFormat};

use super::tracker::{BlobTracker, TrackerParams, DEFAULT_MAX_AGE, DEFAULT_MIN_AGE};

const MATURE: [u8; 3] = [0, 255, 0];
const NASCENT: [u8; 3] = [255, 255, 0];

/// Pipeline stage running detection and tracking on a binary mask.
///
/// Input 0 takes single-channel masks. Output 0 publishes a 3-channel frame
/// with every emitted blob outlined (green once mature, yellow before).
/// Output 1 publishes the frame's `TouchRecord`s.
pub struct BlobTrackerModule {
    core: ModuleCore,
    tracker: BlobTracker,
    canvas: Option<Image>,
}

impl Default for BlobTrackerModule {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobTrackerModule {
    pub const MODULE_NAME: &'static str = "SimpleBlobTracker";

    pub fn new() -> Self {
        let mut core = ModuleCore::new(
            ModuleInfo {
                name: Self::MODULE_NAME,
                description: "Track blobs in a binary image and publish touches",
                author: "touch-pipeline",
            },
            vec![PortInfo::new(
                "mask",
                StreamFormat::Image,
                "Binary mask, single channel, 255 = foreground",
            )],
            vec![
                PortInfo::new("annotated", StreamFormat::Image, "Tracked blobs outlined"),
                PortInfo::new("touches", StreamFormat::Touch, "Tracked touches"),
            ],
        );
        core.register_property(
            "min_size",
            Property::new(DEFAULT_MIN_SIZE as i64)
                .with_range(1.0, 1024.0)
                .with_description("Smallest blob side accepted, in pixels"),
        );
        core.register_property(
            "max_size",
            Property::new(DEFAULT_MAX_SIZE as i64)
                .with_range(1.0, 1024.0)
                .with_description("Largest blob side accepted, in pixels"),
        );
        core.register_property(
            "min_age",
            Property::new(DEFAULT_MIN_AGE as i64)
                .with_range(0.0, 1000.0)
                .with_description("Consecutive matches before a blob is mature"),
        );
        core.register_property(
            "max_age",
            Property::new(DEFAULT_MAX_AGE as i64)
                .with_range(0.0, 1000.0)
                .with_description("Missed frames a blob survives"),
        );

        Self {
            core,
            tracker: BlobTracker::default(),
            canvas: None,
        }
    }

    pub fn tracker(&self) -> &BlobTracker {
        &self.tracker
    }

    fn params(&self) -> TrackerParams {
        let int = |name: &str| {
            self.core
                .property(name)
                .map(|p| p.as_int().max(0) as u32)
                .unwrap_or_default()
        };
        TrackerParams {
            min_size: int("min_size"),
            max_size: int("max_size"),
            min_age: int("min_age"),
            max_age: int("max_age"),
        }
    }

    fn sync_params(&mut self) -> ModuleResult<()> {
        let params = self.params();
        if params != self.tracker.params() {
            self.tracker.set_params(params)?;
            log::debug!("{}: tracker params {:?}", self.core.id(), params);
        }
        Ok(())
    }

    fn allocate_canvas(&mut self, mask: &Image) {
        let reuse = self.canvas.as_ref().is_some_and(|c| c.same_size(mask));
        if !reuse {
            self.canvas = Some(Image::new(mask.width(), mask.height(), 3));
            log::trace!(
                "{}: allocated {}x{} output buffer",
                self.core.id(),
                mask.width(),
                mask.height()
            );
        }
    }

    fn draw(&mut self) -> Option<Image> {
        let canvas = self.canvas.as_mut()?;
        canvas.data_mut().fill(0);
        let params = self.tracker.params();
        for tracked in self.tracker.tracked() {
            if !tracked.blob.fits(1, params.max_size as i32) {
                continue;
            }
            let color = if tracked.is_mature(params.min_age) {
                &MATURE
            } else {
                &NASCENT
            };
            draw_outline(canvas, &tracked.blob, color);
        }
        Some(canvas.clone())
    }

    fn push(&self, port: usize, payload: Payload) -> ModuleResult<()> {
        let stream = self
            .core
            .output(port)
            .ok_or_else(|| ModuleError::runtime(format!("no output port {}", port)))?;
        stream.push(payload)
    }
}

fn draw_outline(image: &mut Image, blob: &Blob, color: &[u8]) {
    let (top, left) = (blob.top() as i64, blob.left() as i64);
    let (bottom, right) = (blob.bottom() as i64, blob.right() as i64);
    for col in left..=right {
        image.put(top, col, color);
        image.put(bottom, col, color);
    }
    for row in top..=bottom {
        image.put(row, left, color);
        image.put(row, right, color);
    }
}

impl Module for BlobTrackerModule {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn on_start(&mut self) -> ModuleResult<()> {
        let Some(input) = self.core.input(0) else {
            return Err(ModuleError::configuration(format!(
                "{}: input 0 is not connected",
                self.core.id()
            )));
        };
        self.sync_params()?;
        self.tracker.clear();
        if let Some(mask) = input.get_data().as_deref().and_then(Payload::as_image) {
            self.allocate_canvas(mask);
        }
        Ok(())
    }

    fn on_stop(&mut self) {
        self.canvas = None;
        self.tracker.clear();
    }

    fn update(&mut self) -> ModuleResult<()> {
        let Some(payload) = self.core.input(0).and_then(|input| input.get_data()) else {
            return Ok(());
        };
        let Some(mask) = payload.as_image() else {
            return Ok(());
        };
        if mask.channels() != 1 {
            let error = ModuleError::runtime(format!(
                "blob tracker input must be a single channel binary image, got {} channels",
                mask.channels()
            ));
            log::error!("{}: {}", self.core.id(), error);
            self.stop();
            return Err(error);
        }

        self.sync_params()?;
        self.allocate_canvas(mask);
        let touches = self.tracker.process(mask)?;
        log::trace!("{}: {} touches", self.core.id(), touches.len());

        if let Some(annotated) = self.draw() {
            self.push(0, Payload::Image(annotated))?;
        }
        self.push(1, Payload::Touches(touches))
    }
}
