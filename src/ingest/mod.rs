//! Frame ingestion sources.
//!
//! This module provides:
//! - `FrameSource`: the capture interface a device backend implements
//! - `SourceModule`: the pipeline stage that drives a `FrameSource`
//! - `SyntheticSource`: seeded moving squares for the daemon and tests
//!
//! A source module has no inputs and one `image` output. Each `poll()` asks the
//! backend for at most one frame; a transient capture failure is recorded on
//! the module and the tick produces nothing.

pub mod synthetic;

pub use synthetic::{SyntheticConfig, SyntheticSource};

use crate::error::{ModuleError, ModuleResult};
use crate::frame::Image;
use crate::module::{Module, ModuleCore, ModuleInfo, PortInfo};
use crate::property::{Property, PropertyBag};
use crate::stream::{Payload, StreamFormat};

/// Capture backend.
pub trait FrameSource: Send {
    /// Module name used by the factory.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    /// Properties exposed on the wrapping module, with their defaults.
    fn default_properties(&self) -> Vec<(&'static str, Property)> {
        Vec::new()
    }

    /// Acquire the device using the module's current property values.
    fn open(&mut self, properties: &PropertyBag) -> ModuleResult<()>;

    /// Produce one frame, or `None` when nothing is ready yet.
    fn capture_one_frame(&mut self) -> ModuleResult<Option<Image>>;

    /// Release the device. Safe to call when not open.
    fn release(&mut self);

    fn frames_captured(&self) -> u64;
}

/// Pipeline stage publishing the frames of a `FrameSource` on output 0.
pub struct SourceModule<S: FrameSource> {
    core: ModuleCore,
    source: S,
}

impl<S: FrameSource> SourceModule<S> {
    pub fn new(source: S) -> Self {
        let info = ModuleInfo {
            name: source.name(),
            description: source.description(),
            author: "touch-pipeline",
        };
        let mut core = ModuleCore::new(
            info,
            Vec::new(),
            vec![PortInfo::new(
                "image",
                StreamFormat::Image,
                "Captured frames",
            )],
        );
        for (name, property) in source.default_properties() {
            core.register_property(name, property);
        }
        Self { core, source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn publish(&mut self, frame: Image) -> ModuleResult<()> {
        let output = self
            .core
            .output(0)
            .ok_or_else(|| ModuleError::runtime("source module has no output stream"))?;
        output.push(Payload::Image(frame))
    }
}

impl<S: FrameSource> Module for SourceModule<S> {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn on_start(&mut self) -> ModuleResult<()> {
        self.source.open(self.core.properties())?;
        log::info!("{}: opened {}", self.core.id(), self.source.name());
        Ok(())
    }

    fn on_stop(&mut self) {
        self.source.release();
        log::info!(
            "{}: released {} after {} frames",
            self.core.id(),
            self.source.name(),
            self.source.frames_captured()
        );
    }

    fn poll(&mut self) -> bool {
        if !self.core.is_started() {
            return false;
        }
        let result = match self.source.capture_one_frame() {
            Ok(Some(frame)) => self.publish(frame).map(|_| true),
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            self.core.set_error(e);
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        frames: Vec<ModuleResult<Option<Image>>>,
        open: bool,
        captured: u64,
    }

    impl FrameSource for Scripted {
        fn name(&self) -> &'static str {
            "Scripted"
        }

        fn open(&mut self, _properties: &PropertyBag) -> ModuleResult<()> {
            self.open = true;
            Ok(())
        }

        fn capture_one_frame(&mut self) -> ModuleResult<Option<Image>> {
            if self.frames.is_empty() {
                return Ok(None);
            }
            let next = self.frames.remove(0);
            if let Ok(Some(_)) = &next {
                self.captured += 1;
            }
            next
        }

        fn release(&mut self) {
            self.open = false;
        }

        fn frames_captured(&self) -> u64 {
            self.captured
        }
    }

    fn scripted(frames: Vec<ModuleResult<Option<Image>>>) -> SourceModule<Scripted> {
        SourceModule::new(Scripted {
            frames,
            open: false,
            captured: 0,
        })
    }

    #[test]
    fn poll_publishes_one_frame_per_call() {
        let mut module = scripted(vec![
            Ok(Some(Image::new(4, 4, 1))),
            Ok(None),
            Ok(Some(Image::new(4, 4, 1))),
        ]);
        assert!(!module.poll(), "not started");

        module.start().unwrap();
        assert!(module.source().open);
        let output = module.output(0).unwrap();
        assert!(module.poll());
        assert_eq!(output.sequence(), 1);
        assert!(!module.poll());
        assert!(module.poll());
        assert_eq!(output.sequence(), 2);

        module.stop();
        assert!(!module.source().open);
        assert_eq!(module.source().frames_captured(), 2);
    }

    #[test]
    fn capture_failure_is_recorded_and_skipped() {
        let mut module = scripted(vec![
            Err(ModuleError::resource("device busy")),
            Ok(Some(Image::new(4, 4, 1))),
        ]);
        module.start().unwrap();
        assert!(!module.poll());
        assert_eq!(module.last_error(), Some(ModuleError::resource("device busy")));
        assert!(module.is_started());

        assert!(module.poll());
        assert!(module.have_error(), "errors persist until acknowledged");
        assert!(module.take_error().is_some());
    }

    #[test]
    fn double_start_is_rejected() {
        let mut module = scripted(Vec::new());
        module.start().unwrap();
        assert!(matches!(
            module.start(),
            Err(ModuleError::InvalidState(_))
        ));
        assert!(module.is_started());
        module.stop();
        module.stop();
        assert!(!module.is_started());
    }
}
