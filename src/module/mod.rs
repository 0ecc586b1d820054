//! Pipeline stages.
//!
//! A module owns its output streams, observes its input streams and exposes a
//! property bag. This module provides:
//! - `Module`: the lifecycle contract (`start`/`stop`/`update`/`poll`).
//! - `ModuleCore`: shared state every implementation embeds.
//! - `ModuleFactory`: name-keyed constructors with introspection.

pub mod base;
pub mod factory;

use std::sync::Arc;

use serde::Serialize;

use crate::error::{ModuleError, ModuleResult};
use crate::property::{Property, PropertyBag, PropertyValue};
use crate::stream::{DataStream, StreamFormat};

pub use self::base::{validate_module_id, InputObserver, ModuleCore, ModuleState, ModuleStats};
pub use self::factory::ModuleFactory;

/// Static identity of a module type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub author: &'static str,
}

/// Declared shape of one input or output port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub format: StreamFormat,
    pub description: String,
}

impl PortInfo {
    pub fn new(name: &str, format: StreamFormat, description: &str) -> Self {
        Self {
            name: name.to_string(),
            format,
            description: description.to_string(),
        }
    }
}

/// Everything a controller needs to know about a module type.
#[derive(Clone, Debug, Serialize)]
pub struct ModuleDescription {
    pub name: String,
    pub description: String,
    pub author: String,
    pub properties: PropertyBag,
    pub inputs: Vec<PortInfo>,
    pub outputs: Vec<PortInfo>,
}

/// Pipeline stage contract.
///
/// Implementors provide `core`/`core_mut` and override the hooks they need;
/// every other method has a default built on `ModuleCore`.
pub trait Module: Send {
    fn core(&self) -> &ModuleCore;

    fn core_mut(&mut self) -> &mut ModuleCore;

    /// Acquire resources before the module enters `Started`.
    fn on_start(&mut self) -> ModuleResult<()> {
        Ok(())
    }

    /// Release resources. Runs only when the module was started.
    fn on_stop(&mut self) {}

    /// Per-tick step for modules with inputs. Must be a no-op when the inputs
    /// hold no data.
    fn update(&mut self) -> ModuleResult<()> {
        Ok(())
    }

    /// One scheduling step. Returns true when the module did work.
    ///
    /// The default runs `update` if an input was notified since the last
    /// step. Errors are recorded on the module, not returned.
    fn poll(&mut self) -> bool {
        if !self.is_started() || !self.core().take_dirty() {
            return false;
        }
        match self.update() {
            Ok(()) => true,
            Err(e) => {
                self.core_mut().set_error(e);
                false
            }
        }
    }

    fn start(&mut self) -> ModuleResult<()> {
        if self.is_started() {
            return Err(ModuleError::invalid_state(format!(
                "module '{}' is already started",
                self.id()
            )));
        }
        if let Err(e) = self.on_start() {
            self.core_mut().set_error(e.clone());
            return Err(e);
        }
        self.core_mut().set_state(ModuleState::Started);
        log::debug!("module {} started", self.id());
        Ok(())
    }

    /// Stop the module. No-op unless started.
    fn stop(&mut self) {
        if !self.is_started() {
            return;
        }
        self.on_stop();
        self.core_mut().set_state(ModuleState::Stopped);
        log::debug!("module {} stopped", self.id());
    }

    fn id(&self) -> String {
        self.core().id()
    }

    fn name(&self) -> &'static str {
        self.core().info().name
    }

    fn is_started(&self) -> bool {
        self.core().is_started()
    }

    fn property(&self, name: &str) -> Option<&Property> {
        self.core().property(name)
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> ModuleResult<()> {
        self.core_mut().set_property(name, value)
    }

    fn properties(&self) -> &PropertyBag {
        self.core().properties()
    }

    fn input(&self, port: usize) -> Option<Arc<DataStream>> {
        self.core().input(port)
    }

    fn output(&self, port: usize) -> Option<Arc<DataStream>> {
        self.core().output(port)
    }

    fn set_input(&mut self, stream: Option<Arc<DataStream>>, port: usize) -> ModuleResult<()> {
        self.core_mut().set_input(stream, port)
    }

    fn have_error(&self) -> bool {
        self.core().have_error()
    }

    fn last_error(&self) -> Option<ModuleError> {
        self.core().last_error().cloned()
    }

    fn take_error(&mut self) -> Option<ModuleError> {
        self.core_mut().take_error()
    }

    fn describe(&self) -> ModuleDescription {
        let core = self.core();
        let info = core.info();
        ModuleDescription {
            name: info.name.to_string(),
            description: info.description.to_string(),
            author: info.author.to_string(),
            properties: core.properties().clone(),
            inputs: core.input_infos().to_vec(),
            outputs: core.output_infos().to_vec(),
        }
    }
}
