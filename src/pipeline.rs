//! Ordered module collection with bulk lifecycle and per-tick scheduling.
//!
//! Insertion order is scheduling order, so producers must be added before
//! their consumers. One driver thread calls `poll()` once per tick; every
//! started module gets one `poll()` per tick, in order.

use std::time::Instant;

use serde::Serialize;

use crate::error::{ModuleError, ModuleResult};
use crate::module::{Module, ModuleStats};
use crate::property::PropertyBag;
use crate::stream::StreamFormat;

#[derive(Default)]
pub struct Pipeline {
    modules: Vec<Box<dyn Module>>,
    running: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module. Ids must be unique within the pipeline and are
    /// read-only from then on.
    pub fn add_element(&mut self, mut module: Box<dyn Module>) -> ModuleResult<()> {
        let id = module.id();
        if self.index_of(&id).is_some() {
            return Err(ModuleError::configuration(format!(
                "pipeline already has a module '{}'",
                id
            )));
        }
        module.core_mut().lock_id();
        log::debug!("pipeline: added {} ({})", id, module.name());
        self.modules.push(module);
        Ok(())
    }

    /// Remove a module, stopping it and disconnecting every consumer of its
    /// outputs.
    pub fn remove_element(&mut self, id: &str) -> ModuleResult<Box<dyn Module>> {
        let index = self
            .index_of(id)
            .ok_or_else(|| ModuleError::configuration(format!("no module '{}'", id)))?;
        let mut module = self.modules.remove(index);
        module.stop();
        module.core_mut().detach_inputs();

        let outputs: Vec<_> = (0..module.core().output_count())
            .filter_map(|port| module.output(port))
            .collect();
        for consumer in self.modules.iter_mut() {
            for stream in &outputs {
                consumer.core_mut().detach_stream(stream);
            }
        }
        log::debug!("pipeline: removed {}", id);
        Ok(module)
    }

    /// Feed output `out_port` of `out_id` into input `in_port` of `in_id`.
    pub fn connect(
        &mut self,
        out_id: &str,
        out_port: usize,
        in_id: &str,
        in_port: usize,
    ) -> ModuleResult<()> {
        let stream = self
            .module(out_id)
            .ok_or_else(|| ModuleError::configuration(format!("no module '{}'", out_id)))?
            .output(out_port)
            .ok_or_else(|| {
                ModuleError::configuration(format!("module '{}' has no output {}", out_id, out_port))
            })?;
        let consumer = self
            .module_mut(in_id)
            .ok_or_else(|| ModuleError::configuration(format!("no module '{}'", in_id)))?;
        consumer.set_input(Some(stream), in_port)
    }

    pub fn module(&self, id: &str) -> Option<&dyn Module> {
        self.index_of(id).map(|i| self.modules[i].as_ref())
    }

    pub fn module_mut(&mut self, id: &str) -> Option<&mut (dyn Module + 'static)> {
        let index = self.index_of(id)?;
        Some(self.modules[index].as_mut())
    }

    pub fn modules(&self) -> impl Iterator<Item = &dyn Module> {
        self.modules.iter().map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn is_started(&self) -> bool {
        self.running
    }

    /// Start every module that is not already started. A module that fails
    /// keeps its error and the sweep continues.
    pub fn start(&mut self) {
        for module in self.modules.iter_mut() {
            if module.is_started() {
                continue;
            }
            if let Err(e) = module.start() {
                log::warn!("pipeline: {} failed to start: {}", module.id(), e);
            }
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        for module in self.modules.iter_mut() {
            module.stop();
        }
        self.running = false;
    }

    /// One tick. Returns the number of modules that did work.
    pub fn poll(&mut self) -> usize {
        let mut busy = 0;
        for module in self.modules.iter_mut() {
            if !module.is_started() {
                continue;
            }
            let began = Instant::now();
            let notified_at = module
                .core()
                .is_dirty()
                .then(|| module.core().take_notified_at());
            if module.poll() {
                let stats = module.core_mut().stats_mut();
                stats.record(began.elapsed());
                if let Some(at) = notified_at.flatten() {
                    stats.record_wait(began.saturating_duration_since(at));
                }
                busy += 1;
            }
        }
        busy
    }

    pub fn have_error(&self) -> bool {
        self.modules.iter().any(|m| m.have_error())
    }

    /// First module error in scheduling order.
    pub fn last_error(&self) -> Option<(String, ModuleError)> {
        self.errors().into_iter().next()
    }

    pub fn errors(&self) -> Vec<(String, ModuleError)> {
        self.modules
            .iter()
            .filter_map(|m| m.last_error().map(|e| (m.id(), e)))
            .collect()
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            size: self.modules.len(),
            running: self.running,
            modules: self.modules.iter().map(|m| module_status(m.as_ref())).collect(),
        }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.id() == id)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PipelineStatus {
    pub size: usize,
    pub running: bool,
    pub modules: Vec<ModuleStatus>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModuleStatus {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
    pub properties: PropertyBag,
    pub inputs: Vec<InputStatus>,
    pub outputs: Vec<OutputStatus>,
    pub stats: ModuleStats,
}

#[derive(Clone, Debug, Serialize)]
pub struct InputStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub format: StreamFormat,
    pub used: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct OutputStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub format: StreamFormat,
    pub observers: Vec<String>,
}

fn module_status(module: &dyn Module) -> ModuleStatus {
    let core = module.core();
    let inputs = core
        .input_infos()
        .iter()
        .enumerate()
        .map(|(port, info)| InputStatus {
            name: info.name.clone(),
            format: info.format,
            used: core.input(port).is_some(),
        })
        .collect();
    let outputs = core
        .output_infos()
        .iter()
        .enumerate()
        .map(|(port, info)| OutputStatus {
            name: info.name.clone(),
            format: info.format,
            observers: core
                .output(port)
                .map(|stream| stream.observer_ids())
                .unwrap_or_default(),
        })
        .collect();
    ModuleStatus {
        id: module.id(),
        name: module.name().to_string(),
        running: module.is_started(),
        error: module.last_error().map(|e| e.to_string()),
        error_kind: module.last_error().map(|e| e.kind()),
        properties: core.properties().clone(),
        inputs,
        outputs,
        stats: core.stats().clone(),
    }
}
