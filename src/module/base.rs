use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{ModuleError, ModuleResult};
use crate::property::{Property, PropertyBag, PropertyValue};
use crate::stream::{DataStream, StreamObserver};

use super::{ModuleInfo, PortInfo};

static NEXT_MODULE_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Module ids: a letter followed by up to 63 of `[A-Za-z0-9_-]`.
pub fn validate_module_id(id: &str) -> ModuleResult<()> {
    static MODULE_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = MODULE_ID_RE
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,63}$").unwrap());
    if !re.is_match(id) {
        return Err(ModuleError::configuration(format!(
            "module id '{}' must match ^[A-Za-z][A-Za-z0-9_-]{{0,63}}$",
            id
        )));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Created,
    Started,
    Stopped,
}

/// Observer registered on every connected input stream.
///
/// Notification only raises the dirty flag; the work happens on the next poll.
/// The first unconsumed notification is timestamped for wait statistics.
pub struct InputObserver {
    owner: RwLock<String>,
    dirty: AtomicBool,
    notified_at: Mutex<Option<Instant>>,
}

impl InputObserver {
    fn new(owner: &str) -> Self {
        Self {
            owner: RwLock::new(owner.to_string()),
            dirty: AtomicBool::new(false),
            notified_at: Mutex::new(None),
        }
    }

    fn rename(&self, owner: &str) {
        *self.owner.write().unwrap_or_else(PoisonError::into_inner) = owner.to_string();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.notified_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(Instant::now);
        self.dirty.store(true, Ordering::Release);
    }

    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// When the pending data was first announced, if it is still unconsumed.
    pub fn notified_at(&self) -> Option<Instant> {
        *self.notified_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_notified(&self) {
        *self.notified_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl StreamObserver for InputObserver {
    fn observer_id(&self) -> String {
        self.owner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn notify_data(&self, _stream: &DataStream) {
        self.mark_dirty();
    }
}

/// Processing counters maintained by the pipeline.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ModuleStats {
    pub frames: u64,
    pub total_process_ms: f64,
    pub average_process_ms: f64,
    pub average_fps: f64,
    /// Frames whose input wait was measured.
    pub waited_frames: u64,
    pub total_wait_ms: f64,
    pub average_wait_ms: f64,
    #[serde(skip)]
    first_frame_at: Option<Instant>,
}

impl ModuleStats {
    pub fn record(&mut self, elapsed: Duration) {
        let now = Instant::now();
        let first = *self.first_frame_at.get_or_insert(now);
        self.frames += 1;
        self.total_process_ms += elapsed.as_secs_f64() * 1000.0;
        self.average_process_ms = self.total_process_ms / self.frames as f64;
        let window = now.duration_since(first).as_secs_f64();
        if window > 0.0 {
            self.average_fps = (self.frames - 1) as f64 / window;
        }
    }

    /// Time between an input notification and the poll that consumed it.
    pub fn record_wait(&mut self, waited: Duration) {
        self.waited_frames += 1;
        self.total_wait_ms += waited.as_secs_f64() * 1000.0;
        self.average_wait_ms = self.total_wait_ms / self.waited_frames as f64;
    }
}

/// State shared by every module: id, properties, ports, lifecycle, error slot.
pub struct ModuleCore {
    info: ModuleInfo,
    properties: PropertyBag,
    input_infos: Vec<PortInfo>,
    output_infos: Vec<PortInfo>,
    inputs: Vec<Option<Arc<DataStream>>>,
    outputs: Vec<Arc<DataStream>>,
    state: ModuleState,
    last_error: Option<ModuleError>,
    observer: Arc<InputObserver>,
    stats: ModuleStats,
}

impl ModuleCore {
    /// Create the core with a default id `<Name><n>` and one stream per output port.
    pub fn new(info: ModuleInfo, input_infos: Vec<PortInfo>, output_infos: Vec<PortInfo>) -> Self {
        let serial = NEXT_MODULE_SERIAL.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}{}", info.name, serial);

        let mut properties = PropertyBag::new();
        properties.register(
            "id",
            Property::new(id.as_str()).with_description("Identifier of the module"),
        );

        let outputs = output_infos
            .iter()
            .map(|port| Arc::new(DataStream::new(&port.name, port.format)))
            .collect();

        Self {
            info,
            properties,
            inputs: vec![None; input_infos.len()],
            input_infos,
            output_infos,
            outputs,
            state: ModuleState::Created,
            last_error: None,
            observer: Arc::new(InputObserver::new(&id)),
            stats: ModuleStats::default(),
        }
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    pub fn id(&self) -> String {
        self.properties
            .get("id")
            .map(Property::as_text)
            .unwrap_or_default()
    }

    /// Set the id once; afterwards the `id` property is read-only.
    pub fn assign_id(&mut self, id: &str) -> ModuleResult<()> {
        if self.properties.get("id").is_some_and(Property::is_read_only) {
            return Err(ModuleError::invalid_state(format!(
                "module '{}' already has an assigned id",
                self.id()
            )));
        }
        validate_module_id(id)?;
        self.properties.set("id", id)?;
        self.properties.set_read_only("id", true)?;
        self.observer.rename(id);
        Ok(())
    }

    /// Freeze the current id, default or assigned.
    pub fn lock_id(&mut self) {
        let _ = self.properties.set_read_only("id", true);
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    /// Register a default property. Used by constructors.
    pub fn register_property(&mut self, name: &str, property: Property) {
        self.properties.register(name, property);
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn set_property(
        &mut self,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> ModuleResult<()> {
        if name == "id" {
            let value = value.into();
            let result = match value {
                PropertyValue::Str(ref id) => self.assign_id(id),
                other => Err(ModuleError::configuration(format!(
                    "module id must be a string, got {}",
                    other.kind()
                ))),
            };
            return self.record(result);
        }
        let result = self.properties.set(name, value);
        self.record(result)
    }

    pub fn input_infos(&self) -> &[PortInfo] {
        &self.input_infos
    }

    pub fn output_infos(&self) -> &[PortInfo] {
        &self.output_infos
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn input(&self, port: usize) -> Option<Arc<DataStream>> {
        self.inputs.get(port).cloned().flatten()
    }

    pub fn output(&self, port: usize) -> Option<Arc<DataStream>> {
        self.outputs.get(port).cloned()
    }

    /// Connect `stream` to input `port`, or disconnect it with `None`.
    ///
    /// The stream must carry the port's declared format. The module stops
    /// observing the previous stream before observing the new one.
    pub fn set_input(&mut self, stream: Option<Arc<DataStream>>, port: usize) -> ModuleResult<()> {
        let Some(info) = self.input_infos.get(port) else {
            return Err(ModuleError::configuration(format!(
                "module '{}' has no input port {}",
                self.id(),
                port
            )));
        };
        if let Some(stream) = &stream {
            if stream.format() != info.format {
                return Err(ModuleError::configuration(format!(
                    "input port {} of '{}' accepts {} streams, got {}",
                    port,
                    self.id(),
                    info.format,
                    stream.format()
                )));
            }
        }

        let observer: Arc<dyn StreamObserver> = self.observer.clone();
        if let Some(previous) = self.inputs[port].take() {
            previous.remove_observer(&observer);
        }
        if let Some(stream) = &stream {
            stream.add_observer(observer);
            if stream.get_data().is_some() {
                self.observer.mark_dirty();
            }
        }
        self.inputs[port] = stream;
        Ok(())
    }

    /// Disconnect every input port.
    pub fn detach_inputs(&mut self) {
        let observer: Arc<dyn StreamObserver> = self.observer.clone();
        for slot in self.inputs.iter_mut() {
            if let Some(stream) = slot.take() {
                stream.remove_observer(&observer);
            }
        }
    }

    /// Disconnect `port` if it is fed by `stream`.
    pub fn detach_stream(&mut self, stream: &Arc<DataStream>) {
        let observer: Arc<dyn StreamObserver> = self.observer.clone();
        for slot in self.inputs.iter_mut() {
            if slot.as_ref().is_some_and(|s| Arc::ptr_eq(s, stream)) {
                stream.remove_observer(&observer);
                *slot = None;
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.observer.is_dirty()
    }

    pub fn take_dirty(&self) -> bool {
        self.observer.take_dirty()
    }

    /// Consume the pending notification timestamp, if any.
    pub fn take_notified_at(&self) -> Option<Instant> {
        let at = self.observer.notified_at();
        self.observer.clear_notified();
        at
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn set_state(&mut self, state: ModuleState) {
        self.state = state;
    }

    pub fn is_started(&self) -> bool {
        self.state == ModuleState::Started
    }

    /// Record an error; the latest one wins. The module keeps running.
    pub fn set_error(&mut self, error: ModuleError) {
        log::warn!("module {}: {}", self.id(), error);
        self.last_error = Some(error);
    }

    pub fn have_error(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn last_error(&self) -> Option<&ModuleError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<ModuleError> {
        self.last_error.take()
    }

    pub fn stats(&self) -> &ModuleStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut ModuleStats {
        &mut self.stats
    }

    fn record<T>(&mut self, result: ModuleResult<T>) -> ModuleResult<T> {
        if let Err(e) = &result {
            self.set_error(e.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Image;
    use crate::stream::{Payload, StreamFormat};

    fn core() -> ModuleCore {
        ModuleCore::new(
            ModuleInfo {
                name: "Probe",
                description: "test module",
                author: "tests",
            },
            vec![PortInfo::new("mask", StreamFormat::Image, "input")],
            vec![PortInfo::new("touches", StreamFormat::Touch, "output")],
        )
    }

    #[test]
    fn module_ids_are_validated() {
        assert!(validate_module_id("tracker").is_ok());
        assert!(validate_module_id("Cam_0-left").is_ok());
        assert!(validate_module_id("0cam").is_err());
        assert!(validate_module_id("").is_err());
        assert!(validate_module_id("bad id").is_err());
        assert!(validate_module_id(&format!("a{}", "b".repeat(64))).is_err());
    }

    #[test]
    fn default_id_uses_the_module_name() {
        let core = core();
        assert!(core.id().starts_with("Probe"));
        assert!(!core.property("id").unwrap().is_read_only());
    }

    #[test]
    fn id_is_read_only_once_assigned() {
        let mut core = core();
        core.assign_id("probe").unwrap();
        assert_eq!(core.id(), "probe");
        assert!(matches!(
            core.assign_id("other"),
            Err(ModuleError::InvalidState(_))
        ));
        assert!(core.set_property("id", "other").is_err());
        assert_eq!(core.id(), "probe");
        assert!(core.have_error());
    }

    #[test]
    fn set_input_checks_port_and_format() {
        let mut core = core();
        let touch = Arc::new(DataStream::new("t", StreamFormat::Touch));
        assert!(matches!(
            core.set_input(Some(touch), 0),
            Err(ModuleError::Configuration(_))
        ));
        let image = Arc::new(DataStream::new("i", StreamFormat::Image));
        assert!(core.set_input(Some(image.clone()), 1).is_err());
        core.set_input(Some(image.clone()), 0).unwrap();
        assert_eq!(image.observer_count(), 1);
        assert_eq!(image.observer_ids(), vec![core.id()]);
    }

    #[test]
    fn rewiring_moves_the_observer() {
        let mut core = core();
        let first = Arc::new(DataStream::new("a", StreamFormat::Image));
        let second = Arc::new(DataStream::new("b", StreamFormat::Image));
        core.set_input(Some(first.clone()), 0).unwrap();
        core.set_input(Some(second.clone()), 0).unwrap();
        assert_eq!(first.observer_count(), 0);
        assert_eq!(second.observer_count(), 1);

        first.push(Payload::Image(Image::new(2, 2, 1))).unwrap();
        assert!(!core.is_dirty());
        second.push(Payload::Image(Image::new(2, 2, 1))).unwrap();
        assert!(core.take_dirty());
        assert!(!core.is_dirty());

        core.set_input(None, 0).unwrap();
        assert_eq!(second.observer_count(), 0);
        assert!(core.input(0).is_none());
    }

    #[test]
    fn errors_latest_wins_until_taken() {
        let mut core = core();
        core.set_error(ModuleError::runtime("first"));
        core.set_error(ModuleError::resource("second"));
        assert_eq!(core.last_error(), Some(&ModuleError::resource("second")));
        assert_eq!(core.take_error(), Some(ModuleError::resource("second")));
        assert!(!core.have_error());
    }

    #[test]
    fn stats_average_over_frames() {
        let mut stats = ModuleStats::default();
        stats.record(Duration::from_millis(2));
        stats.record(Duration::from_millis(4));
        assert_eq!(stats.frames, 2);
        assert!((stats.average_process_ms - 3.0).abs() < 1e-9);

        stats.record_wait(Duration::from_millis(1));
        stats.record_wait(Duration::from_millis(5));
        assert_eq!(stats.waited_frames, 2);
        assert!((stats.average_wait_ms - 3.0).abs() < 1e-9);
    }

    #[test]
    fn first_unconsumed_notification_is_timestamped() {
        let mut core = core();
        let stream = Arc::new(DataStream::new("i", StreamFormat::Image));
        core.set_input(Some(stream.clone()), 0).unwrap();
        assert!(core.take_notified_at().is_none());

        stream.push(Payload::Image(Image::new(2, 2, 1))).unwrap();
        let first = core.observer.notified_at().unwrap();
        stream.push(Payload::Image(Image::new(2, 2, 1))).unwrap();
        assert_eq!(core.take_notified_at(), Some(first));
        assert!(core.take_notified_at().is_none());
    }
}
