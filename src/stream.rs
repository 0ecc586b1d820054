//! Single-slot data streams between pipeline stages.
//!
//! A `DataStream` carries the most recently published payload of one fixed
//! format. Publishing replaces the previous payload and then notifies every
//! observer, in registration order, over a snapshot of the observer list.
//!
//! Payloads are immutable once published: they are stored behind an `Arc`
//! and only ever replaced. A consumer on another thread can therefore take a
//! consistent single-step snapshot with `get_data()` without blocking the
//! producer. Consumers that want the slot itself held across several reads use
//! `lock()`; a push waits for that guard to drop, and only the pointer swap is
//! done under the write lock.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use crate::error::{ModuleError, ModuleResult};
use crate::frame::Image;
use crate::track::TouchRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    /// `Image` frames (binary masks, annotated frames).
    Image,
    /// Ordered `TouchRecord` lists.
    Touch,
}

impl StreamFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamFormat::Image => "image",
            StreamFormat::Touch => "touch",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum Payload {
    Image(Image),
    Touches(Vec<TouchRecord>),
}

impl Payload {
    pub fn format(&self) -> StreamFormat {
        match self {
            Payload::Image(_) => StreamFormat::Image,
            Payload::Touches(_) => StreamFormat::Touch,
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Payload::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_touches(&self) -> Option<&[TouchRecord]> {
        match self {
            Payload::Touches(touches) => Some(touches),
            _ => None,
        }
    }
}

/// Receiver of "new data" notifications.
///
/// `notify_data` runs synchronously inside the producer's `push`, so it must
/// be cheap: record that work is pending and return.
pub trait StreamObserver: Send + Sync {
    /// Identifier used in introspection output.
    fn observer_id(&self) -> String;

    fn notify_data(&self, stream: &DataStream);
}

pub struct DataStream {
    name: String,
    format: StreamFormat,
    slot: RwLock<Option<Arc<Payload>>>,
    observers: Mutex<Vec<Arc<dyn StreamObserver>>>,
    sequence: AtomicU64,
}

impl DataStream {
    pub fn new(name: &str, format: StreamFormat) -> Self {
        Self {
            name: name.to_string(),
            format,
            slot: RwLock::new(None),
            observers: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Publish a payload, replacing the previous one, then notify observers.
    ///
    /// A payload of the wrong format is rejected and the slot is left untouched.
    pub fn push(&self, payload: Payload) -> ModuleResult<()> {
        if payload.format() != self.format {
            return Err(ModuleError::runtime(format!(
                "stream '{}' carries {} payloads, got {}",
                self.name,
                self.format,
                payload.format()
            )));
        }

        let payload = Arc::new(payload);
        {
            let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
            *slot = Some(payload);
            self.sequence.fetch_add(1, Ordering::AcqRel);
        }

        // Dispatch over a snapshot: observers may (un)subscribe from inside the hook.
        let snapshot: Vec<Arc<dyn StreamObserver>> = self.observers().clone();
        for observer in snapshot {
            observer.notify_data(self);
        }
        Ok(())
    }

    /// Current payload, if anything was ever pushed.
    pub fn get_data(&self) -> Option<Arc<Payload>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hold the slot for a multi-step read. Pushes wait until the guard drops.
    pub fn lock(&self) -> StreamLock<'_> {
        StreamLock {
            guard: self.slot.read().unwrap_or_else(PoisonError::into_inner),
            sequence: self.sequence(),
        }
    }

    /// Number of payloads pushed so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn add_observer(&self, observer: Arc<dyn StreamObserver>) {
        let mut observers = self.observers();
        if !observers.iter().any(|o| same_observer(o, &observer)) {
            observers.push(observer);
        }
    }

    pub fn remove_observer(&self, observer: &Arc<dyn StreamObserver>) {
        self.observers().retain(|o| !same_observer(o, observer));
    }

    pub fn observer_count(&self) -> usize {
        self.observers().len()
    }

    pub fn observer_ids(&self) -> Vec<String> {
        self.observers().iter().map(|o| o.observer_id()).collect()
    }

    fn observers(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn StreamObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DataStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStream")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("sequence", &self.sequence())
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Read guard over a stream's slot.
pub struct StreamLock<'a> {
    guard: RwLockReadGuard<'a, Option<Arc<Payload>>>,
    sequence: u64,
}

impl StreamLock<'_> {
    pub fn data(&self) -> Option<&Payload> {
        self.guard.as_deref()
    }

    /// Sequence number of the payload seen through this guard.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

fn same_observer(a: &Arc<dyn StreamObserver>, b: &Arc<dyn StreamObserver>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
