//! Touch Pipeline
//!
//! This crate turns a stream of binary foreground masks into stable,
//! identified touch events (position, size, persistent id) for multi-touch
//! and optical tracking setups.
//!
//! # Architecture
//!
//! Frames move between pipeline stages over single-slot data streams:
//!
//! 1. **Latest wins**: a stream holds one immutable payload; a push replaces it.
//! 2. **Observer scheduling**: a push only marks consumers dirty; the driver's
//!    next `Pipeline::poll()` runs them, producers first.
//! 3. **Cross-thread reads**: streams are `Send + Sync`, so a consumer thread can
//!    follow a stream while the pipeline keeps pushing.
//! 4. **Stable identities**: tracked ids are never reused and never duplicated.
//!
//! # Module Structure
//!
//! - `stream`: DataStream, payloads, observers
//! - `module`: Module lifecycle, ModuleCore, ModuleFactory
//! - `pipeline`: ordered scheduling and status snapshots
//! - `detect`: BlobDetector over a disposable WorkingMask
//! - `track`: BlobTracker, TouchRecord, the tracker module
//! - `ingest`: FrameSource and the synthetic source
//! - `config`: `touchd` configuration (file + env)

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod module;
pub mod pipeline;
pub mod property;
pub mod stream;
pub mod track;

pub use detect::{Blob, BlobDetector};
pub use error::{ModuleError, ModuleResult};
pub use frame::{Image, WorkingMask, BACKGROUND, FOREGROUND};
pub use ingest::{FrameSource, SourceModule, SyntheticConfig, SyntheticSource};
pub use module::{Module, ModuleCore, ModuleDescription, ModuleFactory, ModuleInfo, PortInfo};
pub use pipeline::{Pipeline, PipelineStatus};
pub use property::{Property, PropertyBag, PropertyKind, PropertyValue};
pub use stream::{DataStream, Payload, StreamFormat, StreamObserver};
pub use track::{BlobTracker, BlobTrackerModule, TouchRecord, TrackerParams};
