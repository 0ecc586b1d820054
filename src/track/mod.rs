//! Cross-frame blob tracking.
//!
//! - `BlobTracker`: assigns persistent ids to detector candidates and decays
//!   blobs that disappear.
//! - `BlobArena`: slot table holding the tracked set between frames.
//! - `TouchRecord`: the per-blob event published downstream.
//! - `BlobTrackerModule`: pipeline stage wrapping the tracker.

pub mod arena;
pub mod module;
pub mod touch;
pub mod tracker;

pub use arena::{BlobArena, TrackedBlob};
pub use module::BlobTrackerModule;
pub use touch::TouchRecord;
pub use tracker::{BlobTracker, TrackerParams};
