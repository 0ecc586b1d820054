//! Blob detection.
//!
//! - `Blob`: inclusive axis-aligned box in center form.
//! - `BlobDetector`: sparse-grid scan of a `WorkingMask` producing this frame's candidates.

pub mod blob;
pub mod detector;

pub use blob::Blob;
pub use detector::BlobDetector;
