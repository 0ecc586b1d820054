use crate::detect::blob::Blob;
use crate::error::{ModuleError, ModuleResult};
use crate::frame::WorkingMask;

pub const DEFAULT_MIN_SIZE: u32 = 8;
pub const DEFAULT_MAX_SIZE: u32 = 25;

/// Per-frame candidate extraction from a binary mask.
///
/// The scan visits a sparse grid of seed points. From each foreground seed the
/// detector measures the region with four probes (right, up/down from the run
/// midpoint, then left/right from the vertical midpoint), erases the measured
/// box from the working mask so it cannot seed again, and keeps the box if
/// both sides lie within `[min_size, max_size]`. Boxes accepted in the same
/// scan that overlap are merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlobDetector {
    min_size: u32,
    max_size: u32,
}

impl Default for BlobDetector {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl BlobDetector {
    pub fn new(min_size: u32, max_size: u32) -> ModuleResult<Self> {
        if min_size == 0 {
            return Err(ModuleError::configuration("min_size must be >= 1"));
        }
        if max_size < min_size {
            return Err(ModuleError::configuration(format!(
                "max_size ({}) must be >= min_size ({})",
                max_size, min_size
            )));
        }
        Ok(Self { min_size, max_size })
    }

    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Seed grid spacing on both axes.
    ///
    /// Any run of `min_size` consecutive rows (or columns) contains a multiple
    /// of `min_size`, so a square of side >= `min_size` always holds a seed.
    /// This stays below the `ceil(sqrt(2) * min_size)` upper bound.
    pub fn stride(&self) -> usize {
        self.min_size as usize
    }

    /// Scan `mask` and return this frame's candidates.
    ///
    /// The mask is consumed: measured regions are erased while scanning.
    pub fn detect(&self, mut mask: WorkingMask) -> Vec<Blob> {
        let height = mask.height() as i64;
        let width = mask.width() as i64;
        let stride = self.stride();
        let (min, max) = (self.min_size as i32, self.max_size as i32);
        let mut accepted: Vec<Blob> = Vec::new();

        for row in (0..height).step_by(stride) {
            for col in (0..width).step_by(stride) {
                if !mask.is_foreground(row, col) {
                    continue;
                }
                let (top, left, bottom, right) = measure(&mask, row, col);
                mask.erase(top, left, bottom, right);

                let blob = Blob::from_bounds(top as i32, left as i32, bottom as i32, right as i32);
                if !blob.fits(min, max) {
                    log::trace!(
                        "blob rejected at row={} col={} size={}x{}",
                        blob.center_row,
                        blob.center_col,
                        blob.width,
                        blob.height
                    );
                    continue;
                }

                log::trace!("blob found at row={} col={}", blob.center_row, blob.center_col);
                merge_or_push(&mut accepted, blob);
            }
        }
        accepted
    }
}

/// Fold `blob` into every accepted box it overlaps, repeating while the growing
/// union picks up further boxes. The result takes the earliest absorbed slot.
fn merge_or_push(accepted: &mut Vec<Blob>, blob: Blob) {
    let mut merged = blob;
    let mut slot: Option<usize> = None;
    while let Some(index) = accepted.iter().position(|prev| prev.overlaps(&merged)) {
        merged = merged.union(&accepted.remove(index));
        slot = Some(slot.map_or(index, |s| s.min(index)));
    }
    match slot {
        Some(index) => accepted.insert(index, merged),
        None => accepted.push(merged),
    }
}

/// Inclusive `(top, left, bottom, right)` of the region around a foreground seed.
fn measure(mask: &WorkingMask, row: i64, col: i64) -> (i64, i64, i64, i64) {
    let run_right = extent(mask, row, col, 0, 1);
    let mid_col = (col + run_right) / 2;

    let top = extent(mask, row, mid_col, -1, 0);
    let bottom = extent(mask, row, mid_col, 1, 0);
    let mid_row = (top + bottom) / 2;

    // Second pass from the vertical midpoint corrects an off-center seed.
    let left = extent(mask, mid_row, mid_col, 0, -1).min(col);
    let right = extent(mask, mid_row, mid_col, 0, 1).max(run_right);

    (top, left, bottom, right)
}

/// Walk from a foreground pixel in direction (dr, dc) while the next pixel is
/// foreground; returns the last foreground coordinate on the walked axis.
fn extent(mask: &WorkingMask, row: i64, col: i64, dr: i64, dc: i64) -> i64 {
    let (mut r, mut c) = (row, col);
    while mask.is_foreground(r + dr, c + dc) {
        r += dr;
        c += dc;
    }
    if dr != 0 {
        r
    } else {
        c
    }
}
