use serde::{Deserialize, Serialize};

use crate::detect::detector::{DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE};
use crate::detect::{Blob, BlobDetector};
use crate::error::{ModuleError, ModuleResult};
use crate::frame::{Image, WorkingMask};

use super::arena::{BlobArena, TrackedBlob};
use super::touch::TouchRecord;

pub const DEFAULT_MIN_AGE: u32 = 2;
pub const DEFAULT_MAX_AGE: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerParams {
    pub min_size: u32,
    pub max_size: u32,
    /// Matches needed before a blob counts as mature.
    pub min_age: u32,
    /// Missed frames a blob survives before it is dropped.
    pub max_age: u32,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            min_age: DEFAULT_MIN_AGE,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

impl TrackerParams {
    pub fn validate(&self) -> ModuleResult<()> {
        BlobDetector::new(self.min_size, self.max_size).map(|_| ())
    }
}

/// Cross-frame identity assignment.
///
/// Each frame the candidates are matched greedily against the previous
/// tracked set by two-way center containment. A matched candidate inherits
/// the prior id; an unmatched one gets the next id from a counter that is
/// never reset. Prior blobs that find no candidate decay: each missed frame
/// ages them and shrinks their box by one pixel per axis until they exceed
/// `max_age` or vanish.
#[derive(Debug)]
pub struct BlobTracker {
    params: TrackerParams,
    detector: BlobDetector,
    arena: BlobArena,
    next_id: u64,
}

impl Default for BlobTracker {
    fn default() -> Self {
        Self {
            params: TrackerParams::default(),
            detector: BlobDetector::default(),
            arena: BlobArena::new(),
            next_id: 1,
        }
    }
}

impl BlobTracker {
    pub fn new(params: TrackerParams) -> ModuleResult<Self> {
        let detector = BlobDetector::new(params.min_size, params.max_size)?;
        Ok(Self {
            params,
            detector,
            arena: BlobArena::new(),
            next_id: 1,
        })
    }

    pub fn params(&self) -> TrackerParams {
        self.params
    }

    /// Replace the parameters; the tracked set is kept.
    pub fn set_params(&mut self, params: TrackerParams) -> ModuleResult<()> {
        self.detector = BlobDetector::new(params.min_size, params.max_size)?;
        self.params = params;
        Ok(())
    }

    pub fn detector(&self) -> &BlobDetector {
        &self.detector
    }

    /// Detect on a private copy of `mask`, then track.
    pub fn process(&mut self, mask: &Image) -> ModuleResult<Vec<TouchRecord>> {
        if mask.width() == 0 || mask.height() == 0 {
            return Err(ModuleError::runtime("binary mask has an empty dimension"));
        }
        let candidates = self.detector.detect(WorkingMask::copy_from(mask)?);
        Ok(self.update(&candidates, mask.width(), mask.height()))
    }

    /// Advance one frame with this frame's candidates and return the records
    /// to publish for a `width` x `height` source.
    pub fn update(&mut self, candidates: &[Blob], width: u32, height: u32) -> Vec<TouchRecord> {
        for prior in self.arena.iter_mut() {
            prior.matched = false;
        }

        let mut accepted: Vec<TrackedBlob> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if accepted.iter().any(|a| a.blob.overlaps(candidate)) {
                log::trace!(
                    "candidate at row={} col={} collides with an accepted blob",
                    candidate.center_row,
                    candidate.center_col
                );
                continue;
            }
            let entry = match self.claim_prior(candidate) {
                Some(prior) => TrackedBlob {
                    blob: *candidate,
                    id: prior.id,
                    age: 0,
                    matched: true,
                    maturity: (prior.maturity + 1).min(self.params.min_age),
                },
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    log::debug!("touch {} appeared", id);
                    TrackedBlob::new(*candidate, id)
                }
            };
            accepted.push(entry);
        }

        self.decay_unmatched(&accepted);
        self.arena.end_frame(accepted);
        self.emit(width, height)
    }

    /// First unmatched prior overlapping `candidate`, marked matched.
    fn claim_prior(&mut self, candidate: &Blob) -> Option<TrackedBlob> {
        let slot = self
            .arena
            .iter()
            .find(|(_, prior)| !prior.matched && prior.blob.overlaps(candidate))
            .map(|(slot, _)| slot)?;
        let prior = self.arena.get_mut(slot)?;
        prior.matched = true;
        Some(*prior)
    }

    fn decay_unmatched(&mut self, accepted: &[TrackedBlob]) {
        let max_age = self.params.max_age;
        for slot in 0..self.arena.slot_count() {
            let reason = match self.arena.get_mut(slot) {
                None => continue,
                // Superseded by its candidate in `accepted`.
                Some(prior) if prior.matched => None,
                Some(prior) => {
                    prior.age += 1;
                    if prior.age > max_age {
                        Some("expired")
                    } else {
                        prior.blob = prior.blob.shrunk();
                        if prior.blob.is_empty() {
                            Some("shrank away")
                        } else if accepted.iter().any(|a| a.blob.overlaps(&prior.blob)) {
                            Some("absorbed")
                        } else {
                            continue;
                        }
                    }
                }
            };
            if let (Some(gone), Some(reason)) = (self.arena.retire(slot), reason) {
                log::debug!("touch {} dropped ({})", gone.id, reason);
            }
        }
    }

    fn emit(&self, width: u32, height: u32) -> Vec<TouchRecord> {
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let max = self.params.max_size as i32;
        self.arena
            .iter()
            .map(|(_, tracked)| tracked)
            .filter(|tracked| tracked.blob.fits(1, max))
            .map(|tracked| TouchRecord {
                id: tracked.id,
                x: normalized(tracked.blob.center_col, width),
                y: normalized(tracked.blob.center_row, height),
                w: tracked.blob.width as u32,
                h: tracked.blob.height as u32,
            })
            .collect()
    }

    /// Current tracked set, accepted candidates first.
    pub fn tracked(&self) -> impl Iterator<Item = &TrackedBlob> {
        self.arena.iter().map(|(_, tracked)| tracked)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Forget every tracked blob. Ids keep counting from where they were.
    pub fn clear(&mut self) {
        self.arena.clear();
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

fn normalized(pixel: i32, extent: u32) -> f32 {
    (pixel as f32 / extent as f32).clamp(0.0, 1.0)
}
