use crate::detect::Blob;

/// A blob carried across frames with its identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackedBlob {
    pub blob: Blob,
    pub id: u64,
    /// Consecutive frames without a matching candidate.
    pub age: u32,
    pub matched: bool,
    /// Consecutive matches, saturating at `min_age`. Never gates emission.
    pub maturity: u32,
}

impl TrackedBlob {
    pub fn new(blob: Blob, id: u64) -> Self {
        Self {
            blob,
            id,
            age: 0,
            matched: true,
            maturity: 0,
        }
    }

    pub fn is_mature(&self, min_age: u32) -> bool {
        self.maturity >= min_age
    }
}

/// Slot table holding the tracked set between frames.
///
/// Slots are stable for the duration of a frame. `retire` only frees a slot;
/// freed slots are compacted away by `end_frame`.
#[derive(Debug, Default)]
pub struct BlobArena {
    slots: Vec<Option<TrackedBlob>>,
}

impl BlobArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: usize) -> Option<&TrackedBlob> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut TrackedBlob> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn retire(&mut self, slot: usize) -> Option<TrackedBlob> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Live entries with their slot index, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &TrackedBlob)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|b| (slot, b)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedBlob> {
        self.slots.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Close the frame: `front` takes the first slots, followed by the live
    /// entries in their previous order. Freed slots disappear.
    pub fn end_frame(&mut self, front: Vec<TrackedBlob>) {
        let survivors = std::mem::take(&mut self.slots).into_iter().flatten();
        self.slots = front.into_iter().chain(survivors).map(Some).collect();
    }
}
