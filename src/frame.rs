//! Frame containers.
//!
//! - `Image`: an interleaved 8-bit frame (1 or 3 channels) published on streams.
//!   Once pushed, an image is shared behind an `Arc` and never mutated.
//! - `WorkingMask`: a private, disposable copy of a single-channel binary
//!   image. Blob detection erases regions from it as it scans, so it can only
//!   be built by copying a published frame and is consumed by the detector.

use crate::error::{ModuleError, ModuleResult};

/// Foreground value in binary masks.
pub const FOREGROUND: u8 = 255;
/// Background value in binary masks.
pub const BACKGROUND: u8 = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Image {
    /// Allocate a zeroed image.
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        let len = width as usize * height as usize * channels as usize;
        Self {
            width,
            height,
            channels,
            data: vec![0u8; len],
        }
    }

    /// Wrap existing pixel data, validating its length.
    pub fn from_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> ModuleResult<Self> {
        if channels == 0 {
            return Err(ModuleError::runtime("image must have at least one channel"));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(channels as usize))
            .ok_or_else(|| ModuleError::runtime("image dimensions overflow"))?;
        if data.len() != expected {
            return Err(ModuleError::runtime(format!(
                "image length mismatch: expected {}, got {}",
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn same_size(&self, other: &Image) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Pixel value at (row, col, channel), or `None` out of bounds.
    pub fn get(&self, row: u32, col: u32, channel: u8) -> Option<u8> {
        if row >= self.height || col >= self.width || channel >= self.channels {
            return None;
        }
        Some(self.data[self.offset(row, col) + channel as usize])
    }

    /// Write one pixel (all channels). Out-of-bounds writes are ignored.
    pub fn put(&mut self, row: i64, col: i64, color: &[u8]) {
        if row < 0 || col < 0 || row >= self.height as i64 || col >= self.width as i64 {
            return;
        }
        let offset = self.offset(row as u32, col as u32);
        let n = self.channels as usize;
        for (dst, src) in self.data[offset..offset + n].iter_mut().zip(color) {
            *dst = *src;
        }
    }

    /// Fill an axis-aligned rectangle (clipped to bounds), every channel set to `value`.
    pub fn fill_rect(&mut self, top: i64, left: i64, width: i64, height: i64, value: u8) {
        let color = vec![value; self.channels as usize];
        for row in top..top + height {
            for col in left..left + width {
                self.put(row, col, &color);
            }
        }
    }

    fn offset(&self, row: u32, col: u32) -> usize {
        (row as usize * self.width as usize + col as usize) * self.channels as usize
    }
}

/// Disposable single-channel copy of a binary frame, consumed by blob detection.
#[derive(Debug)]
pub struct WorkingMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl WorkingMask {
    /// Copy a published frame into a scratch buffer.
    ///
    /// Fails with a runtime error unless the frame has exactly one channel.
    pub fn copy_from(image: &Image) -> ModuleResult<Self> {
        if image.channels() != 1 {
            return Err(ModuleError::runtime(format!(
                "binary mask must be a single channel image, got {} channels",
                image.channels()
            )));
        }
        Ok(Self {
            width: image.width(),
            height: image.height(),
            data: image.data().to_vec(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// True when (row, col) is inside the mask and set to `FOREGROUND`.
    pub fn is_foreground(&self, row: i64, col: i64) -> bool {
        if row < 0 || col < 0 || row >= self.height as i64 || col >= self.width as i64 {
            return false;
        }
        self.data[row as usize * self.width as usize + col as usize] == FOREGROUND
    }

    /// Zero the inclusive box `[top, bottom] x [left, right]`, clipped to bounds.
    pub fn erase(&mut self, top: i64, left: i64, bottom: i64, right: i64) {
        let top = top.max(0);
        let left = left.max(0);
        let bottom = bottom.min(self.height as i64 - 1);
        let right = right.min(self.width as i64 - 1);
        if top > bottom || left > right {
            return;
        }
        let w = self.width as usize;
        for row in top as usize..=bottom as usize {
            self.data[row * w + left as usize..=row * w + right as usize].fill(BACKGROUND);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_validates_length() {
        assert!(Image::from_raw(4, 4, 1, vec![0u8; 16]).is_ok());
        assert!(matches!(
            Image::from_raw(4, 4, 3, vec![0u8; 16]),
            Err(ModuleError::Runtime(_))
        ));
        assert!(Image::from_raw(4, 4, 0, vec![]).is_err());
    }

    #[test]
    fn working_mask_requires_single_channel() {
        let rgb = Image::new(8, 8, 3);
        assert!(matches!(
            WorkingMask::copy_from(&rgb),
            Err(ModuleError::Runtime(_))
        ));
    }

    #[test]
    fn erasing_the_working_copy_leaves_the_frame_intact() {
        let mut frame = Image::new(8, 8, 1);
        frame.fill_rect(2, 2, 4, 4, FOREGROUND);

        let mut mask = WorkingMask::copy_from(&frame).unwrap();
        assert!(mask.is_foreground(3, 3));
        mask.erase(-5, -5, 100, 100);
        assert!(!mask.is_foreground(3, 3));

        assert_eq!(frame.get(3, 3, 0), Some(FOREGROUND));
    }

    #[test]
    fn put_ignores_out_of_bounds() {
        let mut img = Image::new(2, 2, 3);
        img.put(-1, 0, &[1, 2, 3]);
        img.put(0, 2, &[1, 2, 3]);
        img.put(1, 1, &[1, 2, 3]);
        assert_eq!(img.get(1, 1, 2), Some(3));
        assert_eq!(img.data().iter().filter(|b| **b != 0).count(), 3);
    }
}
