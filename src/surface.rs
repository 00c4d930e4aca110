// ============================================================================
// PIXEL SURFACE — owned, fixed-size RGBA8 buffer
// ============================================================================

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use image::{Rgba, RgbaImage};

use crate::error::SurfaceError;

/// Straight (non-premultiplied) RGBA8 pixel buffer, rows packed without
/// padding. The buffer length is always `width * height * 4`; resizing means
/// building a new surface.
///
/// `Clone` duplicates the pixel data, so two surfaces never share a buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelSurface {
    image: RgbaImage,
}

impl PixelSurface {
    /// A surface with every pixel set to `fill`.
    pub fn new(width: u32, height: u32, fill: Rgba<u8>) -> Result<Self, SurfaceError> {
        check_dimensions(width, height)?;
        Ok(Self { image: RgbaImage::from_pixel(width, height, fill) })
    }

    /// Fully transparent black.
    pub fn transparent(width: u32, height: u32) -> Result<Self, SurfaceError> {
        Self::new(width, height, Rgba([0, 0, 0, 0]))
    }

    /// Every byte independently pseudo-random. Used for placeholder canvases.
    pub fn random(width: u32, height: u32) -> Result<Self, SurfaceError> {
        check_dimensions(width, height)?;
        let seed = process_seed().wrapping_add(RANDOM_CALLS.fetch_add(1, Ordering::Relaxed));
        let len = width as usize * height as usize * 4;
        let raw: Vec<u8> = (0..len)
            .map(|i| (hash_u32((i as u32).wrapping_mul(374761393).wrapping_add(seed)) >> 24) as u8)
            .collect();
        Self::from_raw(width, height, raw)
    }

    pub fn from_raw(width: u32, height: u32, raw: Vec<u8>) -> Result<Self, SurfaceError> {
        check_dimensions(width, height)?;
        let expected = width as usize * height as usize * 4;
        if raw.len() != expected {
            return Err(SurfaceError::SizeMismatch { expected, actual: raw.len() });
        }
        let image = RgbaImage::from_raw(width, height, raw)
            .ok_or(SurfaceError::SizeMismatch { expected, actual: 0 })?;
        Ok(Self { image })
    }

    pub fn from_rgba_image(image: RgbaImage) -> Result<Self, SurfaceError> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Number of bytes the surface must always hold.
    pub fn byte_len(&self) -> usize {
        self.width() as usize * self.height() as usize * 4
    }

    /// Full copy of the pixel bytes. Never a live view: primitives mutate the
    /// copy and hand it back through [`write_all`](Self::write_all).
    pub fn read_all(&self) -> Vec<u8> {
        self.image.as_raw().clone()
    }

    /// Borrowed view of the pixel bytes for read-only consumers.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Replace the whole buffer. Fails without touching the surface if the
    /// length differs from `width * height * 4`.
    pub fn write_all(&mut self, buffer: Vec<u8>) -> Result<(), SurfaceError> {
        let expected = self.byte_len();
        if buffer.len() != expected {
            return Err(SurfaceError::SizeMismatch { expected, actual: buffer.len() });
        }
        let (w, h) = self.dimensions();
        self.image = RgbaImage::from_raw(w, h, buffer)
            .ok_or(SurfaceError::SizeMismatch { expected, actual: 0 })?;
        Ok(())
    }

    /// Write a `w x h` block of RGBA bytes with its top-left at `(x, y)`.
    ///
    /// The block is clipped against the surface; parts that fall outside are
    /// dropped. `rgba` must hold exactly `w * h * 4` bytes.
    pub fn write_subregion(&mut self, x: i32, y: i32, w: u32, h: u32, rgba: &[u8]) -> Result<(), SurfaceError> {
        let expected = w as usize * h as usize * 4;
        if rgba.len() != expected {
            return Err(SurfaceError::SizeMismatch { expected, actual: rgba.len() });
        }
        let (sw, sh) = (self.width() as i64, self.height() as i64);
        let x0 = (x as i64).max(0);
        let y0 = (y as i64).max(0);
        let x1 = (x as i64 + w as i64).min(sw);
        let y1 = (y as i64 + h as i64).min(sh);
        if x0 >= x1 || y0 >= y1 {
            return Ok(());
        }
        let span = ((x1 - x0) * 4) as usize;
        let stride = sw as usize * 4;
        let dst = &mut *self.image;
        for py in y0..y1 {
            let src_off = (((py - y as i64) * w as i64 + (x0 - x as i64)) * 4) as usize;
            let dst_off = py as usize * stride + x0 as usize * 4;
            dst[dst_off..dst_off + span].copy_from_slice(&rgba[src_off..src_off + span]);
        }
        Ok(())
    }

    /// Pixel at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return None;
        }
        Some(*self.image.get_pixel(x as u32, y as u32))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), SurfaceError> {
    if width == 0 || height == 0 {
        return Err(SurfaceError::InvalidDimensions { width, height });
    }
    Ok(())
}

// ============================================================================
// PLACEHOLDER NOISE
// ============================================================================

static PROCESS_SEED: OnceLock<u32> = OnceLock::new();
static RANDOM_CALLS: AtomicU32 = AtomicU32::new(0);

fn process_seed() -> u32 {
    *PROCESS_SEED.get_or_init(|| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9);
        hash_u32((nanos ^ (nanos >> 32)) as u32)
    })
}

#[inline]
fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EBCA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2AE35);
    x ^= x >> 16;
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn new_rejects_zero_dimensions() {
        assert_eq!(
            PixelSurface::new(0, 4, RED),
            Err(SurfaceError::InvalidDimensions { width: 0, height: 4 })
        );
        assert!(PixelSurface::transparent(3, 0).is_err());
    }

    #[test]
    fn new_fills_every_pixel() {
        let s = PixelSurface::new(3, 2, RED).unwrap();
        assert_eq!(s.byte_len(), 24);
        assert!(s.as_raw().chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
    }

    #[test]
    fn read_all_is_a_copy() {
        let s = PixelSurface::new(2, 2, RED).unwrap();
        let mut copy = s.read_all();
        copy[0] = 7;
        assert_eq!(s.as_raw()[0], 255);
    }

    #[test]
    fn write_all_checks_length() {
        let mut s = PixelSurface::transparent(2, 2).unwrap();
        let err = s.write_all(vec![1; 15]).unwrap_err();
        assert_eq!(err, SurfaceError::SizeMismatch { expected: 16, actual: 15 });
        assert!(s.as_raw().iter().all(|&b| b == 0));

        s.write_all(vec![9; 16]).unwrap();
        assert!(s.as_raw().iter().all(|&b| b == 9));
    }

    #[test]
    fn write_subregion_clips_to_surface() {
        let mut s = PixelSurface::transparent(3, 3).unwrap();
        let block = [255u8; 2 * 2 * 4];
        s.write_subregion(2, 2, 2, 2, &block).unwrap();
        assert_eq!(s.pixel(2, 2), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(s.pixel(1, 1), Some(Rgba([0, 0, 0, 0])));

        s.write_subregion(-1, -1, 2, 2, &block).unwrap();
        assert_eq!(s.pixel(0, 0), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(s.pixel(1, 0), Some(Rgba([0, 0, 0, 0])));

        // fully outside: nothing happens
        s.write_subregion(10, 10, 2, 2, &block).unwrap();
    }

    #[test]
    fn write_subregion_places_rows() {
        let mut s = PixelSurface::transparent(4, 4).unwrap();
        let block: Vec<u8> = (0..2 * 2).flat_map(|i| [i as u8, 0, 0, 255]).collect();
        s.write_subregion(1, 2, 2, 2, &block).unwrap();
        assert_eq!(s.pixel(1, 2), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(s.pixel(2, 2), Some(Rgba([1, 0, 0, 255])));
        assert_eq!(s.pixel(1, 3), Some(Rgba([2, 0, 0, 255])));
        assert_eq!(s.pixel(2, 3), Some(Rgba([3, 0, 0, 255])));
    }

    #[test]
    fn random_surfaces_differ_between_calls() {
        let a = PixelSurface::random(16, 16).unwrap();
        let b = PixelSurface::random(16, 16).unwrap();
        assert_eq!(a.byte_len(), 1024);
        assert_ne!(a.as_raw(), b.as_raw());
    }
}
