// ============================================================================
// COMPOSITOR — flatten enabled layers with straight-alpha "over"
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::Layer;
use crate::error::SurfaceError;
use crate::surface::PixelSurface;

/// Result of [`flatten`]. Owned by the caller; nothing else references it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlattenedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FlattenedImage {
    pub fn into_surface(self) -> Result<PixelSurface, SurfaceError> {
        PixelSurface::from_raw(self.width, self.height, self.pixels)
    }

    pub fn into_rgba_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels)
    }

    /// RGBA at `(x, y)`; panics outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }
}

/// Porter-Duff "over" for one unpremultiplied pixel pair.
///
/// A result with zero coverage is transparent black.
#[inline]
pub fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let oa = da + sa * (1.0 - da);
    if oa <= 0.0 {
        return [0, 0, 0, 0];
    }
    let channel = |d: u8, s: u8| -> u8 {
        let c = (d as f32 * da * (1.0 - sa) + s as f32 * sa) / oa;
        c.round().clamp(0.0, 255.0) as u8
    };
    [
        channel(dst[0], src[0]),
        channel(dst[1], src[1]),
        channel(dst[2], src[2]),
        (oa * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// Bounding size of the enabled layers, or `None` when nothing is enabled.
pub fn enabled_bounds(layers: &[Layer]) -> Option<(u32, u32)> {
    layers
        .iter()
        .filter(|l| l.enabled)
        .map(|l| (l.width(), l.height()))
        .reduce(|(w, h), (lw, lh)| (w.max(lw), h.max(lh)))
}

/// Composite every enabled layer, in sequence order, into one buffer sized
/// to the largest enabled layer. Smaller layers are anchored at the origin.
/// Disabled layers take no part, not even in the bounding box.
pub fn flatten(layers: &[Layer]) -> Option<FlattenedImage> {
    let (width, height) = enabled_bounds(layers)?;
    let stride = width as usize * 4;
    let mut out = vec![0u8; stride * height as usize];

    for layer in layers.iter().filter(|l| l.enabled) {
        let src = layer.surface.as_raw();
        let src_stride = layer.width() as usize * 4;
        out.par_chunks_mut(stride)
            .take(layer.height() as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let src_row = &src[y * src_stride..(y + 1) * src_stride];
                for (dst_px, src_px) in row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                    let blended = over(
                        [dst_px[0], dst_px[1], dst_px[2], dst_px[3]],
                        [src_px[0], src_px[1], src_px[2], src_px[3]],
                    );
                    dst_px.copy_from_slice(&blended);
                }
            });
    }

    Some(FlattenedImage { width, height, pixels: out })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn layer(w: u32, h: u32, fill: [u8; 4], enabled: bool) -> Layer {
        let mut l = Layer::new(PixelSurface::new(w, h, Rgba(fill)).unwrap());
        l.enabled = enabled;
        l
    }

    #[test]
    fn over_opaque_source_replaces() {
        assert_eq!(over([1, 2, 3, 200], [9, 8, 7, 255]), [9, 8, 7, 255]);
    }

    #[test]
    fn over_transparent_source_keeps_destination() {
        assert_eq!(over([10, 20, 30, 128], [255, 255, 255, 0]), [10, 20, 30, 128]);
        assert_eq!(over([0, 0, 0, 0], [5, 5, 5, 0]), [0, 0, 0, 0]);
    }

    #[test]
    fn over_half_alpha_on_white() {
        let out = over([255, 255, 255, 255], [0, 0, 0, 128]);
        assert_eq!(out[3], 255);
        assert!((126..=128).contains(&out[0]));
    }

    #[test]
    fn nothing_enabled_flattens_to_none() {
        let layers = vec![layer(2, 2, [1, 1, 1, 255], false)];
        assert_eq!(flatten(&layers), None);
        assert_eq!(flatten(&[]), None);
    }

    #[test]
    fn single_opaque_layer_is_reproduced() {
        let mut l = layer(3, 2, [0, 0, 0, 255], true);
        let raw: Vec<u8> = (0..6).flat_map(|i| [i * 10, i * 20, i * 30, 255]).collect();
        l.surface.write_all(raw.clone()).unwrap();
        let flat = flatten(&[l]).unwrap();
        assert_eq!((flat.width, flat.height), (3, 2));
        assert_eq!(flat.pixels, raw);
    }

    #[test]
    fn opaque_top_wins_over_anything() {
        let bottom = layer(2, 2, [3, 4, 5, 90], true);
        let top = layer(2, 2, [200, 100, 50, 255], true);
        let flat = flatten(&[bottom, top]).unwrap();
        assert!(flat.pixels.chunks_exact(4).all(|p| p == [200, 100, 50, 255]));
    }

    #[test]
    fn transparent_top_leaves_bottom() {
        let bottom = layer(2, 2, [30, 60, 90, 255], true);
        let top = layer(2, 2, [255, 0, 0, 0], true);
        let flat = flatten(&[bottom, top]).unwrap();
        assert!(flat.pixels.chunks_exact(4).all(|p| p == [30, 60, 90, 255]));
    }

    #[test]
    fn bounds_ignore_disabled_layers_and_anchor_at_origin() {
        let big_hidden = layer(8, 8, [1, 1, 1, 255], false);
        let wide = layer(4, 1, [10, 10, 10, 255], true);
        let tall = layer(1, 3, [20, 20, 20, 255], true);
        let flat = flatten(&[big_hidden, wide, tall]).unwrap();
        assert_eq!((flat.width, flat.height), (4, 3));
        assert_eq!(flat.pixel(0, 0), [20, 20, 20, 255]);
        assert_eq!(flat.pixel(3, 0), [10, 10, 10, 255]);
        assert_eq!(flat.pixel(0, 2), [20, 20, 20, 255]);
        assert_eq!(flat.pixel(3, 2), [0, 0, 0, 0]);
    }
}
