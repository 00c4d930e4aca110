// ============================================================================
// DRAWING PRIMITIVES — circle stamp, stamped stroke, box / marquee
// ============================================================================
//
// Every primitive reads the whole surface once, edits the copy, and writes it
// back in a single call. All coordinates are clipped here, so callers may pass
// points outside the surface.

use image::Rgba;

use crate::compositor::over;
use crate::error::SurfaceError;
use crate::surface::PixelSurface;

/// How a brush colour lands on an existing pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StampPolicy {
    /// RGBA replaced outright. Translucent strokes never build up opacity.
    #[default]
    Overwrite,
    /// Brush colour composited "over" the existing pixel.
    Blend,
}

impl StampPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            StampPolicy::Overwrite => "overwrite",
            StampPolicy::Blend => "blend",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "overwrite" => Some(StampPolicy::Overwrite),
            "blend" => Some(StampPolicy::Blend),
            _ => None,
        }
    }
}

/// Working copy of a surface's pixels with bounds-checked writes.
struct Scratch {
    buf: Vec<u8>,
    width: i64,
    height: i64,
}

impl Scratch {
    fn read(surface: &PixelSurface) -> Self {
        Self {
            buf: surface.read_all(),
            width: surface.width() as i64,
            height: surface.height() as i64,
        }
    }

    fn blank(width: u32, height: u32) -> Self {
        Self {
            buf: vec![0; width as usize * height as usize * 4],
            width: width as i64,
            height: height as i64,
        }
    }

    #[inline]
    fn put(&mut self, x: i64, y: i64, color: Rgba<u8>, policy: StampPolicy) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let px = &mut self.buf[i..i + 4];
        let value = match policy {
            StampPolicy::Overwrite => color.0,
            StampPolicy::Blend => over([px[0], px[1], px[2], px[3]], color.0),
        };
        px.copy_from_slice(&value);
    }

    fn stamp(&mut self, cx: i64, cy: i64, radius: u32, color: Rgba<u8>, policy: StampPolicy) {
        let r = radius as i64;
        for dx in -r..=r {
            let dy_max = ((r * r - dx * dx) as f64).sqrt().floor() as i64;
            for dy in -dy_max..=dy_max {
                self.put(cx + dx, cy + dy, color, policy);
            }
        }
    }

    fn rect(&mut self, c1: (i32, i32), c2: (i32, i32), radius: i32, color: Rgba<u8>, fill: bool) {
        let (x1, x2) = (c1.0.min(c2.0) as i64, c1.0.max(c2.0) as i64);
        let (y1, y2) = (c1.1.min(c2.1) as i64, c1.1.max(c2.1) as i64);
        let r2 = radius as i64 * radius as i64;
        for y in y1.max(0)..=y2.min(self.height - 1) {
            for x in x1.max(0)..=x2.min(self.width - 1) {
                let dx = (x - x1).min(x2 - x);
                let dy = (y - y1).min(y2 - y);
                let border = x == x1 || x == x2 || y == y1 || y == y2 || dx * dx + dy * dy <= r2;
                if fill || border {
                    self.put(x, y, color, StampPolicy::Overwrite);
                }
            }
        }
    }

    fn write_back(self, surface: &mut PixelSurface) -> Result<(), SurfaceError> {
        surface.write_all(self.buf)
    }
}

/// Filled circle of `radius` around `(cx, cy)`. Radius 0 is a single pixel.
pub fn stamp(
    surface: &mut PixelSurface,
    cx: i32,
    cy: i32,
    radius: u32,
    color: Rgba<u8>,
    policy: StampPolicy,
) -> Result<(), SurfaceError> {
    let mut scratch = Scratch::read(surface);
    scratch.stamp(cx as i64, cy as i64, radius, color, policy);
    scratch.write_back(surface)
}

/// Circles stamped every unit step from `from` towards `to`. The end point
/// itself is not stamped; pointer handlers stamp it separately.
pub fn stroke(
    surface: &mut PixelSurface,
    from: (i32, i32),
    to: (i32, i32),
    radius: u32,
    color: Rgba<u8>,
    policy: StampPolicy,
) -> Result<(), SurfaceError> {
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (x1, y1) = (to.0 as f64, to.1 as f64);
    let dist = (x1 - x0).hypot(y1 - y0);
    let steps = dist.floor() as i64;
    if steps == 0 {
        return Ok(());
    }
    let mut scratch = Scratch::read(surface);
    for i in 0..steps {
        let t = i as f64 / dist;
        let x = (x0 * (1.0 - t) + x1 * t).round() as i64;
        let y = (y0 * (1.0 - t) + y1 * t).round() as i64;
        scratch.stamp(x, y, radius, color, policy);
    }
    scratch.write_back(surface)
}

/// Rectangle between two inclusive corners (any order) painted into the
/// existing surface. Unfilled boxes get a border plus a rounded-corner
/// falloff controlled by `radius`.
pub fn draw_box(
    surface: &mut PixelSurface,
    corner1: (i32, i32),
    corner2: (i32, i32),
    radius: i32,
    color: Rgba<u8>,
    fill: bool,
) -> Result<(), SurfaceError> {
    let mut scratch = Scratch::read(surface);
    scratch.rect(corner1, corner2, radius, color, fill);
    scratch.write_back(surface)
}

/// Same box, drawn onto a fresh transparent overlay of the given size.
/// Used for the selection marquee.
pub fn marquee(
    width: u32,
    height: u32,
    corner1: (i32, i32),
    corner2: (i32, i32),
    radius: i32,
    color: Rgba<u8>,
) -> Result<PixelSurface, SurfaceError> {
    let mut overlay = PixelSurface::transparent(width, height)?;
    let mut scratch = Scratch::blank(width, height);
    scratch.rect(corner1, corner2, radius, color, false);
    scratch.write_back(&mut overlay)?;
    Ok(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn count(surface: &PixelSurface, color: Rgba<u8>) -> usize {
        surface.as_raw().chunks_exact(4).filter(|p| *p == color.0).count()
    }

    #[test]
    fn radius_zero_stamp_hits_one_pixel() {
        let mut s = PixelSurface::new(4, 4, WHITE).unwrap();
        stamp(&mut s, 1, 1, 0, RED, StampPolicy::Overwrite).unwrap();
        assert_eq!(s.pixel(1, 1), Some(RED));
        assert_eq!(count(&s, RED), 1);
    }

    #[test]
    fn radius_one_stamp_is_a_plus() {
        let mut s = PixelSurface::new(5, 5, WHITE).unwrap();
        stamp(&mut s, 2, 2, 1, RED, StampPolicy::Overwrite).unwrap();
        assert_eq!(count(&s, RED), 5);
        assert_eq!(s.pixel(1, 1), Some(WHITE));
    }

    #[test]
    fn corner_stamp_stays_in_bounds() {
        let mut s = PixelSurface::new(4, 4, WHITE).unwrap();
        stamp(&mut s, 0, 0, 3, RED, StampPolicy::Overwrite).unwrap();
        stamp(&mut s, 3, 3, 3, RED, StampPolicy::Overwrite).unwrap();
        stamp(&mut s, -50, 70, 5, RED, StampPolicy::Overwrite).unwrap();
        assert_eq!(s.byte_len(), 64);
        assert_eq!(s.pixel(0, 0), Some(RED));
        assert_eq!(s.pixel(3, 3), Some(RED));
    }

    #[test]
    fn overwrite_does_not_accumulate_alpha() {
        let half = Rgba([0, 0, 255, 100]);
        let mut s = PixelSurface::new(3, 3, WHITE).unwrap();
        stamp(&mut s, 1, 1, 0, half, StampPolicy::Overwrite).unwrap();
        stamp(&mut s, 1, 1, 0, half, StampPolicy::Overwrite).unwrap();
        assert_eq!(s.pixel(1, 1), Some(half));
    }

    #[test]
    fn blend_composites_onto_existing() {
        let half = Rgba([0, 0, 0, 128]);
        let mut s = PixelSurface::new(1, 1, WHITE).unwrap();
        stamp(&mut s, 0, 0, 0, half, StampPolicy::Blend).unwrap();
        let px = s.pixel(0, 0).unwrap();
        assert_eq!(px[3], 255);
        assert!(px[0] < 255 && px[0] > 0);
    }

    #[test]
    fn stroke_leaves_end_point_to_caller() {
        let mut s = PixelSurface::new(6, 1, WHITE).unwrap();
        stroke(&mut s, (0, 0), (5, 0), 0, RED, StampPolicy::Overwrite).unwrap();
        for x in 0..5 {
            assert_eq!(s.pixel(x, 0), Some(RED), "x={x}");
        }
        assert_eq!(s.pixel(5, 0), Some(WHITE));
    }

    #[test]
    fn stroke_between_equal_points_is_noop() {
        let mut s = PixelSurface::new(3, 3, WHITE).unwrap();
        stroke(&mut s, (1, 1), (1, 1), 2, RED, StampPolicy::Overwrite).unwrap();
        assert_eq!(count(&s, RED), 0);
    }

    #[test]
    fn filled_box_swaps_corners_and_clips() {
        let mut s = PixelSurface::new(4, 4, WHITE).unwrap();
        draw_box(&mut s, (2, 5), (-3, 1), 0, RED, true).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let expect = if x <= 2 && y >= 1 { RED } else { WHITE };
                assert_eq!(s.pixel(x, y), Some(expect), "({x},{y})");
            }
        }
    }

    #[test]
    fn outlined_box_leaves_interior() {
        let mut s = PixelSurface::new(7, 7, WHITE).unwrap();
        draw_box(&mut s, (0, 0), (6, 6), 0, RED, false).unwrap();
        assert_eq!(s.pixel(0, 3), Some(RED));
        assert_eq!(s.pixel(6, 6), Some(RED));
        assert_eq!(s.pixel(3, 3), Some(WHITE));
        assert_eq!(count(&s, RED), 24);
    }

    #[test]
    fn marquee_draws_on_transparent_overlay() {
        let m = marquee(5, 5, (1, 1), (3, 3), 1, RED).unwrap();
        assert_eq!(m.pixel(0, 0), Some(Rgba([0, 0, 0, 0])));
        assert_eq!(m.pixel(1, 1), Some(RED));
        // radius 1 falloff: (2,2) is one step from two edges -> 1+1 > 1
        assert_eq!(m.pixel(2, 2), Some(Rgba([0, 0, 0, 0])));
    }
}
