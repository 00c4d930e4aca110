// ============================================================================
// SELECTION — region extract / insert and the box-select lifecycle
// ============================================================================

use image::Rgba;

use crate::compositor::over;
use crate::draw;
use crate::error::SurfaceError;
use crate::surface::PixelSurface;

/// Copy `[x1, x2) x [y1, y2)` of `surface` into a new surface.
///
/// Corners may come in any order and are clipped to the source; an empty
/// intersection is an `InvalidDimensions` error.
pub fn extract(surface: &PixelSurface, x1: i32, y1: i32, x2: i32, y2: i32) -> Result<PixelSurface, SurfaceError> {
    let (w, h) = (surface.width() as i64, surface.height() as i64);
    let left = (x1.min(x2) as i64).clamp(0, w);
    let right = (x1.max(x2) as i64).clamp(0, w);
    let top = (y1.min(y2) as i64).clamp(0, h);
    let bottom = (y1.max(y2) as i64).clamp(0, h);
    let (out_w, out_h) = ((right - left) as u32, (bottom - top) as u32);
    if out_w == 0 || out_h == 0 {
        return Err(SurfaceError::InvalidDimensions { width: out_w, height: out_h });
    }

    let src = surface.as_raw();
    let stride = w as usize * 4;
    let span = out_w as usize * 4;
    let mut raw = Vec::with_capacity(span * out_h as usize);
    for y in top..bottom {
        let start = y as usize * stride + left as usize * 4;
        raw.extend_from_slice(&src[start..start + span]);
    }
    PixelSurface::from_raw(out_w, out_h, raw)
}

/// Place `src` into `dst` with its top-left at `(x_offset, y_offset)`.
///
/// With `overwrite`, or where the destination pixel is fully transparent, the
/// source pixel is copied as-is; otherwise it is composited "over" the
/// destination. Pixels landing outside `dst` are skipped.
pub fn insert(
    src: &PixelSurface,
    dst: &mut PixelSurface,
    x_offset: i32,
    y_offset: i32,
    overwrite: bool,
) -> Result<(), SurfaceError> {
    let (sw, sh) = (src.width() as i64, src.height() as i64);
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);
    let src_raw = src.as_raw();
    let mut out = dst.read_all();

    for sy in 0..sh {
        let dy = sy + y_offset as i64;
        if dy < 0 || dy >= dh {
            continue;
        }
        for sx in 0..sw {
            let dx = sx + x_offset as i64;
            if dx < 0 || dx >= dw {
                continue;
            }
            let si = ((sy * sw + sx) * 4) as usize;
            let di = ((dy * dw + dx) * 4) as usize;
            let s = [src_raw[si], src_raw[si + 1], src_raw[si + 2], src_raw[si + 3]];
            let d = [out[di], out[di + 1], out[di + 2], out[di + 3]];
            let px = if overwrite || d[3] == 0 { s } else { over(d, s) };
            out[di..di + 4].copy_from_slice(&px);
        }
    }
    dst.write_all(out)
}

// ============================================================================
// BOX SELECT STATE MACHINE
// ============================================================================

/// Marquee colour: opaque black, drawn with a one-pixel corner falloff.
const MARQUEE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const MARQUEE_RADIUS: i32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SelectionPhase {
    #[default]
    Idle,
    /// Button held, second corner follows the pointer.
    Dragging,
    /// Region lifted out of the layer and waiting to be moved or dropped.
    Complete,
    /// Lifted region following the pointer.
    Moving,
}

/// One pointer sample: the position in layer pixels and on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    pub canvas: (i32, i32),
    pub screen: (f32, f32),
}

impl Pointer {
    /// A sample where screen and canvas coordinates coincide (100% zoom,
    /// no pan). Handy for headless callers.
    pub fn at(x: i32, y: i32) -> Self {
        Self { canvas: (x, y), screen: (x as f32, y as f32) }
    }
}

/// What a pointer event did to the layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Only selection state changed.
    Unchanged,
    /// The region was cut out of the layer. Not a history event.
    Lifted,
    /// The region was dropped back into the layer. Exactly one history event.
    Finalized,
    /// The drag ended with an empty rectangle; nothing was lifted.
    Discarded,
}

/// Box-select lifecycle: `Idle -> Dragging -> Complete <-> Moving`, and
/// `Complete -> Idle` when the content is dropped.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    phase: SelectionPhase,
    corner1: (i32, i32),
    corner2: (i32, i32),
    content: Option<PixelSurface>,
    marquee: Option<PixelSurface>,
    /// Displacement of the lifted content in screen pixels.
    screen_offset: (f32, f32),
    /// Zoom factor in effect while the offset was recorded.
    zoom: f32,
    drag_anchor: (f32, f32),
}

impl Selection {
    pub fn new() -> Self {
        Self { zoom: 1.0, ..Default::default() }
    }

    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != SelectionPhase::Idle
    }

    /// Current corners. Normalized (min, max) once the drag has ended.
    pub fn corners(&self) -> ((i32, i32), (i32, i32)) {
        (self.corner1, self.corner2)
    }

    pub fn content(&self) -> Option<&PixelSurface> {
        self.content.as_ref()
    }

    /// Overlay with the rectangle outline, sized like the target layer.
    pub fn marquee(&self) -> Option<&PixelSurface> {
        self.marquee.as_ref()
    }

    /// Displacement of the lifted content in layer pixels.
    pub fn canvas_offset(&self) -> (i32, i32) {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        (
            (self.screen_offset.0 / zoom).round() as i32,
            (self.screen_offset.1 / zoom).round() as i32,
        )
    }

    /// Where the lifted content is currently drawn: top-left inclusive,
    /// bottom-right exclusive.
    pub fn displaced_bounds(&self) -> ((i32, i32), (i32, i32)) {
        let (ox, oy) = self.canvas_offset();
        (
            (self.corner1.0 + ox, self.corner1.1 + oy),
            (self.corner2.0 + ox, self.corner2.1 + oy),
        )
    }

    fn hit(&self, p: (i32, i32)) -> bool {
        let ((x1, y1), (x2, y2)) = self.displaced_bounds();
        p.0 >= x1 && p.0 < x2 && p.1 >= y1 && p.1 < y2
    }

    /// Button pressed at `pointer`. `zoom` is the current view scale
    /// (1.0 = one screen pixel per layer pixel).
    pub fn press(&mut self, layer: &mut PixelSurface, pointer: Pointer, zoom: f32) -> Result<SelectionOutcome, SurfaceError> {
        match self.phase {
            SelectionPhase::Idle if layer.contains(pointer.canvas.0, pointer.canvas.1) => {
                self.phase = SelectionPhase::Dragging;
                self.corner1 = pointer.canvas;
                self.corner2 = pointer.canvas;
                self.marquee = Some(draw::marquee(
                    layer.width(),
                    layer.height(),
                    self.corner1,
                    self.corner2,
                    MARQUEE_RADIUS,
                    MARQUEE_COLOR,
                )?);
                Ok(SelectionOutcome::Unchanged)
            }
            SelectionPhase::Complete if self.hit(pointer.canvas) => {
                self.phase = SelectionPhase::Moving;
                self.drag_anchor = (
                    pointer.screen.0 - self.screen_offset.0,
                    pointer.screen.1 - self.screen_offset.1,
                );
                self.zoom = zoom;
                Ok(SelectionOutcome::Unchanged)
            }
            SelectionPhase::Complete => {
                self.finalize(layer)?;
                Ok(SelectionOutcome::Finalized)
            }
            _ => Ok(SelectionOutcome::Unchanged),
        }
    }

    /// Pointer moved with the button held.
    pub fn drag(&mut self, layer: &PixelSurface, pointer: Pointer, zoom: f32) -> Result<(), SurfaceError> {
        match self.phase {
            SelectionPhase::Dragging => {
                self.corner2 = (
                    pointer.canvas.0.clamp(0, layer.width() as i32),
                    pointer.canvas.1.clamp(0, layer.height() as i32),
                );
                self.marquee = Some(draw::marquee(
                    layer.width(),
                    layer.height(),
                    self.corner1,
                    self.corner2,
                    MARQUEE_RADIUS,
                    MARQUEE_COLOR,
                )?);
            }
            SelectionPhase::Moving => {
                self.screen_offset = (
                    pointer.screen.0 - self.drag_anchor.0,
                    pointer.screen.1 - self.drag_anchor.1,
                );
                self.zoom = zoom;
            }
            _ => {}
        }
        Ok(())
    }

    /// Button released.
    pub fn release(&mut self, layer: &mut PixelSurface) -> Result<SelectionOutcome, SurfaceError> {
        match self.phase {
            SelectionPhase::Dragging => {
                let (a, b) = (self.corner1, self.corner2);
                self.corner1 = (a.0.min(b.0), a.1.min(b.1));
                self.corner2 = (a.0.max(b.0), a.1.max(b.1));
                let (c1, c2) = (self.corner1, self.corner2);
                if c1.0 == c2.0 || c1.1 == c2.1 {
                    self.reset();
                    return Ok(SelectionOutcome::Discarded);
                }
                let content = extract(layer, c1.0, c1.1, c2.0, c2.1)?;
                draw::draw_box(layer, c1, (c2.0 - 1, c2.1 - 1), 0, Rgba([0, 0, 0, 0]), true)?;
                self.content = Some(content);
                self.phase = SelectionPhase::Complete;
                Ok(SelectionOutcome::Lifted)
            }
            SelectionPhase::Moving => {
                self.phase = SelectionPhase::Complete;
                Ok(SelectionOutcome::Unchanged)
            }
            _ => Ok(SelectionOutcome::Unchanged),
        }
    }

    /// Drop the lifted content at its displaced position, composited over
    /// whatever is there, and return to idle.
    pub fn finalize(&mut self, layer: &mut PixelSurface) -> Result<(), SurfaceError> {
        if let Some(content) = self.content.as_ref() {
            let ((x, y), _) = self.displaced_bounds();
            insert(content, layer, x, y, false)?;
        }
        self.reset();
        Ok(())
    }

    /// Put the lifted content back where it came from and return to idle.
    pub fn cancel(&mut self, layer: &mut PixelSurface) -> Result<(), SurfaceError> {
        if let Some(content) = self.content.as_ref() {
            insert(content, layer, self.corner1.0, self.corner1.1, true)?;
        }
        self.reset();
        Ok(())
    }

    /// Forget everything without touching any layer.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> PixelSurface {
        let raw = (0..w * h).flat_map(|i| [i as u8, (i * 3) as u8, 7, 255]).collect();
        PixelSurface::from_raw(w, h, raw).unwrap()
    }

    #[test]
    fn extract_then_insert_reproduces_rectangle() {
        let src = gradient(6, 5);
        let cut = extract(&src, 1, 1, 4, 3).unwrap();
        assert_eq!(cut.dimensions(), (3, 2));

        let mut blank = PixelSurface::transparent(3, 2).unwrap();
        insert(&cut, &mut blank, 0, 0, true).unwrap();
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(blank.pixel(x, y), src.pixel(x + 1, y + 1));
            }
        }
    }

    #[test]
    fn extract_clips_and_rejects_empty() {
        let src = gradient(4, 4);
        assert_eq!(extract(&src, -2, -2, 2, 2).unwrap().dimensions(), (2, 2));
        assert_eq!(extract(&src, 3, 3, 1, 1).unwrap().dimensions(), (2, 2));
        assert!(extract(&src, 5, 5, 9, 9).is_err());
        assert!(extract(&src, 1, 1, 1, 3).is_err());
    }

    #[test]
    fn insert_skips_out_of_range_pixels() {
        let patch = PixelSurface::new(3, 3, Rgba([1, 2, 3, 255])).unwrap();
        let mut dst = PixelSurface::transparent(4, 4).unwrap();
        insert(&patch, &mut dst, -1, 2, true).unwrap();
        assert_eq!(dst.pixel(0, 2), Some(Rgba([1, 2, 3, 255])));
        assert_eq!(dst.pixel(1, 3), Some(Rgba([1, 2, 3, 255])));
        assert_eq!(dst.pixel(2, 2), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn insert_composites_unless_overwriting() {
        let clear = PixelSurface::new(1, 1, Rgba([0, 0, 0, 0])).unwrap();
        let mut dst = PixelSurface::new(1, 1, Rgba([10, 20, 30, 255])).unwrap();
        insert(&clear, &mut dst, 0, 0, false).unwrap();
        assert_eq!(dst.pixel(0, 0), Some(Rgba([10, 20, 30, 255])));
        insert(&clear, &mut dst, 0, 0, true).unwrap();
        assert_eq!(dst.pixel(0, 0), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn lifecycle_lift_move_drop() {
        let mut layer = PixelSurface::new(8, 8, Rgba([255, 255, 255, 255])).unwrap();
        draw::draw_box(&mut layer, (1, 1), (2, 2), 0, Rgba([255, 0, 0, 255]), true).unwrap();

        let mut sel = Selection::new();
        assert_eq!(sel.press(&mut layer, Pointer::at(3, 3), 1.0).unwrap(), SelectionOutcome::Unchanged);
        sel.drag(&layer, Pointer::at(1, 1), 1.0).unwrap();
        assert_eq!(sel.phase(), SelectionPhase::Dragging);
        assert!(sel.marquee().is_some());

        assert_eq!(sel.release(&mut layer).unwrap(), SelectionOutcome::Lifted);
        assert_eq!(sel.corners(), ((1, 1), (3, 3)));
        assert_eq!(sel.content().unwrap().dimensions(), (2, 2));
        // source cleared exactly over the lifted region
        assert_eq!(layer.pixel(1, 1), Some(Rgba([0, 0, 0, 0])));
        assert_eq!(layer.pixel(3, 3), Some(Rgba([255, 255, 255, 255])));

        // grab inside, move by (+3, +2)
        sel.press(&mut layer, Pointer::at(2, 2), 1.0).unwrap();
        assert_eq!(sel.phase(), SelectionPhase::Moving);
        sel.drag(&layer, Pointer::at(5, 4), 1.0).unwrap();
        sel.release(&mut layer).unwrap();
        assert_eq!(sel.phase(), SelectionPhase::Complete);
        assert_eq!(sel.canvas_offset(), (3, 2));

        // click elsewhere drops it
        assert_eq!(sel.press(&mut layer, Pointer::at(0, 7), 1.0).unwrap(), SelectionOutcome::Finalized);
        assert_eq!(sel.phase(), SelectionPhase::Idle);
        assert_eq!(layer.pixel(4, 3), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(layer.pixel(5, 4), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(layer.pixel(1, 1), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn press_on_far_edge_drops_selection() {
        let mut layer = PixelSurface::new(6, 6, Rgba([255, 255, 255, 255])).unwrap();
        let mut sel = Selection::new();
        sel.press(&mut layer, Pointer::at(1, 1), 1.0).unwrap();
        sel.drag(&layer, Pointer::at(3, 3), 1.0).unwrap();
        assert_eq!(sel.release(&mut layer).unwrap(), SelectionOutcome::Lifted);
        assert_eq!(sel.corners(), ((1, 1), (3, 3)));

        // (3, 3) is one past the lifted 2x2 block
        assert_eq!(sel.press(&mut layer, Pointer::at(3, 3), 1.0).unwrap(), SelectionOutcome::Finalized);
        assert_eq!(sel.phase(), SelectionPhase::Idle);

        sel.press(&mut layer, Pointer::at(1, 1), 1.0).unwrap();
        sel.drag(&layer, Pointer::at(3, 3), 1.0).unwrap();
        sel.release(&mut layer).unwrap();
        sel.press(&mut layer, Pointer::at(2, 2), 1.0).unwrap();
        assert_eq!(sel.phase(), SelectionPhase::Moving);
    }

    #[test]
    fn move_offset_scales_with_zoom() {
        let mut layer = PixelSurface::new(10, 10, Rgba([0, 0, 0, 255])).unwrap();
        let mut sel = Selection::new();
        sel.press(&mut layer, Pointer::at(0, 0), 2.0).unwrap();
        sel.drag(&layer, Pointer::at(2, 2), 2.0).unwrap();
        sel.release(&mut layer).unwrap();

        let grab = Pointer { canvas: (1, 1), screen: (2.0, 2.0) };
        sel.press(&mut layer, grab, 2.0).unwrap();
        sel.drag(&layer, Pointer { canvas: (3, 2), screen: (6.0, 4.0) }, 2.0).unwrap();
        assert_eq!(sel.canvas_offset(), (2, 1));
    }

    #[test]
    fn empty_drag_is_discarded() {
        let mut layer = PixelSurface::new(4, 4, Rgba([9, 9, 9, 255])).unwrap();
        let before = layer.clone();
        let mut sel = Selection::new();
        sel.press(&mut layer, Pointer::at(2, 2), 1.0).unwrap();
        assert_eq!(sel.release(&mut layer).unwrap(), SelectionOutcome::Discarded);
        assert!(!sel.is_active());
        assert_eq!(layer, before);
    }

    #[test]
    fn press_outside_layer_does_not_start() {
        let mut layer = PixelSurface::new(4, 4, Rgba([9, 9, 9, 255])).unwrap();
        let mut sel = Selection::new();
        sel.press(&mut layer, Pointer::at(4, 0), 1.0).unwrap();
        assert_eq!(sel.phase(), SelectionPhase::Idle);
    }

    #[test]
    fn cancel_restores_source() {
        let mut layer = gradient(5, 5);
        let before = layer.clone();
        let mut sel = Selection::new();
        sel.press(&mut layer, Pointer::at(1, 1), 1.0).unwrap();
        sel.drag(&layer, Pointer::at(4, 4), 1.0).unwrap();
        sel.release(&mut layer).unwrap();
        assert_ne!(layer, before);
        sel.cancel(&mut layer).unwrap();
        assert_eq!(layer, before);
        assert!(!sel.is_active());
    }
}
