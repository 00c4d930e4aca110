// ============================================================================
// LAYER STACK — ordered layers, top-active resolution, merge / resize
// ============================================================================

use image::Rgba;

use crate::compositor;
use crate::error::EditorError;
use crate::selection;
use crate::surface::PixelSurface;

/// Largest width or height a layer may be resized to.
pub const MAX_LAYER_DIM: u32 = 10_000;

/// A surface plus its visibility flag. Dimensions come from the surface, so
/// they can never disagree with the pixel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
    pub enabled: bool,
    pub surface: PixelSurface,
}

impl Layer {
    pub fn new(surface: PixelSurface) -> Self {
        Self { enabled: true, surface }
    }

    pub fn filled(width: u32, height: u32, fill: Rgba<u8>) -> Result<Self, EditorError> {
        Ok(Self::new(PixelSurface::new(width, height, fill)?))
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }
}

/// Layers in Z order: index 0 is composited first, the last enabled layer is
/// the "top active" layer that drawing tools target.
///
/// An editing session always holds at least one layer; [`remove`](Self::remove)
/// refuses to take the last one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new(first: Layer) -> Self {
        Self { layers: vec![first] }
    }

    /// Build from decoded layers. `None` when `layers` is empty.
    pub fn from_layers(layers: Vec<Layer>) -> Option<Self> {
        if layers.is_empty() {
            return None;
        }
        Some(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always false for a stack built through the public constructors.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Remove the layer at `index`. Refuses to empty the stack.
    pub fn remove(&mut self, index: usize) -> Result<Layer, EditorError> {
        if index >= self.layers.len() {
            return Err(EditorError::LayerIndex(index));
        }
        if self.layers.len() <= 1 {
            return Err(EditorError::LastLayer);
        }
        Ok(self.layers.remove(index))
    }

    /// Swap `index` with `index + 1`.
    pub fn swap_with_next(&mut self, index: usize) -> Result<(), EditorError> {
        if index + 1 >= self.layers.len() {
            return Err(EditorError::LayerIndex(index + 1));
        }
        self.layers.swap(index, index + 1);
        Ok(())
    }

    /// Move a layer one step later in the sequence (drawn above its neighbour).
    pub fn move_up(&mut self, index: usize) -> Result<(), EditorError> {
        self.swap_with_next(index)
    }

    /// Move a layer one step earlier in the sequence.
    pub fn move_down(&mut self, index: usize) -> Result<(), EditorError> {
        if index == 0 {
            return Err(EditorError::LayerIndex(index));
        }
        self.swap_with_next(index - 1)
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), EditorError> {
        let layer = self.layers.get_mut(index).ok_or(EditorError::LayerIndex(index))?;
        layer.enabled = enabled;
        Ok(())
    }

    /// Index of the last enabled layer in sequence order.
    pub fn top_active_index(&self) -> Option<usize> {
        self.layers.iter().rposition(|l| l.enabled)
    }

    pub fn top_active(&self) -> Option<&Layer> {
        self.top_active_index().map(|i| &self.layers[i])
    }

    pub fn top_active_mut(&mut self) -> Option<&mut Layer> {
        let idx = self.top_active_index()?;
        self.layers.get_mut(idx)
    }

    /// The enabled layers form a single run of at least two.
    pub fn has_contiguous_active_run(&self) -> bool {
        let flags: Vec<bool> = self.layers.iter().map(|l| l.enabled).collect();
        contiguous_active_run(&flags)
    }

    /// Flatten the enabled run into its first layer and drop the rest of it.
    ///
    /// Returns the index of the merged layer. Nothing changes on error.
    pub fn merge_active(&mut self) -> Result<usize, EditorError> {
        if !self.has_contiguous_active_run() {
            return Err(EditorError::NonContiguousMerge);
        }
        let flat = compositor::flatten(&self.layers).ok_or(EditorError::NoActiveLayer)?;
        let merged = flat.into_surface()?;

        let first = self.layers.iter().position(|l| l.enabled).ok_or(EditorError::NoActiveLayer)?;
        let mut index = 0;
        self.layers.retain(|l| {
            let keep = !l.enabled || index == first;
            index += 1;
            keep
        });
        let survivor = &mut self.layers[first];
        survivor.surface = merged;
        survivor.enabled = true;
        Ok(first)
    }

    /// Give the top active layer a new size. The new area is opaque white and
    /// the old content is copied in at the origin.
    pub fn resize_top_active(&mut self, width: u32, height: u32) -> Result<usize, EditorError> {
        if width == 0 || height == 0 || width > MAX_LAYER_DIM || height > MAX_LAYER_DIM {
            return Err(EditorError::InvalidResize { width, height, max: MAX_LAYER_DIM });
        }
        let idx = self.top_active_index().ok_or(EditorError::NoActiveLayer)?;
        let layer = &mut self.layers[idx];
        let mut resized = PixelSurface::new(width, height, Rgba([255, 255, 255, 255]))?;
        selection::insert(&layer.surface, &mut resized, 0, 0, true)?;
        layer.surface = resized;
        Ok(idx)
    }

    /// Replace the top active layer's pixels wholesale (import, generation,
    /// inpaint results).
    pub fn replace_top_active(&mut self, surface: PixelSurface) -> Result<usize, EditorError> {
        let idx = self.top_active_index().ok_or(EditorError::NoActiveLayer)?;
        self.layers[idx].surface = surface;
        Ok(idx)
    }
}

/// Scanning from the bottom, enabled layers may appear as one unbroken run
/// followed only by disabled layers. The run must hold two or more layers.
pub fn contiguous_active_run(enabled: &[bool]) -> bool {
    let mut run = 0usize;
    let mut run_ended = false;
    for &on in enabled {
        match (on, run > 0) {
            (true, _) if run_ended => return false,
            (true, _) => run += 1,
            (false, true) => run_ended = true,
            (false, false) => {}
        }
    }
    run >= 2
}
