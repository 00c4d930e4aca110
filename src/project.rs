use std::path::{Path, PathBuf};

use image::Rgba;
use uuid::Uuid;

use crate::ai::{self, ImageGenerator, InpaintBackend};
use crate::canvas::{Layer, LayerStack};
use crate::compositor::{self, FlattenedImage};
use crate::draw::{self, StampPolicy};
use crate::error::EditorError;
use crate::history::HistoryManager;
use crate::io;
use crate::selection::{Pointer, Selection, SelectionOutcome};
use crate::settings::{EditorSettings, MAX_BRUSH_RADIUS, MIN_BRUSH_RADIUS};
use crate::surface::PixelSurface;

/// Size of the layer every new session starts with.
pub const INITIAL_LAYER_SIZE: u32 = 512;
/// Mask brush used while painting an inpaint region.
pub const INPAINT_MASK_RADIUS: u32 = 10;
pub const INPAINT_MASK_COLOR: Rgba<u8> = Rgba([100, 100, 0, 100]);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    Select,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Brush {
    pub radius: u32,
    pub color: Rgba<u8>,
    pub policy: StampPolicy,
}

/// Which surface a pointer drag is painting into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StrokeTarget {
    Layer(usize),
    Mask,
}

#[derive(Clone, Copy, Debug)]
struct StrokeState {
    target: StrokeTarget,
    last: (i32, i32),
}

/// One open document and everything the editor does to it.
///
/// Every mutating action either succeeds and pushes exactly one history
/// snapshot, or fails, records a warning, and leaves the layers untouched.
pub struct Project {
    pub id: Uuid,
    /// Display name (derived from path or "Untitled")
    pub name: String,
    /// `None` until saved or loaded.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,
    pub settings: EditorSettings,
    pub brush: Brush,
    pub tool: Tool,
    /// View scale used to convert selection drags into layer pixels.
    pub zoom: f32,

    layers: LayerStack,
    history: HistoryManager,
    selection: Selection,
    stroke: Option<StrokeState>,
    inpaint_mask: Option<PixelSurface>,
    warning: Option<String>,
}

impl Project {
    /// Fresh session: one opaque white 512x512 layer as the history root.
    pub fn new(settings: EditorSettings) -> Result<Self, EditorError> {
        let first = Layer::filled(INITIAL_LAYER_SIZE, INITIAL_LAYER_SIZE, Rgba([255, 255, 255, 255]))?;
        Ok(Self::from_layers(LayerStack::new(first), settings))
    }

    /// Session over an existing stack, which becomes the history root.
    pub fn from_layers(layers: LayerStack, settings: EditorSettings) -> Self {
        let mut history = HistoryManager::new(settings.max_history);
        history.snapshot(&layers);
        let brush = Brush {
            radius: settings.brush_radius.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS),
            color: settings.brush_color,
            policy: settings.stamp_policy,
        };
        Self {
            id: Uuid::new_v4(),
            name: "Untitled".to_string(),
            path: None,
            is_dirty: false,
            settings,
            brush,
            tool: Tool::default(),
            zoom: 1.0,
            layers,
            history,
            selection: Selection::new(),
            stroke: None,
            inpaint_mask: None,
            warning: None,
        }
    }

    /// Open a `.slop` file as a new session.
    pub fn open(path: &Path, settings: EditorSettings) -> Result<Self, EditorError> {
        let layers = io::load_slop(path)?;
        let mut project = Self::from_layers(layers, settings);
        project.path = Some(path.to_path_buf());
        project.update_name_from_path();
        Ok(project)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn inpaint_mask(&self) -> Option<&PixelSurface> {
        self.inpaint_mask.as_ref()
    }

    /// Last user-visible message, if any.
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn clear_warning(&mut self) {
        self.warning = None;
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Name with dirty indicator.
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn flatten(&self) -> Option<FlattenedImage> {
        compositor::flatten(self.layers.layers())
    }

    // ========================================================================
    // BRUSH
    // ========================================================================

    pub fn set_brush_radius(&mut self, radius: u32) {
        self.brush.radius = radius.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS);
    }

    pub fn set_brush_color(&mut self, color: Rgba<u8>) {
        self.brush.color = color;
    }

    pub fn set_stamp_policy(&mut self, policy: StampPolicy) {
        self.brush.policy = policy;
    }

    // ========================================================================
    // BOOKKEEPING
    // ========================================================================

    fn commit(&mut self, action: &str) {
        self.history.snapshot(&self.layers);
        self.mark_dirty();
        log_info!("{}: {} layer(s), {} history entries", action, self.layers.len(), self.history.len());
    }

    fn report<T>(&mut self, action: &str, result: Result<T, EditorError>) -> Result<T, EditorError> {
        if let Err(e) = &result {
            if e.is_user_facing() {
                log_warn!("{} refused: {}", action, e);
            } else {
                log_err!("{} failed: {}", action, e);
            }
            self.warning = Some(e.to_string());
        }
        result
    }

    /// Drop any lifted selection into its layer so structural actions see
    /// settled pixels. Produces the selection's history entry.
    fn settle_selection(&mut self) -> Result<(), EditorError> {
        if !self.selection.is_active() {
            return Ok(());
        }
        let lifted = self.selection.content().is_some();
        let layer = self.layers.top_active_mut().ok_or(EditorError::NoActiveLayer)?;
        self.selection.finalize(&mut layer.surface)?;
        if lifted {
            self.commit("finalize selection");
        }
        Ok(())
    }

    // ========================================================================
    // POINTER INPUT
    // ========================================================================

    /// Button pressed at `pointer`. Routed to the inpaint mask when a mask
    /// session is open, otherwise to the current tool.
    pub fn pointer_down(&mut self, pointer: Pointer) -> Result<(), EditorError> {
        let result = self.pointer_down_inner(pointer);
        self.report("pointer down", result)
    }

    fn pointer_down_inner(&mut self, pointer: Pointer) -> Result<(), EditorError> {
        let (x, y) = pointer.canvas;
        if let Some(mask) = self.inpaint_mask.as_mut() {
            if mask.contains(x, y) {
                draw::stamp(mask, x, y, INPAINT_MASK_RADIUS, INPAINT_MASK_COLOR, StampPolicy::Overwrite)?;
                self.stroke = Some(StrokeState { target: StrokeTarget::Mask, last: (x, y) });
            }
            return Ok(());
        }
        match self.tool {
            Tool::Brush => {
                self.settle_selection()?;
                let Some(idx) = self.layers.top_active_index() else { return Ok(()) };
                let brush = self.brush;
                let Some(layer) = self.layers.get_mut(idx) else { return Ok(()) };
                if layer.surface.contains(x, y) {
                    draw::stamp(&mut layer.surface, x, y, brush.radius, brush.color, brush.policy)?;
                    self.stroke = Some(StrokeState { target: StrokeTarget::Layer(idx), last: (x, y) });
                }
            }
            Tool::Select => {
                let zoom = self.zoom;
                let layer = self.layers.top_active_mut().ok_or(EditorError::NoActiveLayer)?;
                if self.selection.press(&mut layer.surface, pointer, zoom)? == SelectionOutcome::Finalized {
                    self.commit("finalize selection");
                }
            }
        }
        Ok(())
    }

    /// Pointer moved with the button held.
    pub fn pointer_move(&mut self, pointer: Pointer) -> Result<(), EditorError> {
        let result = self.pointer_move_inner(pointer);
        self.report("pointer move", result)
    }

    fn pointer_move_inner(&mut self, pointer: Pointer) -> Result<(), EditorError> {
        let (x, y) = pointer.canvas;
        if let Some(stroke) = self.stroke {
            let (radius, color, policy, surface) = match stroke.target {
                StrokeTarget::Mask => {
                    let Some(mask) = self.inpaint_mask.as_mut() else { return Ok(()) };
                    (INPAINT_MASK_RADIUS, INPAINT_MASK_COLOR, StampPolicy::Overwrite, mask)
                }
                StrokeTarget::Layer(idx) => {
                    let brush = self.brush;
                    let Some(layer) = self.layers.get_mut(idx) else { return Ok(()) };
                    (brush.radius, brush.color, brush.policy, &mut layer.surface)
                }
            };
            if !surface.contains(x, y) {
                return Ok(());
            }
            draw::stroke(surface, stroke.last, (x, y), radius, color, policy)?;
            draw::stamp(surface, x, y, radius, color, policy)?;
            self.stroke = Some(StrokeState { last: (x, y), ..stroke });
            return Ok(());
        }
        if self.tool == Tool::Select && self.inpaint_mask.is_none() {
            let zoom = self.zoom;
            let layer = self.layers.top_active().ok_or(EditorError::NoActiveLayer)?;
            self.selection.drag(&layer.surface, pointer, zoom)?;
        }
        Ok(())
    }

    /// Button released. A finished brush stroke is one history entry.
    pub fn pointer_up(&mut self) -> Result<(), EditorError> {
        let result = self.pointer_up_inner();
        self.report("pointer up", result)
    }

    fn pointer_up_inner(&mut self) -> Result<(), EditorError> {
        if let Some(stroke) = self.stroke.take() {
            if let StrokeTarget::Layer(_) = stroke.target {
                self.commit("stroke");
            }
            return Ok(());
        }
        if self.tool == Tool::Select && self.inpaint_mask.is_none() && self.selection.is_active() {
            let layer = self.layers.top_active_mut().ok_or(EditorError::NoActiveLayer)?;
            self.selection.release(&mut layer.surface)?;
        }
        Ok(())
    }

    /// Put a lifted selection back where it came from. Not a history event.
    pub fn cancel_selection(&mut self) -> Result<(), EditorError> {
        let result = match self.layers.top_active_mut() {
            Some(layer) => self.selection.cancel(&mut layer.surface).map_err(EditorError::from),
            None => {
                self.selection.reset();
                Ok(())
            }
        };
        self.report("cancel selection", result)
    }

    // ========================================================================
    // LAYER ACTIONS
    // ========================================================================

    /// Append a layer sized and filled per the settings.
    pub fn add_layer(&mut self) -> Result<usize, EditorError> {
        let result = self.settle_selection().and_then(|_| {
            let layer = Layer::filled(
                self.settings.new_layer_width,
                self.settings.new_layer_height,
                self.settings.new_layer_fill,
            )?;
            self.layers.push(layer);
            Ok(self.layers.len() - 1)
        });
        let idx = self.report("add layer", result)?;
        self.commit("add layer");
        Ok(idx)
    }

    /// Remove the top active layer. Refused for the last remaining layer.
    pub fn remove_layer(&mut self) -> Result<(), EditorError> {
        let result = self.settle_selection().and_then(|_| {
            let idx = self.layers.top_active_index().ok_or(EditorError::NoActiveLayer)?;
            self.layers.remove(idx).map(|_| ())
        });
        self.report("remove layer", result)?;
        self.commit("remove layer");
        Ok(())
    }

    pub fn set_layer_enabled(&mut self, index: usize, enabled: bool) -> Result<(), EditorError> {
        let result = self.settle_selection().and_then(|_| self.layers.set_enabled(index, enabled));
        self.report("toggle layer", result)?;
        self.commit("toggle layer");
        Ok(())
    }

    pub fn toggle_layer(&mut self, index: usize) -> Result<(), EditorError> {
        let enabled = self.layers.get(index).map(|l| l.enabled);
        match enabled {
            Some(on) => self.set_layer_enabled(index, !on),
            None => self.report("toggle layer", Err(EditorError::LayerIndex(index))),
        }
    }

    pub fn move_layer_up(&mut self, index: usize) -> Result<(), EditorError> {
        let result = self.settle_selection().and_then(|_| self.layers.move_up(index));
        self.report("move layer up", result)?;
        self.commit("move layer up");
        Ok(())
    }

    pub fn move_layer_down(&mut self, index: usize) -> Result<(), EditorError> {
        let result = self.settle_selection().and_then(|_| self.layers.move_down(index));
        self.report("move layer down", result)?;
        self.commit("move layer down");
        Ok(())
    }

    pub fn resize_layer(&mut self, width: u32, height: u32) -> Result<usize, EditorError> {
        let result = self.settle_selection().and_then(|_| self.layers.resize_top_active(width, height));
        let idx = self.report("resize layer", result)?;
        self.commit("resize layer");
        Ok(idx)
    }

    pub fn merge_active_layers(&mut self) -> Result<usize, EditorError> {
        let result = self.settle_selection().and_then(|_| self.layers.merge_active());
        let idx = self.report("merge layers", result)?;
        self.commit("merge layers");
        Ok(idx)
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Step back one action. A stroke still in progress or a lifted
    /// selection is abandoned instead, returning the layers to the last
    /// recorded state.
    pub fn undo(&mut self) {
        if let Some(stroke) = self.stroke.take() {
            if let StrokeTarget::Layer(_) = stroke.target {
                self.history.restore_current(&mut self.layers);
                log_info!("undo: unfinished stroke discarded");
            }
            return;
        }
        if self.selection.is_active() {
            self.selection.reset();
            self.history.restore_current(&mut self.layers);
            log_info!("undo: selection abandoned");
            return;
        }
        if self.history.undo(&mut self.layers) {
            self.mark_dirty();
            log_info!("undo: {} history entries left", self.history.len());
        }
    }

    // ========================================================================
    // FILES
    // ========================================================================

    /// Save to `path` as `.slop`. The session adopts the path.
    pub fn save(&mut self, path: &Path) -> Result<(), EditorError> {
        let result = self
            .settle_selection()
            .and_then(|_| io::save_slop(&self.layers, path).map_err(EditorError::from));
        self.report("save", result)?;
        self.path = Some(path.to_path_buf());
        self.update_name_from_path();
        self.mark_clean();
        log_info!("saved {}", path.display());
        Ok(())
    }

    /// Replace the whole session state with a `.slop` file. History restarts
    /// with the loaded stack as its only entry.
    pub fn load(&mut self, path: &Path) -> Result<(), EditorError> {
        let result = io::load_slop(path).map_err(EditorError::from);
        let layers = self.report("load", result)?;
        self.layers = layers;
        self.selection.reset();
        self.stroke = None;
        self.inpaint_mask = None;
        self.history.reset();
        self.history.snapshot(&self.layers);
        self.path = Some(path.to_path_buf());
        self.update_name_from_path();
        self.mark_clean();
        log_info!("loaded {} ({} layers)", path.display(), self.layers.len());
        Ok(())
    }

    /// Write the flattened image as PNG.
    pub fn export_png(&mut self, path: &Path) -> Result<(), EditorError> {
        let result = self
            .settle_selection()
            .and_then(|_| io::export_png(&self.layers, path).map_err(EditorError::from));
        self.report("export", result)?;
        log_info!("exported {}", path.display());
        Ok(())
    }

    /// Load a PNG/JPEG into the top active layer, replacing its pixels.
    pub fn import_image(&mut self, path: &Path) -> Result<(), EditorError> {
        let result = self.settle_selection().and_then(|_| {
            let surface = io::import_image(path)?;
            self.layers.replace_top_active(surface)
        });
        self.report("import", result)?;
        self.commit("import");
        Ok(())
    }

    // ========================================================================
    // GENERATION / INPAINT
    // ========================================================================

    /// Replace the top active layer with a generated image of the requested
    /// size. Needs `settings.model_path`.
    pub fn generate(
        &mut self,
        generator: &mut dyn ImageGenerator,
        prompt: &str,
        width: u32,
        height: u32,
    ) -> Result<(), EditorError> {
        let result = self.settle_selection().and_then(|_| {
            self.layers.top_active_index().ok_or(EditorError::NoActiveLayer)?;
            let surface = ai::run_generation(generator, prompt, width, height, &self.settings.model_path)?;
            self.layers.replace_top_active(surface)
        });
        self.report("generate", result)?;
        self.commit("generate");
        Ok(())
    }

    /// Start painting an inpaint mask over the top active layer.
    pub fn begin_inpaint(&mut self) -> Result<(), EditorError> {
        let result = self.settle_selection().and_then(|_| {
            let layer = self.layers.top_active().ok_or(EditorError::NoActiveLayer)?;
            Ok(PixelSurface::transparent(layer.width(), layer.height())?)
        });
        let mask = self.report("begin inpaint", result)?;
        self.stroke = None;
        self.inpaint_mask = Some(mask);
        Ok(())
    }

    pub fn cancel_inpaint(&mut self) {
        self.inpaint_mask = None;
        self.stroke = None;
    }

    /// Send the layer and mask to `backend` and put the result in the layer.
    /// The mask stays open if the request fails so it can be retried.
    pub fn commit_inpaint(&mut self, backend: &mut dyn InpaintBackend, prompt: &str) -> Result<(), EditorError> {
        let result = self.run_inpaint(backend, prompt);
        self.report("inpaint", result)?;
        self.inpaint_mask = None;
        self.stroke = None;
        self.commit("inpaint");
        Ok(())
    }

    fn run_inpaint(&mut self, backend: &mut dyn InpaintBackend, prompt: &str) -> Result<(), EditorError> {
        let mask = self.inpaint_mask.as_ref().ok_or(EditorError::NoInpaintMask)?;
        let layer = self.layers.top_active().ok_or(EditorError::NoActiveLayer)?;
        let flat = compositor::flatten(std::slice::from_ref(layer))
            .ok_or(EditorError::NoActiveLayer)?
            .into_surface()?;
        let request = ai::build_inpaint_request(&flat, mask, prompt)?;
        let surface = ai::run_inpaint(backend, &self.settings.inpaint_endpoint, &request)?;
        self.layers.replace_top_active(surface)?;
        Ok(())
    }
}
