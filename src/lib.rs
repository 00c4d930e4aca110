//! Layered raster image editor core: pixel surfaces, drawing primitives,
//! the layer stack and its compositor, box selection, snapshot undo and the
//! `.slop` file codec.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod ai;
pub mod canvas;
pub mod cli;
pub mod compositor;
pub mod draw;
pub mod error;
pub mod history;
pub mod io;
pub mod project;
pub mod selection;
pub mod settings;
pub mod surface;

pub use canvas::{Layer, LayerStack};
pub use error::{CodecError, EditorError, SurfaceError};
pub use project::Project;
pub use surface::PixelSurface;
