use image::codecs::png::PngEncoder;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::canvas::{Layer, LayerStack};
use crate::compositor;
use crate::error::CodecError;
use crate::surface::PixelSurface;

// ============================================================================
// SLOP LAYER FILE FORMAT
// ============================================================================
//
// All integers little-endian u32, laid out back to back:
//
//   magic, version, layer_count,
//   layer_count x { width, height, enabled (1 byte), width*height*4 RGBA8 }
//
// bincode's default options (fixed-width ints, little endian) produce exactly
// this layout for the header structs; pixel bytes are streamed raw.

/// First four bytes of every `.slop` file.
pub const SLOP_MAGIC: u32 = 12_312_412;
/// Only version written and accepted.
pub const SLOP_VERSION: u32 = 0;

/// Refuse layers larger than this per side when reading.
const MAX_CANVAS_DIM: u32 = 32_768;
/// Refuse files with more layers than this.
const MAX_LAYERS: u32 = 256;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
struct FileHeader {
    magic: u32,
    version: u32,
    layer_count: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
struct LayerHeader {
    width: u32,
    height: u32,
    enabled: u8,
}

/// Serialize the layer stack into `writer`.
pub fn encode<W: Write>(layers: &LayerStack, mut writer: W) -> Result<(), CodecError> {
    let header = FileHeader {
        magic: SLOP_MAGIC,
        version: SLOP_VERSION,
        layer_count: layers.len() as u32,
    };
    bincode::serialize_into(&mut writer, &header)?;
    for layer in layers.iter() {
        let lh = LayerHeader {
            width: layer.width(),
            height: layer.height(),
            enabled: layer.enabled as u8,
        };
        bincode::serialize_into(&mut writer, &lh)?;
        writer.write_all(layer.surface.as_raw())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a layer stack back. Nothing is returned unless the whole file is
/// valid.
pub fn decode<R: Read>(mut reader: R) -> Result<LayerStack, CodecError> {
    let header: FileHeader = bincode::deserialize_from(&mut reader)?;
    if header.magic != SLOP_MAGIC {
        return Err(CodecError::BadMagic { found: header.magic });
    }
    if header.version != SLOP_VERSION {
        return Err(CodecError::UnsupportedVersion(header.version));
    }
    if header.layer_count == 0 {
        return Err(CodecError::InvalidFormat("File contains no layers".into()));
    }
    if header.layer_count > MAX_LAYERS {
        return Err(CodecError::InvalidFormat(format!(
            "File contains {} layers, which exceeds the maximum of {}",
            header.layer_count, MAX_LAYERS
        )));
    }

    let mut layers = Vec::with_capacity(header.layer_count as usize);
    for index in 0..header.layer_count {
        let lh: LayerHeader = bincode::deserialize_from(&mut reader)?;
        if lh.width == 0 || lh.height == 0 {
            return Err(CodecError::InvalidFormat(format!(
                "Layer {} has zero dimensions ({}x{})",
                index, lh.width, lh.height
            )));
        }
        if lh.width > MAX_CANVAS_DIM || lh.height > MAX_CANVAS_DIM {
            return Err(CodecError::InvalidFormat(format!(
                "Layer {} size {}x{} exceeds maximum allowed {}x{}",
                index, lh.width, lh.height, MAX_CANVAS_DIM, MAX_CANVAS_DIM
            )));
        }
        // Grow with the data actually present instead of trusting the header.
        let len = lh.width as u64 * lh.height as u64 * 4;
        let mut pixels = Vec::new();
        (&mut reader).take(len).read_to_end(&mut pixels)?;
        if (pixels.len() as u64) < len {
            return Err(CodecError::InvalidFormat(format!(
                "Layer {} is truncated: {} of {} pixel bytes",
                index,
                pixels.len(),
                len
            )));
        }
        let surface = PixelSurface::from_raw(lh.width, lh.height, pixels)
            .map_err(|e| CodecError::InvalidFormat(format!("Layer {}: {}", index, e)))?;
        layers.push(Layer {
            enabled: lh.enabled != 0,
            surface,
        });
    }

    LayerStack::from_layers(layers).ok_or_else(|| CodecError::InvalidFormat("File contains no layers".into()))
}

/// Save the layer stack as a `.slop` file.
pub fn save_slop(layers: &LayerStack, path: &Path) -> Result<(), CodecError> {
    let file = File::create(path)?;
    encode(layers, BufWriter::new(file))
}

/// Load a `.slop` file.
pub fn load_slop(path: &Path) -> Result<LayerStack, CodecError> {
    let file = File::open(path)?;
    decode(BufReader::new(file))
}

// ============================================================================
// RASTER EXPORT / IMPORT
// ============================================================================

fn write_png<W: Write>(image: &RgbaImage, writer: W) -> Result<(), CodecError> {
    let encoder = PngEncoder::new(writer);
    #[allow(deprecated)]
    encoder.encode(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)?;
    Ok(())
}

/// Flatten the enabled layers and write them as an RGBA PNG.
pub fn export_png(layers: &LayerStack, path: &Path) -> Result<(), CodecError> {
    let flat = compositor::flatten(layers.layers())
        .ok_or_else(|| CodecError::InvalidFormat("No enabled layers to export".into()))?;
    let image = flat
        .into_rgba_image()
        .ok_or_else(|| CodecError::InvalidFormat("Flattened buffer has the wrong size".into()))?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_png(&image, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// PNG bytes for one surface, as handed to the inpaint service.
pub fn encode_png_bytes(surface: &PixelSurface) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    write_png(surface.as_image(), &mut out)?;
    Ok(out)
}

/// Open a PNG/JPEG file as an RGBA surface.
pub fn import_image(path: &Path) -> Result<PixelSurface, CodecError> {
    let image = image::open(path)?.to_rgba8();
    PixelSurface::from_rgba_image(image).map_err(|e| CodecError::InvalidFormat(e.to_string()))
}

/// Decode an in-memory encoded image (service responses).
pub fn decode_image_bytes(bytes: &[u8]) -> Result<PixelSurface, CodecError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    PixelSurface::from_rgba_image(image).map_err(|e| CodecError::InvalidFormat(e.to_string()))
}
