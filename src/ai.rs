// ============================================================================
// GENERATION / INPAINT COLLABORATORS — traits at the service boundary
// ============================================================================
//
// The editor never talks to a model or a network itself. A front-end plugs in
// an `ImageGenerator` (local diffusion model) and an `InpaintBackend` (img2img
// web service); this module builds their inputs and normalizes their outputs.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::Serialize;

use crate::error::{CodecError, EditorError};
use crate::io;
use crate::surface::PixelSurface;

/// Default img2img endpoint of a locally running web UI.
pub const DEFAULT_INPAINT_ENDPOINT: &str = "http://127.0.0.1:7860/sdapi/v1/img2img";

/// Text-to-image model.
pub trait ImageGenerator {
    /// Produce an image for `prompt`. The size is a request, not a promise;
    /// the caller resizes whatever comes back.
    fn generate(&mut self, prompt: &str, width: u32, height: u32, model_path: &str) -> Result<RgbaImage, String>;
}

/// Mask-guided img2img service.
pub trait InpaintBackend {
    /// Send the request and return the encoded result image.
    fn inpaint(&mut self, endpoint: &str, request: &InpaintRequest) -> Result<Vec<u8>, String>;
}

/// Sampler parameters sent alongside the images.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InpaintParams {
    pub seed: i64,
    pub steps: u32,
    pub resize_mode: u32,
    pub inpainting_fill: u32,
    pub inpainting_mask_invert: u32,
    pub mask_blur: u32,
    pub denoising_strength: f32,
    pub cfg_scale: f32,
    pub n_iter: u32,
    pub batch_size: u32,
    pub include_init_images: bool,
    pub inpaint_full_res: bool,
}

impl Default for InpaintParams {
    fn default() -> Self {
        Self {
            seed: 1,
            steps: 20,
            resize_mode: 1,
            inpainting_fill: 0,
            inpainting_mask_invert: 0,
            mask_blur: 4,
            denoising_strength: 0.75,
            cfg_scale: 7.0,
            n_iter: 1,
            batch_size: 1,
            include_init_images: true,
            inpaint_full_res: false,
        }
    }
}

/// Everything the inpaint service needs. Both images are PNG-encoded.
#[derive(Clone, Debug)]
pub struct InpaintRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub init_png: Vec<u8>,
    pub mask_png: Vec<u8>,
    pub params: InpaintParams,
}

/// Black/white opaque mask: any pixel with a non-zero colour channel becomes
/// white, everything else black. Alpha is ignored.
pub fn build_mask_image(mask: &PixelSurface) -> Result<PixelSurface, CodecError> {
    let raw: Vec<u8> = mask
        .as_raw()
        .chunks_exact(4)
        .flat_map(|p| {
            let v = if p[0] > 0 || p[1] > 0 || p[2] > 0 { 255 } else { 0 };
            [v, v, v, 255]
        })
        .collect();
    PixelSurface::from_raw(mask.width(), mask.height(), raw).map_err(|e| CodecError::InvalidFormat(e.to_string()))
}

/// Encode the layer and its mask for the service.
pub fn build_inpaint_request(layer: &PixelSurface, mask: &PixelSurface, prompt: &str) -> Result<InpaintRequest, CodecError> {
    if layer.dimensions() != mask.dimensions() {
        return Err(CodecError::InvalidFormat(format!(
            "Mask is {}x{} but the layer is {}x{}",
            mask.width(),
            mask.height(),
            layer.width(),
            layer.height()
        )));
    }
    Ok(InpaintRequest {
        prompt: prompt.to_string(),
        width: layer.width(),
        height: layer.height(),
        init_png: io::encode_png_bytes(layer)?,
        mask_png: io::encode_png_bytes(&build_mask_image(mask)?)?,
        params: InpaintParams::default(),
    })
}

/// Resize `image` to exactly `width x height` unless it already is.
pub fn fit_to_request(image: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image;
    }
    imageops::resize(&image, width, height, FilterType::Triangle)
}

/// Run the generator and shape its result into a surface of the requested
/// size. An empty model path is refused before the generator is called.
pub fn run_generation(
    generator: &mut dyn ImageGenerator,
    prompt: &str,
    width: u32,
    height: u32,
    model_path: &str,
) -> Result<PixelSurface, EditorError> {
    if model_path.trim().is_empty() {
        return Err(EditorError::ModelPathNotSet);
    }
    let image = generator
        .generate(prompt, width, height, model_path)
        .map_err(EditorError::Generation)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(EditorError::Generation("generator returned an empty image".into()));
    }
    Ok(PixelSurface::from_rgba_image(fit_to_request(image, width, height))?)
}

/// Run the inpaint backend and decode its response.
pub fn run_inpaint(
    backend: &mut dyn InpaintBackend,
    endpoint: &str,
    request: &InpaintRequest,
) -> Result<PixelSurface, EditorError> {
    let bytes = backend.inpaint(endpoint, request).map_err(EditorError::Inpaint)?;
    io::decode_image_bytes(&bytes).map_err(|e| EditorError::Inpaint(e.to_string()))
}
