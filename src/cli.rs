// ============================================================================
// slop CLI — headless layer-file tools
// ============================================================================
//
// Usage examples:
//   slop new canvas.slop --width 800 --height 600
//   slop new noise.slop --random
//   slop info canvas.slop
//   slop export canvas.slop flat.png
//   slop import photo.jpg photo.slop
//   slop merge canvas.slop --output merged.slop
//
// Everything runs synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use image::Rgba;

use crate::canvas::{Layer, LayerStack};
use crate::error::EditorError;
use crate::io;
use crate::surface::PixelSurface;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Layered raster editor, headless tools for `.slop` files.
#[derive(Parser, Debug)]
#[command(name = "slop", version, about = "Headless tools for layered .slop images")]
pub struct CliArgs {
    /// Print per-command timing information.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a one-layer file.
    New {
        output: PathBuf,
        #[arg(long, default_value_t = 512)]
        width: u32,
        #[arg(long, default_value_t = 512)]
        height: u32,
        /// Fill colour as r,g,b,a.
        #[arg(long, default_value = "255,255,255,255", value_parser = parse_rgba)]
        fill: Rgba<u8>,
        /// Fill with noise instead of a solid colour.
        #[arg(long)]
        random: bool,
    },
    /// List the layers of a file.
    Info { input: PathBuf },
    /// Flatten the enabled layers to PNG.
    Export { input: PathBuf, output: PathBuf },
    /// Turn a PNG/JPEG into a one-layer file.
    Import { input: PathBuf, output: PathBuf },
    /// Merge the contiguous run of enabled layers and save.
    Merge {
        input: PathBuf,
        /// Defaults to overwriting the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Parse "r,g,b,a" into a colour.
fn parse_rgba(s: &str) -> Result<Rgba<u8>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected r,g,b,a, got '{s}'"));
    }
    let mut out = [0u8; 4];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part.parse::<u8>().map_err(|e| format!("'{part}': {e}"))?;
    }
    Ok(Rgba(out))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one command and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let started = Instant::now();
    let result = execute(&args.command);
    if args.verbose {
        eprintln!("done in {:.1} ms", started.elapsed().as_secs_f64() * 1000.0);
    }
    match result {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_err!("cli: {}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Carry out `command`, returning the lines to print on success.
pub fn execute(command: &Command) -> Result<Vec<String>, EditorError> {
    match command {
        Command::New { output, width, height, fill, random } => {
            let surface = if *random {
                PixelSurface::random(*width, *height)?
            } else {
                PixelSurface::new(*width, *height, *fill)?
            };
            io::save_slop(&LayerStack::new(Layer::new(surface)), output)?;
            Ok(vec![format!("wrote {} ({}x{})", output.display(), width, height)])
        }
        Command::Info { input } => {
            let layers = io::load_slop(input)?;
            Ok(describe(input, &layers))
        }
        Command::Export { input, output } => {
            let layers = io::load_slop(input)?;
            io::export_png(&layers, output)?;
            Ok(vec![format!("exported {} -> {}", input.display(), output.display())])
        }
        Command::Import { input, output } => {
            let surface = io::import_image(input)?;
            let (w, h) = surface.dimensions();
            io::save_slop(&LayerStack::new(Layer::new(surface)), output)?;
            Ok(vec![format!("imported {} ({}x{}) -> {}", input.display(), w, h, output.display())])
        }
        Command::Merge { input, output } => {
            let mut layers = io::load_slop(input)?;
            let idx = layers.merge_active()?;
            let target = output.as_deref().unwrap_or(input.as_path());
            io::save_slop(&layers, target)?;
            Ok(vec![format!(
                "merged into layer {} ({} layers left) -> {}",
                idx,
                layers.len(),
                target.display()
            )])
        }
    }
}

fn describe(path: &Path, layers: &LayerStack) -> Vec<String> {
    let mut lines = vec![format!("{}: {} layer(s)", path.display(), layers.len())];
    for (i, layer) in layers.iter().enumerate() {
        let marker = if Some(i) == layers.top_active_index() { " (top active)" } else { "" };
        lines.push(format!(
            "  [{}] {}x{} {}{}",
            i,
            layer.width(),
            layer.height(),
            if layer.enabled { "enabled" } else { "disabled" },
            marker
        ));
    }
    lines
}
