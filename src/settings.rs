// ============================================================================
// EDITOR SETTINGS — persisted as a plain key=value file
// ============================================================================

use std::path::{Path, PathBuf};

use image::Rgba;

use crate::ai::DEFAULT_INPAINT_ENDPOINT;
use crate::draw::StampPolicy;
use crate::history::DEFAULT_MAX_HISTORY;

/// Brush radius bounds offered to the user.
pub const MIN_BRUSH_RADIUS: u32 = 1;
pub const MAX_BRUSH_RADIUS: u32 = 100;

#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Diffusion model used by "Generate". Empty means not configured.
    pub model_path: String,
    pub brush_radius: u32,
    pub brush_color: Rgba<u8>,
    pub stamp_policy: StampPolicy,
    pub max_history: usize,
    pub new_layer_width: u32,
    pub new_layer_height: u32,
    pub new_layer_fill: Rgba<u8>,
    pub inpaint_endpoint: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            brush_radius: 5,
            brush_color: Rgba([0, 0, 0, 255]),
            stamp_policy: StampPolicy::Overwrite,
            max_history: DEFAULT_MAX_HISTORY,
            new_layer_width: 512,
            new_layer_height: 512,
            new_layer_fill: Rgba([255, 255, 255, 255]),
            inpaint_endpoint: DEFAULT_INPAINT_ENDPOINT.to_string(),
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/slop/slop_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\slop\slop_settings.cfg
    /// On macOS:   ~/Library/Application Support/slop/slop_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("slop").join("slop_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("slop")
                    .join("slop_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = match std::env::var("XDG_CONFIG_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => PathBuf::from(std::env::var("HOME").ok()?).join(".config"),
            };
            Some(config_dir.join("slop").join("slop_settings.cfg"))
        }
    }

    /// Serialize a colour as "r,g,b,a"
    fn color_to_str(c: Rgba<u8>) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    /// Parse a colour from "r,g,b,a"
    fn str_to_color(s: &str) -> Option<Rgba<u8>> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some(Rgba([r, g, b, a]))
        } else {
            None
        }
    }

    /// Render as the on-disk text.
    pub fn to_config_string(&self) -> String {
        format!(
            "model_path={}\n\
             brush_radius={}\n\
             brush_color={}\n\
             stamp_policy={}\n\
             max_history={}\n\
             new_layer_width={}\n\
             new_layer_height={}\n\
             new_layer_fill={}\n\
             inpaint_endpoint={}\n",
            self.model_path,
            self.brush_radius,
            Self::color_to_str(self.brush_color),
            self.stamp_policy.name(),
            self.max_history,
            self.new_layer_width,
            self.new_layer_height,
            Self::color_to_str(self.new_layer_fill),
            self.inpaint_endpoint,
        )
    }

    /// Parse settings text. Unknown keys and bad values keep the default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "model_path" => s.model_path = val.to_string(),
                "brush_radius" => {
                    if let Ok(r) = val.parse::<u32>()
                        && (MIN_BRUSH_RADIUS..=MAX_BRUSH_RADIUS).contains(&r)
                    {
                        s.brush_radius = r;
                    }
                }
                "brush_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.brush_color = c;
                    }
                }
                "stamp_policy" => {
                    if let Some(p) = StampPolicy::from_name(val) {
                        s.stamp_policy = p;
                    }
                }
                "max_history" => {
                    if let Ok(n) = val.parse::<usize>()
                        && n > 0
                    {
                        s.max_history = n;
                    }
                }
                "new_layer_width" => {
                    if let Ok(w) = val.parse::<u32>()
                        && w > 0
                    {
                        s.new_layer_width = w;
                    }
                }
                "new_layer_height" => {
                    if let Ok(h) = val.parse::<u32>()
                        && h > 0
                    {
                        s.new_layer_height = h;
                    }
                }
                "new_layer_fill" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.new_layer_fill = c;
                    }
                }
                "inpaint_endpoint" => {
                    if !val.is_empty() {
                        s.inpaint_endpoint = val.to_string();
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Load settings from `path` (returns default if file missing or corrupt)
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Load from the per-user settings file.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        Self::load_from(&path)
    }

    /// Save to the per-user settings file.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::settings_path() else {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no settings directory"));
        };
        self.save_to(&path)
    }
}
