//! Renderer configuration.
//!
//! Defaults describe the demo: an 800x600 window titled "Test Window",
//! shaders under `shaders/`, black clear colour and a slow rotation.
//! [`RendererConfig::from_env`] layers environment overrides on top.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

pub const ENV_VALIDATION: &str = "MINI_VK_VALIDATION";
pub const ENV_SHADER_DIR: &str = "MINI_VK_SHADER_DIR";
pub const ENV_WIDTH: &str = "MINI_VK_WIDTH";
pub const ENV_HEIGHT: &str = "MINI_VK_HEIGHT";

const DEFAULT_SHADER_DIR: &str = "shaders";
const VERTEX_SHADER_FILE: &str = "vert.spv";
const FRAGMENT_SHADER_FILE: &str = "frag.spv";

/// Everything the renderer and the demo application can be tuned with.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Enable `VK_LAYER_KHRONOS_validation` and the debug messenger.
    pub enable_validation: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// RGBA clear colour of the render pass.
    pub clear_color: [f32; 4],
    /// Model rotation in degrees per second.
    pub rotation_speed: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        let shader_dir = Path::new(DEFAULT_SHADER_DIR);
        Self {
            title: "Test Window".to_owned(),
            width: 800,
            height: 600,
            enable_validation: cfg!(debug_assertions),
            vertex_shader: shader_dir.join(VERTEX_SHADER_FILE),
            fragment_shader: shader_dir.join(FRAGMENT_SHADER_FILE),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            rotation_speed: 10.0,
        }
    }
}

impl RendererConfig {
    /// Defaults overridden by the `MINI_VK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a malformed value or an invalid result.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RendererConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a malformed value or an invalid result.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_VALIDATION) {
            config.enable_validation = parse_bool(ENV_VALIDATION, &value)?;
        }
        if let Some(dir) = lookup(ENV_SHADER_DIR) {
            config = config.with_shader_dir(dir);
        }
        if let Some(value) = lookup(ENV_WIDTH) {
            config.width = parse_u32(ENV_WIDTH, &value)?;
        }
        if let Some(value) = lookup(ENV_HEIGHT) {
            config.height = parse_u32(ENV_HEIGHT, &value)?;
        }

        config.validate()?;
        debug!("Renderer configuration: {:?}", config);
        Ok(config)
    }

    /// Points both shader paths into `dir`, keeping the file names.
    pub fn with_shader_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.vertex_shader = dir.join(VERTEX_SHADER_FILE);
        self.fragment_shader = dir.join(FRAGMENT_SHADER_FILE);
        self
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero dimension or an empty title.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.title.trim().is_empty() {
            return Err(Error::Config("window title must not be empty".to_owned()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(Error::Config(format!(
            "{key} expects 0/1/true/false, got '{other}'"
        ))),
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key} expects an unsigned integer, got '{value}': {e}")))
}
