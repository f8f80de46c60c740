//! Core utilities shared by the mini-vk crates:
//! - Error types and result aliases
//! - Logging initialization
//! - Renderer configuration
//! - Frame timer

mod config;
mod error;
mod logging;
mod timer;

pub use config::{ENV_HEIGHT, ENV_SHADER_DIR, ENV_VALIDATION, ENV_WIDTH, RendererConfig};
pub use error::{Error, Result};
pub use logging::{DEFAULT_LOG_FILTER, init_logging};
pub use timer::Timer;
