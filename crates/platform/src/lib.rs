//! Surface providers for the renderer.
//!
//! - [`Window`]: a winit window, surfaces created through `ash-window`
//! - [`HeadlessSurface`]: `VK_EXT_headless_surface`, no window system needed

mod headless;
mod window;

pub use headless::HeadlessSurface;
pub use window::Window;

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
