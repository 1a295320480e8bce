//! # Popstack
//!
//! A Wayland client that maps a toplevel window backed by shared memory and
//! stacks up to two nested xdg popups on it in response to pointer presses,
//! optionally holding an exclusive pointer grab on each popup.
//!
//! ## Architecture
//!
//! - `config`: Configuration parsing and grab mode
//! - `error`: Error taxonomy and exit codes
//! - `shm`: Shared-memory buffer allocation
//! - `protocol`: Outgoing request seam and a recording backend
//! - `window`: Window arena and surface lifecycle
//! - `popup`: Popup stack and the button-press policy
//! - `input`: Pointer event routing and seat capability tracking
//! - `app`: Application state and typed event handlers
//! - `wayland`: wayland-client backend and the display event loop
//!
//! ## Usage
//!
//! ```rust,no_run
//! use popstack::{App, Client, GrabMode, PopstackConfig, ShmAllocator};
//!
//! fn main() -> popstack::Result<()> {
//!     let config = PopstackConfig::default();
//!     let app = App::new(&config, GrabMode::WithGrab, ShmAllocator::from_env()?)?;
//!     Client::connect(app)?.run()
//! }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod input;
pub mod popup;
pub mod protocol;
pub mod shm;
pub mod wayland;
pub mod window;

// Re-export main types for easy access
pub use app::App;
pub use config::{GrabMode, PopstackConfig};
pub use error::{PopstackError, Result};
pub use popup::{PopupStack, PressOutcome};
pub use protocol::Protocol;
pub use shm::{ShmAllocator, ShmBuffer};
pub use wayland::Client;
pub use window::{WindowArena, WindowId};

/// Version information for popstack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
