//! Outgoing protocol requests
//!
//! The window, popup and input modules never touch wire objects. Every
//! request they make goes through [`Protocol`], keyed by the arena
//! [`WindowId`] of the window it concerns. The Wayland backend maps those
//! ids onto live proxies; [`recording::RecordingProtocol`] keeps a log of
//! requests so the state machines can be driven without a server.
//!
//! # Request order
//!
//! For one window the client issues, in order:
//! 1. `create_surface`
//! 2. `assign_toplevel` or `assign_popup` (+ optional `grab`)
//! 3. `commit` (no buffer; asks the server for the first configure)
//! 4. `ack_configure(serial)` for every configure received
//! 5. `create_buffer`, `attach`, `damage`, `commit` on first configure

pub mod recording;

use crate::error::PopstackError;
use crate::shm::ShmBuffer;
use crate::window::{BufferKey, WindowId};

/// Placement request for a popup relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Positioner {
    /// Size of the popup surface
    pub width: i32,
    pub height: i32,
    /// Anchor rectangle in parent surface coordinates
    pub anchor_x: i32,
    pub anchor_y: i32,
    pub anchor_width: i32,
    pub anchor_height: i32,
}

impl Positioner {
    /// Anchor rectangle at `(offset_x, offset_y)` matching the popup's own size
    pub fn for_popup(width: i32, height: i32, offset_x: i32, offset_y: i32) -> Self {
        Self {
            width,
            height,
            anchor_x: offset_x,
            anchor_y: offset_y,
            anchor_width: width,
            anchor_height: height,
        }
    }
}

/// Requests the core issues to the display server
#[cfg_attr(test, mockall::automock)]
pub trait Protocol {
    /// Create the window's surface
    fn create_surface(&mut self, window: WindowId) -> Result<(), PopstackError>;

    /// Give the surface the toplevel role
    fn assign_toplevel(&mut self, window: WindowId) -> Result<(), PopstackError>;

    /// Give the surface the popup role, placed against `parent`
    fn assign_popup(
        &mut self,
        window: WindowId,
        parent: WindowId,
        positioner: &Positioner,
    ) -> Result<(), PopstackError>;

    /// Ask for an exclusive pointer grab on a popup
    fn grab(&mut self, window: WindowId, serial: u32);

    /// Destroy the role objects (popup/toplevel and shell surface)
    fn destroy_role(&mut self, window: WindowId);

    fn ack_configure(&mut self, window: WindowId, serial: u32);

    /// Register `buffer` with the server (pool, buffer at offset 0, pool destroyed)
    fn create_buffer(&mut self, key: BufferKey, buffer: &ShmBuffer) -> Result<(), PopstackError>;

    fn destroy_buffer(&mut self, key: BufferKey);

    /// Attach a buffer, or detach with `None`
    fn attach(&mut self, window: WindowId, buffer: Option<BufferKey>);

    fn damage(&mut self, window: WindowId, x: i32, y: i32, width: i32, height: i32);

    fn commit(&mut self, window: WindowId);

    fn destroy_surface(&mut self, window: WindowId);

    /// Answer a shell liveness ping
    fn pong(&mut self, serial: u32);
}
