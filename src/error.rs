//! Error taxonomy for the popstack client
//!
//! Every failure in this client is terminal. There is no retry policy: a
//! missing global, a failed allocation or a protocol violation all end the
//! process with a single diagnostic line and exit status 1.

use crate::window::WindowId;
use std::io;
use thiserror::Error;

/// Exit status for a clean shutdown (peer closed the connection)
pub const EXIT_OK: i32 = 0;

/// Exit status for every setup, allocation or usage failure
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Error)]
pub enum PopstackError {
    /// Bad or missing command line flag
    #[error("usage: {0}")]
    Usage(String),

    /// Could not reach the display server
    #[error("can't connect to display: {0}")]
    Connection(String),

    /// A required global never showed up during discovery
    #[error("required global `{interface}` not advertised by the server")]
    Capability { interface: &'static str },

    /// `XDG_RUNTIME_DIR` is not set
    #[error("XDG_RUNTIME_DIR is not set; no directory for shared-memory buffers")]
    MissingRuntimeDir,

    /// Requested buffer geometry can't be expressed on the wire
    #[error("invalid buffer dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    /// Backing file creation, truncation or mapping failed
    #[error("creating a buffer file for {size} B failed ({what}): {source}")]
    ResourceAllocation {
        what: &'static str,
        size: usize,
        #[source]
        source: io::Error,
    },

    /// A creation request produced no usable object
    #[error("can't create {what}")]
    ProtocolObject { what: &'static str },

    /// Acknowledging anything but the pending configure serial
    #[error("window {window:?} acked configure serial {got}, pending serial is {expected:?}")]
    ConfigureSerial {
        window: WindowId,
        expected: Option<u32>,
        got: u32,
    },

    /// Repaint requested before the first buffer was committed
    #[error("window {0:?} has no committed buffer to repaint")]
    NotMapped(WindowId),

    /// A handler referenced a window that is no longer in the arena
    #[error("unknown window {0:?}")]
    UnknownWindow(WindowId),

    /// The server raised a protocol error on the connection
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// Configuration contents rejected by validation
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PopstackError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }
}

pub type Result<T, E = PopstackError> = std::result::Result<T, E>;
