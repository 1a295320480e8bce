//! In-memory protocol backend
//!
//! Records every request instead of sending it, and can be told to refuse
//! object creation to exercise the fatal paths.

use super::{Positioner, Protocol};
use crate::error::PopstackError;
use crate::shm::ShmBuffer;
use crate::window::{BufferKey, WindowId};

/// One recorded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateSurface(WindowId),
    AssignToplevel(WindowId),
    AssignPopup {
        window: WindowId,
        parent: WindowId,
        positioner: Positioner,
    },
    Grab {
        window: WindowId,
        serial: u32,
    },
    DestroyRole(WindowId),
    AckConfigure {
        window: WindowId,
        serial: u32,
    },
    CreateBuffer {
        key: BufferKey,
        width: i32,
        height: i32,
        stride: i32,
        size: usize,
    },
    DestroyBuffer(BufferKey),
    Attach {
        window: WindowId,
        buffer: Option<BufferKey>,
    },
    Damage {
        window: WindowId,
        width: i32,
        height: i32,
    },
    Commit(WindowId),
    DestroySurface(WindowId),
    Pong(u32),
}

/// Which creation request should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Surface,
    Toplevel,
    Popup,
    Buffer,
}

#[derive(Debug, Default)]
pub struct RecordingProtocol {
    requests: Vec<Request>,
    fail_on: Option<FailOn>,
}

impl RecordingProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose `what` creation requests return no object
    pub fn failing(what: FailOn) -> Self {
        Self {
            requests: Vec::new(),
            fail_on: Some(what),
        }
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Drain the log, returning what was recorded since the last call
    pub fn take(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    pub fn count(&self, pred: impl Fn(&Request) -> bool) -> usize {
        self.requests.iter().filter(|r| pred(r)).count()
    }

    fn refuse(&self, what: FailOn, name: &'static str) -> Result<(), PopstackError> {
        if self.fail_on == Some(what) {
            Err(PopstackError::ProtocolObject { what: name })
        } else {
            Ok(())
        }
    }
}

impl Protocol for RecordingProtocol {
    fn create_surface(&mut self, window: WindowId) -> Result<(), PopstackError> {
        self.refuse(FailOn::Surface, "surface")?;
        self.requests.push(Request::CreateSurface(window));
        Ok(())
    }

    fn assign_toplevel(&mut self, window: WindowId) -> Result<(), PopstackError> {
        self.refuse(FailOn::Toplevel, "xdg toplevel")?;
        self.requests.push(Request::AssignToplevel(window));
        Ok(())
    }

    fn assign_popup(
        &mut self,
        window: WindowId,
        parent: WindowId,
        positioner: &Positioner,
    ) -> Result<(), PopstackError> {
        self.refuse(FailOn::Popup, "xdg popup")?;
        self.requests.push(Request::AssignPopup {
            window,
            parent,
            positioner: *positioner,
        });
        Ok(())
    }

    fn grab(&mut self, window: WindowId, serial: u32) {
        self.requests.push(Request::Grab { window, serial });
    }

    fn destroy_role(&mut self, window: WindowId) {
        self.requests.push(Request::DestroyRole(window));
    }

    fn ack_configure(&mut self, window: WindowId, serial: u32) {
        self.requests.push(Request::AckConfigure { window, serial });
    }

    fn create_buffer(&mut self, key: BufferKey, buffer: &ShmBuffer) -> Result<(), PopstackError> {
        self.refuse(FailOn::Buffer, "shm pool buffer")?;
        self.requests.push(Request::CreateBuffer {
            key,
            width: buffer.width(),
            height: buffer.height(),
            stride: buffer.stride(),
            size: buffer.size(),
        });
        Ok(())
    }

    fn destroy_buffer(&mut self, key: BufferKey) {
        self.requests.push(Request::DestroyBuffer(key));
    }

    fn attach(&mut self, window: WindowId, buffer: Option<BufferKey>) {
        self.requests.push(Request::Attach { window, buffer });
    }

    fn damage(&mut self, window: WindowId, _x: i32, _y: i32, width: i32, height: i32) {
        self.requests.push(Request::Damage {
            window,
            width,
            height,
        });
    }

    fn commit(&mut self, window: WindowId) {
        self.requests.push(Request::Commit(window));
    }

    fn destroy_surface(&mut self, window: WindowId) {
        self.requests.push(Request::DestroySurface(window));
    }

    fn pong(&mut self, serial: u32) {
        self.requests.push(Request::Pong(serial));
    }
}
