//! Window entities and their surface lifecycle
//!
//! A [`Window`] owns one surface, its role (toplevel or popup) and up to two
//! shared-memory buffers. Windows live in a [`WindowArena`]; a
//! [`WindowId`] carries a generation so an id held after its window was
//! destroyed resolves to nothing instead of to the slot's next occupant.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──role──► RoleAssigned ──commit──► AwaitingConfigure
//!                                                   │ configure(serial), ack(serial)
//!                                                   ▼
//!                 BufferAttached ◄──first paint── Configured
//!                    │    ▲
//!                    └────┘ repaint: back buffer, attach, damage, commit
//! ```
//!
//! A buffer attached and committed is owned by the server until it sends
//! `release`. Repaints only ever write into a buffer that is not busy; when
//! both slots are busy the repaint waits for the next release.

use crate::error::{PopstackError, Result};
use crate::protocol::{Positioner, Protocol};
use crate::shm::{ShmAllocator, ShmBuffer};
use log::{debug, warn};

/// Most buffers a window holds at once (front + back)
pub const MAX_BUFFERS: usize = 2;

/// Weak handle to a window in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId {
    index: u32,
    generation: u32,
}

impl WindowId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// One buffer slot of one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferKey {
    pub window: WindowId,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Toplevel,
    Popup,
}

/// Surface lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WindowState {
    /// Surface exists, no role yet
    Created,
    /// Toplevel or popup role requested
    RoleAssigned,
    /// Initial commit sent, waiting for the first configure
    AwaitingConfigure,
    /// First configure acknowledged
    Configured,
    /// First paint committed
    BufferAttached,
}

/// What a repaint request turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepaintOutcome {
    /// Painted into `slot`, attached and committed
    Committed { slot: usize },
    /// Back buffer still held by the server; replayed on its release
    Deferred,
}

#[derive(Debug)]
struct BufferSlot {
    shm: ShmBuffer,
    /// Attached and committed, not yet released by the server
    busy: bool,
}

#[derive(Debug)]
pub struct Window {
    id: WindowId,
    role: Role,
    state: WindowState,
    width: i32,
    height: i32,
    color: u32,
    parent: Option<WindowId>,
    buffers: [Option<BufferSlot>; MAX_BUFFERS],
    /// Slot currently attached to the surface
    front: Option<usize>,
    pending_serial: Option<u32>,
    last_acked_serial: Option<u32>,
    /// Role objects still exist server-side
    role_alive: bool,
    grabbed: bool,
    pending_repaint: bool,
    suggested_size: Option<(i32, i32)>,
}

impl Window {
    fn new(id: WindowId, role: Role, width: i32, height: i32, color: u32, parent: Option<WindowId>) -> Self {
        Self {
            id,
            role,
            state: WindowState::Created,
            width,
            height,
            color,
            parent,
            buffers: [None, None],
            front: None,
            pending_serial: None,
            last_acked_serial: None,
            role_alive: false,
            grabbed: false,
            pending_repaint: false,
            suggested_size: None,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn parent(&self) -> Option<WindowId> {
        self.parent
    }

    pub fn is_configured(&self) -> bool {
        self.state >= WindowState::Configured
    }

    pub fn has_grab(&self) -> bool {
        self.grabbed
    }

    pub fn role_alive(&self) -> bool {
        self.role_alive
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    pub fn has_buffer(&self, slot: usize) -> bool {
        self.buffers.get(slot).map_or(false, Option::is_some)
    }

    pub fn front_slot(&self) -> Option<usize> {
        self.front
    }

    pub fn is_busy(&self, slot: usize) -> bool {
        matches!(self.buffers.get(slot), Some(Some(b)) if b.busy)
    }

    pub fn repaint_pending(&self) -> bool {
        self.pending_repaint
    }

    pub fn last_acked_serial(&self) -> Option<u32> {
        self.last_acked_serial
    }

    pub fn suggested_size(&self) -> Option<(i32, i32)> {
        self.suggested_size
    }

    /// Pixels of the buffer currently attached
    pub fn front_pixels(&self) -> Option<&[u32]> {
        let slot = self.front?;
        self.buffers[slot].as_ref().map(|b| b.shm.pixels())
    }

    pub fn pixels(&self, slot: usize) -> Option<&[u32]> {
        self.buffers.get(slot)?.as_ref().map(|b| b.shm.pixels())
    }

    fn transition(&mut self, new_state: WindowState) {
        if self.state != new_state {
            debug!("Window {:?} state transition: {:?} -> {:?}", self.id, self.state, new_state);
            self.state = new_state;
        }
    }

    /// Issue the create-surface request
    pub fn create_surface(&mut self, proto: &mut impl Protocol) -> Result<()> {
        proto.create_surface(self.id)?;
        debug!("Created surface for {:?} window {:?}", self.role, self.id);
        Ok(())
    }

    pub fn assign_toplevel(&mut self, proto: &mut impl Protocol) -> Result<()> {
        proto.assign_toplevel(self.id)?;
        self.role_alive = true;
        self.transition(WindowState::RoleAssigned);
        Ok(())
    }

    /// Request the popup role; the caller has checked `parent` is configured
    pub fn assign_popup(&mut self, positioner: &Positioner, proto: &mut impl Protocol) -> Result<()> {
        let parent = self.parent.ok_or(PopstackError::ProtocolObject {
            what: "popup without parent",
        })?;
        proto.assign_popup(self.id, parent, positioner)?;
        self.role_alive = true;
        self.transition(WindowState::RoleAssigned);
        Ok(())
    }

    /// Ask for an exclusive grab; fire-and-forget
    pub fn request_grab(&mut self, serial: u32, proto: &mut impl Protocol) {
        if self.role != Role::Popup || !self.role_alive {
            warn!("Ignoring grab request on {:?} window {:?}", self.role, self.id);
            return;
        }
        proto.grab(self.id, serial);
        self.grabbed = true;
        debug!("Requested grab on popup {:?} with serial {}", self.id, serial);
    }

    /// The server ended the grab (popup dismissed)
    pub fn grab_ended(&mut self) {
        self.grabbed = false;
    }

    /// Initial bufferless commit; the server answers with a configure
    pub fn commit_role(&mut self, proto: &mut impl Protocol) {
        proto.commit(self.id);
        self.transition(WindowState::AwaitingConfigure);
    }

    /// Inbound configure: acknowledge `serial`, then paint if nothing is shown yet
    pub fn handle_configure(
        &mut self,
        serial: u32,
        allocator: &ShmAllocator,
        proto: &mut impl Protocol,
    ) -> Result<()> {
        self.pending_serial = Some(serial);
        self.ack_configure(serial, proto)?;

        if self.state == WindowState::AwaitingConfigure {
            self.transition(WindowState::Configured);
        }

        if self.buffer_count() == 0 && self.role_alive {
            self.show(allocator, proto)?;
        }
        Ok(())
    }

    /// Acknowledge the pending configure; any other serial is a violation
    pub fn ack_configure(&mut self, serial: u32, proto: &mut impl Protocol) -> Result<()> {
        if self.pending_serial != Some(serial) {
            return Err(PopstackError::ConfigureSerial {
                window: self.id,
                expected: self.pending_serial,
                got: serial,
            });
        }
        proto.ack_configure(self.id, serial);
        self.pending_serial = None;
        self.last_acked_serial = Some(serial);
        debug!("Window {:?} acknowledged configure serial {}", self.id, serial);
        Ok(())
    }

    /// Toplevel configure payload; kept for diagnostics only
    pub fn set_suggested_size(&mut self, width: i32, height: i32) {
        self.suggested_size = Some((width, height));
    }

    fn allocate_slot(&mut self, slot: usize, allocator: &ShmAllocator, proto: &mut impl Protocol) -> Result<()> {
        let shm = allocator.allocate(self.width, self.height)?;
        proto.create_buffer(BufferKey { window: self.id, slot }, &shm)?;
        self.buffers[slot] = Some(BufferSlot { shm, busy: false });
        Ok(())
    }

    /// First paint: buffer 0, flat fill, attach, full damage, commit
    fn show(&mut self, allocator: &ShmAllocator, proto: &mut impl Protocol) -> Result<()> {
        self.allocate_slot(0, allocator, proto)?;
        self.paint_and_commit(0, proto);
        self.transition(WindowState::BufferAttached);
        Ok(())
    }

    fn paint_and_commit(&mut self, slot: usize, proto: &mut impl Protocol) {
        let Some(buffer) = self.buffers[slot].as_mut() else {
            return;
        };
        buffer.shm.fill(self.color);
        buffer.busy = true;
        proto.attach(self.id, Some(BufferKey { window: self.id, slot }));
        proto.damage(self.id, 0, 0, self.width, self.height);
        proto.commit(self.id);
        self.front = Some(slot);
        debug!("Window {:?} committed buffer slot {}", self.id, slot);
    }

    /// Ping-pong repaint with `color` into the slot that is not attached
    pub fn repaint(
        &mut self,
        color: u32,
        allocator: &ShmAllocator,
        proto: &mut impl Protocol,
    ) -> Result<RepaintOutcome> {
        if self.state != WindowState::BufferAttached {
            return Err(PopstackError::NotMapped(self.id));
        }
        self.color = color;

        let back = match self.front {
            Some(front) => (front + 1) % MAX_BUFFERS,
            None => 0,
        };
        if self.buffers[back].is_none() {
            self.allocate_slot(back, allocator, proto)?;
        }
        if self.is_busy(back) {
            debug!("Window {:?} back buffer {} still held by server, deferring repaint", self.id, back);
            self.pending_repaint = true;
            return Ok(RepaintOutcome::Deferred);
        }

        self.pending_repaint = false;
        self.paint_and_commit(back, proto);
        Ok(RepaintOutcome::Committed { slot: back })
    }

    /// Server released a buffer; replay a deferred repaint if it was waiting on it
    pub fn buffer_released(&mut self, slot: usize, allocator: &ShmAllocator, proto: &mut impl Protocol) -> Result<()> {
        match self.buffers.get_mut(slot) {
            Some(Some(buffer)) => buffer.busy = false,
            _ => {
                warn!("Release for unknown buffer slot {} of window {:?}", slot, self.id);
                return Ok(());
            }
        }
        debug!("Window {:?} buffer slot {} released", self.id, slot);

        if self.pending_repaint && Some(slot) != self.front {
            self.repaint(self.color, allocator, proto)?;
        }
        Ok(())
    }

    /// Destroy role objects and any grab they carried
    pub fn release_role(&mut self, proto: &mut impl Protocol) {
        if self.role_alive {
            proto.destroy_role(self.id);
            self.role_alive = false;
            self.grabbed = false;
        }
    }

    /// Attach nothing and commit, removing the visible content
    pub fn detach(&mut self, proto: &mut impl Protocol) {
        proto.attach(self.id, None);
        proto.commit(self.id);
        self.front = None;
        self.pending_repaint = false;
        if self.state == WindowState::BufferAttached {
            self.transition(WindowState::Configured);
        }
    }

    /// Tear down every server-side object this window owns
    pub fn destroy(mut self, proto: &mut impl Protocol) {
        self.release_role(proto);
        for slot in 0..MAX_BUFFERS {
            if self.buffers[slot].take().is_some() {
                proto.destroy_buffer(BufferKey { window: self.id, slot });
            }
        }
        proto.destroy_surface(self.id);
        debug!("Destroyed window {:?}", self.id);
    }
}

#[derive(Debug, Default)]
struct ArenaEntry {
    generation: u32,
    window: Option<Window>,
}

/// Slot storage for windows; destroyed windows give their slot back
#[derive(Debug, Default)]
pub struct WindowArena {
    entries: Vec<ArenaEntry>,
    free: Vec<u32>,
}

impl WindowArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a window in a free slot
    pub fn insert(&mut self, role: Role, width: i32, height: i32, color: u32, parent: Option<WindowId>) -> WindowId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.entries.push(ArenaEntry::default());
                (self.entries.len() - 1) as u32
            }
        };
        let entry = &mut self.entries[index as usize];
        let id = WindowId {
            index,
            generation: entry.generation,
        };
        entry.window = Some(Window::new(id, role, width, height, color, parent));
        id
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.entries
            .get(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.window.as_ref())
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.window.as_mut())
    }

    /// Take a window out, retiring its id
    pub fn remove(&mut self, id: WindowId) -> Option<Window> {
        let entry = self.entries.get_mut(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let window = entry.window.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(window)
    }

    /// Live windows
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.window.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
