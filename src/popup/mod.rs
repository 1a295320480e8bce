//! Popup stack management
//!
//! Maintains the chain of at most two popups hanging off the main window
//! (menu → submenu) and reacts to pointer button presses:
//!
//! | depth | press does                                                        |
//! |-------|-------------------------------------------------------------------|
//! | 0     | create the first popup, anchored to the main window               |
//! | 1     | create the second popup, anchored to the first                    |
//! | 2     | topmost holds a grab: pop and free it                             |
//! | 2     | otherwise, first popup without a second buffer: ping-pong repaint |
//! | 2     | otherwise: nothing                                                |
//!
//! Entry `i`'s parent is always the main window for `i == 0` and entry
//! `i - 1` otherwise, so every popup reaches the main window within
//! [`MAX_DEPTH`] hops.

use crate::config::{parse_color, GrabMode, PopupConfig, SurfaceConfig};
use crate::error::{PopstackError, Result};
use crate::protocol::{Positioner, Protocol};
use crate::shm::ShmAllocator;
use crate::window::{RepaintOutcome, Role, Window, WindowArena, WindowId, WindowState};
use log::{debug, info, warn};

/// Deepest popup chain allowed
pub const MAX_DEPTH: usize = 2;

/// Geometry and fill of one popup level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupLevel {
    pub width: i32,
    pub height: i32,
    pub color: u32,
}

impl PopupLevel {
    fn from_config(config: &SurfaceConfig) -> Result<Self> {
        let color = config
            .rgb()
            .map_err(|e| PopstackError::Config(format!("{:#}", e)))?;
        Ok(Self {
            width: config.width as i32,
            height: config.height as i32,
            color,
        })
    }
}

/// Why a press changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The would-be parent has not acknowledged its first configure
    ParentNotConfigured,
    /// The first popup has nothing committed yet to repaint
    FirstPopupNotMapped,
    /// Stack full, no grab to drop and the repaint already happened
    StackFull,
}

/// Effect of one button press on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Created { window: WindowId, depth: usize },
    Dismissed { window: WindowId, depth: usize },
    Repainted { window: WindowId, outcome: RepaintOutcome },
    Ignored(IgnoreReason),
}

#[derive(Debug)]
pub struct PopupStack {
    entries: Vec<WindowId>,
    levels: [PopupLevel; MAX_DEPTH],
    offset: (i32, i32),
    repaint_color: u32,
}

impl PopupStack {
    pub fn new(config: &PopupConfig) -> Result<Self> {
        let repaint_color = parse_color(&config.repaint_color)
            .map_err(|e| PopstackError::Config(format!("{:#}", e)))?;
        Ok(Self {
            entries: Vec::with_capacity(MAX_DEPTH),
            levels: [
                PopupLevel::from_config(&config.first)?,
                PopupLevel::from_config(&config.second)?,
            ],
            offset: (config.offset_x, config.offset_y),
            repaint_color,
        })
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[WindowId] {
        &self.entries
    }

    pub fn top(&self) -> Option<WindowId> {
        self.entries.last().copied()
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.entries.contains(&window)
    }

    /// Apply the press policy
    pub fn on_button_press(
        &mut self,
        serial: u32,
        main: WindowId,
        windows: &mut WindowArena,
        allocator: &ShmAllocator,
        grab_mode: GrabMode,
        proto: &mut impl Protocol,
    ) -> Result<PressOutcome> {
        match self.entries.len() {
            0 => self.push(serial, main, windows, grab_mode, proto),
            1 => {
                let parent = self.entries[0];
                self.push(serial, parent, windows, grab_mode, proto)
            }
            _ => self.on_full_stack(windows, allocator, proto),
        }
    }

    fn push(
        &mut self,
        serial: u32,
        parent: WindowId,
        windows: &mut WindowArena,
        grab_mode: GrabMode,
        proto: &mut impl Protocol,
    ) -> Result<PressOutcome> {
        match windows.get(parent) {
            Some(window) if window.is_configured() => {}
            Some(_) => {
                warn!("Parent {:?} not configured yet, ignoring press", parent);
                return Ok(PressOutcome::Ignored(IgnoreReason::ParentNotConfigured));
            }
            None => return Err(PopstackError::UnknownWindow(parent)),
        }

        let depth = self.entries.len();
        let level = self.levels[depth];
        let id = windows.insert(Role::Popup, level.width, level.height, level.color, Some(parent));
        info!(
            "Creating popup {:?} at depth {} ({}x{}) anchored to {:?}",
            id,
            depth + 1,
            level.width,
            level.height,
            parent
        );

        let positioner = Positioner::for_popup(level.width, level.height, self.offset.0, self.offset.1);
        let mapped = match windows.get_mut(id) {
            Some(window) => map_popup(window, &positioner, serial, grab_mode, proto),
            None => Err(PopstackError::UnknownWindow(id)),
        };
        if let Err(e) = mapped {
            windows.remove(id);
            return Err(e);
        }

        self.entries.push(id);
        Ok(PressOutcome::Created {
            window: id,
            depth: self.entries.len(),
        })
    }

    fn on_full_stack(
        &mut self,
        windows: &mut WindowArena,
        allocator: &ShmAllocator,
        proto: &mut impl Protocol,
    ) -> Result<PressOutcome> {
        let top = self.entries[MAX_DEPTH - 1];
        if windows.get(top).map_or(false, |w| w.has_grab()) {
            info!("Enough popups, destroying topmost popup {:?}", top);
            self.pop(windows, proto);
            return Ok(PressOutcome::Dismissed {
                window: top,
                depth: self.entries.len(),
            });
        }

        let first = self.entries[0];
        let window = windows.get_mut(first).ok_or(PopstackError::UnknownWindow(first))?;
        if window.has_buffer(1) {
            debug!("Popup stack full, press ignored");
            return Ok(PressOutcome::Ignored(IgnoreReason::StackFull));
        }
        if window.state() != WindowState::BufferAttached {
            return Ok(PressOutcome::Ignored(IgnoreReason::FirstPopupNotMapped));
        }

        info!("Repainting popup {:?} into a second buffer", first);
        let outcome = window.repaint(self.repaint_color, allocator, proto)?;
        Ok(PressOutcome::Repainted {
            window: first,
            outcome,
        })
    }

    /// Destroy the topmost popup and return its slot to the arena
    fn pop(&mut self, windows: &mut WindowArena, proto: &mut impl Protocol) {
        let Some(top) = self.entries.pop() else {
            return;
        };
        if let Some(mut window) = windows.remove(top) {
            window.release_role(proto);
            window.detach(proto);
            window.destroy(proto);
        }
    }

    /// Server dismissed a popup; its grab is over
    pub fn handle_popup_done(&mut self, window: WindowId, windows: &mut WindowArena) {
        if !self.contains(window) {
            debug!("popup_done for {:?}, which is not on the stack", window);
            return;
        }
        if let Some(popup) = windows.get_mut(window) {
            info!("Popup {:?} dismissed by server, grab released", window);
            popup.grab_ended();
        }
    }

    /// Check parentage of every entry against the stack order
    pub fn verify_chain(&self, main: WindowId, windows: &WindowArena) -> bool {
        self.entries.iter().enumerate().all(|(i, &id)| {
            let expected = if i == 0 { main } else { self.entries[i - 1] };
            let parent_ok = windows
                .get(id)
                .map_or(false, |w| w.role() == Role::Popup && w.parent() == Some(expected));
            parent_ok && hops_to_root(id, main, windows).map_or(false, |h| h <= MAX_DEPTH)
        })
    }
}

/// Surface, popup role, optional grab, then the initial commit
fn map_popup(
    window: &mut Window,
    positioner: &Positioner,
    serial: u32,
    grab_mode: GrabMode,
    proto: &mut impl Protocol,
) -> Result<()> {
    window.create_surface(proto)?;
    window.assign_popup(positioner, proto)?;
    if grab_mode.grabs() {
        window.request_grab(serial, proto);
    } else {
        debug!("Not using grab for popup {:?}", window.id());
    }
    window.commit_role(proto);
    Ok(())
}

/// Parent links followed from `window` until `main`, if it gets there
pub fn hops_to_root(window: WindowId, main: WindowId, windows: &WindowArena) -> Option<usize> {
    let mut current = window;
    for hops in 0..=MAX_DEPTH {
        if current == main {
            return Some(hops);
        }
        current = windows.get(current)?.parent()?;
    }
    None
}
