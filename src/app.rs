//! Application state
//!
//! [`App`] is the single aggregate every event handler works on: the window
//! arena, the main window, the popup stack and the input router. Handlers
//! take a typed payload and the outgoing [`Protocol`], so they can be driven
//! by the Wayland backend or directly from tests.

use crate::config::{GrabMode, PopstackConfig};
use crate::error::{PopstackError, Result};
use crate::input::{InputRouter, PointerEvent};
use crate::popup::{PopupStack, PressOutcome};
use crate::protocol::Protocol;
use crate::shm::ShmAllocator;
use crate::window::{BufferKey, Role, Window, WindowArena, WindowId};
use log::{debug, info, warn};

#[derive(Debug)]
pub struct App {
    config: PopstackConfig,
    grab_mode: GrabMode,
    allocator: ShmAllocator,
    windows: WindowArena,
    main: Option<WindowId>,
    main_color: u32,
    popups: PopupStack,
    router: InputRouter,
}

impl App {
    pub fn new(config: &PopstackConfig, grab_mode: GrabMode, allocator: ShmAllocator) -> Result<Self> {
        let main_color = config
            .main_window
            .rgb()
            .map_err(|e| PopstackError::Config(format!("{:#}", e)))?;
        let popups = PopupStack::new(&config.popups)?;

        Ok(Self {
            config: config.clone(),
            grab_mode,
            allocator,
            windows: WindowArena::new(),
            main: None,
            main_color,
            popups,
            router: InputRouter::new(),
        })
    }

    pub fn config(&self) -> &PopstackConfig {
        &self.config
    }

    pub fn grab_mode(&self) -> GrabMode {
        self.grab_mode
    }

    pub fn allocator(&self) -> &ShmAllocator {
        &self.allocator
    }

    pub fn windows(&self) -> &WindowArena {
        &self.windows
    }

    pub fn main_window(&self) -> Option<WindowId> {
        self.main
    }

    pub fn popups(&self) -> &PopupStack {
        &self.popups
    }

    pub fn router(&self) -> &InputRouter {
        &self.router
    }

    /// Create the main toplevel and send its initial commit
    pub fn start(&mut self, proto: &mut impl Protocol) -> Result<WindowId> {
        let size = &self.config.main_window;
        let id = self.windows.insert(
            Role::Toplevel,
            size.width as i32,
            size.height as i32,
            self.main_color,
            None,
        );

        let created = match self.windows.get_mut(id) {
            Some(window) => map_toplevel(window, proto),
            None => Err(PopstackError::UnknownWindow(id)),
        };
        if let Err(e) = created {
            self.windows.remove(id);
            return Err(e);
        }

        info!("Main window {:?} created ({}x{})", id, size.width, size.height);
        self.main = Some(id);
        Ok(id)
    }

    /// Shell surface configure: ack, and paint on the first one
    pub fn on_configure(&mut self, window: WindowId, serial: u32, proto: &mut impl Protocol) -> Result<()> {
        match self.windows.get_mut(window) {
            Some(w) => w.handle_configure(serial, &self.allocator, proto),
            None => {
                warn!("Configure serial {} for destroyed window {:?}", serial, window);
                Ok(())
            }
        }
    }

    pub fn on_toplevel_configure(&mut self, window: WindowId, width: i32, height: i32, states: &[u32]) {
        debug!(
            "Toplevel {:?} configure: suggested {}x{}, states {:?}",
            window, width, height, states
        );
        if let Some(w) = self.windows.get_mut(window) {
            w.set_suggested_size(width, height);
        }
    }

    pub fn on_toplevel_close(&mut self, window: WindowId) {
        info!("Close requested for toplevel {:?}; ignoring", window);
    }

    pub fn on_popup_configure(&mut self, window: WindowId, x: i32, y: i32, width: i32, height: i32) {
        debug!("Popup {:?} configure: {}x{} at ({}, {})", window, width, height, x, y);
    }

    pub fn on_popup_done(&mut self, window: WindowId) {
        self.popups.handle_popup_done(window, &mut self.windows);
    }

    /// Route a pointer event; a press drives the popup stack
    pub fn on_pointer(&mut self, event: PointerEvent, proto: &mut impl Protocol) -> Result<Option<PressOutcome>> {
        let Some(press) = self.router.route(event) else {
            return Ok(None);
        };
        let Some(main) = self.main else {
            warn!("Button press before the main window exists");
            return Ok(None);
        };

        let outcome = self.popups.on_button_press(
            press.serial,
            main,
            &mut self.windows,
            &self.allocator,
            self.grab_mode,
            proto,
        )?;
        debug!("Press {} -> {:?}, depth {}", press.serial, outcome, self.popups.depth());
        Ok(Some(outcome))
    }

    pub fn on_buffer_release(&mut self, key: BufferKey, proto: &mut impl Protocol) -> Result<()> {
        match self.windows.get_mut(key.window) {
            Some(window) => window.buffer_released(key.slot, &self.allocator, proto),
            None => {
                debug!("Release for buffer of destroyed window {:?}", key.window);
                Ok(())
            }
        }
    }

    pub fn on_ping(&mut self, serial: u32, proto: &mut impl Protocol) {
        debug!("Ping {}, answering pong", serial);
        proto.pong(serial);
    }
}

fn map_toplevel(window: &mut Window, proto: &mut impl Protocol) -> Result<()> {
    window.create_surface(proto)?;
    window.assign_toplevel(proto)?;
    window.commit_role(proto);
    Ok(())
}
