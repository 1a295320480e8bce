//! Wayland backend and display event loop
//!
//! Binds the globals the client needs, implements [`Protocol`] on top of
//! wayland-client proxies and routes every incoming event to the typed
//! handlers on [`App`]. Proxies carry the arena [`WindowId`] (surfaces and
//! their role objects) or [`BufferKey`] (buffers) as user data.
//!
//! Handlers never exit the process. The first error a handler returns is
//! parked in [`ClientState`] and surfaces from [`Client::run`] once the
//! current dispatch batch is done.

use crate::app::App;
use crate::error::{PopstackError, Result};
use crate::input::{ButtonState, CapabilityChange, MouseButton, PointerCapability, PointerEvent};
use crate::protocol::{Positioner, Protocol};
use crate::shm::{PixelFormat, ShmBuffer};
use crate::window::{BufferKey, WindowId, MAX_BUFFERS};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use wayland_client::{
    backend::WaylandError,
    delegate_noop,
    globals::{registry_queue_init, BindError, GlobalListContents},
    protocol::{wl_buffer, wl_compositor, wl_pointer, wl_registry, wl_seat, wl_shm, wl_shm_pool, wl_surface},
    Connection, Dispatch, DispatchError, EventQueue, Proxy, QueueHandle, WEnum,
};
use wayland_protocols::xdg::shell::client::{xdg_popup, xdg_positioner, xdg_surface, xdg_toplevel, xdg_wm_base};

const COMPOSITOR_VERSIONS: std::ops::RangeInclusive<u32> = 1..=4;
const SHM_VERSIONS: std::ops::RangeInclusive<u32> = 1..=1;
const WM_BASE_VERSIONS: std::ops::RangeInclusive<u32> = 1..=3;
const SEAT_VERSIONS: std::ops::RangeInclusive<u32> = 1..=7;

/// `wl_pointer.release` exists from this version on
const POINTER_RELEASE_SINCE: u32 = 3;

const WINDOW_TITLE: &str = "popstack";

enum RoleObject {
    Toplevel(xdg_toplevel::XdgToplevel),
    Popup(xdg_popup::XdgPopup),
}

/// Wire objects backing one window
struct SurfaceObjects {
    surface: wl_surface::WlSurface,
    xdg_surface: Option<xdg_surface::XdgSurface>,
    role: Option<RoleObject>,
    buffers: [Option<wl_buffer::WlBuffer>; MAX_BUFFERS],
}

/// [`Protocol`] over live wayland-client proxies
pub struct WaylandProtocol {
    qh: QueueHandle<ClientState>,
    compositor: wl_compositor::WlCompositor,
    shm: wl_shm::WlShm,
    wm_base: xdg_wm_base::XdgWmBase,
    seat: Option<wl_seat::WlSeat>,
    surfaces: HashMap<WindowId, SurfaceObjects>,
}

fn inert<P: Proxy>(proxy: &P) -> bool {
    proxy.id().is_null()
}

impl WaylandProtocol {
    fn objects(&mut self, window: WindowId) -> Option<&mut SurfaceObjects> {
        let objects = self.surfaces.get_mut(&window);
        if objects.is_none() {
            warn!("No wire objects for window {:?}", window);
        }
        objects
    }

    fn shell_surface(&mut self, window: WindowId, what: &'static str) -> Result<xdg_surface::XdgSurface> {
        let Some(objects) = self.surfaces.get_mut(&window) else {
            return Err(PopstackError::UnknownWindow(window));
        };
        if let Some(xdg) = &objects.xdg_surface {
            return Ok(xdg.clone());
        }
        let xdg = self.wm_base.get_xdg_surface(&objects.surface, &self.qh, window);
        if inert(&xdg) {
            return Err(PopstackError::ProtocolObject { what });
        }
        objects.xdg_surface = Some(xdg.clone());
        Ok(xdg)
    }
}

impl Protocol for WaylandProtocol {
    fn create_surface(&mut self, window: WindowId) -> Result<()> {
        let surface = self.compositor.create_surface(&self.qh, window);
        if inert(&surface) {
            return Err(PopstackError::ProtocolObject { what: "surface" });
        }
        self.surfaces.insert(
            window,
            SurfaceObjects {
                surface,
                xdg_surface: None,
                role: None,
                buffers: [None, None],
            },
        );
        Ok(())
    }

    fn assign_toplevel(&mut self, window: WindowId) -> Result<()> {
        let xdg = self.shell_surface(window, "xdg surface")?;
        let toplevel = xdg.get_toplevel(&self.qh, window);
        if inert(&toplevel) {
            return Err(PopstackError::ProtocolObject { what: "xdg toplevel" });
        }
        toplevel.set_title(WINDOW_TITLE.to_string());
        if let Some(objects) = self.objects(window) {
            objects.role = Some(RoleObject::Toplevel(toplevel));
        }
        Ok(())
    }

    fn assign_popup(&mut self, window: WindowId, parent: WindowId, positioner: &Positioner) -> Result<()> {
        let parent_xdg = self
            .surfaces
            .get(&parent)
            .and_then(|objects| objects.xdg_surface.clone())
            .ok_or(PopstackError::UnknownWindow(parent))?;
        let xdg = self.shell_surface(window, "xdg surface")?;

        let wire = self.wm_base.create_positioner(&self.qh, ());
        if inert(&wire) {
            return Err(PopstackError::ProtocolObject { what: "xdg positioner" });
        }
        wire.set_size(positioner.width, positioner.height);
        wire.set_anchor_rect(
            positioner.anchor_x,
            positioner.anchor_y,
            positioner.anchor_width,
            positioner.anchor_height,
        );
        let popup = xdg.get_popup(Some(&parent_xdg), &wire, &self.qh, window);
        wire.destroy();
        if inert(&popup) {
            return Err(PopstackError::ProtocolObject { what: "xdg popup" });
        }

        if let Some(objects) = self.objects(window) {
            objects.role = Some(RoleObject::Popup(popup));
        }
        Ok(())
    }

    fn grab(&mut self, window: WindowId, serial: u32) {
        let Some(seat) = self.seat.clone() else {
            warn!("No seat, can't grab for popup {:?}", window);
            return;
        };
        if let Some(SurfaceObjects {
            role: Some(RoleObject::Popup(popup)),
            ..
        }) = self.surfaces.get(&window)
        {
            popup.grab(&seat, serial);
        }
    }

    fn destroy_role(&mut self, window: WindowId) {
        let Some(objects) = self.objects(window) else {
            return;
        };
        match objects.role.take() {
            Some(RoleObject::Popup(popup)) => popup.destroy(),
            Some(RoleObject::Toplevel(toplevel)) => toplevel.destroy(),
            None => {}
        }
        if let Some(xdg) = objects.xdg_surface.take() {
            xdg.destroy();
        }
    }

    fn ack_configure(&mut self, window: WindowId, serial: u32) {
        if let Some(xdg) = self.objects(window).and_then(|o| o.xdg_surface.as_ref()) {
            xdg.ack_configure(serial);
        }
    }

    fn create_buffer(&mut self, key: BufferKey, buffer: &ShmBuffer) -> Result<()> {
        let size = i32::try_from(buffer.size()).map_err(|_| PopstackError::InvalidDimensions {
            width: buffer.width(),
            height: buffer.height(),
        })?;
        let format = match buffer.format() {
            PixelFormat::Xrgb8888 => wl_shm::Format::Xrgb8888,
        };

        let pool = self.shm.create_pool(buffer.as_fd(), size, &self.qh, ());
        if inert(&pool) {
            return Err(PopstackError::ProtocolObject { what: "shm pool" });
        }
        let wire = pool.create_buffer(0, buffer.width(), buffer.height(), buffer.stride(), format, &self.qh, key);
        pool.destroy();
        if inert(&wire) {
            return Err(PopstackError::ProtocolObject { what: "shm pool buffer" });
        }

        let objects = self
            .surfaces
            .get_mut(&key.window)
            .ok_or(PopstackError::UnknownWindow(key.window))?;
        if let Some(old) = objects.buffers[key.slot].replace(wire) {
            old.destroy();
        }
        Ok(())
    }

    fn destroy_buffer(&mut self, key: BufferKey) {
        if let Some(wire) = self.objects(key.window).and_then(|o| o.buffers[key.slot].take()) {
            wire.destroy();
        }
    }

    fn attach(&mut self, window: WindowId, buffer: Option<BufferKey>) {
        let Some(objects) = self.objects(window) else {
            return;
        };
        let wire = match buffer {
            Some(key) => objects.buffers[key.slot].as_ref(),
            None => None,
        };
        objects.surface.attach(wire, 0, 0);
    }

    fn damage(&mut self, window: WindowId, x: i32, y: i32, width: i32, height: i32) {
        if let Some(objects) = self.objects(window) {
            objects.surface.damage(x, y, width, height);
        }
    }

    fn commit(&mut self, window: WindowId) {
        if let Some(objects) = self.objects(window) {
            objects.surface.commit();
        }
    }

    fn destroy_surface(&mut self, window: WindowId) {
        let Some(mut objects) = self.surfaces.remove(&window) else {
            return;
        };
        for wire in objects.buffers.iter_mut().filter_map(Option::take) {
            wire.destroy();
        }
        objects.surface.destroy();
    }

    fn pong(&mut self, serial: u32) {
        self.wm_base.pong(serial);
    }
}

/// Everything the event handlers can reach
pub struct ClientState {
    app: App,
    protocol: WaylandProtocol,
    pointer: Option<wl_pointer::WlPointer>,
    pointer_cap: PointerCapability,
    fatal: Option<PopstackError>,
}

impl ClientState {
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Park the first handler error until the batch finishes
    fn record(&mut self, result: Result<()>) {
        if let Err(e) = result {
            error!("Fatal error in event handler: {}", e);
            if self.fatal.is_none() {
                self.fatal = Some(e);
            }
        }
    }
}

/// Toplevel configure states arrive as a native-endian `u32` array
fn decode_states(raw: &[u8]) -> Vec<u32> {
    raw.chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn button_state(state: WEnum<wl_pointer::ButtonState>) -> ButtonState {
    match state {
        WEnum::Value(wl_pointer::ButtonState::Pressed) => ButtonState::Pressed,
        _ => ButtonState::Released,
    }
}

fn capability_error(interface: &'static str, err: BindError) -> PopstackError {
    error!("Can't bind {}: {}", interface, err);
    PopstackError::Capability { interface }
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for ClientState {
    fn event(
        _: &mut Self,
        _: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global { name, interface, version } => {
                debug!("Global {} added: {} v{}", name, interface, version);
            }
            wl_registry::Event::GlobalRemove { name } => {
                debug!("Global {} removed", name);
            }
            _ => {}
        }
    }
}

delegate_noop!(ClientState: ignore wl_compositor::WlCompositor);
delegate_noop!(ClientState: ignore wl_shm_pool::WlShmPool);
delegate_noop!(ClientState: ignore xdg_positioner::XdgPositioner);

impl Dispatch<wl_shm::WlShm, ()> for ClientState {
    fn event(
        _: &mut Self,
        _: &wl_shm::WlShm,
        event: wl_shm::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format { format } = event {
            debug!("Possible shmem format {:?}", format);
        }
    }
}

impl Dispatch<wl_surface::WlSurface, WindowId> for ClientState {
    fn event(
        _: &mut Self,
        _: &wl_surface::WlSurface,
        event: wl_surface::Event,
        window: &WindowId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        debug!("Surface event for {:?}: {:?}", window, event);
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for ClientState {
    fn event(
        state: &mut Self,
        _: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            state.app.on_ping(serial, &mut state.protocol);
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, WindowId> for ClientState {
    fn event(
        state: &mut Self,
        _: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        window: &WindowId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            let result = state.app.on_configure(*window, serial, &mut state.protocol);
            state.record(result);
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, WindowId> for ClientState {
    fn event(
        state: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        window: &WindowId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, states } => {
                state
                    .app
                    .on_toplevel_configure(*window, width, height, &decode_states(&states));
            }
            xdg_toplevel::Event::Close => state.app.on_toplevel_close(*window),
            _ => {}
        }
    }
}

impl Dispatch<xdg_popup::XdgPopup, WindowId> for ClientState {
    fn event(
        state: &mut Self,
        _: &xdg_popup::XdgPopup,
        event: xdg_popup::Event,
        window: &WindowId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_popup::Event::Configure { x, y, width, height } => {
                state.app.on_popup_configure(*window, x, y, width, height);
            }
            xdg_popup::Event::PopupDone => state.app.on_popup_done(*window),
            _ => {}
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, BufferKey> for ClientState {
    fn event(
        state: &mut Self,
        _: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        key: &BufferKey,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            let result = state.app.on_buffer_release(*key, &mut state.protocol);
            state.record(result);
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for ClientState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities {
                capabilities: WEnum::Value(capabilities),
            } => match state.pointer_cap.update(capabilities.contains(wl_seat::Capability::Pointer)) {
                CapabilityChange::Acquire => {
                    debug!("Seat has a pointer, acquiring it");
                    state.pointer = Some(seat.get_pointer(qh, ()));
                }
                CapabilityChange::Release => {
                    debug!("Seat lost its pointer");
                    if let Some(pointer) = state.pointer.take() {
                        if pointer.version() >= POINTER_RELEASE_SINCE {
                            pointer.release();
                        }
                    }
                }
                CapabilityChange::Unchanged => {}
            },
            wl_seat::Event::Name { name } => debug!("Seat name: {}", name),
            _ => {}
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for ClientState {
    fn event(
        state: &mut Self,
        _: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let event = match event {
            wl_pointer::Event::Enter {
                serial,
                surface_x,
                surface_y,
                ..
            } => PointerEvent::Enter {
                serial,
                x: surface_x,
                y: surface_y,
            },
            wl_pointer::Event::Leave { serial, .. } => PointerEvent::Leave { serial },
            wl_pointer::Event::Motion {
                time,
                surface_x,
                surface_y,
            } => PointerEvent::Motion {
                time,
                x: surface_x,
                y: surface_y,
            },
            wl_pointer::Event::Button {
                serial,
                time,
                button,
                state: button_state_raw,
            } => PointerEvent::Button {
                serial,
                time,
                button: MouseButton::from_code(button),
                state: button_state(button_state_raw),
            },
            wl_pointer::Event::Axis { time, value, .. } => PointerEvent::Axis { time, value },
            wl_pointer::Event::Frame => PointerEvent::Frame,
            _ => PointerEvent::Other,
        };
        let result = state.app.on_pointer(event, &mut state.protocol).map(|_| ());
        state.record(result);
    }
}

/// A connected client: event queue plus the state it dispatches into
pub struct Client {
    queue: EventQueue<ClientState>,
    state: ClientState,
}

impl Client {
    /// Connect via `WAYLAND_DISPLAY`, bind globals and create the main window
    pub fn connect(app: App) -> Result<Self> {
        let connection = Connection::connect_to_env().map_err(|e| PopstackError::Connection(e.to_string()))?;
        let (globals, queue) =
            registry_queue_init::<ClientState>(&connection).map_err(|e| PopstackError::Connection(e.to_string()))?;
        let qh = queue.handle();
        info!("Connected to display");

        let compositor = globals
            .bind::<wl_compositor::WlCompositor, _, _>(&qh, COMPOSITOR_VERSIONS, ())
            .map_err(|e| capability_error("wl_compositor", e))?;
        let shm = globals
            .bind::<wl_shm::WlShm, _, _>(&qh, SHM_VERSIONS, ())
            .map_err(|e| capability_error("wl_shm", e))?;
        let wm_base = globals
            .bind::<xdg_wm_base::XdgWmBase, _, _>(&qh, WM_BASE_VERSIONS, ())
            .map_err(|e| capability_error("xdg_wm_base", e))?;
        let seat = match globals.bind::<wl_seat::WlSeat, _, _>(&qh, SEAT_VERSIONS, ()) {
            Ok(seat) => Some(seat),
            Err(e) => {
                warn!("No usable wl_seat ({}), running without input", e);
                None
            }
        };
        info!(
            "Bound globals: wl_compositor v{}, wl_shm v{}, xdg_wm_base v{}",
            compositor.version(),
            shm.version(),
            wm_base.version()
        );

        let mut state = ClientState {
            app,
            protocol: WaylandProtocol {
                qh,
                compositor,
                shm,
                wm_base,
                seat,
                surfaces: HashMap::new(),
            },
            pointer: None,
            pointer_cap: PointerCapability::default(),
            fatal: None,
        };
        state.app.start(&mut state.protocol)?;

        Ok(Self { queue, state })
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Dispatch until the server hangs up or a handler fails
    pub fn run(mut self) -> Result<()> {
        info!("Entering event loop");
        loop {
            match self.queue.blocking_dispatch(&mut self.state) {
                Ok(_) => {}
                Err(DispatchError::Backend(WaylandError::Io(e))) => {
                    info!("Connection closed: {}", e);
                    return Ok(());
                }
                Err(e) => return Err(PopstackError::Dispatch(e.to_string())),
            }
            if let Some(e) = self.state.fatal.take() {
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_states() {
        let raw: Vec<u8> = [1u32, 4, 9].iter().flat_map(|s| s.to_ne_bytes()).collect();
        assert_eq!(decode_states(&raw), vec![1, 4, 9]);
        // Trailing partial entry is dropped
        assert_eq!(decode_states(&raw[..5]), vec![1]);
        assert!(decode_states(&[]).is_empty());
    }

    #[test]
    fn test_button_state_mapping() {
        assert_eq!(
            button_state(WEnum::Value(wl_pointer::ButtonState::Pressed)),
            ButtonState::Pressed
        );
        assert_eq!(
            button_state(WEnum::Value(wl_pointer::ButtonState::Released)),
            ButtonState::Released
        );
        assert_eq!(button_state(WEnum::Unknown(7)), ButtonState::Released);
    }
}
