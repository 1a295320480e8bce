//! Pointer input routing
//!
//! Turns pointer events into button presses for the popup stack and tracks
//! whether the seat currently offers a pointer. Only a press changes state:
//! it records the event serial, which later authorizes a popup grab.
//! Enter, leave, motion, axis and release events are accepted and dropped.

use log::debug;

/// Linux evdev button codes (`linux/input-event-codes.h`)
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u32),
}

impl MouseButton {
    pub fn from_code(code: u32) -> Self {
        match code {
            BTN_LEFT => MouseButton::Left,
            BTN_RIGHT => MouseButton::Right,
            BTN_MIDDLE => MouseButton::Middle,
            other => MouseButton::Other(other),
        }
    }
}

/// Pointer events as delivered by the seat
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Enter { serial: u32, x: f64, y: f64 },
    Leave { serial: u32 },
    Motion { time: u32, x: f64, y: f64 },
    Button {
        serial: u32,
        time: u32,
        button: MouseButton,
        state: ButtonState,
    },
    Axis { time: u32, value: f64 },
    Frame,
    /// Anything newer than the events above
    Other,
}

/// A press the popup stack should react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub serial: u32,
    pub button: MouseButton,
    pub time: u32,
}

#[derive(Debug, Default)]
pub struct InputRouter {
    last_serial: Option<u32>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent button-press serial
    pub fn last_serial(&self) -> Option<u32> {
        self.last_serial
    }

    /// Route one pointer event; `Some` only for a press
    pub fn route(&mut self, event: PointerEvent) -> Option<ButtonPress> {
        match event {
            PointerEvent::Button {
                serial,
                time,
                button,
                state: ButtonState::Pressed,
            } => {
                debug!("Pointer button {:?} pressed, serial {}", button, serial);
                self.last_serial = Some(serial);
                Some(ButtonPress { serial, button, time })
            }
            PointerEvent::Button { button, .. } => {
                debug!("Pointer button {:?} released", button);
                None
            }
            PointerEvent::Enter { x, y, .. } => {
                debug!("Pointer entered at ({:.1}, {:.1})", x, y);
                None
            }
            PointerEvent::Leave { .. } => {
                debug!("Pointer left surface");
                None
            }
            PointerEvent::Motion { .. }
            | PointerEvent::Axis { .. }
            | PointerEvent::Frame
            | PointerEvent::Other => None,
        }
    }
}

/// What to do with the pointer object after a seat capability update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityChange {
    Acquire,
    Release,
    Unchanged,
}

/// Presence of a pointer on the seat
#[derive(Debug, Default)]
pub struct PointerCapability {
    present: bool,
}

impl PointerCapability {
    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn update(&mut self, has_pointer: bool) -> CapabilityChange {
        let change = match (self.present, has_pointer) {
            (false, true) => CapabilityChange::Acquire,
            (true, false) => CapabilityChange::Release,
            _ => CapabilityChange::Unchanged,
        };
        self.present = has_pointer;
        change
    }
}
