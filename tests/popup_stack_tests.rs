//! Integration tests for the popup stack
//!
//! These tests drive the whole client core through the `App` handlers, the
//! way the Wayland backend does, with the recording protocol standing in
//! for the compositor.

use popstack::input::{ButtonState, MouseButton, PointerEvent, BTN_LEFT};
use popstack::popup::{hops_to_root, IgnoreReason};
use popstack::protocol::recording::{RecordingProtocol, Request};
use popstack::window::{BufferKey, RepaintOutcome, WindowState};
use popstack::{App, GrabMode, PopstackConfig, PressOutcome, ShmAllocator, WindowId};
use tempfile::{tempdir, TempDir};

struct Session {
    _dir: TempDir,
    app: App,
    proto: RecordingProtocol,
    main: WindowId,
    serial: u32,
}

impl Session {
    /// Started client whose main window received its first configure
    fn mapped(mode: GrabMode) -> Self {
        let dir = tempdir().unwrap();
        let mut app = App::new(&PopstackConfig::default(), mode, ShmAllocator::new(dir.path())).unwrap();
        let mut proto = RecordingProtocol::new();
        let main = app.start(&mut proto).unwrap();
        app.on_configure(main, 1, &mut proto).unwrap();
        proto.take();
        Self {
            _dir: dir,
            app,
            proto,
            main,
            serial: 100,
        }
    }

    fn next_serial(&mut self) -> u32 {
        self.serial += 1;
        self.serial
    }

    fn click(&mut self) -> PressOutcome {
        let serial = self.next_serial();
        let press = PointerEvent::Button {
            serial,
            time: serial * 10,
            button: MouseButton::from_code(BTN_LEFT),
            state: ButtonState::Pressed,
        };
        let outcome = self.app.on_pointer(press, &mut self.proto).unwrap();
        outcome.expect("a press always reaches the popup stack once mapped")
    }

    /// Click, then configure whatever popup the click created
    fn click_and_configure(&mut self) -> PressOutcome {
        let outcome = self.click();
        if let PressOutcome::Created { window, .. } = outcome {
            let serial = self.next_serial();
            self.app.on_configure(window, serial, &mut self.proto).unwrap();
        }
        outcome
    }

    fn depth(&self) -> usize {
        self.app.popups().depth()
    }
}

#[test]
fn test_press_sequence_without_grab() {
    let mut s = Session::mapped(GrabMode::WithoutGrab);

    let PressOutcome::Created { window: first, depth: 1 } = s.click_and_configure() else {
        panic!("first press must create the first popup");
    };
    assert_eq!(s.app.windows().get(first).unwrap().size(), (50, 50));

    let PressOutcome::Created { window: second, depth: 2 } = s.click_and_configure() else {
        panic!("second press must create the second popup");
    };
    assert_eq!(s.app.windows().get(second).unwrap().size(), (60, 60));

    // Third press: no grab anywhere, first popup gets its second buffer
    let outcome = s.click();
    assert_eq!(
        outcome,
        PressOutcome::Repainted {
            window: first,
            outcome: RepaintOutcome::Committed { slot: 1 },
        }
    );
    assert_eq!(s.depth(), 2);
    let popup = s.app.windows().get(first).unwrap();
    assert_eq!(popup.buffer_count(), 2);
    assert!(popup.front_pixels().unwrap().iter().all(|&p| p == 0));

    // Nothing left to do after that
    assert_eq!(s.click(), PressOutcome::Ignored(IgnoreReason::StackFull));
    assert_eq!(s.proto.count(|r| matches!(r, Request::Grab { .. })), 0);
}

#[test]
fn test_press_sequence_with_grab() {
    let mut s = Session::mapped(GrabMode::WithGrab);

    let PressOutcome::Created { window: first, .. } = s.click_and_configure() else {
        panic!("first press must create a popup");
    };
    let PressOutcome::Created { window: second, .. } = s.click_and_configure() else {
        panic!("second press must create a popup");
    };
    assert!(s.app.windows().get(second).unwrap().has_grab());
    assert_eq!(s.proto.count(|r| matches!(r, Request::Grab { .. })), 2);

    // The grab uses the serial of the press that created the popup
    assert!(s.proto.requests().contains(&Request::Grab {
        window: first,
        serial: 101
    }));

    s.proto.take();
    let outcome = s.click();
    assert_eq!(outcome, PressOutcome::Dismissed { window: second, depth: 1 });
    assert_eq!(s.depth(), 1);
    assert!(s.app.windows().get(second).is_none());
    assert!(s.proto.requests().contains(&Request::DestroySurface(second)));

    // Depth dropped to one: the next press builds a fresh second popup
    let PressOutcome::Created { window: third, depth: 2 } = s.click_and_configure() else {
        panic!("stack should have room after the pop");
    };
    assert_eq!(s.app.windows().get(third).unwrap().parent(), Some(first));
}

#[test]
fn test_popup_done_falls_back_to_repaint() {
    let mut s = Session::mapped(GrabMode::WithGrab);
    let PressOutcome::Created { window: first, .. } = s.click_and_configure() else {
        panic!("first press must create a popup");
    };
    let PressOutcome::Created { window: second, .. } = s.click_and_configure() else {
        panic!("second press must create a popup");
    };

    // Server dismisses the grab, e.g. after a click outside the popups
    s.app.on_popup_done(second);
    assert!(!s.app.windows().get(second).unwrap().has_grab());
    assert_eq!(s.depth(), 2);

    assert!(matches!(
        s.click(),
        PressOutcome::Repainted { window, .. } if window == first
    ));
}

#[test]
fn test_parentage_reaches_main_within_two_hops() {
    let mut s = Session::mapped(GrabMode::WithoutGrab);
    s.click_and_configure();
    s.click_and_configure();

    let entries = s.app.popups().entries().to_vec();
    assert_eq!(entries.len(), 2);
    assert!(s.app.popups().verify_chain(s.main, s.app.windows()));
    assert_eq!(hops_to_root(entries[0], s.main, s.app.windows()), Some(1));
    assert_eq!(hops_to_root(entries[1], s.main, s.app.windows()), Some(2));
}

#[test]
fn test_configure_ack_uses_delivered_serial() {
    let mut s = Session::mapped(GrabMode::WithoutGrab);
    let PressOutcome::Created { window, .. } = s.click() else {
        panic!("first press must create a popup");
    };
    s.proto.take();

    s.app.on_configure(window, 4242, &mut s.proto).unwrap();
    assert_eq!(
        s.proto.requests().first(),
        Some(&Request::AckConfigure { window, serial: 4242 })
    );
    assert_eq!(
        s.app.windows().get(window).unwrap().state(),
        WindowState::BufferAttached
    );
}

#[test]
fn test_release_events_do_not_touch_the_stack() {
    let mut s = Session::mapped(GrabMode::WithoutGrab);
    let release = PointerEvent::Button {
        serial: 9,
        time: 0,
        button: MouseButton::Left,
        state: ButtonState::Released,
    };

    assert_eq!(s.app.on_pointer(release, &mut s.proto).unwrap(), None);
    assert_eq!(s.depth(), 0);
    assert!(s.proto.requests().is_empty());
}

#[test]
fn test_deferred_repaint_commits_after_release() {
    let mut s = Session::mapped(GrabMode::WithoutGrab);
    let PressOutcome::Created { window: first, .. } = s.click_and_configure() else {
        panic!("first press must create a popup");
    };
    s.click_and_configure();
    s.click();
    s.proto.take();

    // Both buffers of the first popup are held by the server now; a
    // release of the yellow one is what lets any later paint through
    let key = BufferKey { window: first, slot: 0 };
    s.app.on_buffer_release(key, &mut s.proto).unwrap();
    assert!(s.proto.requests().is_empty());
    assert!(!s.app.windows().get(first).unwrap().is_busy(0));
}
