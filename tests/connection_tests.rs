//! Startup failure tests
//!
//! These tests point the client at display sockets that do not exist and
//! check that startup fails with the right error before any window exists.

use popstack::{App, Client, GrabMode, PopstackConfig, PopstackError, ShmAllocator};
use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn test_missing_display_is_connection_error() {
    let dir = tempdir().unwrap();
    std::env::set_var("XDG_RUNTIME_DIR", dir.path());
    std::env::set_var("WAYLAND_DISPLAY", "popstack-test-no-such-socket");
    std::env::remove_var("WAYLAND_SOCKET");

    let allocator = ShmAllocator::from_env().unwrap();
    let app = App::new(&PopstackConfig::default(), GrabMode::WithGrab, allocator).unwrap();

    let err = match Client::connect(app) {
        Ok(_) => panic!("connected to a socket that does not exist"),
        Err(e) => e,
    };
    assert!(matches!(err, PopstackError::Connection(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().starts_with("can't connect to display"));
}

#[test]
#[serial]
fn test_missing_runtime_dir_fails_before_connecting() {
    std::env::remove_var("XDG_RUNTIME_DIR");

    let err = ShmAllocator::from_env().unwrap_err();
    assert!(matches!(err, PopstackError::MissingRuntimeDir));
    assert_eq!(err.exit_code(), 1);
}
