use std::sync::{Arc, Mutex};

use remitfind_core::hotkey::{Key, KeyInput};
use remitfind_core::input_port::{
    InputPortError, KeyDisposition, KeyEventPort, KeySink, MockInputPort, NoopInputPort,
    PortRegistration,
};

fn recording_sink(seen: Arc<Mutex<Vec<KeyInput>>>) -> KeySink {
    Arc::new(move |input: KeyInput| {
        let reserved = input.key.is_reserved();
        seen.lock().unwrap().push(input);
        if reserved {
            KeyDisposition::Consumed
        } else {
            KeyDisposition::Ignored
        }
    })
}

#[test]
fn mock_port_tracks_attach_lifecycle() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut port = MockInputPort::default();
    assert_eq!(port.emit(KeyInput::plain(Key::Enter)), None);

    let registration = port.attach("Mod+K", recording_sink(seen.clone())).unwrap();
    assert_eq!(registration, PortRegistration::Attached("Mod+K".to_string()));
    assert!(port.is_attached());

    assert_eq!(
        port.emit(KeyInput::plain(Key::Enter)),
        Some(KeyDisposition::Consumed)
    );
    assert_eq!(seen.lock().unwrap().len(), 1);

    port.detach_all().unwrap();
    assert!(!port.is_attached());
    assert!(port.registrations().is_empty());
    assert_eq!(port.emit(KeyInput::plain(Key::Enter)), None);
}

#[test]
fn mock_port_rejects_second_attach_and_bad_shortcut() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut port = MockInputPort::default();

    assert!(matches!(
        port.attach("K", recording_sink(seen.clone())),
        Err(InputPortError::InvalidShortcut(_))
    ));

    port.attach("Ctrl+K", recording_sink(seen.clone())).unwrap();
    assert_eq!(
        port.attach("Ctrl+P", recording_sink(seen)),
        Err(InputPortError::AlreadyAttached)
    );
}

#[test]
fn noop_port_validates_but_delivers_nothing() {
    let mut port = NoopInputPort::default();
    let registration = port
        .attach("Mod+K", recording_sink(Arc::new(Mutex::new(Vec::new()))))
        .unwrap();

    assert_eq!(registration, PortRegistration::Noop("Mod+K".to_string()));
    assert_eq!(port.registrations().len(), 1);
    port.detach_all().unwrap();
    assert!(port.registrations().is_empty());
}
