// Gamepad polling thread
//
// gilrs has no blocking event wait, so buttons are polled on a short
// interval, the same cadence a joystick event pump would use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use gilrs::{EventType, Gilrs};
use log::{info, warn};

use crate::{EventCallback, InputEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) fn spawn_poller(
    callback: EventCallback,
    enabled: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
) -> Option<JoinHandle<()>> {
    let builder = std::thread::Builder::new().name("gamepad-poll".into());
    match builder.spawn(move || poll_loop(callback, enabled, stop)) {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!("failed to spawn gamepad thread: {}", err);
            None
        }
    }
}

fn poll_loop(callback: EventCallback, enabled: Arc<AtomicBool>, stop: Arc<AtomicBool>) {
    // Gilrs is created on this thread; it is not Send on every platform.
    let mut gilrs = match Gilrs::new() {
        Ok(gilrs) => gilrs,
        Err(err) => {
            warn!("gamepad backend unavailable: {}", err);
            return;
        }
    };

    for (_id, gamepad) in gilrs.gamepads() {
        info!("gamepad connected: {}", gamepad.name());
    }

    while !stop.load(Ordering::SeqCst) {
        while let Some(gilrs::Event { event, .. }) = gilrs.next_event() {
            if let EventType::ButtonPressed(button, _) = event {
                if enabled.load(Ordering::SeqCst) {
                    (callback)(InputEvent::GamepadButton(button));
                }
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
