// OS keyboard/mouse hook thread
//
// `rdev::listen` occupies its thread for the life of the process and has no
// unhook, so the hook is installed exactly once; the active subscriber is
// swapped in a static and delivery is gated by the monitor's enabled flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{error, trace};
use rdev::EventType;

use crate::{EventCallback, InputEvent, MonitorError};

struct Subscriber {
    callback: EventCallback,
    enabled: Arc<AtomicBool>,
}

static SUBSCRIBER: Mutex<Option<Subscriber>> = Mutex::new(None);
static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

pub(crate) fn install(
    callback: EventCallback,
    enabled: Arc<AtomicBool>,
) -> Result<(), MonitorError> {
    *SUBSCRIBER.lock().unwrap() = Some(Subscriber { callback, enabled });

    if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    std::thread::Builder::new()
        .name("input-hooks".into())
        .spawn(|| {
            // Blocks for the life of the process; hook failures (e.g. no
            // display server, missing input permissions) surface here.
            if let Err(err) = rdev::listen(forward) {
                error!("keyboard/mouse hook failed: {:?}", err);
            }
        })
        .map_err(|err| MonitorError::Hook(err.to_string()))?;

    Ok(())
}

/// Detach the current subscriber; the hook thread keeps running idle.
pub(crate) fn clear() {
    *SUBSCRIBER.lock().unwrap() = None;
}

fn forward(event: rdev::Event) {
    let input = match event.event_type {
        EventType::KeyPress(key) => InputEvent::Key(key),
        EventType::ButtonPress(button) => InputEvent::MouseButton(button),
        _ => return,
    };

    let guard = SUBSCRIBER.lock().unwrap();
    if let Some(subscriber) = guard.as_ref() {
        if subscriber.enabled.load(Ordering::SeqCst) {
            trace!("hook press: {:?}", input);
            (subscriber.callback)(input);
        }
    }
}
