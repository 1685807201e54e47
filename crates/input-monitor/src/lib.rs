// Global input press monitoring for trigger bindings
//!
//! # input-monitor
//!
//! Watches keyboard, mouse and gamepad button presses system-wide, even when
//! the application window is not focused:
//! - Keyboard + mouse: OS hooks via `rdev`
//! - Gamepads: polled via `gilrs` on a dedicated thread
//!
//! ## Features
//! - Single callback for all three input sources
//! - Pause/resume without tearing down the OS hooks
//! - Binding model with human-readable labels ("Space", "Mouse Left",
//!   "Controller South")
//! - Gamepad thread stops when the monitor is dropped
//!
//! ## Example
//! ```no_run
//! use input_monitor::InputMonitor;
//!
//! let monitor = InputMonitor::start(|event| {
//!     println!("pressed: {}", event.label());
//! })?;
//! // ... react to events ...
//! monitor.pause();
//! # Ok::<(), input_monitor::MonitorError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod gamepad;
mod hooks;

// Re-exported so callers can name keys and buttons without their own
// dependency on the backends
pub use gilrs;
pub use rdev;

/// Callback invoked for every observed press.
pub type EventCallback = Arc<dyn Fn(InputEvent) + Send + Sync + 'static>;

/// Errors from setting up the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to install input hooks: {0}")]
    Hook(String),
}

/// The device class an input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Keyboard,
    Mouse,
    Gamepad,
}

/// A single observed button/key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key(rdev::Key),
    MouseButton(rdev::Button),
    GamepadButton(gilrs::Button),
}

impl InputEvent {
    pub fn source(&self) -> InputSource {
        match self {
            InputEvent::Key(_) => InputSource::Keyboard,
            InputEvent::MouseButton(_) => InputSource::Mouse,
            InputEvent::GamepadButton(_) => InputSource::Gamepad,
        }
    }

    pub fn label(&self) -> String {
        TriggerBinding::from_event(self).label()
    }
}

/// The input a recording trigger is bound to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerBinding {
    Key(rdev::Key),
    MouseButton(rdev::Button),
    GamepadButton(gilrs::Button),
}

impl TriggerBinding {
    /// Bind to whatever was just pressed.
    pub fn from_event(event: &InputEvent) -> Self {
        match *event {
            InputEvent::Key(key) => TriggerBinding::Key(key),
            InputEvent::MouseButton(button) => TriggerBinding::MouseButton(button),
            InputEvent::GamepadButton(button) => TriggerBinding::GamepadButton(button),
        }
    }

    pub fn source(&self) -> InputSource {
        match self {
            TriggerBinding::Key(_) => InputSource::Keyboard,
            TriggerBinding::MouseButton(_) => InputSource::Mouse,
            TriggerBinding::GamepadButton(_) => InputSource::Gamepad,
        }
    }

    /// Whether a press is the bound input.
    pub fn matches(&self, event: &InputEvent) -> bool {
        match (self, event) {
            (TriggerBinding::Key(bound), InputEvent::Key(key)) => bound == key,
            (TriggerBinding::MouseButton(bound), InputEvent::MouseButton(button)) => {
                bound == button
            }
            (TriggerBinding::GamepadButton(bound), InputEvent::GamepadButton(button)) => {
                bound == button
            }
            _ => false,
        }
    }

    /// Human-readable name for the GUI, e.g. "Space", "Mouse Left",
    /// "Controller South".
    pub fn label(&self) -> String {
        match self {
            TriggerBinding::Key(key) => key_label(key),
            TriggerBinding::MouseButton(button) => mouse_label(button),
            TriggerBinding::GamepadButton(button) => {
                format!("Controller {}", camel_to_words(&format!("{:?}", button)))
            }
        }
    }
}

fn key_label(key: &rdev::Key) -> String {
    let name = format!("{:?}", key);
    // "KeyA" -> "A", "Num7" -> "7"
    if let Some(rest) = name.strip_prefix("Key") {
        if rest.len() == 1 {
            return rest.to_string();
        }
    }
    if let Some(rest) = name.strip_prefix("Num") {
        if rest.len() == 1 && rest.chars().all(|c| c.is_ascii_digit()) {
            return rest.to_string();
        }
    }
    camel_to_words(&name)
}

fn mouse_label(button: &rdev::Button) -> String {
    match button {
        rdev::Button::Left => "Mouse Left".to_string(),
        rdev::Button::Right => "Mouse Right".to_string(),
        rdev::Button::Middle => "Mouse Middle".to_string(),
        rdev::Button::Unknown(code) => format!("Mouse Button {}", code),
    }
}

// "ControlLeft" -> "Control Left", "DPadUp" -> "D Pad Up"
fn camel_to_words(name: &str) -> String {
    let mut words = String::with_capacity(name.len() + 2);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() && i > 0 {
            words.push(' ');
        }
        words.push(ch);
    }
    words
}

/// Handle to the running monitor.
///
/// Keyboard/mouse hooks stay installed for the life of the process (the
/// underlying `rdev` listener has no unhook); pausing gates event delivery
/// instead. The gamepad polling thread is stopped on drop.
pub struct InputMonitor {
    enabled: Arc<AtomicBool>,
    gamepad_stop: Arc<AtomicBool>,
    gamepad_thread: Option<JoinHandle<()>>,
}

impl InputMonitor {
    /// Install the hooks and start delivering presses to `callback`.
    ///
    /// A missing gamepad backend is not fatal; keyboard and mouse monitoring
    /// continue and a warning is logged.
    pub fn start<F>(callback: F) -> Result<Self, MonitorError>
    where
        F: Fn(InputEvent) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        let enabled = Arc::new(AtomicBool::new(true));

        hooks::install(callback.clone(), enabled.clone())?;

        let gamepad_stop = Arc::new(AtomicBool::new(false));
        let gamepad_thread =
            gamepad::spawn_poller(callback, enabled.clone(), gamepad_stop.clone());

        Ok(Self {
            enabled,
            gamepad_stop,
            gamepad_thread,
        })
    }

    /// Stop delivering events without tearing down the OS hooks.
    pub fn pause(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Resume event delivery.
    pub fn resume(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl Drop for InputMonitor {
    fn drop(&mut self) {
        hooks::clear();
        self.gamepad_stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.gamepad_thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_labels_read_like_the_keycap() {
        assert_eq!(TriggerBinding::Key(rdev::Key::KeyA).label(), "A");
        assert_eq!(TriggerBinding::Key(rdev::Key::Num7).label(), "7");
        assert_eq!(TriggerBinding::Key(rdev::Key::Space).label(), "Space");
        assert_eq!(TriggerBinding::Key(rdev::Key::F5).label(), "F5");
        assert_eq!(
            TriggerBinding::Key(rdev::Key::ControlLeft).label(),
            "Control Left"
        );
    }

    #[test]
    fn mouse_labels() {
        assert_eq!(
            TriggerBinding::MouseButton(rdev::Button::Left).label(),
            "Mouse Left"
        );
        assert_eq!(
            TriggerBinding::MouseButton(rdev::Button::Unknown(4)).label(),
            "Mouse Button 4"
        );
    }

    #[test]
    fn gamepad_labels() {
        assert_eq!(
            TriggerBinding::GamepadButton(gilrs::Button::South).label(),
            "Controller South"
        );
        assert_eq!(
            TriggerBinding::GamepadButton(gilrs::Button::DPadUp).label(),
            "Controller D Pad Up"
        );
    }

    #[test]
    fn binding_matches_only_the_bound_input() {
        let binding = TriggerBinding::Key(rdev::Key::Space);
        assert!(binding.matches(&InputEvent::Key(rdev::Key::Space)));
        assert!(!binding.matches(&InputEvent::Key(rdev::Key::KeyA)));
        assert!(!binding.matches(&InputEvent::MouseButton(rdev::Button::Left)));
        assert!(!binding.matches(&InputEvent::GamepadButton(gilrs::Button::South)));
    }

    #[test]
    fn binding_from_event_matches_that_event() {
        let events = [
            InputEvent::Key(rdev::Key::Escape),
            InputEvent::MouseButton(rdev::Button::Middle),
            InputEvent::GamepadButton(gilrs::Button::West),
        ];
        for event in events {
            let binding = TriggerBinding::from_event(&event);
            assert!(binding.matches(&event));
            assert_eq!(binding.source(), event.source());
        }
    }
}
