// Recording trigger state machine
//
// One control thread owns the clip recorder and the global input monitor.
// Input presses and GUI requests arrive on the same channel; the idle stop
// is driven by recv_timeout against the current deadline, so nothing here
// ever runs on the GUI thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use input_monitor::{InputEvent, InputMonitor, InputSource, MonitorError, TriggerBinding};
use log::{error, info, warn};
use tauri::{AppHandle, Manager};

use crate::events::{self, BindingInfo};
use crate::recorder::ClipRecorder;
use crate::state::AppState;

/// Requests handled by the control thread
pub enum ControlMsg {
    Input(InputEvent),
    CaptureBinding(InputSource),
    ClearBinding,
    SetMonitoring(bool),
    SetIdleTimeout(Duration),
    ManualStart,
    ManualStop,
    Shutdown,
}

/// Why a clip was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    IdleTimeout,
    Manual,
    Shutdown,
}

/// Side effect the control thread must perform after a transition
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    /// Begin a new clip
    Start,
    /// Stop and save the current clip
    Stop(StopReason),
    /// A new binding was captured in bind mode
    Captured(TriggerBinding),
    /// Nothing to do (deadline refreshes happen inside the machine)
    None,
}

/// The trigger logic itself, free of threads and side effects.
///
/// While bind mode is active every press is consumed: a press of the
/// requested source becomes the new binding, anything else is swallowed, and
/// neither starts a clip.
struct TriggerMachine {
    binding: Option<TriggerBinding>,
    capture: Option<InputSource>,
    recording: bool,
    deadline: Option<Instant>,
    idle_timeout: Duration,
}

impl TriggerMachine {
    fn new(idle_timeout: Duration) -> Self {
        Self {
            binding: None,
            capture: None,
            recording: false,
            deadline: None,
            idle_timeout,
        }
    }

    fn on_input(&mut self, event: &InputEvent, now: Instant) -> Action {
        if let Some(source) = self.capture {
            if event.source() == source {
                let binding = TriggerBinding::from_event(event);
                self.capture = None;
                self.binding = Some(binding);
                return Action::Captured(binding);
            }
            return Action::None;
        }

        match self.binding {
            Some(binding) if binding.matches(event) => {
                // Every bound press pushes the idle stop out
                self.deadline = Some(now + self.idle_timeout);
                if self.recording {
                    Action::None
                } else {
                    self.recording = true;
                    Action::Start
                }
            }
            _ => Action::None,
        }
    }

    /// Called when recv_timeout expires without a message.
    fn on_deadline(&mut self, now: Instant) -> Action {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                if self.recording {
                    self.recording = false;
                    Action::Stop(StopReason::IdleTimeout)
                } else {
                    Action::None
                }
            }
            _ => Action::None,
        }
    }

    /// Manual start has no idle deadline; only bound presses arm one.
    fn manual_start(&mut self) -> Action {
        if self.recording {
            return Action::None;
        }
        self.recording = true;
        Action::Start
    }

    fn manual_stop(&mut self) -> Action {
        if !self.recording {
            return Action::None;
        }
        self.recording = false;
        self.deadline = None;
        Action::Stop(StopReason::Manual)
    }

    fn begin_capture(&mut self, source: InputSource) {
        self.capture = Some(source);
    }

    fn clear_binding(&mut self) {
        self.binding = None;
        self.capture = None;
    }

    fn set_idle_timeout(&mut self, timeout: Duration) {
        // Takes effect at the next deadline refresh
        self.idle_timeout = timeout;
    }

    /// Roll back after the recorder refused to start.
    fn abort_recording(&mut self) {
        self.recording = false;
        self.deadline = None;
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn timeout_left(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}

/// State mirrored for the command layer
struct SharedStatus {
    recording: AtomicBool,
    monitoring: AtomicBool,
    binding: Mutex<Option<TriggerBinding>>,
}

/// Handle held in AppState; messages the control thread and mirrors its
/// state for status queries.
pub struct TriggerHandle {
    tx: Sender<ControlMsg>,
    shared: Arc<SharedStatus>,
    thread: Option<JoinHandle<()>>,
}

impl TriggerHandle {
    fn send(&self, msg: ControlMsg) {
        if self.tx.send(msg).is_err() {
            warn!("trigger control thread is gone");
        }
    }

    pub fn capture_binding(&self, source: InputSource) {
        self.send(ControlMsg::CaptureBinding(source));
    }

    pub fn clear_binding(&self) {
        self.send(ControlMsg::ClearBinding);
    }

    pub fn set_monitoring(&self, enabled: bool) {
        self.send(ControlMsg::SetMonitoring(enabled));
    }

    pub fn set_idle_timeout(&self, timeout: Duration) {
        self.send(ControlMsg::SetIdleTimeout(timeout));
    }

    pub fn start_clip(&self) {
        self.send(ControlMsg::ManualStart);
    }

    pub fn stop_clip(&self) {
        self.send(ControlMsg::ManualStop);
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::SeqCst)
    }

    pub fn is_monitoring(&self) -> bool {
        self.shared.monitoring.load(Ordering::SeqCst)
    }

    pub fn binding(&self) -> Option<TriggerBinding> {
        *self.shared.binding.lock().unwrap()
    }

    /// Stop monitoring and finalize any in-flight clip.
    pub fn shutdown(mut self) {
        self.send(ControlMsg::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Install the global input monitor and start the control thread.
pub fn spawn(app: AppHandle) -> Result<TriggerHandle, MonitorError> {
    let (tx, rx) = mpsc::channel();

    let input_tx = tx.clone();
    let monitor = InputMonitor::start(move |event| {
        let _ = input_tx.send(ControlMsg::Input(event));
    })?;

    let shared = Arc::new(SharedStatus {
        recording: AtomicBool::new(false),
        monitoring: AtomicBool::new(true),
        binding: Mutex::new(None),
    });

    let idle_timeout = {
        let state = app.state::<AppState>();
        let secs = *state.idle_timeout_secs.lock().unwrap();
        Duration::from_secs(secs)
    };

    let thread_shared = shared.clone();
    let thread = std::thread::Builder::new()
        .name("trigger-control".into())
        .spawn(move || run(app, rx, monitor, thread_shared, idle_timeout))
        .map_err(|err| MonitorError::Hook(err.to_string()))?;

    Ok(TriggerHandle {
        tx,
        shared,
        thread: Some(thread),
    })
}

fn run(
    app: AppHandle,
    rx: Receiver<ControlMsg>,
    monitor: InputMonitor,
    shared: Arc<SharedStatus>,
    idle_timeout: Duration,
) {
    let mut machine = TriggerMachine::new(idle_timeout);
    let mut recorder = {
        let state = app.state::<AppState>();
        ClipRecorder::new(
            state.output_folder.lock().unwrap().clone(),
            *state.capture_fps.lock().unwrap(),
        )
    };

    info!("trigger controller started (idle timeout {:?})", idle_timeout);

    loop {
        let msg = match machine.timeout_left(Instant::now()) {
            Some(left) => match rx.recv_timeout(left) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            },
        };

        let now = Instant::now();
        let action = match msg {
            None => machine.on_deadline(now),
            Some(ControlMsg::Input(event)) => machine.on_input(&event, now),
            Some(ControlMsg::CaptureBinding(source)) => {
                info!("bind mode: waiting for a {:?} press", source);
                machine.begin_capture(source);
                // Bind mode needs presses delivered even if monitoring was
                // paused; binding a trigger rearms monitoring
                monitor.resume();
                shared.monitoring.store(true, Ordering::SeqCst);
                Action::None
            }
            Some(ControlMsg::ClearBinding) => {
                machine.clear_binding();
                *shared.binding.lock().unwrap() = None;
                info!("trigger binding cleared");
                Action::None
            }
            Some(ControlMsg::SetMonitoring(enabled)) => {
                if enabled {
                    monitor.resume();
                } else {
                    monitor.pause();
                }
                shared.monitoring.store(enabled, Ordering::SeqCst);
                Action::None
            }
            Some(ControlMsg::SetIdleTimeout(timeout)) => {
                machine.set_idle_timeout(timeout);
                Action::None
            }
            Some(ControlMsg::ManualStart) => machine.manual_start(),
            Some(ControlMsg::ManualStop) => machine.manual_stop(),
            Some(ControlMsg::Shutdown) => break,
        };

        match action {
            Action::Start => start_clip(&app, &shared, &mut machine, &mut recorder),
            Action::Stop(reason) => stop_clip(&app, &shared, &mut recorder, reason),
            Action::Captured(binding) => {
                let info = BindingInfo::from(&binding);
                info!("trigger bound to {}", info.label);
                *shared.binding.lock().unwrap() = Some(binding);
                let _ = events::emit_binding_captured(&app, info);
            }
            Action::None => {}
        }
    }

    // Channel closed or shutdown requested; never leave a clip half-written
    if machine.is_recording() {
        stop_clip(&app, &shared, &mut recorder, StopReason::Shutdown);
    }
    drop(monitor);
    info!("trigger controller stopped");
}

fn start_clip(
    app: &AppHandle,
    shared: &SharedStatus,
    machine: &mut TriggerMachine,
    recorder: &mut ClipRecorder,
) {
    set_watcher_paused(app, true);
    {
        let state = app.state::<AppState>();
        recorder.set_output_dir(state.output_folder.lock().unwrap().clone());
        recorder.set_fps(*state.capture_fps.lock().unwrap());
    }

    match recorder.start() {
        Ok(path) => {
            shared.recording.store(true, Ordering::SeqCst);
            info!("🎬 Recording to {:?}", path);
            let _ = events::emit_status(app, "recording");
        }
        Err(err) => {
            error!("❌ Failed to start recording: {}", err);
            machine.abort_recording();
            set_watcher_paused(app, false);
            let _ = events::emit_error(app, "CAPTURE_ERROR", &err.to_string());
            let _ = events::emit_status(app, "idle");
        }
    }
}

fn stop_clip(
    app: &AppHandle,
    shared: &SharedStatus,
    recorder: &mut ClipRecorder,
    reason: StopReason,
) {
    match recorder.stop() {
        Ok(clip) => {
            info!(
                "✅ Clip saved to {:?} ({} frames, {} ms, {:?})",
                clip.path, clip.frames, clip.duration_ms, reason
            );
            let video_path = clip.path.to_string_lossy().to_string();
            if let Err(err) = crate::commands::generate_thumbnail_internal(&video_path) {
                warn!("⚠️ Failed to generate thumbnail: {}", err);
            }
            {
                let state = app.state::<AppState>();
                *state.clip_count.lock().unwrap() += 1;
            }
            let _ = events::emit_clip_saved(
                app,
                events::ClipSavedEvent {
                    path: video_path,
                    duration_ms: clip.duration_ms,
                },
            );
        }
        Err(err) => {
            error!("❌ Failed to stop recording: {}", err);
            let _ = events::emit_error(app, "SAVE_ERROR", &err.to_string());
        }
    }

    shared.recording.store(false, Ordering::SeqCst);
    let _ = events::emit_status(app, "idle");
    set_watcher_paused(app, false);
}

fn set_watcher_paused(app: &AppHandle, paused: bool) {
    let state = app.state::<AppState>();
    let control = state.watcher_control.lock().unwrap();
    if let Some(control) = control.as_ref() {
        if paused {
            control.pause();
        } else {
            control.resume();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use input_monitor::rdev;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn space() -> InputEvent {
        InputEvent::Key(rdev::Key::Space)
    }

    fn armed_machine() -> TriggerMachine {
        let mut machine = TriggerMachine::new(TIMEOUT);
        machine.binding = Some(TriggerBinding::from_event(&space()));
        machine
    }

    #[test]
    fn bound_press_while_idle_starts_a_clip() {
        let mut machine = armed_machine();
        let now = Instant::now();

        assert_eq!(machine.on_input(&space(), now), Action::Start);
        assert!(machine.is_recording());
        assert_eq!(machine.timeout_left(now), Some(TIMEOUT));
    }

    #[test]
    fn bound_press_while_recording_only_refreshes_the_deadline() {
        let mut machine = armed_machine();
        let start = Instant::now();
        machine.on_input(&space(), start);

        let later = start + Duration::from_secs(4);
        assert_eq!(machine.on_input(&space(), later), Action::None);
        assert!(machine.is_recording());
        assert_eq!(machine.timeout_left(later), Some(TIMEOUT));
    }

    #[test]
    fn unbound_presses_are_ignored() {
        let mut machine = armed_machine();
        let now = Instant::now();

        let other = InputEvent::Key(rdev::Key::KeyA);
        assert_eq!(machine.on_input(&other, now), Action::None);
        assert!(!machine.is_recording());
        assert_eq!(machine.timeout_left(now), None);

        // ...and never refresh the deadline while recording
        machine.on_input(&space(), now);
        let later = now + Duration::from_secs(9);
        machine.on_input(&other, later);
        assert_eq!(machine.timeout_left(now), Some(TIMEOUT));
    }

    #[test]
    fn nothing_triggers_without_a_binding() {
        let mut machine = TriggerMachine::new(TIMEOUT);
        assert_eq!(machine.on_input(&space(), Instant::now()), Action::None);
        assert!(!machine.is_recording());
    }

    #[test]
    fn idle_expiry_stops_the_clip() {
        let mut machine = armed_machine();
        let start = Instant::now();
        machine.on_input(&space(), start);

        let expired = start + TIMEOUT + Duration::from_millis(1);
        assert_eq!(
            machine.on_deadline(expired),
            Action::Stop(StopReason::IdleTimeout)
        );
        assert!(!machine.is_recording());
        assert_eq!(machine.timeout_left(expired), None);
    }

    #[test]
    fn expiry_while_idle_does_nothing() {
        let mut machine = armed_machine();
        assert_eq!(machine.on_deadline(Instant::now()), Action::None);
    }

    #[test]
    fn early_wakeup_does_not_stop_the_clip() {
        let mut machine = armed_machine();
        let start = Instant::now();
        machine.on_input(&space(), start);

        let early = start + Duration::from_secs(5);
        assert_eq!(machine.on_deadline(early), Action::None);
        assert!(machine.is_recording());
    }

    #[test]
    fn manual_start_and_stop() {
        let mut machine = TriggerMachine::new(TIMEOUT);

        assert_eq!(machine.manual_start(), Action::Start);
        assert!(machine.is_recording());
        // Manual clips have no idle deadline
        assert_eq!(machine.timeout_left(Instant::now()), None);

        assert_eq!(machine.manual_start(), Action::None);
        assert_eq!(machine.manual_stop(), Action::Stop(StopReason::Manual));
        assert!(!machine.is_recording());
        assert_eq!(machine.manual_stop(), Action::None);
    }

    #[test]
    fn bind_mode_captures_without_recording() {
        let mut machine = armed_machine();
        let now = Instant::now();
        machine.begin_capture(InputSource::Keyboard);

        // Wrong source is swallowed, capture stays active
        let click = InputEvent::MouseButton(rdev::Button::Left);
        assert_eq!(machine.on_input(&click, now), Action::None);

        // The next keyboard press becomes the binding and starts nothing
        let key = InputEvent::Key(rdev::Key::KeyR);
        let captured = TriggerBinding::from_event(&key);
        assert_eq!(machine.on_input(&key, now), Action::Captured(captured));
        assert!(!machine.is_recording());

        // The new binding is live from then on
        assert_eq!(machine.on_input(&key, now), Action::Start);
    }

    #[test]
    fn aborted_start_rolls_back() {
        let mut machine = armed_machine();
        machine.on_input(&space(), Instant::now());
        machine.abort_recording();

        assert!(!machine.is_recording());
        assert_eq!(machine.timeout_left(Instant::now()), None);
        // The next press starts again
        assert_eq!(machine.on_input(&space(), Instant::now()), Action::Start);
    }

    #[test]
    fn shorter_timeout_applies_on_the_next_refresh() {
        let mut machine = armed_machine();
        let start = Instant::now();
        machine.on_input(&space(), start);
        machine.set_idle_timeout(Duration::from_secs(3));

        // Existing deadline is untouched
        assert_eq!(machine.timeout_left(start), Some(TIMEOUT));

        // The next press uses the new timeout
        let later = start + Duration::from_secs(1);
        machine.on_input(&space(), later);
        assert_eq!(machine.timeout_left(later), Some(Duration::from_secs(3)));
    }
}
