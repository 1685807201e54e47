// Events pushed to the webview; command responses cover everything else.

use input_monitor::{InputSource, TriggerBinding};
use serde::Serialize;
use tauri::{AppHandle, Emitter};

#[derive(Debug, Clone, Serialize)]
pub struct ClipSavedEvent {
    pub path: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

/// What a trigger is bound to, as shown in the GUI
#[derive(Debug, Clone, Serialize)]
pub struct BindingInfo {
    pub source: InputSource,
    pub label: String,
}

impl From<&TriggerBinding> for BindingInfo {
    fn from(binding: &TriggerBinding) -> Self {
        Self {
            source: binding.source(),
            label: binding.label(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub code: String,
    pub message: String,
}

fn emit<P: Serialize + Clone>(app: &AppHandle, event: &str, payload: P) -> Result<(), String> {
    app.emit(event, payload)
        .map_err(|e| format!("Failed to emit {}: {}", event, e))
}

/// Recording status: "idle" or "recording"
pub fn emit_status(app: &AppHandle, status: &str) -> Result<(), String> {
    emit(app, "recording-status", status)
}

pub fn emit_clip_saved(app: &AppHandle, event: ClipSavedEvent) -> Result<(), String> {
    emit(app, "clip-saved", event)
}

/// Announces the binding captured during bind mode
pub fn emit_binding_captured(app: &AppHandle, binding: BindingInfo) -> Result<(), String> {
    emit(app, "binding-captured", binding)
}

pub fn emit_error(app: &AppHandle, code: &str, message: &str) -> Result<(), String> {
    emit(
        app,
        "recording-error",
        ErrorEvent {
            code: code.to_string(),
            message: message.to_string(),
        },
    )
}
