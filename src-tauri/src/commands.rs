use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use input_monitor::InputSource;
use log::{info, warn};
use tauri::{AppHandle, State};

use crate::events::BindingInfo;
use crate::state::AppState;

#[derive(serde::Serialize)]
pub struct ClipInfo {
    pub filename: String,
    pub path: String,
    pub size: u64,
    pub created: u64,
    pub modified: u64,
    pub thumbnail_path: Option<String>,
}

#[derive(serde::Serialize)]
pub struct RecorderStatus {
    pub state: String, // "idle" | "recording"
    pub monitoring: bool,
    pub binding: Option<BindingInfo>,
}

/// Get current output folder
#[tauri::command]
pub fn get_output_folder(state: State<AppState>) -> Result<String, String> {
    let folder = state.output_folder.lock().unwrap();
    Ok(folder.to_string_lossy().to_string())
}

/// Set the output folder for clips and re-point the clips watcher at it
#[tauri::command]
pub fn set_output_folder(
    path: String,
    app: AppHandle,
    state: State<AppState>,
) -> Result<(), String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        std::fs::create_dir_all(&path_buf)
            .map_err(|e| format!("Failed to create directory: {}", e))?;
    }

    *state.output_folder.lock().unwrap() = path_buf.clone();

    // Silence the watcher on the old folder before replacing it
    if let Some(old) = state.watcher_control.lock().unwrap().take() {
        old.pause();
    }
    match crate::fs_watcher::watch_clips_folder(app, path_buf) {
        Ok(control) => {
            *state.watcher_control.lock().unwrap() = Some(control);
        }
        Err(e) => warn!("⚠️  Failed to watch new clips folder: {}", e),
    }

    Ok(())
}

/// Bind the trigger to the next pressed input of the given source; the
/// result arrives as a `binding-captured` event
#[tauri::command]
pub fn capture_binding(source: InputSource, state: State<AppState>) -> Result<(), String> {
    let controller = state.controller.lock().unwrap();
    let controller = controller
        .as_ref()
        .ok_or_else(|| "Input monitoring is not running".to_string())?;
    controller.capture_binding(source);
    Ok(())
}

/// Current trigger binding, if any
#[tauri::command]
pub fn get_binding(state: State<AppState>) -> Result<Option<BindingInfo>, String> {
    let controller = state.controller.lock().unwrap();
    Ok(controller
        .as_ref()
        .and_then(|c| c.binding())
        .map(|b| BindingInfo::from(&b)))
}

/// Forget the trigger binding
#[tauri::command]
pub fn clear_binding(state: State<AppState>) -> Result<(), String> {
    let controller = state.controller.lock().unwrap();
    let controller = controller
        .as_ref()
        .ok_or_else(|| "Input monitoring is not running".to_string())?;
    controller.clear_binding();
    Ok(())
}

/// Pause or resume reacting to global input
#[tauri::command]
pub fn set_monitoring(enabled: bool, state: State<AppState>) -> Result<(), String> {
    let controller = state.controller.lock().unwrap();
    let controller = controller
        .as_ref()
        .ok_or_else(|| "Input monitoring is not running".to_string())?;
    controller.set_monitoring(enabled);
    Ok(())
}

/// Recording/monitoring/binding state in one call
#[tauri::command]
pub fn get_recorder_status(state: State<AppState>) -> Result<RecorderStatus, String> {
    let controller = state.controller.lock().unwrap();
    let (recording, monitoring, binding) = controller
        .as_ref()
        .map(|c| (c.is_recording(), c.is_monitoring(), c.binding()))
        .unwrap_or((false, false, None));

    Ok(RecorderStatus {
        state: if recording { "recording" } else { "idle" }.to_string(),
        monitoring,
        binding: binding.map(|b| BindingInfo::from(&b)),
    })
}

/// Start recording manually (same machine as the trigger path)
#[tauri::command]
pub fn start_recording(state: State<AppState>) -> Result<(), String> {
    let controller = state.controller.lock().unwrap();
    let controller = controller
        .as_ref()
        .ok_or_else(|| "Recorder is not running".to_string())?;
    controller.start_clip();
    Ok(())
}

/// Stop recording manually
#[tauri::command]
pub fn stop_recording(state: State<AppState>) -> Result<(), String> {
    let controller = state.controller.lock().unwrap();
    let controller = controller
        .as_ref()
        .ok_or_else(|| "Recorder is not running".to_string())?;
    controller.stop_clip();
    Ok(())
}

/// Seconds of bound-input quiet before a clip auto-stops
#[tauri::command]
pub fn get_idle_timeout_secs(state: State<AppState>) -> Result<u64, String> {
    Ok(*state.idle_timeout_secs.lock().unwrap())
}

#[tauri::command]
pub fn set_idle_timeout_secs(secs: u64, state: State<AppState>) -> Result<(), String> {
    if secs == 0 || secs > 3600 {
        return Err("Idle timeout must be between 1 and 3600 seconds".to_string());
    }
    *state.idle_timeout_secs.lock().unwrap() = secs;
    if let Some(controller) = state.controller.lock().unwrap().as_ref() {
        controller.set_idle_timeout(Duration::from_secs(secs));
    }
    Ok(())
}

/// Frame rate used for the next clip
#[tauri::command]
pub fn get_capture_fps(state: State<AppState>) -> Result<u32, String> {
    Ok(*state.capture_fps.lock().unwrap())
}

#[tauri::command]
pub fn set_capture_fps(fps: u32, state: State<AppState>) -> Result<(), String> {
    if fps == 0 || fps > 60 {
        return Err("Capture rate must be between 1 and 60 fps".to_string());
    }
    *state.capture_fps.lock().unwrap() = fps;
    Ok(())
}

/// List all clips in the output folder, newest first
#[tauri::command]
pub fn list_clips(state: State<AppState>) -> Result<Vec<ClipInfo>, String> {
    let folder = state.output_folder.lock().unwrap().clone();

    if !folder.exists() {
        return Ok(vec![]);
    }

    let entries =
        std::fs::read_dir(&folder).map_err(|e| format!("Failed to read clips folder: {}", e))?;

    let mut clips = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !crate::fs_watcher::is_clip_file(&path) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        clips.push(ClipInfo {
            filename: entry.file_name().to_string_lossy().to_string(),
            path: path.to_string_lossy().to_string(),
            size: metadata.len(),
            created: system_time_secs(metadata.created().ok()),
            modified: system_time_secs(metadata.modified().ok()),
            thumbnail_path: existing_thumbnail(&path),
        });
    }

    // Newest first, matching the clip grid
    clips.sort_by(|a, b| b.modified.cmp(&a.modified));

    *state.clip_count.lock().unwrap() = clips.len() as u32;

    Ok(clips)
}

/// Delete a clip (and its thumbnail) from the output folder
#[tauri::command]
pub fn delete_clip(filename: String, state: State<AppState>) -> Result<(), String> {
    if filename.contains('/') || filename.contains('\\') || filename.starts_with('.') {
        return Err("Invalid clip filename".to_string());
    }

    let folder = state.output_folder.lock().unwrap().clone();
    let file_path = folder.join(&filename);

    // Validate the path is within the output folder
    if !file_path.starts_with(&folder) {
        return Err("Invalid file path".to_string());
    }

    if file_path.exists() {
        std::fs::remove_file(&file_path).map_err(|e| format!("Failed to delete file: {}", e))?;

        if let Some(thumbnail) = existing_thumbnail(&file_path) {
            let _ = std::fs::remove_file(&thumbnail);
        }

        let mut count = state.clip_count.lock().unwrap();
        *count = count.saturating_sub(1);

        info!("🗑️ Deleted clip: {}", filename);
    }

    Ok(())
}

/// Generate a thumbnail for a clip using the FFmpeg CLI
#[tauri::command]
pub fn generate_thumbnail(video_path: String) -> Result<String, String> {
    generate_thumbnail_internal(&video_path)
}

/// Internal thumbnail generation (also run automatically after each clip)
pub(crate) fn generate_thumbnail_internal(video_path: &str) -> Result<String, String> {
    let video_file = PathBuf::from(video_path);

    if !video_file.exists() {
        return Err("Video file does not exist".to_string());
    }

    let thumbnail_name = video_file
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| format!("{}_thumb.jpg", s))
        .ok_or("Invalid video filename")?;

    let thumbnail_path = video_file
        .parent()
        .ok_or("Invalid video path")?
        .join(&thumbnail_name);
    let thumbnail = thumbnail_path.to_string_lossy();

    // Probe for duration so the thumbnail comes from the middle of the clip
    let center_time = match std::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
            video_path,
        ])
        .output()
    {
        Ok(result) if result.status.success() => String::from_utf8_lossy(&result.stdout)
            .trim()
            .parse::<f64>()
            .map(|duration| (duration / 2.0).to_string())
            .unwrap_or_else(|_| "0.1".to_string()),
        _ => "0.1".to_string(),
    };

    let output = std::process::Command::new("ffmpeg")
        .args([
            "-i", video_path, "-ss", &center_time, "-vframes", "1", "-vf", "scale=320:240", "-f",
            "image2", "-y", &thumbnail,
        ])
        .output()
        .map_err(|e| {
            format!(
                "Failed to run FFmpeg: {}. Make sure FFmpeg is installed and in PATH.",
                e
            )
        })?;

    if output.status.success() {
        info!("🖼️ Generated thumbnail: {}", thumbnail);
        return Ok(thumbnail.to_string());
    }
    warn!(
        "FFmpeg thumbnail failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // Plain size flag as a fallback for older builds
    let fallback = std::process::Command::new("ffmpeg")
        .args([
            "-i", video_path, "-ss", &center_time, "-vframes", "1", "-s", "320x240", "-y",
            &thumbnail,
        ])
        .output()
        .map_err(|e| format!("Failed to run FFmpeg: {}", e))?;

    if fallback.status.success() {
        info!("🖼️ Generated thumbnail (fallback): {}", thumbnail);
        Ok(thumbnail.to_string())
    } else {
        Err(format!(
            "FFmpeg thumbnail failed: {}",
            String::from_utf8_lossy(&fallback.stderr)
        ))
    }
}

/// Read a thumbnail file and return it as base64
#[tauri::command]
pub fn read_thumbnail_file(file_path: String) -> Result<String, String> {
    use base64::{engine::general_purpose, Engine as _};

    let file_data = std::fs::read(&file_path)
        .map_err(|e| format!("Failed to read file {}: {}", file_path, e))?;

    Ok(general_purpose::STANDARD.encode(&file_data))
}

/// Play a clip with the system default player
#[tauri::command]
pub async fn play_clip(file_path: String) -> Result<(), String> {
    info!("🎬 Playing clip: {}", file_path);
    system_open(&file_path)
}

/// Open a folder in the system file explorer
#[tauri::command]
pub async fn open_folder(path: String) -> Result<(), String> {
    system_open(&path)
}

fn system_open(path: &str) -> Result<(), String> {
    #[cfg(target_os = "macos")]
    let result = std::process::Command::new("open").arg(path).spawn();

    #[cfg(target_os = "windows")]
    let result = std::process::Command::new("cmd")
        .args(["/C", "start", "", path])
        .spawn();

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let result = std::process::Command::new("xdg-open").arg(path).spawn();

    result
        .map(|_| ())
        .map_err(|e| format!("Failed to open {}: {}", path, e))
}

fn system_time_secs(time: Option<SystemTime>) -> u64 {
    time.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn existing_thumbnail(video: &Path) -> Option<String> {
    let thumbnail = video.with_extension("").to_string_lossy().to_string() + "_thumb.jpg";
    Path::new(&thumbnail).exists().then_some(thumbnail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_lives_next_to_the_clip() {
        // No file on disk -> no thumbnail reported
        assert_eq!(existing_thumbnail(Path::new("/nowhere/clip_x.mp4")), None);
    }

    #[test]
    fn missing_file_times_fall_back_to_zero() {
        assert_eq!(system_time_secs(None), 0);
        assert!(system_time_secs(Some(SystemTime::now())) > 0);
    }
}
