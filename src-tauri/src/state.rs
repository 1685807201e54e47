use std::path::PathBuf;
use std::sync::Mutex;

use crate::fs_watcher::WatcherControl;
use crate::trigger::TriggerHandle;

/// Frames per second grabbed from the screen while a clip is recording
pub const DEFAULT_CAPTURE_FPS: u32 = 15;

/// Seconds of bound-input inactivity before a clip is stopped
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 10;

/// Application state for managing recording settings
pub struct AppState {
    pub output_folder: Mutex<PathBuf>,
    pub capture_fps: Mutex<u32>,
    pub idle_timeout_secs: Mutex<u64>,
    pub clip_count: Mutex<u32>,
    pub controller: Mutex<Option<TriggerHandle>>,
    pub watcher_control: Mutex<Option<WatcherControl>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            output_folder: Mutex::new(default_clips_folder()),
            capture_fps: Mutex::new(DEFAULT_CAPTURE_FPS),
            idle_timeout_secs: Mutex::new(DEFAULT_IDLE_TIMEOUT_SECS),
            clip_count: Mutex::new(0),
            controller: Mutex::new(None),
            watcher_control: Mutex::new(None),
        }
    }
}

/// Platform default: the user's video directory, "ClipTracker" inside it.
fn default_clips_folder() -> PathBuf {
    let videos = if cfg!(target_os = "macos") {
        "Movies"
    } else {
        "Videos"
    };
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(videos)
        .join("ClipTracker")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_folder_ends_with_clip_tracker() {
        assert!(default_clips_folder().ends_with("ClipTracker"));
    }
}
