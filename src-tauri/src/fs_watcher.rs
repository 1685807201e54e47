use notify::{Event, EventKind, RecursiveMode, Result as NotifyResult, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::channel,
    Arc,
};
use tauri::{AppHandle, Emitter};
use log::{debug, info};

/// Control handle for the clips-folder watcher
pub struct WatcherControl {
    enabled: Arc<AtomicBool>,
}

impl WatcherControl {
    /// Pause event emission (while a clip is being written)
    pub fn pause(&self) {
        info!("⏸️  Pausing clips watcher");
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Resume event emission (after the clip is finalized)
    pub fn resume(&self) {
        info!("▶️  Resuming clips watcher");
        self.enabled.store(true, Ordering::SeqCst);
    }
}

/// Start watching the clips folder and emit `clips-changed` to the frontend
/// whenever a clip file appears, changes or disappears.
///
/// Returns a WatcherControl handle to pause/resume event emission.
pub fn watch_clips_folder(app: AppHandle, clips_folder: PathBuf) -> NotifyResult<WatcherControl> {
    info!("📁 Starting clips watcher for: {:?}", clips_folder);

    let (tx, rx) = channel();

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;

    // The clips folder is flat; nothing interesting lives in subfolders
    watcher.watch(&clips_folder, RecursiveMode::NonRecursive)?;

    let enabled = Arc::new(AtomicBool::new(true));
    let enabled_clone = enabled.clone();

    std::thread::spawn(move || {
        while let Ok(event) = rx.recv() {
            if !enabled_clone.load(Ordering::SeqCst) {
                debug!("clips event received but paused: {:?}", event);
                continue;
            }

            match event.kind {
                EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_) => {
                    if event.paths.iter().any(|path| is_clip_file(path)) {
                        debug!("clip change detected: {:?}", event.paths);
                        let _ = app.emit("clips-changed", ());
                    }
                }
                _ => {}
            }
        }
    });

    // Keep watcher alive by leaking it; it runs for the lifetime of the app
    Box::leak(Box::new(watcher));

    Ok(WatcherControl { enabled })
}

/// Clips are always written as MP4
pub(crate) fn is_clip_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("mp4"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_clip_files() {
        assert!(is_clip_file(Path::new("/clips/clip_20240102_030405.mp4")));
        assert!(is_clip_file(Path::new("upper.MP4")));
        assert!(!is_clip_file(Path::new("clip_20240102_030405_thumb.jpg")));
        assert!(!is_clip_file(Path::new("notes.txt")));
        assert!(!is_clip_file(Path::new("no_extension")));
    }
}
