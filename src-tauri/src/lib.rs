mod commands;
mod encoding;
mod events;
mod fs_watcher;
mod recorder;
mod state;
mod trigger;

pub mod logging;

use log::{info, warn};
use state::AppState;
use tauri::Manager;

pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .manage(AppState::new())
        .invoke_handler(tauri::generate_handler![
            commands::get_output_folder,
            commands::set_output_folder,
            commands::capture_binding,
            commands::get_binding,
            commands::clear_binding,
            commands::set_monitoring,
            commands::get_recorder_status,
            commands::start_recording,
            commands::stop_recording,
            commands::get_idle_timeout_secs,
            commands::set_idle_timeout_secs,
            commands::get_capture_fps,
            commands::set_capture_fps,
            commands::list_clips,
            commands::delete_clip,
            commands::generate_thumbnail,
            commands::read_thumbnail_file,
            commands::play_clip,
            commands::open_folder,
        ])
        .setup(|app| {
            let state = app.state::<AppState>();
            let output_folder = {
                let folder = state.output_folder.lock().unwrap();
                folder.clone()
            };

            // Ensure the clips folder exists
            if !output_folder.exists() {
                info!("📁 Creating clips folder: {:?}", output_folder);
                if let Err(e) = std::fs::create_dir_all(&output_folder) {
                    warn!("⚠️  Failed to create clips folder: {}", e);
                }
            }

            // Watch the clips folder so the library view stays current
            match fs_watcher::watch_clips_folder(app.handle().clone(), output_folder) {
                Ok(control) => {
                    *state.watcher_control.lock().unwrap() = Some(control);
                }
                Err(e) => warn!("⚠️  Failed to start clips watcher: {}", e),
            }

            // Global input monitor + recording trigger controller
            match trigger::spawn(app.handle().clone()) {
                Ok(handle) => {
                    *state.controller.lock().unwrap() = Some(handle);
                    info!("✅ Trigger controller running");
                }
                Err(e) => {
                    warn!("⚠️  Global input monitoring unavailable: {}", e);
                }
            }

            Ok(())
        })
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::CloseRequested { .. } = event {
                // Finalize any in-flight clip before the process goes away
                let state = window.app_handle().state::<AppState>();
                if let Some(controller) = state.controller.lock().unwrap().take() {
                    controller.shutdown();
                }
            }
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
