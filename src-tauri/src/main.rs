// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    clip_tracker_lib::logging::init();
    clip_tracker_lib::run()
}
