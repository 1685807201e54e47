// Screen clip recorder
//
// Owns the capture worker thread: grabs primary-monitor frames at a fixed
// rate and streams them into the MP4 encoder until told to stop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use log::{info, warn};
use thiserror::Error;
use xcap::Monitor;

use crate::encoding::{clip_duration_secs, ClipEncoder, EncodeError};

/// Give up on a clip after this many grab failures in a row
const MAX_GRAB_FAILURES: u32 = 30;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("recording already in progress")]
    AlreadyRecording,
    #[error("no recording in progress")]
    NotRecording,
    #[error("no primary monitor found")]
    NoMonitor,
    #[error("screen grab failed: {0}")]
    Capture(String),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("capture worker panicked")]
    WorkerPanic,
}

/// A finished clip on disk
#[derive(Debug)]
pub struct SavedClip {
    pub path: PathBuf,
    pub duration_ms: u64,
    pub frames: u64,
}

struct Worker {
    handle: JoinHandle<Result<u64, RecorderError>>,
    stop: Arc<AtomicBool>,
    path: PathBuf,
    fps: u32,
}

/// Records one screen clip at a time to the output folder.
pub struct ClipRecorder {
    output_dir: PathBuf,
    fps: u32,
    worker: Option<Worker>,
}

impl ClipRecorder {
    pub fn new(output_dir: PathBuf, fps: u32) -> Self {
        Self {
            output_dir,
            fps,
            worker: None,
        }
    }

    pub fn set_output_dir(&mut self, output_dir: PathBuf) {
        self.output_dir = output_dir;
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps;
    }

    pub fn is_recording(&self) -> bool {
        self.worker.is_some()
    }

    /// Start capturing to a new timestamped clip file.
    pub fn start(&mut self) -> Result<PathBuf, RecorderError> {
        if self.worker.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let path = next_clip_path(&self.output_dir, Local::now());

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let worker_path = path.clone();
        let fps = self.fps;

        let handle = thread::Builder::new()
            .name("clip-capture".into())
            .spawn(move || capture_loop(worker_path, fps, worker_stop))?;

        self.worker = Some(Worker {
            handle,
            stop,
            path: path.clone(),
            fps,
        });
        Ok(path)
    }

    /// Stop capturing, finalize the file and report what was written.
    pub fn stop(&mut self) -> Result<SavedClip, RecorderError> {
        let worker = self.worker.take().ok_or(RecorderError::NotRecording)?;
        worker.stop.store(true, Ordering::SeqCst);

        let frames = worker
            .handle
            .join()
            .map_err(|_| RecorderError::WorkerPanic)??;

        Ok(SavedClip {
            path: worker.path,
            duration_ms: (clip_duration_secs(frames, worker.fps) * 1000.0) as u64,
            frames,
        })
    }
}

fn capture_loop(path: PathBuf, fps: u32, stop: Arc<AtomicBool>) -> Result<u64, RecorderError> {
    let monitor = primary_monitor()?;

    // Size the encoder from an actual grab; on HiDPI screens the captured
    // image is in physical pixels, not the monitor's logical size
    let first = monitor
        .capture_image()
        .map_err(|err| RecorderError::Capture(err.to_string()))?;
    let (width, height) = (first.width(), first.height());
    info!("capturing {}x{} @ {} fps", width, height, fps);

    let mut encoder = ClipEncoder::create(&path, width, height, fps)?;
    encoder.write_frame(first.as_raw())?;

    let frame_time = Duration::from_secs_f64(1.0 / fps as f64);
    let mut last_frame = Instant::now();
    let mut grab_failures = 0u32;

    while !stop.load(Ordering::SeqCst) {
        if last_frame.elapsed() >= frame_time {
            last_frame = Instant::now();

            match monitor.capture_image() {
                Ok(image) => {
                    grab_failures = 0;
                    if (image.width(), image.height()) != (width, height) {
                        // Resolution changed mid-clip; hold the last frame
                        warn!(
                            "frame size changed to {}x{}, skipping",
                            image.width(),
                            image.height()
                        );
                    } else {
                        encoder.write_frame(image.as_raw())?;
                    }
                }
                Err(err) => {
                    grab_failures += 1;
                    warn!("screen grab failed: {}", err);
                    if grab_failures >= MAX_GRAB_FAILURES {
                        // Finalize what we have so the partial clip plays
                        let _ = encoder.finish();
                        return Err(RecorderError::Capture(err.to_string()));
                    }
                }
            }
        }

        // Sleep off the remainder of this frame's slot
        let remaining = frame_time.saturating_sub(last_frame.elapsed());
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
    }

    let frames = encoder.frames_written();
    encoder.finish()?;
    Ok(frames)
}

fn primary_monitor() -> Result<Monitor, RecorderError> {
    let monitors = Monitor::all().map_err(|err| RecorderError::Capture(err.to_string()))?;
    monitors
        .into_iter()
        .find(|monitor| monitor.is_primary())
        .ok_or(RecorderError::NoMonitor)
}

/// Timestamped clip path, e.g. `clip_20240102_030405.mp4`; a numeric suffix
/// keeps clips started within the same second apart.
fn next_clip_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = format!("clip_{}", now.format("%Y%m%d_%H%M%S"));
    let mut path = dir.join(format!("{}.mp4", stem));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{}_{}.mp4", stem, n));
        n += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "clip-tracker-test-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn clip_names_are_timestamped() {
        let dir = test_dir("names");
        let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = next_clip_path(&dir, now);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "clip_20240102_030405.mp4"
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn clip_names_get_a_suffix_on_collision() {
        let dir = test_dir("collisions");
        let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        std::fs::write(dir.join("clip_20240102_030405.mp4"), b"x").unwrap();
        let second = next_clip_path(&dir, now);
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "clip_20240102_030405_2.mp4"
        );

        std::fs::write(&second, b"x").unwrap();
        let third = next_clip_path(&dir, now);
        assert_eq!(
            third.file_name().unwrap().to_str().unwrap(),
            "clip_20240102_030405_3.mp4"
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn stop_without_start_is_an_error() {
        let mut recorder = ClipRecorder::new(test_dir("stop"), 15);
        assert!(!recorder.is_recording());
        assert!(matches!(
            recorder.stop(),
            Err(RecorderError::NotRecording)
        ));
    }
}
