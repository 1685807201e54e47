// Logger setup: stdout, wall-clock time plus the gap since the last record.
// The gap makes capture pacing problems visible at a glance.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::sync::Mutex;
use std::time::Instant;

static LAST_LOG: Mutex<Option<Instant>> = Mutex::new(None);

fn millis_since_last() -> u128 {
    let now = Instant::now();
    let mut last = LAST_LOG.lock().unwrap();
    let delta = last.map(|t| now.duration_since(t).as_millis()).unwrap_or(0);
    *last = Some(now);
    delta
}

/// Initialize logging. Defaults to info; RUST_LOG overrides.
pub fn init() {
    Builder::new()
        .target(Target::Stdout)
        .format(|buf, record| {
            use std::io::Write;

            writeln!(
                buf,
                "{} [+{} ms] {:5} {} - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                millis_since_last(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}
