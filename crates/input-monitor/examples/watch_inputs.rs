// Print every global input press for ten seconds
//
// Requires access to the OS input hooks (on Linux: a display server, and a
// gamepad needs evdev/udev access).

use input_monitor::InputMonitor;
use std::time::Duration;

fn main() -> Result<(), input_monitor::MonitorError> {
    let monitor = InputMonitor::start(|event| {
        println!("{:?} -> {}", event.source(), event.label());
    })?;

    println!("listening... press keys, mouse or gamepad buttons");
    std::thread::sleep(Duration::from_secs(10));

    drop(monitor);
    Ok(())
}
