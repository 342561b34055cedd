use anyhow::Result;
use voicegate::audio::CpalHost;

/// Device names for `--list-input-devices`. `VOICEGATE_TEST_DEVICES` (comma
/// separated) replaces the real scan so the listing can be tested headless.
fn input_device_names() -> Vec<String> {
    match std::env::var("VOICEGATE_TEST_DEVICES") {
        Ok(raw) => parse_device_list(&raw),
        Err(_) => CpalHost::list_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        }),
    }
}

fn parse_device_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn list_input_devices() -> Result<()> {
    let devices = input_device_names();
    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}
