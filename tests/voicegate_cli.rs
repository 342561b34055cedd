use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn voicegate_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_voicegate").expect("voicegate test binary not built")
}

#[test]
fn voicegate_help_lists_gate_flags() {
    let output = Command::new(voicegate_bin())
        .arg("--help")
        .output()
        .expect("run voicegate --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("VoiceGate"));
    assert!(combined.contains("--threshold-db"));
    assert!(combined.contains("--release-s"));
}

#[test]
fn voicegate_list_input_devices_uses_test_override() {
    let output = Command::new(voicegate_bin())
        .arg("--list-input-devices")
        .env("VOICEGATE_TEST_DEVICES", "Desk Mic, Headset")
        .output()
        .expect("run voicegate --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Available audio input devices:"));
    assert!(combined.contains("  - Desk Mic"));
    assert!(combined.contains("  - Headset"));
}

#[test]
fn voicegate_list_input_devices_reports_none() {
    let output = Command::new(voicegate_bin())
        .arg("--list-input-devices")
        .env("VOICEGATE_TEST_DEVICES", "")
        .output()
        .expect("run voicegate --list-input-devices");
    assert!(output.status.success());
    assert!(combined_output(&output).contains("No audio input devices detected."));
}

#[test]
fn voicegate_rejects_out_of_range_threshold() {
    let output = Command::new(voicegate_bin())
        .args(["--threshold-db", "-90", "--no-logs"])
        .output()
        .expect("run voicegate with a bad threshold");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--threshold-db must be between"));
}

#[test]
fn voicegate_rejects_unknown_flag() {
    let output = Command::new(voicegate_bin())
        .arg("--not-a-flag")
        .output()
        .expect("run voicegate with an unknown flag");
    assert!(!output.status.success());
}
