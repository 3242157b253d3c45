use assert_cmd::Command;

// Binary smoke tests: flags parse and headless paths exit cleanly.
// The TUI itself needs a tty and is covered by headless_integration.

#[test]
fn help_mentions_the_session_flags() {
    let output = Command::cargo_bin("drillcall")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let help = String::from_utf8(output).unwrap();
    assert!(help.contains("--duration"));
    assert!(help.contains("--min-break"));
    assert!(help.contains("--max-break"));
    assert!(help.contains("--seed"));
    assert!(help.contains("--mute"));
    assert!(help.contains("--export-history"));
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("drillcall")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn rejects_a_non_tty_stdin_without_flags() {
    // Piped stdin is not a tty; the app must refuse to start the TUI
    Command::cargo_bin("drillcall")
        .unwrap()
        .write_stdin("")
        .assert()
        .failure();
}
