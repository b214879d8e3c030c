use std::fs;
use std::path::Path;

use assert_cmd::Command; // Bring Command into scope
use predicates::prelude::*; // Bring predicate traits into scope
use tempfile::TempDir;

fn talkie(config: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("talkie")?;
    cmd.arg("--config").arg(config);
    Ok(cmd)
}

fn write_plugin_default(root: &Path, plugin: &str, body: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dir = root.join("plugins").join("default");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(format!("{}.json", plugin)), body)?;
    Ok(())
}

#[test]
fn test_ping_command() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("talkie")?;
    cmd.arg("--ping");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("pong"));

    Ok(())
}

#[test]
fn test_no_args_runs_normally() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;

    talkie(config.path())?
        .assert()
        .success()
        .stdout(predicate::str::contains("Initializing application..."))
        .stdout(predicate::str::contains("All plugins initialized."))
        .stdout(predicate::str::contains("Transmitted 3 frame(s)"))
        .stdout(predicate::str::contains("Shutting down application..."))
        .stdout(predicate::str::contains("pong").not());

    Ok(())
}

#[test]
fn test_run_sends_requested_frames() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;

    talkie(config.path())?
        .args(["run", "--frames", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transmitted 5 frame(s)"));

    Ok(())
}

#[test]
fn test_plugins_list() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;

    talkie(config.path())?
        .args(["plugins", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Listing registered plugins:"))
        .stdout(predicate::str::contains("Name: bluetooth"))
        .stdout(predicate::str::contains("Name: wifi-direct"))
        .stdout(predicate::str::contains("Name: session"))
        .stdout(predicate::str::contains("Name: ptt"))
        .stdout(predicate::str::contains("All plugins initialized.").not());

    Ok(())
}

#[test]
fn test_plugins_plan_shows_suppliers() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;

    talkie(config.path())?
        .args(["plugins", "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wiring plan:"))
        .stdout(predicate::str::contains("session requires all of 'talkie.transport': resolved by [bluetooth, wifi-direct]"))
        .stdout(predicate::str::contains("ptt requires 'talkie.session': resolved by [session]"));

    Ok(())
}

#[test]
fn test_dedicated_transport_is_announced() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;

    talkie(config.path())?
        .args(["--transport", "bluetooth"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Announced on bluetooth"));

    Ok(())
}

#[test]
fn test_unknown_dedicated_transport_is_ambiguous() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;

    talkie(config.path())?
        .args(["--transport", "carrier-pigeon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("talkie.transport"));

    Ok(())
}

#[test]
fn test_bad_audio_config_fails_initialization() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;
    write_plugin_default(config.path(), "audio", r#"{ "sample_rate": 44100 }"#)?;

    talkie(config.path())?
        .assert()
        .failure()
        .stdout(predicate::str::contains("Shutting down application..."))
        .stderr(predicate::str::contains("Unsupported sample rate 44100 Hz"));

    Ok(())
}

#[test]
fn test_background_post_initialization() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;

    talkie(config.path())?
        .args(["--background", "--transport", "wifi-direct"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Announced on wifi-direct"))
        .stdout(predicate::str::contains("Transmitted 3 frame(s)"));

    Ok(())
}

#[test]
fn test_native_stack_failure_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;
    write_plugin_default(config.path(), "bluetooth", r#"{ "native_stack": true }"#)?;

    talkie(config.path())?
        .assert()
        .failure()
        .stderr(predicate::str::contains("bluetooth"));

    Ok(())
}

#[test]
fn test_under_test_setting_swallows_native_stack_failure() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;
    write_plugin_default(config.path(), "bluetooth", r#"{ "native_stack": true }"#)?;
    fs::write(config.path().join("talkie.json"), r#"{ "plugin_manager": { "under_test": true } }"#)?;

    talkie(config.path())?
        .assert()
        .success()
        .stdout(predicate::str::contains("Transmitted 3 frame(s)"));

    Ok(())
}

#[test]
fn test_plugins_config_lists_options_without_writing() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;

    talkie(config.path())?
        .args(["plugins", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default configuration files: none"))
        .stdout(predicate::str::contains("User configuration files: none"))
        .stdout(predicate::str::contains("audio: channels, frame_ms, sample_rate"))
        .stdout(predicate::str::contains("bluetooth: max_frame_size, native_stack"))
        .stdout(predicate::str::contains("saved").not());
    assert!(!config.path().join("plugins").exists());

    Ok(())
}

#[test]
fn test_plugins_config_save_writes_missing_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let config = TempDir::new()?;
    write_plugin_default(config.path(), "audio", r#"{ "sample_rate": 8000 }"#)?;

    talkie(config.path())?
        .args(["plugins", "config", "--save"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kept existing defaults"))
        .stdout(predicate::str::contains("saved"));

    let defaults = config.path().join("plugins").join("default");
    assert!(defaults.join("bluetooth.json").is_file());
    assert!(defaults.join("core-logging.json").is_file());
    assert!(!defaults.join("session.json").exists());
    assert_eq!(fs::read_to_string(defaults.join("audio.json"))?, r#"{ "sample_rate": 8000 }"#);

    talkie(config.path())?
        .args(["plugins", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Default configuration files: audio, bluetooth, core-logging, wifi-direct",
        ));

    talkie(config.path())?.assert().success();

    Ok(())
}
