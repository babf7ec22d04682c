use hearth_kernel::config::{HubConfig, load_config, load_config_or_defaults};
use std::fs;
use tempfile::tempdir;

#[test]
fn defaults_are_sane_without_a_file() {
    let dir = tempdir().expect("temp dir");
    let cfg: HubConfig =
        load_config_or_defaults(Some(dir.path().join("missing.toml"))).expect("defaults");

    assert_eq!(cfg.log.name, "hearthd");
    assert_eq!(cfg.bus.startup_timeout_ms, 30_000);
    assert_eq!(cfg.bus.subscription_lifetime_ms, 600_000);
    assert_eq!(cfg.bus.command_timeout_ms, 3_000);
}

#[test]
fn required_file_must_exist() {
    let dir = tempdir().expect("temp dir");
    let result: Result<HubConfig, _> = load_config(Some(dir.path().join("missing.toml")));
    assert!(result.is_err());
}

#[test]
fn toml_file_overrides_defaults() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("hub.toml");
    fs::write(
        &path,
        r#"
[log]
level = "debug"

[bus]
startup_timeout_ms = 0
subscription_lifetime_ms = 1500
"#,
    )
    .expect("write config");

    let cfg: HubConfig = load_config(Some(&path)).expect("config");
    assert_eq!(cfg.log.level, "debug");
    assert_eq!(cfg.bus.startup_timeout_ms, 0);
    assert_eq!(cfg.bus.subscription_lifetime_ms, 1500);
    assert_eq!(cfg.bus.pull_timeout_ms, 1_000, "untouched keys keep their defaults");
    assert!(cfg.bus.startup_timeout().is_zero());
}

#[test]
fn malformed_values_are_rejected() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("hub.toml");
    fs::write(&path, "[bus]\nstartup_timeout_ms = \"soon\"\n").expect("write config");

    let result: Result<HubConfig, _> = load_config(Some(&path));
    assert!(result.is_err());
}
