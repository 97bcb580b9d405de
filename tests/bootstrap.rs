use std::io::Write;

use fleetview::application::error::AppError;
use fleetview::config::{self, LoadError};
use fleetview::infra::bootstrap;
use fleetview::infra::error::InfraError;
use serial_test::serial;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
#[serial]
fn environment_overrides_file_values() {
    let file = config_file("[cache]\nenabled = true\nunique_identifier = \"uuid\"\n");

    // SAFETY: tests touching the environment are serialized.
    unsafe { std::env::set_var("FLEETVIEW__CACHE__ENABLED", "false") };
    let settings = config::load(Some(file.path()));
    unsafe { std::env::remove_var("FLEETVIEW__CACHE__ENABLED") };

    let settings = settings.expect("settings load");
    assert!(!settings.cache.enabled);
    assert_eq!(settings.cache.unique_identifier, "uuid");
}

#[test]
#[serial]
fn invalid_settings_fail_before_telemetry() {
    let file = config_file("[cache]\nall_key = \"\"\n");

    let err = bootstrap::init(Some(file.path())).expect_err("empty all_key is invalid");
    assert!(matches!(
        err,
        AppError::Config(LoadError::Invalid {
            key: "cache.all_key",
            ..
        })
    ));
    bootstrap::report_error(&err);
}

#[test]
#[serial]
fn init_builds_a_configured_registry_once() {
    let file = config_file("[logging]\nlevel = \"debug\"\n\n[cache]\nenabled = false\n");

    let registry = bootstrap::init(Some(file.path())).expect("bootstrap");
    assert!(!registry.config().enabled);
    assert_eq!(registry.config().all_key, "__all__");

    let err = bootstrap::init(Some(file.path())).expect_err("subscriber already installed");
    assert!(matches!(err, AppError::Infra(InfraError::Telemetry(_))));
    bootstrap::report_error(&err);
}
