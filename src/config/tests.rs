use super::*;
use serial_test::serial;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const CATALOG_VARS: [&str; 4] = [
    "CATALOG_BROKER__URI",
    "CATALOG_BROKER__REQUEST_TIMEOUT_MS",
    "CATALOG_STORE__PATH",
    "CATALOG_LOGGING__LEVEL",
];

fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
    CATALOG_VARS.iter().map(|k| (*k, None)).collect()
}

fn missing_file(tmp: &TempDir) -> String {
    tmp.path().join("absent").to_string_lossy().into_owned()
}

#[test]
fn default_logging_level_is_info() {
    assert_eq!(LoggingSettings::default().level, "info");
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let toml = r#"
        [broker]
        uri = "amqp://broker.internal:5672"
        request_timeout_ms = 250

        [store]
        path = "/var/lib/catalog"

        [logging]
        level = "debug"
    "#;
    fs::write(tmp.path().join("default.toml"), toml).expect("write config file");
    let base = tmp.path().join("default").to_string_lossy().into_owned();

    let cfg = temp_env::with_vars(cleared(), || load_config_from(&base)).expect("load config");
    assert_eq!(cfg.broker.uri, "amqp://broker.internal:5672");
    assert_eq!(cfg.broker.request_timeout(), Duration::from_millis(250));
    assert_eq!(cfg.store.path, "/var/lib/catalog");
    assert_eq!(cfg.logging.level, "debug");
}

#[test]
#[serial]
fn environment_supplies_required_values_and_defaults_fill_the_rest() {
    let tmp = TempDir::new().expect("create tempdir");
    let file = missing_file(&tmp);
    let mut vars = cleared();
    vars[0].1 = Some("amqp://localhost:5672");
    vars[2].1 = Some("catalog_db");

    let cfg = temp_env::with_vars(vars, || load_config_from(&file)).expect("load config");
    assert_eq!(cfg.broker.uri, "amqp://localhost:5672");
    assert_eq!(cfg.broker.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
    assert_eq!(cfg.store.path, "catalog_db");
    assert_eq!(cfg.logging.level, DEFAULT_LOG_LEVEL);
}

#[test]
#[serial]
fn numeric_environment_values_are_parsed() {
    let tmp = TempDir::new().expect("create tempdir");
    let file = missing_file(&tmp);
    let mut vars = cleared();
    vars[0].1 = Some("amqp://localhost:5672");
    vars[1].1 = Some("1500");
    vars[2].1 = Some("catalog_db");

    let cfg = temp_env::with_vars(vars, || load_config_from(&file)).expect("load config");
    assert_eq!(cfg.broker.request_timeout_ms, 1500);
}

#[test]
#[serial]
fn missing_broker_uri_is_fatal() {
    let tmp = TempDir::new().expect("create tempdir");
    let file = missing_file(&tmp);
    let mut vars = cleared();
    vars[2].1 = Some("catalog_db");

    let err = temp_env::with_vars(vars, || load_config_from(&file)).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(ref key) if key == "broker.uri"));
}

#[test]
#[serial]
fn missing_store_path_is_fatal() {
    let tmp = TempDir::new().expect("create tempdir");
    let file = missing_file(&tmp);
    let mut vars = cleared();
    vars[0].1 = Some("amqp://localhost:5672");

    let err = temp_env::with_vars(vars, || load_config_from(&file)).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(ref key) if key == "store.path"));
}
