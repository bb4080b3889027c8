use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use switchyard::runtime_config::{
    RuntimeConfig, DEFAULT_SLOW_MATCH_US, DEFAULT_STACK_SIZE, ENV_CONTEXT_STORAGE,
    ENV_SLOW_MATCH_US, ENV_STACK_SIZE,
};
use switchyard::PipelineBuilder;
use switchyard::Router;
use tempfile::NamedTempFile;

// Tests in this file read or write process environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn write_yaml(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_without_file_uses_defaults() {
    let _lock = ENV_LOCK.lock().unwrap();
    let config = RuntimeConfig::load(None).unwrap();
    assert_eq!(config, RuntimeConfig::default());
    assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
    assert_eq!(config.slow_match_threshold_us, DEFAULT_SLOW_MATCH_US);
    assert_eq!(config.request_id_header, "x-request-id");
}

#[test]
fn test_load_from_yaml_file() {
    let _lock = ENV_LOCK.lock().unwrap();
    let file = write_yaml(
        "context_storage: true\nslow_match_threshold_us: 250\nstack_size: \"0x10000\"\nrequest_id_header: x-trace-id\n",
    );
    let config = RuntimeConfig::load(Some(file.path())).unwrap();
    assert!(config.context_storage);
    assert_eq!(config.slow_match_threshold(), Duration::from_micros(250));
    assert_eq!(config.stack_size, 0x10000);
    assert_eq!(config.request_id_header, "x-trace-id");
}

#[test]
fn test_environment_overrides_file() {
    let _lock = ENV_LOCK.lock().unwrap();
    let file = write_yaml("context_storage: false\nslow_match_threshold_us: 250\n");

    std::env::set_var(ENV_CONTEXT_STORAGE, "true");
    std::env::set_var(ENV_SLOW_MATCH_US, "5000");
    std::env::set_var(ENV_STACK_SIZE, "not-a-size");
    let loaded = RuntimeConfig::load(Some(file.path()));
    std::env::remove_var(ENV_CONTEXT_STORAGE);
    std::env::remove_var(ENV_SLOW_MATCH_US);
    std::env::remove_var(ENV_STACK_SIZE);

    let config = loaded.unwrap();
    assert!(config.context_storage);
    assert_eq!(config.slow_match_threshold_us, 5000);
    // invalid values are ignored
    assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
}

#[test]
fn test_missing_file_is_an_error() {
    let err = RuntimeConfig::load(Some(std::path::Path::new("/definitely/not/here.yaml")))
        .unwrap_err();
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn test_malformed_yaml_is_an_error() {
    assert!(RuntimeConfig::from_yaml_str("stack_size: [1, 2]").is_err());
    assert!(RuntimeConfig::from_yaml_str("slow_match_threshold_us: soon").is_err());
}

#[test]
fn test_config_enables_context_storage_at_freeze() {
    let config = RuntimeConfig::from_yaml_str("context_storage: true").unwrap();
    let pipeline = PipelineBuilder::new(Router::new()).with_config(config).freeze();
    assert!(pipeline.context_storage().is_some());
    assert!(pipeline.config().context_storage);
}
