// Configuration loading tests

use std::io::Write;

use kagami::config::{Config, ConfigError};
use kagami::logging::LogFormat;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

// Test: Config loads from a YAML file on disk
#[test]
fn test_loads_config_from_file() {
    let file = write_config(
        r#"
server:
  port: 9090
storage:
  public_dir: ./assets
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.storage.public_dir.to_str(), Some("./assets"));
    assert_eq!(config.storage.cache_dir.to_str(), Some("./cache"));
    assert!(config.validate().is_ok());
}

// Test: Logging section is optional and defaults to JSON at info
#[test]
fn test_logging_defaults() {
    let config = Config::from_yaml_with_env("server:\n  port: 3000\n").unwrap();
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Json);
}

// Test: Port 0 is rejected by validation
#[test]
fn test_rejects_port_zero() {
    let config = Config::from_yaml_with_env("server:\n  port: 0\n").unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

// Test: Out-of-range quality is rejected by validation
#[test]
fn test_rejects_quality_out_of_range() {
    for quality in ["0", "101"] {
        let yaml = format!("transform:\n  default_quality: {}\n", quality);
        let config = Config::from_yaml_with_env(&yaml).unwrap();
        assert!(
            config.validate().is_err(),
            "quality {} should be rejected",
            quality
        );
    }
}

// Test: Empty bucket name is rejected
#[test]
fn test_rejects_empty_bucket() {
    let yaml = r#"
storage:
  cloud:
    bucket: ""
    region: us-east-1
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();
    assert!(config.is_cloud_mode());
    assert!(config.validate().is_err());
}

// Test: Unknown log level is rejected
#[test]
fn test_rejects_bad_log_level() {
    let config = Config::from_yaml_with_env("logging:\n  level: \"kagami=verbose\"\n").unwrap();
    assert!(config.validate().is_err());
}

// Test: Variables are substituted anywhere in the document
#[test]
fn test_env_substitution_in_numbers() {
    std::env::set_var("KAGAMI_UNIT_PORT", "4100");
    let config = Config::from_yaml_with_env("server:\n  port: ${KAGAMI_UNIT_PORT}\n").unwrap();
    assert_eq!(config.server.port, 4100);
}

// Test: Unknown format value fails to parse
#[test]
fn test_unknown_log_format_is_parse_error() {
    let err = Config::from_yaml_with_env("logging:\n  format: xml\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

// Test: The shipped example configuration loads and validates
#[test]
fn test_example_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.yaml");
    let config = Config::from_file(path).unwrap();
    assert!(config.validate().is_ok());
    assert!(!config.is_cloud_mode());
}
