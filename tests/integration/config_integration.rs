//! Integration tests for configuration loading

use lia_context::{ConfigLoader, ContextEngine};
use tempfile::TempDir;

#[test]
fn test_project_file_is_layered_over_defaults() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("config")).unwrap();
    std::fs::write(
        temp_dir.path().join("config/lia-context.toml"),
        r#"
[builder]
max_tokens = 1500

[cache.ttl]
page_secs = 600

[incidents]
similar_limit = 5
"#,
    )
    .unwrap();

    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    assert_eq!(config.builder.max_tokens, 1500);
    assert_eq!(config.builder.min_truncation_tokens, 100);
    assert_eq!(config.cache.ttl.page_secs, 600);
    assert_eq!(config.cache.ttl.user_secs, 300);
    assert_eq!(config.incidents.similar_limit, 5);
    assert_eq!(config.incidents.table, "incident_reports");
}

#[test]
fn test_missing_project_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    assert_eq!(config.builder.max_tokens, 4000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_loaded_config_drives_engine() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("engine.toml");
    std::fs::write(
        &config_file,
        r#"
[builder]
max_tokens = 900
separator = "\n\n"

[incidents]
base_url = "https://db.example.com"
api_key = "anon-key"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    let engine = ContextEngine::init(config).unwrap();
    assert_eq!(engine.config().builder.max_tokens, 900);
    assert_eq!(engine.config().builder.separator, "\n\n");
    assert_eq!(
        engine.config().incidents.base_url.as_deref(),
        Some("https://db.example.com")
    );
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("broken.toml");
    std::fs::write(&config_file, "[builder\nmax_tokens = ").unwrap();

    let err = ConfigLoader::load_from_file(&config_file).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}
