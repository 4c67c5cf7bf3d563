use nasr_config::{ConfigError, NasrConfig, NASR_CACHE_DIR_ENV_VAR};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

#[test]
fn empty_document_yields_defaults() {
    let config = NasrConfig::load_from_str("").unwrap();
    assert_eq!(config, NasrConfig::default());

    assert_eq!(config.cache.root, PathBuf::from(".nasr/cache"));
    assert!(config.cache.use_existing);
    assert_eq!(config.cache.ttl_days, 28);
    assert_eq!(config.cache.airports.capacity.get(), 10);
    assert_eq!(config.cache.runways.capacity.get(), 50);
    assert_eq!(config.cache.airports.version, 1);
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.stderr);
}

#[test]
fn partial_store_settings_keep_the_default_version() {
    let text = r#"
[cache]
root = "/var/cache/nasr"
use_existing = false
ttl_days = 56

[cache.runways]
capacity = 200
"#;
    let config = NasrConfig::load_from_str(text).unwrap();

    assert_eq!(config.cache.root, PathBuf::from("/var/cache/nasr"));
    assert!(!config.cache.use_existing);
    assert_eq!(config.cache.ttl().as_secs(), 56 * 24 * 60 * 60);
    assert_eq!(config.cache.runways.capacity.get(), 200);
    assert_eq!(config.cache.runways.version, 1);
    assert_eq!(config.cache.airport_dir(), PathBuf::from("/var/cache/nasr/apt"));
    assert_eq!(config.cache.runway_dir(), PathBuf::from("/var/cache/nasr/rwy"));
}

#[test]
fn zero_capacity_is_rejected() {
    let text = "[cache.airports]\ncapacity = 0\n";
    assert!(matches!(
        NasrConfig::load_from_str(text),
        Err(ConfigError::Toml(_))
    ));
}

#[test]
fn unknown_keys_are_rejected() {
    let err = NasrConfig::load_from_str("[cache]\nsize = 3\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(ref message) if message.contains("size")));
}

#[test]
fn zero_ttl_is_invalid() {
    match NasrConfig::load_from_str("[cache]\nttl_days = 0\n").unwrap_err() {
        ConfigError::Invalid { field, .. } => assert_eq!(field, "cache.ttl_days"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn relative_root_is_resolved_against_the_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nasr.toml");
    std::fs::write(&path, "[cache]\nroot = \"data/cache\"\n").unwrap();

    let config = NasrConfig::load_from_path(&path).unwrap();
    assert_eq!(config.cache.root, tmp.path().join("data/cache"));
}

#[test]
fn missing_file_is_an_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = NasrConfig::load_from_path(tmp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn cache_dir_override_replaces_the_root() {
    let config = NasrConfig::default().with_overrides_from(|name| {
        (name == NASR_CACHE_DIR_ENV_VAR).then(|| "/tmp/override".to_string())
    });
    assert_eq!(config.cache.root, PathBuf::from("/tmp/override"));

    let untouched = NasrConfig::default().with_overrides_from(|_| Some("  ".to_string()));
    assert_eq!(untouched.cache.root, PathBuf::from(".nasr/cache"));
}
