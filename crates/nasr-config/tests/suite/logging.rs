use nasr_config::{init_tracing, LoggingConfig, NasrConfig};

#[test]
fn logging_section_parses() {
    let text = r#"
[logging]
level = "nasr.cache=trace,warn"
json = true
stderr = false
"#;
    let config = NasrConfig::load_from_str(text).unwrap();
    assert_eq!(config.logging.level, "nasr.cache=trace,warn");
    assert!(config.logging.json);
    assert!(!config.logging.stderr);
    assert!(config.logging.file.is_none());
}

#[test]
fn init_tracing_installs_once() {
    let tmp = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        stderr: false,
        file: Some(tmp.path().join("nasr.log")),
        ..LoggingConfig::default()
    };

    let first = init_tracing(&config);
    assert!(!init_tracing(&config), "second call must be a no-op");
    if first && std::env::var_os("RUST_LOG").is_none() {
        tracing::info!(target: "nasr.config", "written to the log file");
        let text = std::fs::read_to_string(tmp.path().join("nasr.log")).unwrap();
        assert!(text.contains("written to the log file"));
    }
}
