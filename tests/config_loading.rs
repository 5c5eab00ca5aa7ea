use std::io::Write;

use apiflow_core::config::AppConfig;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[http]
timeout_secs = 12
user_agent = "flow-tests/1.0"
max_body_chars = 500

[run]
event_capacity = 64

[log]
filter = "apiflow=debug"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.http.timeout_secs, 12);
    assert_eq!(config.http.user_agent, "flow-tests/1.0");
    assert_eq!(config.http.max_body_chars, 500);
    assert_eq!(config.run.event_capacity, 64);
    assert_eq!(config.log.filter.as_deref(), Some("apiflow=debug"));
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("APIFLOW_TEST_USER_AGENT", "expanded-agent");

    let toml_content = r#"
[http]
user_agent = "${APIFLOW_TEST_USER_AGENT}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.http.user_agent, "expanded-agent");
    assert_eq!(config.http.timeout_secs, 30);

    std::env::remove_var("APIFLOW_TEST_USER_AGENT");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[http\ntimeout_secs = ").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(err.to_string().starts_with("Config error"));
}
