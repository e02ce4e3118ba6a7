use std::{env, fs};

use starfish_server::StorageBackend;
use starfish_server::config::loader::load_config;
use starfish_sync::{CmSource, RegistryMode};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("starfish.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081

[storage]
backend = "memory"

[remote]
base_url = "http://pbx.example.com/ProvisioningWebService/sps/v1"
username = "svc"
password = "hunter2"

[registry]
mode = "static"
sites = ["NYC", "LON"]

[sync]
cm_source = "static"
station_ids = "1000, 1001"
server_names = "CM1"

[schedule.resources]
interval_secs = 3600
initial_delay_secs = 60

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses; unspecified sections keep their defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.api_prefix, "/ProvisioningWebService/sps/v1");
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    assert_eq!(cfg.remote.username, "svc");
    assert_eq!(cfg.registry.mode, RegistryMode::Static);
    assert_eq!(cfg.registry.sites, vec!["NYC", "LON"]);
    assert_eq!(cfg.sync.cm_source, CmSource::Static);
    assert_eq!(cfg.sync.server_names(), vec!["CM1"]);
    assert_eq!(cfg.sync.huntgroup_ids, "2000,2001,2002");
    assert_eq!(cfg.schedule.resources.interval_secs, 3600);
    assert_eq!(cfg.schedule.resources.initial_delay_secs, 60);
    assert_eq!(cfg.schedule.sites.interval_secs, 86_400);
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("STARFISH__SYNC__MAX_CONCURRENT_REQUESTS", "9");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.sync.max_concurrent_requests, 9);
    unsafe {
        env::remove_var("STARFISH__SYNC__MAX_CONCURRENT_REQUESTS");
    }

    // 3) An HTTP registry without a URL is rejected
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[storage]
backend = "memory"

[registry]
mode = "http"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.to_string().contains("registry.url is required"));
}

#[test]
fn unknown_backend_is_a_deserialize_error() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[storage]\nbackend = \"sqlite\"\n").expect("write toml");

    let err = load_config(path.to_str()).expect_err("expected deserialize error");
    assert!(err.to_string().starts_with("config deserialize error"));
}
