// ABOUTME: Tests for configuration loading and validation
// ABOUTME: Verifies TOML parsing, env var overrides, and required field validation

use athenais::config::{Config, StorageKind};
use athenais_core::StorageBackend;
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "ATHENAIS_CONFIG_PATH",
    "MATRIX_HOMESERVER",
    "MATRIX_USER_ID",
    "MATRIX_PASSWORD",
    "MATRIX_ACCESS_TOKEN",
    "MATRIX_DEVICE_NAME",
    "MATRIX_ROOMS",
    "STORAGE_BACKEND",
    "DATABASE_DSN",
    "CRYPTO_PICKLE_KEY",
    "OPEN_AI_KEY",
    "OPENAI_PROMPT",
    "OPENAI_MODEL",
    "OPENAI_CHANCE",
];

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

const FULL_CONFIG: &str = r#"
[matrix]
home_server = "https://test.matrix.org"
user_id = "@bot:test.matrix.org"
password = "secret123"
device_name = "test-device"
rooms = ["!one:test.matrix.org", "!two:test.matrix.org"]

[storage]
backend = "sqlite"
path = "/tmp/athenais-test-store"
pickle_key = "pickle"

[openai]
api_key = "sk-from-file"
prompt = "You are terse."
chance = 25
"#;

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, FULL_CONFIG);
    std::env::set_var("ATHENAIS_CONFIG_PATH", &path);

    let config = Config::load().unwrap();

    assert_eq!(config.matrix.home_server, "https://test.matrix.org");
    assert_eq!(config.matrix.user_id, "@bot:test.matrix.org");
    assert_eq!(config.matrix.password, Some("secret123".to_string()));
    assert_eq!(config.matrix.device_name, "test-device");
    assert_eq!(config.desired_rooms().len(), 2);
    assert_eq!(config.storage.backend, StorageKind::Sqlite);
    assert_eq!(
        config.storage_backend(),
        StorageBackend::Sqlite {
            path: PathBuf::from("/tmp/athenais-test-store"),
            passphrase: Some("pickle".to_string()),
        }
    );
    assert_eq!(config.openai.chance, 25);

    let openai = config.openai_config().unwrap();
    assert_eq!(openai.system_prompt, "You are terse.");

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_explicit_path_wins_and_must_exist() {
    clear_config_env_vars();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, FULL_CONFIG);

    let config = Config::load_from(Some(&path)).unwrap();
    assert_eq!(config.matrix.user_id, "@bot:test.matrix.org");

    let missing = dir.path().join("nope.toml");
    let err = Config::load_from(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
#[serial]
fn test_env_vars_override_file() {
    clear_config_env_vars();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, FULL_CONFIG);
    std::env::set_var("ATHENAIS_CONFIG_PATH", &path);
    std::env::set_var("MATRIX_HOMESERVER", "https://override.example.org");
    std::env::set_var("MATRIX_ROOMS", "!x:example.org, !y:example.org,,");
    std::env::set_var("OPENAI_CHANCE", "100");
    std::env::set_var("STORAGE_BACKEND", "memory");

    let config = Config::load().unwrap();

    assert_eq!(config.matrix.home_server, "https://override.example.org");
    assert_eq!(
        config.matrix.rooms,
        vec!["!x:example.org".to_string(), "!y:example.org".to_string()]
    );
    assert_eq!(config.openai.chance, 100);
    assert_eq!(config.storage_backend(), StorageBackend::Memory);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_only_configuration() {
    clear_config_env_vars();
    // A ./config.toml in the working directory would shadow the env-only setup
    if PathBuf::from("config.toml").exists() {
        return;
    }
    let dir = TempDir::new().unwrap();
    // Point the search at an empty directory's missing file so no file is used
    std::env::set_var("ATHENAIS_CONFIG_PATH", dir.path().join("missing.toml"));
    std::env::set_var("MATRIX_HOMESERVER", "https://env.example.org");
    std::env::set_var("MATRIX_USER_ID", "@env:example.org");
    std::env::set_var("MATRIX_ACCESS_TOKEN", "syt_token");
    std::env::set_var("DATABASE_DSN", dir.path().join("store").to_str().unwrap());
    std::env::set_var("CRYPTO_PICKLE_KEY", "from-env");
    std::env::set_var("OPEN_AI_KEY", "sk-env");

    let config = Config::load().unwrap();

    assert_eq!(config.matrix.user_id, "@env:example.org");
    assert_eq!(config.matrix.access_token, Some("syt_token".to_string()));
    assert_eq!(config.matrix.device_name, "athenais");
    assert_eq!(config.storage.pickle_key, Some("from-env".to_string()));
    // The pickle key is scrubbed from the environment once read
    assert!(std::env::var("CRYPTO_PICKLE_KEY").is_err());
    assert_eq!(config.openai_config().unwrap().api_key, "sk-env");
    assert_eq!(config.openai.chance, 50);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_requires_home_server() {
    clear_config_env_vars();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[matrix]
user_id = "@bot:test.matrix.org"
password = "secret"
"#,
    );

    let err = Config::load_from(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("home_server"));
}

#[test]
#[serial]
fn test_config_rejects_room_alias() {
    clear_config_env_vars();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r##"
[matrix]
home_server = "https://test.matrix.org"
user_id = "@bot:test.matrix.org"
password = "secret"
rooms = ["#lobby:test.matrix.org"]
"##,
    );

    let err = Config::load_from(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("#lobby:test.matrix.org"));
}

#[test]
#[serial]
fn test_invalid_chance_env_is_rejected() {
    clear_config_env_vars();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, FULL_CONFIG);

    std::env::set_var("OPENAI_CHANCE", "lots");
    let err = Config::load_from(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("OPENAI_CHANCE"));

    std::env::set_var("OPENAI_CHANCE", "150");
    let err = Config::load_from(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("between 0 and 100"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_unknown_storage_backend_is_rejected() {
    clear_config_env_vars();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, FULL_CONFIG);

    std::env::set_var("STORAGE_BACKEND", "postgres");
    assert!(Config::load_from(Some(&path)).is_err());

    clear_config_env_vars();
}
