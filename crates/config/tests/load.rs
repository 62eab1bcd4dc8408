use std::time::Duration;

use app_config::AppConfig;
use config::{Environment, Map};

/// An environment holding exactly `vars`, independent of the process
/// environment and any `.env` file.
fn env_of(vars: &[(&str, &str)]) -> Environment {
    let vars: Map<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    Environment::default().source(Some(vars))
}

#[test]
fn test_load_default_config() {
    let cfg = AppConfig::from_env(env_of(&[])).unwrap();
    assert_eq!(cfg.db_host, "localhost");
    assert_eq!(cfg.db_name, "coffee_db");
    assert_eq!(cfg.db_pool_size, 16);
    assert_eq!(cfg.migrations_dir, "migrations");
    assert_eq!(cfg.http_port, 8081);
    assert_eq!(cfg.shutdown_timeout, Duration::from_secs(5));
}

#[test]
fn test_variables_override_defaults() {
    let cfg = AppConfig::from_env(env_of(&[
        ("DB_HOST", "postgres"),
        ("DB_NAME", "orders"),
        ("DB_POOL_SIZE", "4"),
        ("SHUTDOWN_TIMEOUT", "1m"),
    ]))
    .unwrap();
    assert_eq!(cfg.db_host, "postgres");
    assert_eq!(cfg.db_name, "orders");
    assert_eq!(cfg.db_pool_size, 4);
    assert_eq!(cfg.shutdown_timeout, Duration::from_secs(60));
    assert_eq!(cfg.db_port, 5432);
}

#[test]
fn test_malformed_values_are_rejected() {
    assert!(AppConfig::from_env(env_of(&[("DB_PORT", "not-a-port")])).is_err());
    assert!(AppConfig::from_env(env_of(&[("SHUTDOWN_TIMEOUT", "soon")])).is_err());
}

#[test]
fn test_dsn_contains_connection_settings() {
    let cfg = AppConfig::from_env(env_of(&[("DB_HOST", "db.internal")])).unwrap();
    let dsn = cfg.db_dsn();
    assert!(dsn.contains("host=db.internal"));
    assert!(dsn.contains("port=5432"));
    assert!(dsn.contains("dbname=coffee_db"));
}
