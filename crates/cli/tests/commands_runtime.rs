use std::env;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Mutex, OnceLock};
use std::thread;

use clientele_cli::commands::{config, doctor, migrate};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    let vars = [("CLIENTELE_DATABASE_URL", "sqlite::memory:"), ("CLIENTELE_DATABASE_MAX_CONNECTIONS", "1")];
    with_env(&vars, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "applied 1 pending migration(s)");
        assert_eq!(payload["applied_migrations"], 1);
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_identity_url() {
    with_env(
        &[
            ("CLIENTELE_DATABASE_URL", "sqlite::memory:"),
            ("CLIENTELE_IDENTITY_BASE_URL", "users.internal:8081"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn config_exits_with_config_code_when_validation_fails() {
    with_env(&[("CLIENTELE_IDENTITY_DEFAULT_PROFILE_ID", "0")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_reports_sources_and_redacts_the_api_token() {
    with_env(
        &[
            ("CLIENTELE_DATABASE_URL", "sqlite::memory:"),
            ("CLIENTELE_IDENTITY_API_TOKEN", "tok_supersecretvalue"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            let output = result.output;

            assert!(output.contains(
                "- identity.api_token = tok_*** (source: env (CLIENTELE_IDENTITY_API_TOKEN))"
            ));
            assert!(output.contains("- database.url = sqlite::memory: (source: env (CLIENTELE_DATABASE_URL))"));
            assert!(output.contains("- identity.default_profile_id = 4 (source: default)"));
            assert!(!output.contains("supersecret"));
        },
    );
}

#[test]
fn doctor_passes_when_database_and_identity_are_reachable() {
    let base_url = spawn_identity_stub();
    with_env(
        &[
            ("CLIENTELE_DATABASE_URL", "sqlite::memory:"),
            ("CLIENTELE_IDENTITY_BASE_URL", base_url.as_str()),
        ],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 0, "expected all checks to pass: {}", result.output);

            let report = parse_payload(&result.output);
            assert_eq!(report["overall_status"], "pass");
            assert_eq!(check_status(&report, "identity_reachability"), "pass");
        },
    );
}

#[test]
fn doctor_flags_unreachable_identity_service() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("addr");
    drop(listener);
    let base_url = format!("http://{address}");

    with_env(
        &[
            ("CLIENTELE_DATABASE_URL", "sqlite::memory:"),
            ("CLIENTELE_IDENTITY_BASE_URL", base_url.as_str()),
            ("CLIENTELE_IDENTITY_TIMEOUT_SECS", "2"),
        ],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 1);

            let report = parse_payload(&result.output);
            assert_eq!(report["overall_status"], "fail");
            assert_eq!(check_status(&report, "database_connectivity"), "pass");
            assert_eq!(check_status(&report, "identity_reachability"), "fail");
        },
    );
}

#[test]
fn doctor_skips_runtime_checks_when_config_is_invalid() {
    with_env(&[("CLIENTELE_IDENTITY_TIMEOUT_SECS", "0")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result.output.contains("- [skip] identity_reachability:"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn check_status(report: &Value, name: &str) -> String {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .and_then(|check| check["status"].as_str())
        .unwrap_or_default()
        .to_string()
}

/// Answers a single request with a profile payload.
fn spawn_identity_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let address = listener.local_addr().expect("stub addr");
    thread::spawn(move || {
        if let Some(Ok(mut stream)) = listener.incoming().next() {
            let mut buffer = [0_u8; 2048];
            let _ = stream.read(&mut buffer);
            let body = r#"{"id":4,"name":"CUSTOMER"}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{address}")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "CLIENTELE_DATABASE_URL",
        "CLIENTELE_DATABASE_MAX_CONNECTIONS",
        "CLIENTELE_DATABASE_TIMEOUT_SECS",
        "CLIENTELE_IDENTITY_BASE_URL",
        "CLIENTELE_IDENTITY_API_TOKEN",
        "CLIENTELE_IDENTITY_TIMEOUT_SECS",
        "CLIENTELE_IDENTITY_DEFAULT_PROFILE_ID",
        "CLIENTELE_SERVER_BIND_ADDRESS",
        "CLIENTELE_SERVER_PORT",
        "CLIENTELE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "CLIENTELE_LOGGING_LEVEL",
        "CLIENTELE_LOGGING_FORMAT",
        "CLIENTELE_LOG_LEVEL",
        "CLIENTELE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
