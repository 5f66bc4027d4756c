pub mod config;
pub mod doctor;
pub mod migrate;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Why a command gave up. Each class has its own process exit code so that
/// deploy scripts can tell a bad config from an unreachable database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
}

impl FailureClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::RuntimeInit => 3,
            Self::DbConnectivity => 4,
            Self::Migration => 5,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<FailureClass>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied_migrations: Option<i64>,
}

impl CommandResult {
    pub fn text(output: String) -> Self {
        Self { exit_code: 0, output }
    }

    /// Outcome of a successful `migrate` against `database_url`.
    pub fn migrated(database_url: &str, applied: i64) -> Self {
        let message = if applied == 0 {
            "schema already up to date".to_string()
        } else {
            format!("applied {applied} pending migration(s)")
        };
        let payload = CommandOutcome {
            command: "migrate",
            status: "ok",
            error_class: None,
            message,
            database_url: Some(database_url),
            applied_migrations: Some(applied),
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(command: &str, class: FailureClass, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command,
            status: "error",
            error_class: Some(class),
            message: message.into(),
            database_url: None,
            applied_migrations: None,
        };
        Self { exit_code: class.exit_code(), output: serialize_payload(&payload) }
    }
}

fn serialize_payload(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{}\",\"status\":\"error\",\"message\":\"{}\"}}",
            escape_json(payload.command),
            escape_json(&error.to_string())
        )
    })
}

pub(crate) fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{CommandResult, FailureClass};

    #[test]
    fn failures_carry_their_class_and_exit_code() {
        let result = CommandResult::failure("migrate", FailureClass::DbConnectivity, "refused");
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 4);
        assert_eq!(payload["error_class"], "db_connectivity");
        assert_eq!(payload["message"], "refused");
        assert!(payload.get("applied_migrations").is_none());
    }

    #[test]
    fn migrate_outcome_reports_the_applied_count() {
        let fresh: Value =
            serde_json::from_str(&CommandResult::migrated("sqlite::memory:", 0).output).expect("json");
        assert_eq!(fresh["message"], "schema already up to date");
        assert_eq!(fresh["applied_migrations"], 0);
        assert_eq!(fresh["database_url"], "sqlite::memory:");
        assert!(fresh.get("error_class").is_none());
    }
}
