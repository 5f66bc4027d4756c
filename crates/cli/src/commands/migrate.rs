use crate::commands::{CommandResult, FailureClass};
use clientele_core::config::{AppConfig, LoadOptions};
use clientele_db::{connect, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                FailureClass::ConfigValidation,
                format!("configuration issue: {error}"),
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                FailureClass::RuntimeInit,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| (FailureClass::DbConnectivity, error.to_string()))?;
        // The ledger table is absent until the first run.
        let before = migrations::applied_count(&pool).await.unwrap_or(0);
        migrations::run_pending(&pool)
            .await
            .map_err(|error| (FailureClass::Migration, error.to_string()))?;
        let after = migrations::applied_count(&pool).await.unwrap_or(before);
        pool.close().await;
        Ok::<i64, (FailureClass, String)>(after - before)
    });

    match result {
        Ok(applied) => CommandResult::migrated(&config.database.url, applied),
        Err((class, message)) => CommandResult::failure("migrate", class, message),
    }
}
