use quoteworks_core::config::LoadOptions;
use quoteworks_db::{connect_with_config, migrations};
use serde_json::json;

use crate::commands::{prepare, CommandResult, Failure, EXIT_DB_CONNECTIVITY, EXIT_MIGRATION};

pub fn run(options: LoadOptions) -> CommandResult {
    let (config, runtime) = match prepare(options) {
        Ok(prepared) => prepared,
        Err(failure) => return CommandResult::from_failure("migrate", failure),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database).await.map_err(|error| {
            Failure::new("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY)
        })?;
        let applied = migrations::run_pending(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), EXIT_MIGRATION));
        pool.close().await;
        applied
    });

    match result {
        Ok(()) => CommandResult::success_with(
            "migrate",
            "applied pending migrations",
            Some(json!({ "database_url": config.database.url })),
        ),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}

#[cfg(test)]
mod tests {
    use quoteworks_core::config::{ConfigOverrides, LoadOptions};
    use serde_json::Value;

    use super::run;

    fn options_for(database_url: String) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn migrate_creates_the_schema_in_a_file_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("quotes.db").display());

        let result = run(options_for(url.clone()));
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 0, "{}", result.output);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["details"]["database_url"], url);

        let rerun = run(options_for(url));
        assert_eq!(rerun.exit_code, 0, "migrations are re-runnable");
    }

    #[test]
    fn invalid_database_url_is_a_config_failure() {
        let result = run(options_for("mysql://localhost/quotes".to_string()));
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 2);
        assert_eq!(payload["error_class"], "config_validation");
    }
}
