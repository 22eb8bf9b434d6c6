use nickbook_core::config::LoadOptions;
use nickbook_db::connect_with_settings;

use crate::commands::{build_runtime, load_config, CommandResult, EXIT_DATABASE};

const COMMAND: &str = "start";

/// Preflight for the server: configuration validates and the database answers.
pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await?;
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await?;
        pool.close().await;
        Ok::<(), sqlx::Error>(())
    });

    match result {
        Ok(()) => CommandResult::success(
            COMMAND,
            format!(
                "preflight passed; server would listen on {}:{} with {} allowed group(s)",
                config.server.bind_address,
                config.server.port,
                config.guard.allowed_groups.len()
            ),
        ),
        Err(error) => CommandResult::failure(
            COMMAND,
            "db_connectivity",
            format!("database check failed: {error}"),
            EXIT_DATABASE,
        ),
    }
}
