use nickbook_core::config::LoadOptions;
use nickbook_db::{connect_with_settings, schema};

use crate::commands::{build_runtime, load_config, CommandResult, EXIT_DATABASE, EXIT_SCHEMA};

const COMMAND: &str = "init-db";

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
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
        schema::ensure_schema(&pool)
            .await
            .map_err(|error| ("schema", error.to_string(), EXIT_SCHEMA))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success(COMMAND, "nickname schema is ready"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(COMMAND, error_class, message, exit_code)
        }
    }
}
