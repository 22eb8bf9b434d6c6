use crate::DbPool;

const CREATE_NICKNAMES: &str = r#"
CREATE TABLE IF NOT EXISTS nicknames (
    user_id TEXT NOT NULL,
    scope_id TEXT NOT NULL,
    nickname TEXT NOT NULL,
    server TEXT NOT NULL,
    note TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, scope_id)
)
"#;

const CREATE_SCOPE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_nicknames_scope_id ON nicknames (scope_id)";

/// Creates the nickname table if it does not exist yet. Safe to call on every start.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_NICKNAMES).execute(pool).await?;
    sqlx::query(CREATE_SCOPE_INDEX).execute(pool).await?;
    Ok(())
}
