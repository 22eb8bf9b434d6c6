use chrono::{DateTime, Utc};

use nickbook_core::domain::nickname::{NicknameRecord, ScopeId, UserId};

use super::{NicknameRepository, RepositoryError};
use crate::DbPool;

const SELECT_COLUMNS: &str =
    "SELECT user_id, scope_id, nickname, server, note, display_name, updated_at FROM nicknames";

pub struct SqlNicknameRepository {
    pool: DbPool,
}

impl SqlNicknameRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NicknameRow {
    user_id: String,
    scope_id: String,
    nickname: String,
    server: String,
    note: String,
    display_name: String,
    updated_at: DateTime<Utc>,
}

impl From<NicknameRow> for NicknameRecord {
    fn from(row: NicknameRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            scope_id: ScopeId(row.scope_id),
            nickname: row.nickname,
            server: row.server,
            note: row.note,
            display_name: row.display_name,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait::async_trait]
impl NicknameRepository for SqlNicknameRepository {
    async fn upsert(&self, record: NicknameRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO nicknames (user_id, scope_id, nickname, server, note, display_name, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, scope_id) DO UPDATE SET
                nickname = excluded.nickname,
                server = excluded.server,
                note = excluded.note,
                display_name = excluded.display_name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.user_id.0)
        .bind(&record.scope_id.0)
        .bind(&record.nickname)
        .bind(&record.server)
        .bind(&record.note)
        .bind(&record.display_name)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(
        &self,
        user_id: &UserId,
        scope_id: &ScopeId,
    ) -> Result<Option<NicknameRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, NicknameRow>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ? AND scope_id = ?"
        ))
        .bind(&user_id.0)
        .bind(&scope_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(NicknameRecord::from))
    }

    async fn search(
        &self,
        scope_id: &ScopeId,
        keyword: &str,
    ) -> Result<Vec<NicknameRecord>, RepositoryError> {
        // SQLite LOWER() folds ASCII only; match with Unicode folding instead.
        let records = self.list_scope(scope_id).await?;
        Ok(records.into_iter().filter(|record| record.matches_keyword(keyword)).collect())
    }

    async fn list_scope(&self, scope_id: &ScopeId) -> Result<Vec<NicknameRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, NicknameRow>(&format!(
            "{SELECT_COLUMNS} WHERE scope_id = ? ORDER BY rowid"
        ))
        .bind(&scope_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(NicknameRecord::from).collect())
    }

    async fn list_all(&self) -> Result<Vec<NicknameRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, NicknameRow>(&format!("{SELECT_COLUMNS} ORDER BY rowid"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(NicknameRecord::from).collect())
    }

    async fn delete(&self, user_id: &UserId, scope_id: &ScopeId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM nicknames WHERE user_id = ? AND scope_id = ?")
            .bind(&user_id.0)
            .bind(&scope_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
