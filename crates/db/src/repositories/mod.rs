use async_trait::async_trait;
use thiserror::Error;

use nickbook_core::domain::nickname::{NicknameRecord, ScopeId, UserId};

pub mod memory;
pub mod nickname;

pub use memory::InMemoryNicknameRepository;
pub use nickname::SqlNicknameRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait NicknameRepository: Send + Sync {
    /// Inserts the record or fully replaces the one stored for its `(user_id, scope_id)`.
    async fn upsert(&self, record: NicknameRecord) -> Result<(), RepositoryError>;

    async fn find(
        &self,
        user_id: &UserId,
        scope_id: &ScopeId,
    ) -> Result<Option<NicknameRecord>, RepositoryError>;

    /// Records in `scope_id` whose nickname, server, note, or display name contains
    /// `keyword`, ignoring case.
    async fn search(
        &self,
        scope_id: &ScopeId,
        keyword: &str,
    ) -> Result<Vec<NicknameRecord>, RepositoryError>;

    async fn list_scope(&self, scope_id: &ScopeId) -> Result<Vec<NicknameRecord>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<NicknameRecord>, RepositoryError>;

    /// Removes the caller's record. Returns whether a record existed.
    async fn delete(&self, user_id: &UserId, scope_id: &ScopeId) -> Result<bool, RepositoryError>;
}
