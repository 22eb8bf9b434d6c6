use tokio::sync::RwLock;

use nickbook_core::domain::nickname::{NicknameRecord, ScopeId, UserId};

use super::{NicknameRepository, RepositoryError};

/// Insertion-ordered store used by tests and dry runs.
#[derive(Default)]
pub struct InMemoryNicknameRepository {
    records: RwLock<Vec<NicknameRecord>>,
}

impl InMemoryNicknameRepository {
    pub fn with_records(records: Vec<NicknameRecord>) -> Self {
        Self { records: RwLock::new(records) }
    }
}

fn same_key(record: &NicknameRecord, user_id: &UserId, scope_id: &ScopeId) -> bool {
    &record.user_id == user_id && &record.scope_id == scope_id
}

#[async_trait::async_trait]
impl NicknameRepository for InMemoryNicknameRepository {
    async fn upsert(&self, record: NicknameRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|stored| same_key(stored, &record.user_id, &record.scope_id))
        {
            Some(stored) => *stored = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn find(
        &self,
        user_id: &UserId,
        scope_id: &ScopeId,
    ) -> Result<Option<NicknameRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|record| same_key(record, user_id, scope_id)).cloned())
    }

    async fn search(
        &self,
        scope_id: &ScopeId,
        keyword: &str,
    ) -> Result<Vec<NicknameRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|record| &record.scope_id == scope_id && record.matches_keyword(keyword))
            .cloned()
            .collect())
    }

    async fn list_scope(&self, scope_id: &ScopeId) -> Result<Vec<NicknameRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|record| &record.scope_id == scope_id).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<NicknameRecord>, RepositoryError> {
        Ok(self.records.read().await.clone())
    }

    async fn delete(&self, user_id: &UserId, scope_id: &ScopeId) -> Result<bool, RepositoryError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| !same_key(record, user_id, scope_id));
        Ok(records.len() != before)
    }
}
