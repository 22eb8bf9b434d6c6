use std::sync::Arc;

use chrono::Utc;
use tracing::error;

use nickbook_core::{NicknameRecord, ScopeId, UserId};
use nickbook_db::NicknameRepository;

use crate::messages;

pub const REGISTER_PREFIX: &str = "@登記暱稱";
pub const SEARCH_PREFIX: &str = "@找人";
pub const LIST_COMMANDS: [&str; 2] = ["@暱稱清單", "暱稱名單"];
pub const DELETE_COMMAND: &str = "@刪除暱稱";
pub const HELP_COMMAND: &str = "@說明";

const FIELD_DELIMITER: char = '/';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub nickname: String,
    pub server: String,
    pub note: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageError {
    MissingRegistrationField,
    MissingSearchKeyword,
}

impl UsageError {
    pub fn reply(self) -> &'static str {
        match self {
            Self::MissingRegistrationField => messages::REGISTER_USAGE,
            Self::MissingSearchKeyword => messages::SEARCH_KEYWORD_REQUIRED,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NicknameCommand {
    Register(Registration),
    Search { keyword: String },
    List,
    Delete,
    Help,
    Fallback,
    Invalid(UsageError),
}

/// Who sent the command and where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub scope_id: ScopeId,
    pub user_id: UserId,
    pub display_name: String,
}

/// Classifies a text message. Values are split on `/` with no escaping, so a `/`
/// inside a value cuts it short.
pub fn parse_nickname_command(input: &str) -> NicknameCommand {
    let text = input.trim();

    if text.starts_with(REGISTER_PREFIX) {
        return parse_registration(text);
    }

    if is_search(text) {
        return match field(text, 1) {
            Some(keyword) => NicknameCommand::Search { keyword },
            None => NicknameCommand::Invalid(UsageError::MissingSearchKeyword),
        };
    }

    if LIST_COMMANDS.contains(&text) {
        return NicknameCommand::List;
    }

    match text {
        DELETE_COMMAND => NicknameCommand::Delete,
        HELP_COMMAND => NicknameCommand::Help,
        _ => NicknameCommand::Fallback,
    }
}

/// Bare `@找人` or `@找人/...`; `@找人 Tank` falls through to the hint.
fn is_search(text: &str) -> bool {
    text.strip_prefix(SEARCH_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(FIELD_DELIMITER))
}

fn parse_registration(text: &str) -> NicknameCommand {
    let (Some(nickname), Some(server)) = (field(text, 1), field(text, 2)) else {
        return NicknameCommand::Invalid(UsageError::MissingRegistrationField);
    };
    let note = field(text, 3).unwrap_or_default();

    NicknameCommand::Register(Registration { nickname, server, note })
}

fn field(text: &str, index: usize) -> Option<String> {
    text.split(FIELD_DELIMITER)
        .nth(index)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

pub struct CommandRouter {
    repository: Arc<dyn NicknameRepository>,
}

impl CommandRouter {
    pub fn new(repository: Arc<dyn NicknameRepository>) -> Self {
        Self { repository }
    }

    /// Runs the store operation for `command` and returns the single reply for it.
    /// Store failures are logged and answered with a generic failure text.
    pub async fn route(&self, command: NicknameCommand, envelope: &CommandEnvelope) -> String {
        let reply = match command {
            NicknameCommand::Register(registration) => {
                self.register(registration, envelope).await
            }
            NicknameCommand::Search { keyword } => self.search(&keyword, envelope).await,
            NicknameCommand::List => self.list(envelope).await,
            NicknameCommand::Delete => self.delete(envelope).await,
            NicknameCommand::Help => messages::HELP_TEXT.to_owned(),
            NicknameCommand::Fallback => messages::FALLBACK_HINT.to_owned(),
            NicknameCommand::Invalid(usage) => usage.reply().to_owned(),
        };

        messages::truncate_for_reply(reply)
    }

    async fn register(&self, registration: Registration, envelope: &CommandEnvelope) -> String {
        let nickname = registration.nickname.clone();
        let record = NicknameRecord {
            user_id: envelope.user_id.clone(),
            scope_id: envelope.scope_id.clone(),
            nickname: registration.nickname,
            server: registration.server,
            note: registration.note,
            display_name: envelope.display_name.clone(),
            updated_at: Utc::now(),
        };

        match self.repository.upsert(record).await {
            Ok(()) => messages::register_success(&nickname),
            Err(store_error) => {
                error!(
                    event_name = "command.register.failed",
                    scope_id = %envelope.scope_id,
                    user_id = %envelope.user_id,
                    error = %store_error,
                    "failed to store nickname registration"
                );
                messages::REGISTER_FAILED.to_owned()
            }
        }
    }

    async fn search(&self, keyword: &str, envelope: &CommandEnvelope) -> String {
        match self.repository.search(&envelope.scope_id, keyword).await {
            Ok(records) => messages::search_results(keyword, &records),
            Err(store_error) => {
                error!(
                    event_name = "command.search.failed",
                    scope_id = %envelope.scope_id,
                    error = %store_error,
                    "failed to search nicknames"
                );
                messages::SEARCH_FAILED.to_owned()
            }
        }
    }

    async fn list(&self, envelope: &CommandEnvelope) -> String {
        match self.repository.list_scope(&envelope.scope_id).await {
            Ok(records) => messages::scope_listing(&records),
            Err(store_error) => {
                error!(
                    event_name = "command.list.failed",
                    scope_id = %envelope.scope_id,
                    error = %store_error,
                    "failed to list nicknames"
                );
                messages::LIST_FAILED.to_owned()
            }
        }
    }

    async fn delete(&self, envelope: &CommandEnvelope) -> String {
        match self.repository.delete(&envelope.user_id, &envelope.scope_id).await {
            Ok(_) => messages::DELETE_DONE.to_owned(),
            Err(store_error) => {
                error!(
                    event_name = "command.delete.failed",
                    scope_id = %envelope.scope_id,
                    user_id = %envelope.user_id,
                    error = %store_error,
                    "failed to delete nickname registration"
                );
                messages::DELETE_FAILED.to_owned()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use nickbook_core::{NicknameRecord, ScopeId, UserId};
    use nickbook_db::{
        connect_with_settings, schema::ensure_schema, InMemoryNicknameRepository,
        NicknameRepository, RepositoryError, SqlNicknameRepository,
    };

    use super::{
        parse_nickname_command, CommandEnvelope, CommandRouter, NicknameCommand, Registration,
        UsageError,
    };
    use crate::messages;

    /// Repository whose every call fails, for exercising failure replies.
    pub(crate) struct FailingRepository;

    fn store_down() -> RepositoryError {
        RepositoryError::Decode("store unavailable".to_owned())
    }

    #[async_trait]
    impl NicknameRepository for FailingRepository {
        async fn upsert(&self, _record: NicknameRecord) -> Result<(), RepositoryError> {
            Err(store_down())
        }

        async fn find(
            &self,
            _user_id: &UserId,
            _scope_id: &ScopeId,
        ) -> Result<Option<NicknameRecord>, RepositoryError> {
            Err(store_down())
        }

        async fn search(
            &self,
            _scope_id: &ScopeId,
            _keyword: &str,
        ) -> Result<Vec<NicknameRecord>, RepositoryError> {
            Err(store_down())
        }

        async fn list_scope(
            &self,
            _scope_id: &ScopeId,
        ) -> Result<Vec<NicknameRecord>, RepositoryError> {
            Err(store_down())
        }

        async fn list_all(&self) -> Result<Vec<NicknameRecord>, RepositoryError> {
            Err(store_down())
        }

        async fn delete(
            &self,
            _user_id: &UserId,
            _scope_id: &ScopeId,
        ) -> Result<bool, RepositoryError> {
            Err(store_down())
        }
    }

    fn envelope(user: &str, scope: &str, display_name: &str) -> CommandEnvelope {
        CommandEnvelope {
            scope_id: ScopeId(scope.to_owned()),
            user_id: UserId(user.to_owned()),
            display_name: display_name.to_owned(),
        }
    }

    #[test]
    fn parses_registration_fields_and_optional_note() {
        assert_eq!(
            parse_nickname_command("  @登記暱稱/ Tank / Asgard / 主坦  "),
            NicknameCommand::Register(Registration {
                nickname: "Tank".to_owned(),
                server: "Asgard".to_owned(),
                note: "主坦".to_owned(),
            })
        );
        assert_eq!(
            parse_nickname_command("@登記暱稱/Tank/Asgard"),
            NicknameCommand::Register(Registration {
                nickname: "Tank".to_owned(),
                server: "Asgard".to_owned(),
                note: String::new(),
            })
        );
        assert_eq!(
            parse_nickname_command("@登記暱稱/Tank/Asgard/備註/多餘"),
            NicknameCommand::Register(Registration {
                nickname: "Tank".to_owned(),
                server: "Asgard".to_owned(),
                note: "備註".to_owned(),
            })
        );
    }

    #[test]
    fn registration_without_mandatory_fields_is_a_usage_error() {
        for input in ["@登記暱稱", "@登記暱稱/Tank", "@登記暱稱/Tank/", "@登記暱稱/ /Asgard"] {
            assert_eq!(
                parse_nickname_command(input),
                NicknameCommand::Invalid(UsageError::MissingRegistrationField),
                "input: {input}"
            );
        }
    }

    #[test]
    fn parses_search_list_delete_help_and_fallback() {
        assert_eq!(
            parse_nickname_command("@找人/ tank "),
            NicknameCommand::Search { keyword: "tank".to_owned() }
        );
        assert_eq!(
            parse_nickname_command("@找人"),
            NicknameCommand::Invalid(UsageError::MissingSearchKeyword)
        );
        assert_eq!(
            parse_nickname_command("@找人/  "),
            NicknameCommand::Invalid(UsageError::MissingSearchKeyword)
        );
        assert_eq!(parse_nickname_command("@暱稱清單"), NicknameCommand::List);
        assert_eq!(parse_nickname_command("暱稱名單"), NicknameCommand::List);
        assert_eq!(parse_nickname_command("@刪除暱稱"), NicknameCommand::Delete);
        assert_eq!(parse_nickname_command("@說明"), NicknameCommand::Help);
        assert_eq!(parse_nickname_command("hello"), NicknameCommand::Fallback);
        assert_eq!(parse_nickname_command("@暱稱清單 please"), NicknameCommand::Fallback);
        assert_eq!(parse_nickname_command("@找人 Tank"), NicknameCommand::Fallback);
        assert_eq!(parse_nickname_command("@找人xyz"), NicknameCommand::Fallback);
    }

    #[tokio::test]
    async fn register_then_search_and_list_within_scope() {
        let repository = Arc::new(InMemoryNicknameRepository::default());
        let router = CommandRouter::new(repository.clone());
        let alice = envelope("U1", "C1", "Alice");

        let reply = router.route(parse_nickname_command("@登記暱稱/Tank/Asgard"), &alice).await;
        assert_eq!(reply, "✅ 暱稱已登記為：Tank");

        let reply = router.route(parse_nickname_command("@找人/tan"), &alice).await;
        assert_eq!(reply, "🔍 符合「tan」的結果：\nAlice｜暱稱：Tank｜伺服器：Asgard｜備註：無");

        let reply = router.route(parse_nickname_command("@暱稱清單"), &alice).await;
        assert_eq!(reply, "📋 暱稱清單（共 1 筆）：\nAlice｜暱稱：Tank｜伺服器：Asgard｜備註：無");

        let outsider = envelope("U2", "C2", "Bob");
        let reply = router.route(parse_nickname_command("@找人/Tank"), &outsider).await;
        assert_eq!(reply, messages::SEARCH_NO_MATCH);
        let reply = router.route(NicknameCommand::List, &outsider).await;
        assert_eq!(reply, messages::LIST_EMPTY);
    }

    #[tokio::test]
    async fn command_flow_against_sqlite_store() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        ensure_schema(&pool).await.expect("schema");
        let router = CommandRouter::new(Arc::new(SqlNicknameRepository::new(pool.clone())));
        let alice = envelope("U1", "C1", "Alice");
        let carol = envelope("U2", "C1", "Carol");
        let outsider = envelope("U3", "C2", "Bob");

        let reply =
            router.route(parse_nickname_command("@登記暱稱/Tank/Asgard/raid lead"), &alice).await;
        assert_eq!(reply, "✅ 暱稱已登記為：Tank");
        router.route(parse_nickname_command("@登記暱稱/ＴＡＮＫ/Midgard"), &carol).await;

        let reply = router.route(parse_nickname_command("@找人/Asgard"), &alice).await;
        assert_eq!(
            reply,
            "🔍 符合「Asgard」的結果：\nAlice｜暱稱：Tank｜伺服器：Asgard｜備註：raid lead"
        );

        let reply = router.route(parse_nickname_command("@找人/ｔａｎｋ"), &alice).await;
        assert_eq!(
            reply,
            "🔍 符合「ｔａｎｋ」的結果：\nCarol｜暱稱：ＴＡＮＫ｜伺服器：Midgard｜備註：無"
        );

        let reply = router.route(parse_nickname_command("@找人/Tank"), &outsider).await;
        assert_eq!(reply, messages::SEARCH_NO_MATCH);
        assert_eq!(router.route(NicknameCommand::List, &outsider).await, messages::LIST_EMPTY);
        assert_eq!(router.route(NicknameCommand::Delete, &outsider).await, messages::DELETE_DONE);

        assert_eq!(router.route(NicknameCommand::Delete, &alice).await, messages::DELETE_DONE);
        let reply = router.route(parse_nickname_command("暱稱名單"), &carol).await;
        assert_eq!(
            reply,
            "📋 暱稱清單（共 1 筆）：\nCarol｜暱稱：ＴＡＮＫ｜伺服器：Midgard｜備註：無"
        );

        pool.close().await;
    }

    #[tokio::test]
    async fn reregistration_replaces_previous_record() {
        let repository = Arc::new(InMemoryNicknameRepository::default());
        let router = CommandRouter::new(repository.clone());
        let alice = envelope("U1", "C1", "Alice");

        router.route(parse_nickname_command("@登記暱稱/Tank/Asgard/主坦"), &alice).await;
        router.route(parse_nickname_command("@登記暱稱/Healer/Midgard"), &alice).await;

        let records = repository.list_scope(&ScopeId("C1".to_owned())).await.expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].nickname, "Healer");
        assert_eq!(records[0].note, "");
    }

    #[tokio::test]
    async fn usage_errors_do_not_touch_the_store() {
        let repository = Arc::new(InMemoryNicknameRepository::default());
        let router = CommandRouter::new(repository.clone());
        let alice = envelope("U1", "C1", "Alice");

        let reply = router.route(parse_nickname_command("@登記暱稱/Tank"), &alice).await;
        assert_eq!(reply, messages::REGISTER_USAGE);
        let reply = router.route(parse_nickname_command("@找人"), &alice).await;
        assert_eq!(reply, messages::SEARCH_KEYWORD_REQUIRED);

        assert!(repository.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn delete_reports_success_even_without_a_record() {
        let repository = Arc::new(InMemoryNicknameRepository::default());
        let router = CommandRouter::new(repository.clone());
        let alice = envelope("U1", "C1", "Alice");

        assert_eq!(router.route(NicknameCommand::Delete, &alice).await, messages::DELETE_DONE);

        router.route(parse_nickname_command("@登記暱稱/Tank/Asgard"), &alice).await;
        assert_eq!(router.route(NicknameCommand::Delete, &alice).await, messages::DELETE_DONE);
        assert!(repository.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn store_failures_map_to_generic_replies() {
        let router = CommandRouter::new(Arc::new(FailingRepository));
        let alice = envelope("U1", "C1", "Alice");

        assert_eq!(
            router.route(parse_nickname_command("@登記暱稱/Tank/Asgard"), &alice).await,
            messages::REGISTER_FAILED
        );
        assert_eq!(
            router.route(parse_nickname_command("@找人/Tank"), &alice).await,
            messages::SEARCH_FAILED
        );
        assert_eq!(router.route(NicknameCommand::List, &alice).await, messages::LIST_FAILED);
        assert_eq!(router.route(NicknameCommand::Delete, &alice).await, messages::DELETE_FAILED);
    }

    #[tokio::test]
    async fn help_and_fallback_are_fixed_texts() {
        let router = CommandRouter::new(Arc::new(InMemoryNicknameRepository::default()));
        let alice = envelope("U1", "private", "Alice");

        let help = router.route(NicknameCommand::Help, &alice).await;
        assert!(help.contains("@刪除暱稱"));
        assert!(help.contains("@找人/關鍵字"));
        assert_eq!(router.route(NicknameCommand::Fallback, &alice).await, messages::FALLBACK_HINT);
    }
}
