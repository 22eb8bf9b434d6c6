use nickbook_core::NicknameRecord;

/// Reply length ceiling enforced by the Messaging API for a text message.
pub const MAX_REPLY_CHARS: usize = 5000;

pub const REGISTER_USAGE: &str = "請輸入格式：@登記暱稱/暱稱/伺服器/備註（備註可省略）";
pub const REGISTER_FAILED: &str = "❌ 暱稱登記失敗，請稍後再試。";
pub const SEARCH_KEYWORD_REQUIRED: &str = "請輸入關鍵字！";
pub const SEARCH_NO_MATCH: &str = "查無資料";
pub const SEARCH_FAILED: &str = "查詢失敗";
pub const LIST_EMPTY: &str = "目前沒有登記資料";
pub const LIST_FAILED: &str = "資料錯誤";
pub const DELETE_DONE: &str = "🗑️ 已刪除你的暱稱登記。";
pub const DELETE_FAILED: &str = "❌ 刪除失敗，請稍後再試。";
pub const FALLBACK_HINT: &str = "請輸入 @登記暱稱 或 @找人 查詢暱稱。";
pub const GROUP_REJECTED_NOTICE: &str = "這個群組不是授權名單，我將離開。";
pub const GROUP_WELCOME: &str = "嗨，我來啦！這是主人允許的群組，請輸入 @登記暱稱 開始使用～";

pub const HELP_TEXT: &str = "📘 使用說明：

1. 登記暱稱
@登記暱稱/暱稱/伺服器/備註

2. 查詢暱稱
@找人/關鍵字

3. 清單查看
@暱稱清單 或 暱稱名單

4. 刪除暱稱
@刪除暱稱";

pub fn register_success(nickname: &str) -> String {
    format!("✅ 暱稱已登記為：{nickname}")
}

/// `<displayName>｜暱稱：<nickname>｜伺服器：<server>｜備註：<note or 無>`
pub fn format_record_line(record: &NicknameRecord) -> String {
    format!(
        "{}｜暱稱：{}｜伺服器：{}｜備註：{}",
        record.display_name,
        record.nickname,
        record.server,
        record.note_or_placeholder()
    )
}

pub fn search_results(keyword: &str, records: &[NicknameRecord]) -> String {
    if records.is_empty() {
        return SEARCH_NO_MATCH.to_owned();
    }
    format!("🔍 符合「{keyword}」的結果：\n{}", record_lines(records))
}

pub fn scope_listing(records: &[NicknameRecord]) -> String {
    if records.is_empty() {
        return LIST_EMPTY.to_owned();
    }
    format!("📋 暱稱清單（共 {} 筆）：\n{}", records.len(), record_lines(records))
}

fn record_lines(records: &[NicknameRecord]) -> String {
    records.iter().map(format_record_line).collect::<Vec<_>>().join("\n")
}

/// Cuts `text` to at most [`MAX_REPLY_CHARS`] characters, ending in `…` when shortened.
pub fn truncate_for_reply(text: String) -> String {
    if text.chars().count() <= MAX_REPLY_CHARS {
        return text;
    }
    let mut truncated: String = text.chars().take(MAX_REPLY_CHARS - 1).collect();
    truncated.push('…');
    truncated
}
