use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use nickbook_core::{
    config::{AdminConfig, ExportConfig},
    NicknameRecord,
};
use nickbook_db::{NicknameRepository, RepositoryError};

const BASIC_REALM: &str = "Basic realm=\"nickbook-admin\"";
const LIST_TEMPLATE: &str = "admin/list.html";
const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const EXPORT_HEADERS: [&str; 7] = ["群組ID", "使用者ID", "名稱", "暱稱", "伺服器", "備註", "更新時間"];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("admin credentials required")]
    Unauthorized,
    #[error("failed to load nickname records: {0}")]
    Repository(#[from] RepositoryError),
    #[error("failed to render record list: {0}")]
    Template(#[from] tera::Error),
    #[error("failed to build export workbook: {0}")]
    Workbook(#[from] XlsxError),
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        if let Self::Unauthorized = self {
            return (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_REALM))],
                "Unauthorized",
            )
                .into_response();
        }

        error!(event_name = "admin.request_failed", error = %self, "admin request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

#[derive(Clone)]
pub struct AdminState {
    repository: Arc<dyn NicknameRepository>,
    username: String,
    password: SecretString,
    export_path: PathBuf,
    templates: Arc<Tera>,
}

impl AdminState {
    pub fn new(
        repository: Arc<dyn NicknameRepository>,
        admin: &AdminConfig,
        export: &ExportConfig,
    ) -> Result<Self, tera::Error> {
        Ok(Self {
            repository,
            username: admin.username.clone(),
            password: admin.password.clone(),
            export_path: export.path.clone(),
            templates: Arc::new(init_templates()?),
        })
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), AdminError> {
        let Some((username, password)) = basic_credentials(headers) else {
            return Err(AdminError::Unauthorized);
        };
        let username_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let password_ok = password.as_bytes().ct_eq(self.password.expose_secret().as_bytes());
        if bool::from(username_ok & password_ok) {
            Ok(())
        } else {
            Err(AdminError::Unauthorized)
        }
    }
}

fn init_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(LIST_TEMPLATE, include_str!("../../../templates/admin/list.html"))?;
    Ok(tera)
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/list", get(list_records))
        .route("/export", get(export_records))
        .with_state(state)
}

/// Decodes `Authorization: Basic <base64(user:password)>`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_owned(), password.to_owned()))
}

#[derive(Serialize)]
struct RecordRow {
    scope_id: String,
    user_id: String,
    display_name: String,
    nickname: String,
    server: String,
    note: String,
    updated_at: String,
}

impl From<NicknameRecord> for RecordRow {
    fn from(record: NicknameRecord) -> Self {
        Self {
            scope_id: record.scope_id.0,
            user_id: record.user_id.0,
            display_name: record.display_name,
            nickname: record.nickname,
            server: record.server,
            note: record.note,
            updated_at: record.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl RecordRow {
    fn cells(&self) -> [&str; 7] {
        [
            &self.scope_id,
            &self.user_id,
            &self.display_name,
            &self.nickname,
            &self.server,
            &self.note,
            &self.updated_at,
        ]
    }
}

async fn load_rows(state: &AdminState) -> Result<Vec<RecordRow>, AdminError> {
    let records = state.repository.list_all().await?;
    Ok(records.into_iter().map(RecordRow::from).collect())
}

pub async fn list_records(
    State(state): State<AdminState>,
    headers: HeaderMap,
) -> Result<Html<String>, AdminError> {
    state.authorize(&headers)?;

    let rows = load_rows(&state).await?;
    let mut context = Context::new();
    context.insert("records", &rows);

    Ok(Html(state.templates.render(LIST_TEMPLATE, &context)?))
}

pub async fn export_records(
    State(state): State<AdminState>,
    headers: HeaderMap,
) -> Result<Response, AdminError> {
    state.authorize(&headers)?;

    let rows = load_rows(&state).await?;
    let bytes = build_workbook(&rows)?;
    write_export(&state.export_path, &bytes).await?;

    info!(
        event_name = "admin.export.written",
        path = %state.export_path.display(),
        record_count = rows.len(),
        "wrote nickname export"
    );

    let filename = state
        .export_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("nicknames.xlsx")
        .to_owned();

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_owned()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// Writes to a sibling staging file, then renames it over `path`.
async fn write_export(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or("export");
    let staging = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    tokio::fs::write(&staging, bytes).await?;
    if let Err(error) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(error);
    }
    Ok(())
}

fn build_workbook(rows: &[RecordRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("暱稱清單")?;

    for (col, title) in (0_u16..).zip(EXPORT_HEADERS) {
        worksheet.write_string_with_format(0, col, title, &header_format)?;
        worksheet.set_column_width(col, 18)?;
    }

    for (row, record) in (1_u32..).zip(rows) {
        for (col, value) in (0_u16..).zip(record.cells()) {
            worksheet.write_string(row, col, value)?;
        }
    }

    workbook.save_to_buffer()
}
