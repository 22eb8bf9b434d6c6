use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use nickbook_core::config::LineConfig;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("line api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("line api returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
}

/// Messaging API calls the bot depends on.
#[async_trait]
pub trait LineClient: Send + Sync {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), ClientError>;
    async fn leave_group(&self, group_id: &str) -> Result<(), ClientError>;
    async fn get_profile(&self, user_id: &str) -> Result<Profile, ClientError>;
    async fn get_group_member_profile(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<Profile, ClientError>;
    async fn get_room_member_profile(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<Profile, ClientError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

pub struct HttpLineClient {
    http: Client,
    base_url: String,
    access_token: SecretString,
}

impl HttpLineClient {
    pub fn new(base_url: impl Into<String>, access_token: SecretString) -> Self {
        Self { http: Client::new(), base_url: base_url.into(), access_token }
    }

    pub fn from_config(config: &LineConfig) -> Self {
        Self::new(config.api_base_url.clone(), config.channel_access_token.clone())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.access_token.expose_secret())
    }

    async fn fetch_profile(&self, path: String) -> Result<Profile, ClientError> {
        let response = self.authorized(self.http.get(self.endpoint(&path))).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status: status.as_u16(), body })
}

#[async_trait]
impl LineClient for HttpLineClient {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), ClientError> {
        let payload = ReplyRequest { reply_token, messages: [TextMessage { kind: "text", text }] };
        let response = self
            .authorized(self.http.post(self.endpoint("v2/bot/message/reply")))
            .json(&payload)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn leave_group(&self, group_id: &str) -> Result<(), ClientError> {
        let path = format!("v2/bot/group/{group_id}/leave");
        let response = self.authorized(self.http.post(self.endpoint(&path))).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, ClientError> {
        self.fetch_profile(format!("v2/bot/profile/{user_id}")).await
    }

    async fn get_group_member_profile(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<Profile, ClientError> {
        self.fetch_profile(format!("v2/bot/group/{group_id}/member/{user_id}")).await
    }

    async fn get_room_member_profile(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<Profile, ClientError> {
        self.fetch_profile(format!("v2/bot/room/{room_id}/member/{user_id}")).await
    }
}
