use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use nickbook_line::{
    events::parse_webhook_body, verify_signature, EventContext, WebhookDispatcher,
};

pub const SIGNATURE_HEADER: &str = "x-line-signature";

#[derive(Clone)]
pub struct WebhookState {
    dispatcher: Arc<WebhookDispatcher>,
    channel_secret: SecretString,
}

impl WebhookState {
    pub fn new(dispatcher: Arc<WebhookDispatcher>, channel_secret: SecretString) -> Self {
        Self { dispatcher, channel_secret }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/webhook", post(receive)).with_state(state)
}

pub async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    let verified = signature.is_some_and(|signature| {
        verify_signature(state.channel_secret.expose_secret(), &body, signature)
    });
    if !verified {
        warn!(
            event_name = "ingress.line.signature_rejected",
            correlation_id = %correlation_id,
            signature_present = signature.is_some(),
            "rejected webhook with invalid signature"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let payload = match parse_webhook_body(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(
                event_name = "ingress.line.body_rejected",
                correlation_id = %correlation_id,
                error = %error,
                "rejected malformed webhook body"
            );
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": error.to_string() })))
                .into_response();
        }
    };

    info!(
        event_name = "ingress.line.webhook_received",
        correlation_id = %correlation_id,
        destination = payload.destination.as_deref().unwrap_or("unknown"),
        event_count = payload.events.len(),
        "received line webhook"
    );

    let context = EventContext { correlation_id };
    let outcomes = state.dispatcher.handle_batch(payload.events, &context).await;
    (StatusCode::OK, Json(outcomes)).into_response()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use nickbook_db::InMemoryNicknameRepository;
    use nickbook_line::{
        signature::sign_body, ClientError, LineClient, MembershipGuard, Profile,
        WebhookDispatcher,
    };

    use super::{router, WebhookState, SIGNATURE_HEADER};

    pub(crate) const SECRET: &str = "channel-secret";

    /// Answers every profile lookup with a fixed name and records reply texts.
    #[derive(Clone, Default)]
    pub(crate) struct StubClient {
        pub(crate) replies: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LineClient for StubClient {
        async fn reply_text(&self, _reply_token: &str, text: &str) -> Result<(), ClientError> {
            self.replies.lock().expect("replies lock").push(text.to_owned());
            Ok(())
        }

        async fn leave_group(&self, _group_id: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn get_profile(&self, _user_id: &str) -> Result<Profile, ClientError> {
            Ok(Profile { display_name: "小明".to_owned() })
        }

        async fn get_group_member_profile(
            &self,
            _group_id: &str,
            _user_id: &str,
        ) -> Result<Profile, ClientError> {
            Ok(Profile { display_name: "小明".to_owned() })
        }

        async fn get_room_member_profile(
            &self,
            _room_id: &str,
            _user_id: &str,
        ) -> Result<Profile, ClientError> {
            Ok(Profile { display_name: "小明".to_owned() })
        }
    }

    fn webhook_router(client: &StubClient) -> Router {
        let dispatcher = WebhookDispatcher::new(
            Arc::new(client.clone()),
            Arc::new(InMemoryNicknameRepository::default()),
            MembershipGuard::new(["C-allowed"], true),
        );
        router(WebhookState::new(Arc::new(dispatcher), SecretString::from(SECRET.to_owned())))
    }

    fn signed_request(body: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/webhook");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body.to_owned())).expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn missing_or_invalid_signature_is_unauthorized() {
        let client = StubClient::default();
        let app = webhook_router(&client);
        let body = json!({
            "destination": "Ubot",
            "events": [{
                "type": "message",
                "replyToken": "rt",
                "source": { "type": "user", "userId": "U1" },
                "message": { "type": "text", "text": "@說明" }
            }]
        })
        .to_string();

        let missing = app.clone().oneshot(signed_request(&body, None)).await.expect("response");
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let forged = sign_body("other-secret", body.as_bytes());
        let invalid =
            app.oneshot(signed_request(&body, Some(forged))).await.expect("response");
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);

        assert!(client.replies.lock().expect("replies lock").is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let client = StubClient::default();
        let app = webhook_router(&client);
        let body = r#"{"destination":"Ubot"}"#;

        let response = app
            .oneshot(signed_request(body, Some(sign_body(SECRET, body.as_bytes()))))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signed_delivery_returns_outcomes_in_event_order() {
        let client = StubClient::default();
        let app = webhook_router(&client);
        let body = json!({
            "destination": "Ubot",
            "events": [
                {
                    "type": "message",
                    "replyToken": "rt-1",
                    "source": { "type": "user", "userId": "U1" },
                    "message": { "type": "text", "text": "@登記暱稱/Tank/Asgard" }
                },
                { "type": "unfollow" },
                {
                    "type": "leave",
                    "source": { "type": "group", "groupId": "C-other" }
                }
            ]
        })
        .to_string();

        let response = app
            .oneshot(signed_request(&body, Some(sign_body(SECRET, body.as_bytes()))))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let outcomes = json_body(response).await;
        assert_eq!(outcomes[0], json!({ "status": "replied" }));
        assert_eq!(outcomes[1]["status"], "failed");
        assert_eq!(outcomes[2], json!({ "status": "ignored" }));
        assert_eq!(
            *client.replies.lock().expect("replies lock"),
            vec!["✅ 暱稱已登記為：Tank".to_owned()]
        );
    }

    #[tokio::test]
    async fn empty_event_list_is_accepted() {
        let client = StubClient::default();
        let app = webhook_router(&client);
        let body = r#"{"destination":"Ubot","events":[]}"#;

        let response = app
            .oneshot(signed_request(body, Some(sign_body(SECRET, body.as_bytes()))))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
    }
}
