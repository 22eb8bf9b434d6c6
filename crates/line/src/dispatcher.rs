use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use nickbook_db::NicknameRepository;

use crate::{
    client::{ClientError, LineClient},
    commands::{parse_nickname_command, CommandEnvelope, CommandRouter},
    events::{EventKind, EventParseError, EventSource, LineEvent},
    guard::{GuardDecision, MembershipGuard},
    messages,
    profile::DisplayNameResolver,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// Result of one webhook event, reported back in the webhook response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventOutcome {
    Replied,
    Welcomed,
    LeftGroup { group_id: String },
    Ignored,
    Failed { error: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Parse(#[from] EventParseError),
    #[error("profile lookup failed: {0}")]
    Profile(#[source] ClientError),
    #[error("reply failed: {0}")]
    Reply(#[source] ClientError),
    #[error("leave group failed: {0}")]
    Leave(#[source] ClientError),
}

/// Runs each webhook event through guard, parser, resolver, and router.
pub struct WebhookDispatcher {
    client: Arc<dyn LineClient>,
    router: CommandRouter,
    resolver: DisplayNameResolver,
    guard: MembershipGuard,
}

impl WebhookDispatcher {
    pub fn new(
        client: Arc<dyn LineClient>,
        repository: Arc<dyn NicknameRepository>,
        guard: MembershipGuard,
    ) -> Self {
        Self {
            resolver: DisplayNameResolver::new(client.clone()),
            router: CommandRouter::new(repository),
            client,
            guard,
        }
    }

    /// Handles every event concurrently. Outcomes keep the order of `events`, and a
    /// failing event never affects its siblings.
    pub async fn handle_batch(
        &self,
        events: Vec<Value>,
        ctx: &EventContext,
    ) -> Vec<EventOutcome> {
        let handlers =
            events.into_iter().enumerate().map(|(index, raw)| self.handle_raw(index, raw, ctx));
        join_all(handlers).await
    }

    async fn handle_raw(&self, index: usize, raw: Value, ctx: &EventContext) -> EventOutcome {
        let result = match LineEvent::from_value(raw) {
            Ok(event) => self.handle_event(&event, ctx).await,
            Err(parse_error) => Err(parse_error.into()),
        };

        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "ingress.line.event_failed",
                    correlation_id = %ctx.correlation_id,
                    event_index = index,
                    error = %error,
                    "webhook event failed; continuing batch"
                );
                EventOutcome::Failed { error: error.to_string() }
            }
        }
    }

    pub async fn handle_event(
        &self,
        event: &LineEvent,
        ctx: &EventContext,
    ) -> Result<EventOutcome, DispatchError> {
        info!(
            event_name = "ingress.line.event_received",
            correlation_id = %ctx.correlation_id,
            event_type = event.kind.name(),
            source_type = event.source.kind(),
            scope_id = %event.source.scope_id(),
            webhook_event_id = event.webhook_event_id.as_deref().unwrap_or("unknown"),
            "received line event"
        );

        if event.kind == EventKind::Leave {
            return Ok(EventOutcome::Ignored);
        }

        if let GuardDecision::Rejected { group_id } = self.guard.check(&event.source) {
            return self.reject_group(event, group_id, ctx).await;
        }

        match &event.kind {
            EventKind::Join => self.welcome(event).await,
            EventKind::TextMessage { text } => self.handle_text(event, text, ctx).await,
            EventKind::OtherMessage { .. } | EventKind::Unsupported { .. } | EventKind::Leave => {
                Ok(EventOutcome::Ignored)
            }
        }
    }

    async fn reject_group(
        &self,
        event: &LineEvent,
        group_id: String,
        ctx: &EventContext,
    ) -> Result<EventOutcome, DispatchError> {
        if let Some(reply_token) = event.reply_token.as_deref() {
            if let Err(error) =
                self.client.reply_text(reply_token, messages::GROUP_REJECTED_NOTICE).await
            {
                warn!(
                    event_name = "guard.notice_failed",
                    correlation_id = %ctx.correlation_id,
                    group_id = %group_id,
                    error = %error,
                    "failed to send rejection notice; leaving anyway"
                );
            }
        }

        self.client.leave_group(&group_id).await.map_err(DispatchError::Leave)?;
        info!(
            event_name = "guard.left_group",
            correlation_id = %ctx.correlation_id,
            group_id = %group_id,
            "left group that is not on the allow-list"
        );
        Ok(EventOutcome::LeftGroup { group_id })
    }

    async fn welcome(&self, event: &LineEvent) -> Result<EventOutcome, DispatchError> {
        let EventSource::Group { .. } = event.source else {
            return Ok(EventOutcome::Ignored);
        };
        if !self.guard.welcome_on_join() {
            return Ok(EventOutcome::Ignored);
        }
        let Some(reply_token) = event.reply_token.as_deref() else {
            return Ok(EventOutcome::Ignored);
        };

        self.client
            .reply_text(reply_token, messages::GROUP_WELCOME)
            .await
            .map_err(DispatchError::Reply)?;
        Ok(EventOutcome::Welcomed)
    }

    async fn handle_text(
        &self,
        event: &LineEvent,
        text: &str,
        ctx: &EventContext,
    ) -> Result<EventOutcome, DispatchError> {
        let (Some(user_id), Some(reply_token)) =
            (event.source.user_id(), event.reply_token.as_deref())
        else {
            debug!(
                correlation_id = %ctx.correlation_id,
                source_type = event.source.kind(),
                "text message without user id or reply token; ignoring"
            );
            return Ok(EventOutcome::Ignored);
        };

        let display_name = self
            .resolver
            .resolve(&event.source, user_id.as_str())
            .await
            .map_err(DispatchError::Profile)?;

        let envelope =
            CommandEnvelope { scope_id: event.source.scope_id(), user_id, display_name };
        let reply = self.router.route(parse_nickname_command(text), &envelope).await;

        self.client.reply_text(reply_token, &reply).await.map_err(DispatchError::Reply)?;
        Ok(EventOutcome::Replied)
    }
}
