use std::sync::Arc;

use tracing::debug;

use crate::{
    client::{ClientError, LineClient},
    events::EventSource,
};

/// Resolves the display name stored alongside a registration.
///
/// Direct-chat lookups propagate failures. Group and room lookups fall back to the
/// raw user id, since member profiles are unavailable for users who are not friends
/// of the bot.
pub struct DisplayNameResolver {
    client: Arc<dyn LineClient>,
}

impl DisplayNameResolver {
    pub fn new(client: Arc<dyn LineClient>) -> Self {
        Self { client }
    }

    pub async fn resolve(
        &self,
        source: &EventSource,
        user_id: &str,
    ) -> Result<String, ClientError> {
        let lookup = match source {
            EventSource::User { .. } => {
                return Ok(self.client.get_profile(user_id).await?.display_name);
            }
            EventSource::Group { group_id, .. } => {
                self.client.get_group_member_profile(group_id, user_id).await
            }
            EventSource::Room { room_id, .. } => {
                self.client.get_room_member_profile(room_id, user_id).await
            }
        };

        match lookup {
            Ok(profile) => Ok(profile.display_name),
            Err(error) => {
                debug!(
                    event_name = "profile.lookup.fallback",
                    source_type = source.kind(),
                    user_id,
                    error = %error,
                    "member profile lookup failed; using user id"
                );
                Ok(user_id.to_owned())
            }
        }
    }
}
