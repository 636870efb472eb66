use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use runway_core::prelude::*;
use tracing::debug;

/// Issues `count` registration tokens concurrently. Any failure fails the batch.
pub async fn issue_tokens<R: RegistrationService>(
    registry: &R,
    count: u32,
) -> Result<Vec<RegistrationToken>, RegistrationError> {
    let tokens = try_join_all((0..count).map(|_| registry.issue_registration_token())).await?;
    let expires_at = earliest_expiry(&tokens);
    debug!(count = tokens.len(), ?expires_at, "Issued registration tokens");
    Ok(tokens)
}

/// When the first token of a batch stops being accepted, if the service says.
pub fn earliest_expiry(tokens: &[RegistrationToken]) -> Option<DateTime<Utc>> {
    tokens.iter().filter_map(|t| t.expires_at).min()
}
