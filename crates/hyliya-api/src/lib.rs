pub mod auth;
pub mod billing;
pub mod conversations;
pub mod discovery;
pub mod friends;
pub mod matchmaking;
pub mod messages;
pub mod middleware;
pub mod posts;
pub mod profiles;
pub mod state;

use tracing::warn;
use uuid::Uuid;

/// Parse a stored id, logging instead of failing the whole response when a
/// row is corrupt.
pub(crate) fn parse_uuid(s: &str, context: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", context, s, e);
        Uuid::default()
    })
}
