//! Gateway trait: the boundary between the core and the game portal.
//!
//! The core never speaks HTTP itself. Every remote call goes through a
//! [`GameGateway`], which hands back the raw status, content type and body
//! so that [`crate::classify`] can decide what the response means.
//!
//! Implementations own session state (cookies, anti-forgery token) and
//! retry timed-out requests themselves; a call only returns once the portal
//! has answered or the transport failed for a reason other than a timeout.

use adept_types::{FollowerId, MissionId, ProgressId};

/// Errors a gateway surfaces to the core.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request could not be completed (connection refused, TLS, body
    /// read failure). Timeouts never surface here.
    #[error("transport error: {message}")]
    Http {
        /// Description of the failure.
        message: String,
    },

    /// Re-establishing the portal session failed.
    #[error("authentication failed: {message}")]
    AuthFailed {
        /// Description of the failure.
        message: String,
    },
}

/// A portal response as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Response body as text.
    pub body: String,
}

impl RawResponse {
    /// Build a `200 application/json` response from a JSON value.
    pub fn json(body: &serde_json::Value) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json".to_owned()),
            body: body.to_string(),
        }
    }
}

/// The remote operations the reconciliation loop needs.
///
/// Calls are issued strictly one at a time; no method is ever invoked while
/// another is still pending. Generic dispatch is used throughout, so the
/// trait does not need to be object safe.
#[allow(async_fn_in_trait)]
pub trait GameGateway {
    /// Fetch the full `HeroBag` state snapshot.
    async fn fetch_snapshot(&mut self) -> Result<RawResponse, GatewayError>;

    /// Acknowledge a finished progress via the captured completion link.
    async fn finish_progress(
        &mut self,
        link: &str,
        progress: ProgressId,
    ) -> Result<RawResponse, GatewayError>;

    /// Start a mission with the given followers via the captured start link.
    async fn start_mission(
        &mut self,
        link: &str,
        mission: MissionId,
        followers: &[FollowerId],
    ) -> Result<RawResponse, GatewayError>;

    /// Drop the current session and log in again.
    async fn reauthenticate(&mut self) -> Result<(), GatewayError>;

    /// Ping the external health check, if one is configured.
    async fn ping_health(&mut self) -> Result<(), GatewayError> {
        Ok(())
    }
}
