//! Response classification: every portal reply maps to exactly one outcome.
//!
//! Action replies share one envelope:
//!
//! ```text
//! { "spec": { "operationResult": { "status": "Success", "actionFailCause": "..." },
//!             "updateData": { ...repositories... } } }
//! ```
//!
//! | Reply                                              | Outcome     |
//! |----------------------------------------------------|-------------|
//! | not JSON, or no `spec` object                      | `Malformed` |
//! | `spec` present, status other than `Success`        | `GameError` |
//! | HTTP 200, status `Success`, decodable `updateData` | `Success`   |
//! | status `Success` on a non-200 reply, bad delta     | `Malformed` |
//!
//! Snapshot replies are classified separately: a non-JSON snapshot means the
//! session expired and the portal served its login page.

use adept_types::{StateDelta, StateSnapshot};
use serde_json::Value;

use crate::gateway::RawResponse;
use crate::planner::WithholdReason;

/// The status string the portal uses for an accepted operation.
const STATUS_SUCCESS: &str = "Success";

/// An accepted action and the state it changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSuccess {
    /// Server-supplied `actionFailCause`; the portal fills it even on success.
    pub cause: Option<String>,
    /// Repositories to merge into the store.
    pub delta: StateDelta,
}

/// An action the portal understood and refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFailure {
    /// HTTP status code.
    pub http_status: u16,
    /// The `operationResult.status` value, if any.
    pub status: Option<String>,
    /// The server-reported failure cause.
    pub cause: Option<String>,
}

impl core::fmt::Display for GameFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "status {} ({}): {}",
            self.status.as_deref().unwrap_or("missing"),
            self.http_status,
            self.cause.as_deref().unwrap_or("no cause reported")
        )
    }
}

/// A reply that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Full response body, kept for diagnosis.
    pub body: String,
    /// What was wrong with it.
    pub detail: String,
}

/// Outcome of one mission or progress action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The portal accepted the action.
    Success(ActionSuccess),
    /// The planner withheld the action before any network call.
    TransientRejection(WithholdReason),
    /// The portal understood and rejected the action.
    GameError(GameFailure),
    /// The reply could not be interpreted.
    Malformed(MalformedResponse),
}

/// Outcome kind without payload, for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// See [`ActionOutcome::Success`].
    Success,
    /// See [`ActionOutcome::TransientRejection`].
    TransientRejection,
    /// See [`ActionOutcome::GameError`].
    GameError,
    /// See [`ActionOutcome::Malformed`].
    Malformed,
}

impl ActionOutcome {
    /// Drop the payload.
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::TransientRejection(_) => OutcomeKind::TransientRejection,
            Self::GameError(_) => OutcomeKind::GameError,
            Self::Malformed(_) => OutcomeKind::Malformed,
        }
    }
}

/// Outcome of a snapshot fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    /// A decoded snapshot.
    Snapshot(Box<StateSnapshot>),
    /// The portal answered with something other than JSON.
    AuthExpired {
        /// HTTP status code.
        status: u16,
        /// Why the reply was judged non-JSON.
        detail: String,
    },
    /// JSON with an unexpected shape.
    Malformed(MalformedResponse),
}

fn malformed(response: &RawResponse, detail: impl Into<String>) -> MalformedResponse {
    MalformedResponse {
        status: response.status,
        body: response.body.clone(),
        detail: detail.into(),
    }
}

/// Render a cause value as text: strings verbatim, anything else as JSON.
fn cause_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Classify the reply to a complete-progress or start-mission action.
pub fn classify(response: &RawResponse) -> ActionOutcome {
    let value: Value = match serde_json::from_str(&response.body) {
        Ok(value) => value,
        Err(e) => return ActionOutcome::Malformed(malformed(response, format!("body is not JSON: {e}"))),
    };
    let Some(spec) = value.get("spec").filter(|spec| spec.is_object()) else {
        return ActionOutcome::Malformed(malformed(response, "missing `spec` object"));
    };

    let operation = spec.get("operationResult");
    let status = operation
        .and_then(|op| op.get("status"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);
    let cause = cause_text(operation.and_then(|op| op.get("actionFailCause")));

    if status.as_deref() != Some(STATUS_SUCCESS) {
        return ActionOutcome::GameError(GameFailure {
            http_status: response.status,
            status,
            cause,
        });
    }

    if response.status != 200 {
        return ActionOutcome::Malformed(malformed(
            response,
            format!("success envelope on HTTP {}", response.status),
        ));
    }

    let delta = match spec.get("updateData") {
        None | Some(Value::Null) => StateDelta::default(),
        Some(update) => match StateDelta::from_value(update) {
            Ok(delta) => delta,
            Err(e) => {
                return ActionOutcome::Malformed(malformed(response, format!("bad `updateData`: {e}")));
            }
        },
    };

    ActionOutcome::Success(ActionSuccess { cause, delta })
}

/// Classify the reply to a `HeroBag` snapshot fetch.
pub fn classify_snapshot(response: &RawResponse) -> SnapshotOutcome {
    if let Some(content_type) = response.content_type.as_deref() {
        if !content_type.to_ascii_lowercase().contains("json") {
            return SnapshotOutcome::AuthExpired {
                status: response.status,
                detail: format!("unexpected content type `{content_type}`"),
            };
        }
    }

    let value: Value = match serde_json::from_str(&response.body) {
        Ok(value) => value,
        Err(e) => {
            return SnapshotOutcome::AuthExpired {
                status: response.status,
                detail: format!("body is not JSON: {e}"),
            };
        }
    };

    if response.status != 200 {
        return SnapshotOutcome::Malformed(malformed(
            response,
            format!("HTTP {}", response.status),
        ));
    }
    let Some(spec) = value.get("spec").filter(|spec| spec.is_object()) else {
        return SnapshotOutcome::Malformed(malformed(response, "missing `spec` object"));
    };

    match StateSnapshot::from_value(spec) {
        Ok(snapshot) => SnapshotOutcome::Snapshot(Box::new(snapshot)),
        Err(e) => SnapshotOutcome::Malformed(malformed(response, e.to_string())),
    }
}
