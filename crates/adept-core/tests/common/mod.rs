//! Shared fixtures: a scripted gateway and JSON builders for portal payloads.

#![allow(dead_code)]

use std::collections::VecDeque;

use adept_core::gateway::{GameGateway, GatewayError, RawResponse};
use adept_core::store::StateStore;
use adept_types::{ActionLinks, FollowerId, MissionId, ProgressId, StateSnapshot};
use serde_json::{Value, json};

/// Completion link used by every fixture snapshot.
pub const FINISH_LINK: &str = "/cult/HeroBag:finishProgress";

/// Mission start link used by every fixture snapshot.
pub const START_LINK: &str = "/cult/HeroBag:fuse";

/// One gateway call, as recorded by [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `fetch_snapshot`
    Snapshot,
    /// `finish_progress`
    Finish(ProgressId),
    /// `start_mission`
    Start(MissionId, Vec<FollowerId>),
    /// `reauthenticate`
    Reauth,
    /// `ping_health`
    Ping,
}

/// A gateway that replays queued replies and records every call.
///
/// An exhausted action queue answers with a game error; an exhausted
/// snapshot queue answers with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    /// Replies to `fetch_snapshot`, in order.
    pub snapshots: VecDeque<Result<RawResponse, GatewayError>>,
    /// Replies to `finish_progress`, in order.
    pub finishes: VecDeque<Result<RawResponse, GatewayError>>,
    /// Replies to `start_mission`, in order.
    pub starts: VecDeque<Result<RawResponse, GatewayError>>,
    /// Every call made, in order.
    pub calls: Vec<Call>,
}

impl ScriptedGateway {
    /// Gateway with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot reply.
    pub fn snapshot(mut self, response: RawResponse) -> Self {
        self.snapshots.push_back(Ok(response));
        self
    }

    /// Queue a completion reply.
    pub fn finish(mut self, response: RawResponse) -> Self {
        self.finishes.push_back(Ok(response));
        self
    }

    /// Queue a start reply.
    pub fn start(mut self, response: RawResponse) -> Self {
        self.starts.push_back(Ok(response));
        self
    }

    /// Queue a transport failure for the next completion.
    pub fn finish_transport_error(mut self) -> Self {
        self.finishes.push_back(Err(GatewayError::Http {
            message: String::from("connection reset"),
        }));
        self
    }

    /// Start calls, in order.
    pub fn started(&self) -> Vec<(MissionId, Vec<FollowerId>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Start(mission, followers) => Some((*mission, followers.clone())),
                _ => None,
            })
            .collect()
    }

    /// How many times `call` was made.
    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl GameGateway for ScriptedGateway {
    async fn fetch_snapshot(&mut self) -> Result<RawResponse, GatewayError> {
        self.calls.push(Call::Snapshot);
        self.snapshots.pop_front().unwrap_or_else(|| {
            Err(GatewayError::Http {
                message: String::from("no snapshot scripted"),
            })
        })
    }

    async fn finish_progress(
        &mut self,
        link: &str,
        progress: ProgressId,
    ) -> Result<RawResponse, GatewayError> {
        assert_eq!(link, FINISH_LINK);
        self.calls.push(Call::Finish(progress));
        self.finishes
            .pop_front()
            .unwrap_or_else(|| Ok(game_error("Unscripted")))
    }

    async fn start_mission(
        &mut self,
        link: &str,
        mission: MissionId,
        followers: &[FollowerId],
    ) -> Result<RawResponse, GatewayError> {
        assert_eq!(link, START_LINK);
        self.calls.push(Call::Start(mission, followers.to_vec()));
        self.starts
            .pop_front()
            .unwrap_or_else(|| Ok(game_error("Unscripted")))
    }

    async fn reauthenticate(&mut self) -> Result<(), GatewayError> {
        self.calls.push(Call::Reauth);
        Ok(())
    }

    async fn ping_health(&mut self) -> Result<(), GatewayError> {
        self.calls.push(Call::Ping);
        Ok(())
    }
}

/// The fixture action links.
pub fn links() -> ActionLinks {
    ActionLinks {
        finish_progress: FINISH_LINK.to_owned(),
        start_mission: START_LINK.to_owned(),
    }
}

/// A mission entry. `cost` of zero means a free mission.
pub fn mission(id: u64, kind: &str, duration: u64, slots: u32, professions: &[u64], cost: u64) -> Value {
    let currencies: Vec<Value> = if cost == 0 {
        Vec::new()
    } else {
        vec![json!({"id": 1, "amount": cost})]
    };
    let professions: Vec<Value> = professions.iter().map(|id| json!({"id": id})).collect();
    json!({
        "id": id,
        "name": format!("Mission {id}"),
        "type": kind,
        "inProgress": false,
        "duration": duration,
        "slotCount": slots,
        "professions": professions,
        "price": {"currencies": currencies, "resources": []}
    })
}

/// A mission entry that is already running.
pub fn busy_mission(id: u64, kind: &str) -> Value {
    let mut value = mission(id, kind, 600, 1, &[], 0);
    value["inProgress"] = Value::Bool(true);
    value
}

/// A follower entry.
pub fn follower(id: u64, efficiency: f64, profession: u64, in_progress: bool) -> Value {
    json!({
        "id": id,
        "efficiency": efficiency,
        "inProgress": in_progress,
        "profession": {"id": profession}
    })
}

/// A mission progress entry.
pub fn progress(id: u64, mission_id: u64, finished: bool) -> Value {
    json!({
        "id": id,
        "finished": finished,
        "startTime": 1_700_000_000_000_i64,
        "endTime": 1_700_000_600_000_i64,
        "fuseData": {"missionId": mission_id}
    })
}

/// A full `spec` object with links.
pub fn state(progresses: Vec<Value>, missions: Vec<Value>, followers: Vec<Value>, wallet: Value) -> Value {
    json!({
        "progresses": progresses,
        "missions": missions,
        "followers": followers,
        "wallet": wallet,
        "finishProgressOperationLink": FINISH_LINK,
        "fuseOperationLink": START_LINK
    })
}

/// Wrap a `spec` object as a snapshot reply.
pub fn snapshot_reply(spec: Value) -> RawResponse {
    RawResponse::json(&json!({ "spec": spec }))
}

/// A store loaded from a `spec` object.
pub fn store(spec: &Value) -> StateStore {
    let mut store = StateStore::new();
    match StateSnapshot::from_value(spec) {
        Ok(snapshot) => {
            store.replace(snapshot);
        }
        Err(e) => panic!("fixture snapshot did not decode: {e}"),
    }
    store
}

/// An accepted action carrying `update` as its delta.
pub fn success(update: Value) -> RawResponse {
    RawResponse::json(&json!({
        "spec": {
            "operationResult": {"status": "Success", "actionFailCause": "None"},
            "updateData": update
        }
    }))
}

/// An accepted action with no delta.
pub fn bare_success() -> RawResponse {
    RawResponse::json(&json!({"spec": {"operationResult": {"status": "Success"}}}))
}

/// A rejected action.
pub fn game_error(cause: &str) -> RawResponse {
    RawResponse::json(&json!({
        "spec": {"operationResult": {"status": "Fail", "actionFailCause": cause}}
    }))
}

/// The portal's login page, served when the session has expired.
pub fn login_page() -> RawResponse {
    RawResponse {
        status: 200,
        content_type: Some(String::from("text/html; charset=utf-8")),
        body: String::from("<html><form id=\"login\"></form></html>"),
    }
}
