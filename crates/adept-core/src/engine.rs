//! Reconciliation engine: drives one tick to a fixpoint.
//!
//! Each pass runs two phases against the [`StateStore`]:
//!
//! 1. **Draining progresses** -- every finished mission progress is
//!    acknowledged with the portal. A success removes the progress and merges
//!    the returned delta. The second success in one scan ends the scan early
//!    so the next pass works from fresh state.
//!
//! 2. **Attempting missions** -- case missions, then cost-free mining
//!    missions, then invasions, each sorted by `(duration, capacity)`, are
//!    planned and started. Battle and cult missions are left for manual play.
//!
//! Any accepted action marks the pass dirty and triggers another pass. A
//! pass with no accepted action ends the tick. The number of passes per tick
//! is capped; hitting the cap is logged and the tick ends normally.
//!
//! Nothing here retries within a pass: rejected or unreadable replies are
//! logged and the engine moves on to the next progress or mission.

use std::collections::BTreeSet;

use adept_types::{
    ActionLinks, Follower, FollowerId, Mission, MissionCategory, MissionId, Progress, ProgressId,
    ResourceWallet,
};
use chrono::Utc;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::classify::{ActionOutcome, OutcomeKind, classify};
use crate::gateway::GameGateway;
use crate::planner::{Decision, plan_assignment};
use crate::store::StateStore;

/// Mission categories attempted automatically, in priority order.
pub const AUTO_ATTEMPT_ORDER: [MissionCategory; 3] = [
    MissionCategory::Case,
    MissionCategory::Mining,
    MissionCategory::Invasion,
];

/// Default ceiling on convergence passes within one tick.
pub const DEFAULT_MAX_PASSES: u32 = 16;

/// Completions after which the rest of a drain scan is deferred.
const DRAIN_CHANGES_BEFORE_RESCAN: u32 = 2;

/// One mission considered during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionAttempt {
    /// The mission.
    pub mission_id: MissionId,
    /// Its category.
    pub category: MissionCategory,
    /// The planner's verdict.
    pub decision: Decision,
    /// How the attempt ended. Withheld missions report
    /// [`OutcomeKind::TransientRejection`]; `None` means the transport failed.
    pub outcome: Option<OutcomeKind>,
}

/// Everything that happened in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// 1-based pass number within the tick.
    pub pass: u32,
    /// Progresses the portal acknowledged.
    pub completed: Vec<ProgressId>,
    /// Whether the drain scan stopped early to favour fresh state.
    pub drain_deferred: bool,
    /// Missions planned, in attempt order.
    pub attempts: Vec<MissionAttempt>,
    /// Actions the portal rejected.
    pub game_errors: u32,
    /// Replies that could not be interpreted.
    pub malformed: u32,
    /// Calls that failed in transport.
    pub transport_failures: u32,
    /// Whether an accepted action changed the state.
    pub dirty: bool,
}

impl PassReport {
    fn new(pass: u32) -> Self {
        Self {
            pass,
            ..Self::default()
        }
    }

    /// Missions the portal accepted in this pass.
    pub fn started(&self) -> impl Iterator<Item = MissionId> + '_ {
        self.attempts
            .iter()
            .filter(|attempt| attempt.outcome == Some(OutcomeKind::Success))
            .map(|attempt| attempt.mission_id)
    }

    fn record(&mut self, outcome: &ActionOutcome) {
        match outcome.kind() {
            OutcomeKind::Success => self.dirty = true,
            OutcomeKind::GameError => self.game_errors = self.game_errors.saturating_add(1),
            OutcomeKind::Malformed => self.malformed = self.malformed.saturating_add(1),
            OutcomeKind::TransientRejection => {}
        }
    }
}

/// Result of a whole tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// One report per pass, in order.
    pub passes: Vec<PassReport>,
    /// `false` when the pass ceiling cut the tick short.
    pub converged: bool,
}

impl TickSummary {
    /// All acknowledged progresses.
    pub fn completed(&self) -> Vec<ProgressId> {
        self.passes
            .iter()
            .flat_map(|pass| pass.completed.iter().copied())
            .collect()
    }

    /// All started missions.
    pub fn started(&self) -> Vec<MissionId> {
        self.passes.iter().flat_map(|pass| pass.started()).collect()
    }
}

/// Missions of `category` that may be attempted, sorted by
/// `(duration, capacity)` with ties in encounter order.
///
/// Mining additionally requires the mission to be cost-free.
pub fn eligible_missions<'a, I>(missions: I, category: MissionCategory) -> Vec<&'a Mission>
where
    I: IntoIterator<Item = &'a Mission>,
{
    let mut eligible: Vec<&Mission> = missions
        .into_iter()
        .filter(|m| m.is_idle() && m.category == category)
        .filter(|m| category != MissionCategory::Mining || m.cost.is_free())
        .collect();
    eligible.sort_by_key(|m| (m.duration, m.capacity));
    eligible
}

/// The per-tick convergence loop.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    max_passes: u32,
    span: Span,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PASSES)
    }
}

impl ReconciliationEngine {
    /// Create an engine allowing at most `max_passes` passes per tick
    /// (at least one).
    pub fn new(max_passes: u32) -> Self {
        Self {
            max_passes: max_passes.max(1),
            span: info_span!("engine"),
        }
    }

    /// Emit all engine events inside `span` instead of the default one.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The configured pass ceiling.
    pub const fn max_passes(&self) -> u32 {
        self.max_passes
    }

    /// Run passes until one changes nothing or the ceiling is reached.
    pub async fn run_tick<G: GameGateway>(
        &self,
        store: &mut StateStore,
        links: &ActionLinks,
        gateway: &mut G,
    ) -> TickSummary {
        self.converge(store, links, gateway)
            .instrument(self.span.clone())
            .await
    }

    async fn converge<G: GameGateway>(
        &self,
        store: &mut StateStore,
        links: &ActionLinks,
        gateway: &mut G,
    ) -> TickSummary {
        let mut summary = TickSummary::default();

        for pass in 1..=self.max_passes {
            let wallet = store.wallet().clone();
            let mut report = PassReport::new(pass);

            debug!(pass, "draining progresses");
            Self::drain_progresses(store, links, gateway, &mut report).await;

            debug!(pass, "attempting missions");
            Self::attempt_missions(store, links, gateway, &wallet, &mut report).await;

            let dirty = report.dirty;
            summary.passes.push(report);
            if !dirty {
                summary.converged = true;
                info!(
                    passes = pass,
                    completed = summary.completed().len(),
                    started = summary.started().len(),
                    "tick converged"
                );
                return summary;
            }
            debug!(pass, "state changed, re-entering drain phase");
        }

        warn!(
            max_passes = self.max_passes,
            "convergence ceiling reached with state still changing, ending tick"
        );
        summary
    }

    /// Acknowledge finished mission progresses.
    ///
    /// Scans an immutable copy of the progress list taken at the start of the
    /// scan, so merges during the scan never disturb the iteration.
    pub async fn drain_progresses<G: GameGateway>(
        store: &mut StateStore,
        links: &ActionLinks,
        gateway: &mut G,
        report: &mut PassReport,
    ) {
        let scan: Vec<Progress> = store.progresses().iter().cloned().collect();
        let now = Utc::now();
        let mut changes: u32 = 0;

        for (index, progress) in scan.iter().enumerate() {
            if !progress.is_mission() {
                debug!(progress_id = %progress.id, "skipping non-mission progress");
                continue;
            }
            if !progress.finished {
                debug!(
                    progress_id = %progress.id,
                    remaining = %progress.format_remaining(now),
                    "progress still running"
                );
                continue;
            }

            info!(
                progress_id = %progress.id,
                mission_id = ?progress.mission_id.map(|id| id.into_inner()),
                "progress finished, submitting completion"
            );
            let response = match gateway.finish_progress(&links.finish_progress, progress.id).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(progress_id = %progress.id, error = %e, "completion request failed");
                    report.transport_failures = report.transport_failures.saturating_add(1);
                    continue;
                }
            };

            let outcome = classify(&response);
            report.record(&outcome);
            match outcome {
                ActionOutcome::Success(success) => {
                    info!(
                        progress_id = %progress.id,
                        cause = success.cause.as_deref().unwrap_or_default(),
                        "completion acknowledged"
                    );
                    // The delta may still list the acknowledged progress.
                    store.merge_delta(success.delta);
                    store.acknowledge_progress(progress.id);
                    report.completed.push(progress.id);
                    changes = changes.saturating_add(1);
                }
                ActionOutcome::GameError(failure) => {
                    warn!(progress_id = %progress.id, failure = %failure, "completion rejected");
                }
                ActionOutcome::Malformed(malformed) => {
                    warn!(
                        progress_id = %progress.id,
                        status = malformed.status,
                        detail = %malformed.detail,
                        body = %malformed.body,
                        "unreadable completion reply"
                    );
                }
                ActionOutcome::TransientRejection(reason) => {
                    debug!(progress_id = %progress.id, reason = %reason, "completion withheld");
                }
            }

            let remaining = scan.len().saturating_sub(index.saturating_add(1));
            if changes >= DRAIN_CHANGES_BEFORE_RESCAN && remaining > 0 {
                info!(
                    deferred = remaining,
                    "state changed twice, deferring rest of the drain to the next pass"
                );
                report.drain_deferred = true;
                break;
            }
        }
    }

    /// Plan and start eligible missions in category priority order.
    ///
    /// Cost checks read `wallet`, the balance captured at the start of the
    /// pass. Followers bound by an accepted start are not offered again in
    /// the same pass, and no mission is attempted twice in one pass.
    pub async fn attempt_missions<G: GameGateway>(
        store: &mut StateStore,
        links: &ActionLinks,
        gateway: &mut G,
        wallet: &ResourceWallet,
        report: &mut PassReport,
    ) {
        let mut committed: BTreeSet<FollowerId> = BTreeSet::new();
        let mut attempted: BTreeSet<MissionId> = BTreeSet::new();

        for category in AUTO_ATTEMPT_ORDER {
            let eligible: Vec<Mission> = eligible_missions(store.missions(), category)
                .into_iter()
                .cloned()
                .collect();
            if eligible.is_empty() {
                continue;
            }
            info!(category = %category, count = eligible.len(), "eligible missions");

            for mission in eligible {
                let still_idle = store.missions().get(mission.id).is_some_and(Mission::is_idle);
                if !still_idle || !attempted.insert(mission.id) {
                    continue;
                }

                let decision = {
                    let candidates: Vec<&Follower> = store
                        .followers()
                        .iter()
                        .filter(|f| !committed.contains(&f.id))
                        .collect();
                    plan_assignment(&mission, candidates, wallet)
                };

                let outcome = match &decision {
                    Decision::Withhold(reason) => {
                        info!(
                            mission_id = %mission.id,
                            category = %category,
                            reason = %reason,
                            "mission withheld"
                        );
                        Some(OutcomeKind::TransientRejection)
                    }
                    Decision::Proceed(followers) => {
                        Self::start_mission(store, links, gateway, &mission, followers, report)
                            .await
                            .inspect(|kind| {
                                if *kind == OutcomeKind::Success {
                                    committed.extend(followers.iter().copied());
                                }
                            })
                    }
                };

                report.attempts.push(MissionAttempt {
                    mission_id: mission.id,
                    category,
                    decision,
                    outcome,
                });
            }
        }
    }

    /// Submit one start action and apply its outcome.
    async fn start_mission<G: GameGateway>(
        store: &mut StateStore,
        links: &ActionLinks,
        gateway: &mut G,
        mission: &Mission,
        followers: &[FollowerId],
        report: &mut PassReport,
    ) -> Option<OutcomeKind> {
        debug!(
            mission_id = %mission.id,
            name = %mission.name,
            duration = mission.duration,
            difficulty = ?mission.difficulty,
            experience = ?mission.experience,
            followers = ?followers.iter().map(|id| id.into_inner()).collect::<Vec<_>>(),
            "starting mission"
        );
        let response = match gateway
            .start_mission(&links.start_mission, mission.id, followers)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(mission_id = %mission.id, error = %e, "start request failed");
                report.transport_failures = report.transport_failures.saturating_add(1);
                return None;
            }
        };

        let outcome = classify(&response);
        report.record(&outcome);
        let kind = outcome.kind();
        match outcome {
            ActionOutcome::Success(success) => {
                info!(
                    mission_id = %mission.id,
                    category = %mission.category,
                    followers = followers.len(),
                    cause = success.cause.as_deref().unwrap_or_default(),
                    "mission started"
                );
                store.merge_delta(success.delta);
            }
            ActionOutcome::GameError(failure) => {
                warn!(mission_id = %mission.id, failure = %failure, "mission start rejected");
            }
            ActionOutcome::Malformed(malformed) => {
                warn!(
                    mission_id = %mission.id,
                    status = malformed.status,
                    detail = %malformed.detail,
                    body = %malformed.body,
                    "unreadable mission start reply"
                );
            }
            ActionOutcome::TransientRejection(reason) => {
                debug!(mission_id = %mission.id, reason = %reason, "mission start withheld");
            }
        }
        Some(kind)
    }
}
