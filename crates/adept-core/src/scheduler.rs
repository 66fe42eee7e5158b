//! Poll scheduler: the outer loop of fetch, reconcile and sleep.
//!
//! Every tick fetches a fresh snapshot, replaces the [`StateStore`], runs the
//! [`ReconciliationEngine`] to a fixpoint, pings the health check and then
//! sleeps for a jittered delay of the configured interval +/- 25%. Ticks never
//! overlap: the next fetch only starts after the sleep.
//!
//! The action links handed out with the snapshot are captured the first time
//! they appear. A first snapshot without them is fatal; later snapshots
//! without them keep the captured pair.

use std::convert::Infallible;
use std::time::Duration;

use adept_types::ActionLinks;
use rand::Rng;
use tracing::{Instrument, Span, error, info, info_span, warn};

use crate::classify::{SnapshotOutcome, classify_snapshot};
use crate::engine::{ReconciliationEngine, TickSummary};
use crate::gateway::GameGateway;
use crate::store::StateStore;

/// Default polling interval, in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 6;

/// Default number of re-authentications attempted for one snapshot fetch.
pub const DEFAULT_SNAPSHOT_AUTH_RETRIES: u32 = 3;

/// Unrecoverable conditions that end the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    /// The first snapshot ever fetched did not carry both action links.
    #[error("first snapshot carried no action links; cannot complete progresses or start missions")]
    MissingActionLinks,
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Nominal minutes between polls.
    pub interval_minutes: u64,
    /// Re-authentications attempted when a snapshot comes back as non-JSON.
    pub snapshot_auth_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            snapshot_auth_retries: DEFAULT_SNAPSHOT_AUTH_RETRIES,
        }
    }
}

/// Why a tick did not reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The session could not be restored within the retry budget.
    AuthExpired,
    /// The snapshot had an unexpected shape.
    Malformed,
    /// The snapshot request failed in transport.
    Transport,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The engine ran against a fresh snapshot.
    Reconciled(TickSummary),
    /// No usable snapshot this tick; state was left as it was.
    Skipped(SkipReason),
}

/// Sample a delay uniformly from `[0.75, 1.25]` times the interval, in
/// whole seconds.
pub fn jittered_delay<R: Rng>(interval_minutes: u64, rng: &mut R) -> Duration {
    let base = interval_minutes.saturating_mul(60);
    let quarter = base / 4;
    let low = base.saturating_sub(quarter);
    let high = base.saturating_add(quarter);
    Duration::from_secs(rng.random_range(low..=high))
}

/// Drives successive ticks forever.
#[derive(Debug)]
pub struct PollScheduler<R> {
    config: SchedulerConfig,
    engine: ReconciliationEngine,
    store: StateStore,
    links: Option<ActionLinks>,
    rng: R,
    span: Span,
}

impl<R: Rng> PollScheduler<R> {
    /// Create a scheduler with an empty store and no captured links.
    pub fn new(config: SchedulerConfig, engine: ReconciliationEngine, rng: R) -> Self {
        Self {
            config,
            engine,
            store: StateStore::new(),
            links: None,
            rng,
            span: info_span!("scheduler"),
        }
    }

    /// Emit all scheduler events inside `span` instead of the default one.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The local state mirror.
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// The captured action links, once a snapshot supplied them.
    pub const fn links(&self) -> Option<&ActionLinks> {
        self.links.as_ref()
    }

    /// Delay before the next poll.
    pub fn next_delay(&mut self) -> Duration {
        jittered_delay(self.config.interval_minutes, &mut self.rng)
    }

    /// Poll forever. Returns only on a fatal condition.
    pub async fn run<G: GameGateway>(&mut self, gateway: &mut G) -> Result<Infallible, FatalError> {
        let span = self.span.clone();
        async {
            info!(
                interval_minutes = self.config.interval_minutes,
                max_passes = self.engine.max_passes(),
                "poll loop starting"
            );
            loop {
                self.tick_inner(gateway).await?;
                let delay = self.next_delay();
                info!(delay_secs = delay.as_secs(), "next poll scheduled");
                tokio::time::sleep(delay).await;
            }
        }
        .instrument(span)
        .await
    }

    /// Run a single tick: fetch, replace, reconcile, ping.
    pub async fn tick<G: GameGateway>(&mut self, gateway: &mut G) -> Result<TickOutcome, FatalError> {
        let span = self.span.clone();
        self.tick_inner(gateway).instrument(span).await
    }

    async fn tick_inner<G: GameGateway>(&mut self, gateway: &mut G) -> Result<TickOutcome, FatalError> {
        let mut snapshot = match self.fetch_snapshot(gateway).await {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                warn!(reason = ?reason, "skipping tick without a usable snapshot");
                return Ok(TickOutcome::Skipped(reason));
            }
        };

        match (snapshot.links.take(), self.links.is_some()) {
            (Some(links), _) => self.links = Some(links),
            (None, true) => warn!("snapshot carried no action links, keeping the captured ones"),
            (None, false) => {
                error!("first snapshot carried no action links");
                return Err(FatalError::MissingActionLinks);
            }
        }

        info!(
            progresses = snapshot.progresses.len(),
            missions = snapshot.missions.len(),
            followers = snapshot.followers.len(),
            "snapshot loaded"
        );
        self.store.replace(*snapshot);

        let Some(links) = self.links.clone() else {
            return Err(FatalError::MissingActionLinks);
        };
        let summary = self.engine.run_tick(&mut self.store, &links, gateway).await;

        if let Err(e) = gateway.ping_health().await {
            warn!(error = %e, "health check ping failed");
        }

        Ok(TickOutcome::Reconciled(summary))
    }

    /// Fetch and decode a snapshot, re-authenticating on an expired session.
    async fn fetch_snapshot<G: GameGateway>(
        &self,
        gateway: &mut G,
    ) -> Result<Box<adept_types::StateSnapshot>, SkipReason> {
        let mut reauths: u32 = 0;
        loop {
            let response = gateway.fetch_snapshot().await.map_err(|e| {
                warn!(error = %e, "snapshot request failed");
                SkipReason::Transport
            })?;

            match classify_snapshot(&response) {
                SnapshotOutcome::Snapshot(snapshot) => return Ok(snapshot),
                SnapshotOutcome::Malformed(malformed) => {
                    warn!(
                        status = malformed.status,
                        detail = %malformed.detail,
                        body = %malformed.body,
                        "unreadable snapshot"
                    );
                    return Err(SkipReason::Malformed);
                }
                SnapshotOutcome::AuthExpired { status, detail } => {
                    if reauths >= self.config.snapshot_auth_retries {
                        error!(status, detail = %detail, attempts = reauths, "session could not be restored");
                        return Err(SkipReason::AuthExpired);
                    }
                    reauths = reauths.saturating_add(1);
                    warn!(status, detail = %detail, attempt = reauths, "session expired, re-authenticating");
                    if let Err(e) = gateway.reauthenticate().await {
                        warn!(error = %e, "re-authentication failed");
                    }
                }
            }
        }
    }
}
