//! Escalation Controller — The adaptive tier loop
//!
//! Runs a stage cheapest-first and climbs the ladder only while measured
//! quality says it must:
//!
//! ```text
//! select initial tier
//!   └─ loop:
//!        execute(tier)  ── failed / timed out ──► escalate unconditionally
//!        measure → DecisionMatrix
//!          ├─ accept                    ► done
//!          └─ escalate
//!               ├─ regression guard     ► accept best prior
//!               ├─ repetition guard     ► accept best so far
//!               ├─ budget guard         ► accept best so far
//!               └─ next tier
//! ```
//!
//! Attempts are strictly sequential. The only shared state is the
//! `Arc`'d configuration; the trail and best-so-far pointer live on the
//! stack of one `run` call.

use crate::config::LadderConfig;
use crate::error::{ConfigError, SelectionError, StageError};
use crate::escalation::catalog::{Tier, TierCatalog};
use crate::escalation::cost::CostModel;
use crate::escalation::decision::{DecisionMatrix, DecisionRule};
use crate::escalation::initial_tier::{CheapSignals, InitialTierSelector};
use crate::escalation::metrics::{QualityMetrics, QualityMetricsExtractor, QualitySource};
use crate::escalation::state::{
    AttemptRecord, ControllerState, Decision, EscalationTrail, SelectionResult,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The external collaborator that does the expensive work for one tier.
///
/// Anything the executor acquires for an attempt must be owned by the
/// returned future: the controller drops it when the attempt ends, times
/// out or is cancelled. `cancel` fires on caller cancellation and when the
/// attempt is abandoned.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    type Output: QualitySource + Send;

    async fn execute(
        &self,
        tier: &Tier,
        cancel: CancellationToken,
    ) -> Result<Self::Output, StageError>;
}

enum AttemptOutcome<O> {
    Succeeded(O),
    Failed(StageError),
    Cancelled,
}

/// Best successful attempt seen so far.
struct BestAttempt<O> {
    index: usize,
    score: f64,
    output: O,
}

/// Keep whichever of `best` and `candidate` scored higher. Ties keep the
/// earlier attempt.
fn keep_best<O>(best: Option<BestAttempt<O>>, candidate: BestAttempt<O>) -> BestAttempt<O> {
    match best {
        Some(current) if current.score >= candidate.score => current,
        _ => candidate,
    }
}

fn candidate<O>(index: usize, metrics: &QualityMetrics, output: O) -> BestAttempt<O> {
    BestAttempt {
        index,
        score: metrics.overall_score,
        output,
    }
}

/// Why escalation cannot proceed from the current tier.
fn blocked_reason(
    catalog: &TierCatalog,
    trail: &EscalationTrail,
    tier: &Tier,
    escalations: usize,
    max_escalations: usize,
) -> Result<Tier, String> {
    let Some(next) = catalog.next(tier.id) else {
        return Err(crate::escalation::decision::HIGHEST_TIER_REACHED.to_string());
    };
    if trail.attempted(next.id) {
        return Err(format!("repetition_guard_tier_{}_already_attempted", next.name));
    }
    if escalations >= max_escalations {
        return Err(format!(
            "escalation_budget_exhausted_{}_of_{}",
            escalations, max_escalations
        ));
    }
    Ok(next.clone())
}

/// Stateless driver; one instance serves any number of concurrent runs.
#[derive(Debug, Clone)]
pub struct EscalationController {
    config: Arc<LadderConfig>,
    catalog: Arc<TierCatalog>,
    extractor: QualityMetricsExtractor,
    matrix: DecisionMatrix,
    selector: InitialTierSelector,
    cost: CostModel,
}

impl EscalationController {
    /// Validate `config` and build the controller. Fails fast on bad config.
    pub fn new(config: LadderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let catalog = Arc::new(config.catalog()?);
        let extractor =
            QualityMetricsExtractor::new(config.metric_weights, config.low_confidence_cutoff);
        let matrix = DecisionMatrix::new(
            catalog.clone(),
            config.min_acceptable_confidence,
            config.weak_tier,
        );
        let selector = InitialTierSelector::new(config.initial_tier);
        let cost = CostModel::new(catalog.clone());

        info!(catalog = %catalog.summary(), config = %config.summary(), "escalation controller ready");

        Ok(Self {
            config: Arc::new(config),
            catalog,
            extractor,
            matrix,
            selector,
            cost,
        })
    }

    pub fn config(&self) -> &LadderConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<TierCatalog> {
        &self.catalog
    }

    pub fn extractor(&self) -> &QualityMetricsExtractor {
        &self.extractor
    }

    pub fn decision_matrix(&self) -> &DecisionMatrix {
        &self.matrix
    }

    /// Run one invocation without external cancellation.
    pub async fn run<E: StageExecutor>(
        &self,
        signals: &CheapSignals,
        executor: &E,
    ) -> Result<SelectionResult<E::Output>, SelectionError> {
        self.run_with_cancel(signals, executor, &CancellationToken::new())
            .await
    }

    /// Run one invocation. Cancellation is honored at every attempt
    /// boundary and aborts the attempt in flight.
    pub async fn run_with_cancel<E: StageExecutor>(
        &self,
        signals: &CheapSignals,
        executor: &E,
        cancel: &CancellationToken,
    ) -> Result<SelectionResult<E::Output>, SelectionError> {
        let started = Instant::now();
        let invocation_id = Uuid::new_v4();
        let max_escalations = self.config.max_escalations;

        let mut state = ControllerState::SelectingInitial;
        let recommendation = self.selector.select_initial_tier(signals, &self.catalog);
        let mut tier = self.catalog.cheapest().clone();
        if let Some(t) = self.catalog.get(recommendation.tier) {
            tier = t.clone();
        }
        info!(
            %invocation_id,
            tier = %tier.name,
            complexity = %recommendation.complexity,
            reason = %recommendation.reason,
            "initial tier selected"
        );
        self.transition(&mut state, ControllerState::Running(tier.id), invocation_id);

        let mut trail = EscalationTrail::new();
        let mut best: Option<BestAttempt<E::Output>> = None;
        let mut escalations = 0usize;

        loop {
            if cancel.is_cancelled() {
                info!(%invocation_id, attempts = trail.len(), "selection cancelled");
                return Err(SelectionError::Cancelled {
                    completed_attempts: trail.len(),
                });
            }

            let attempt_started = Instant::now();
            let outcome = self.attempt(executor, &tier, cancel).await;
            let processing_time = attempt_started.elapsed();
            self.transition(&mut state, ControllerState::Evaluating(tier.id), invocation_id);

            let output = match outcome {
                AttemptOutcome::Cancelled => {
                    info!(%invocation_id, tier = %tier.name, "attempt cancelled; discarding");
                    return Err(SelectionError::Cancelled {
                        completed_attempts: trail.len(),
                    });
                }
                AttemptOutcome::Failed(err) => {
                    warn!(%invocation_id, tier = %tier.name, error = %err, "stage attempt failed");
                    match blocked_reason(&self.catalog, &trail, &tier, escalations, max_escalations)
                    {
                        Ok(next) => {
                            trail.push(self.record(
                                &tier,
                                None,
                                processing_time,
                                Decision::Escalate,
                                format!("stage_failed_escalating_to_{}: {}", next.name, err),
                            ));
                            escalations += 1;
                            self.transition(
                                &mut state,
                                ControllerState::Escalating(next.id),
                                invocation_id,
                            );
                            self.transition(
                                &mut state,
                                ControllerState::Running(next.id),
                                invocation_id,
                            );
                            tier = next;
                            continue;
                        }
                        Err(blocked) => {
                            if let Some(best) = best.take() {
                                trail.push(self.record(
                                    &tier,
                                    None,
                                    processing_time,
                                    Decision::AcceptFinal,
                                    format!(
                                        "stage_failed_{}_keeping_best_attempt: {}",
                                        blocked, err
                                    ),
                                ));
                                self.transition(
                                    &mut state,
                                    ControllerState::Accepted,
                                    invocation_id,
                                );
                                return Ok(self.finish(invocation_id, trail, best, started));
                            }
                            trail.push(self.record(
                                &tier,
                                None,
                                processing_time,
                                Decision::Failed,
                                format!("stage_failed_{}: {}", blocked, err),
                            ));
                            self.transition(&mut state, ControllerState::Failed, invocation_id);
                            warn!(
                                %invocation_id,
                                trail = %trail.summary(),
                                "all attempts failed"
                            );
                            return Err(SelectionError::AllAttemptsFailed {
                                last_failure: err,
                                trail,
                            });
                        }
                    }
                }
                AttemptOutcome::Succeeded(output) => output,
            };

            let metrics = output.quality(&self.extractor);
            let verdict = self.matrix.evaluate(&metrics, &tier);
            let index = trail.len();
            debug!(
                %invocation_id,
                tier = %tier.name,
                metrics = %metrics.summary(),
                escalate = verdict.escalate,
                reason = %verdict.reason,
                "attempt evaluated"
            );

            if !verdict.escalate {
                let decision = if verdict.rule == DecisionRule::HighestTier {
                    Decision::AcceptFinal
                } else {
                    Decision::Accept
                };
                trail.push(self.record(
                    &tier,
                    Some(metrics),
                    processing_time,
                    decision,
                    verdict.reason,
                ));
                let best = keep_best(best, candidate(index, &metrics, output));
                self.transition(&mut state, ControllerState::Accepted, invocation_id);
                return Ok(self.finish(invocation_id, trail, best, started));
            }

            // Regression guard: never trade a good result in hand for a worse one.
            match best.take() {
                Some(prior)
                    if metrics.overall_score <= prior.score
                        && prior.score >= self.matrix.min_acceptable_score() =>
                {
                    let reason = format!(
                        "regression_guard_score_{:.3}_not_above_best_{:.3}_keeping_{}",
                        metrics.overall_score,
                        prior.score,
                        trail
                            .get(prior.index)
                            .map(|r| r.tier_name.as_str())
                            .unwrap_or("prior")
                    );
                    warn!(%invocation_id, tier = %tier.name, %reason, "regression guard tripped");
                    trail.push(self.record(
                        &tier,
                        Some(metrics),
                        processing_time,
                        Decision::AcceptFinal,
                        reason,
                    ));
                    self.transition(&mut state, ControllerState::Accepted, invocation_id);
                    return Ok(self.finish(invocation_id, trail, prior, started));
                }
                other => best = other,
            }

            match blocked_reason(&self.catalog, &trail, &tier, escalations, max_escalations) {
                Ok(next) => {
                    info!(
                        %invocation_id,
                        from = %tier.name,
                        to = %next.name,
                        score = metrics.overall_score,
                        reason = %verdict.reason,
                        "escalating"
                    );
                    trail.push(self.record(
                        &tier,
                        Some(metrics),
                        processing_time,
                        Decision::Escalate,
                        verdict.reason,
                    ));
                    best = Some(keep_best(best, candidate(index, &metrics, output)));
                    escalations += 1;
                    self.transition(
                        &mut state,
                        ControllerState::Escalating(next.id),
                        invocation_id,
                    );
                    self.transition(&mut state, ControllerState::Running(next.id), invocation_id);
                    tier = next;
                }
                Err(blocked) => {
                    info!(%invocation_id, tier = %tier.name, reason = %blocked, "escalation blocked");
                    trail.push(self.record(
                        &tier,
                        Some(metrics),
                        processing_time,
                        Decision::AcceptFinal,
                        format!("{}; wanted {}", blocked, verdict.reason),
                    ));
                    let best = keep_best(best, candidate(index, &metrics, output));
                    self.transition(&mut state, ControllerState::Accepted, invocation_id);
                    return Ok(self.finish(invocation_id, trail, best, started));
                }
            }
        }
    }

    /// Execute one attempt bounded by the per-attempt timeout and the
    /// caller's cancellation. The attempt's token is cancelled when this
    /// returns, whatever the outcome.
    async fn attempt<E: StageExecutor>(
        &self,
        executor: &E,
        tier: &Tier,
        cancel: &CancellationToken,
    ) -> AttemptOutcome<E::Output> {
        let attempt_token = cancel.child_token();
        let _release = attempt_token.clone().drop_guard();
        let timeout = self.config.per_attempt_timeout();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => AttemptOutcome::Cancelled,
            result = tokio::time::timeout(timeout, executor.execute(tier, attempt_token.clone())) => {
                match result {
                    Ok(Ok(output)) => AttemptOutcome::Succeeded(output),
                    Ok(Err(StageError::Cancelled)) if cancel.is_cancelled() => {
                        AttemptOutcome::Cancelled
                    }
                    Ok(Err(err)) => AttemptOutcome::Failed(err),
                    Err(_) => AttemptOutcome::Failed(StageError::TimedOut(timeout)),
                }
            }
        }
    }

    fn record(
        &self,
        tier: &Tier,
        metrics: Option<QualityMetrics>,
        processing_time: Duration,
        decision: Decision,
        reason: String,
    ) -> AttemptRecord {
        AttemptRecord {
            tier_id: tier.id,
            tier_name: tier.name.clone(),
            succeeded: metrics.is_some(),
            metrics,
            processing_time,
            decision,
            reason,
            timestamp: Utc::now(),
        }
    }

    fn transition(&self, state: &mut ControllerState, next: ControllerState, id: Uuid) {
        debug_assert!(
            state.can_transition_to(next),
            "illegal transition {} → {}",
            state,
            next
        );
        debug!(invocation_id = %id, from = %state, to = %next, "state transition");
        *state = next;
    }

    fn finish<O>(
        &self,
        invocation_id: Uuid,
        trail: EscalationTrail,
        best: BestAttempt<O>,
        started: Instant,
    ) -> SelectionResult<O> {
        let total_time = started.elapsed();
        let estimate = self.cost.estimate(&trail, Some(total_time));
        let final_tier = trail
            .get(best.index)
            .and_then(|r| self.catalog.get(r.tier_id))
            .unwrap_or_else(|| self.catalog.cheapest())
            .clone();

        let result = SelectionResult {
            invocation_id,
            final_tier,
            output: best.output,
            trail,
            selected_attempt: best.index,
            total_time,
            quality_achieved: best.score,
            time_saved_estimate: estimate.savings_ratio,
        };
        info!(
            %invocation_id,
            tier = %result.final_tier.name,
            quality = result.quality_achieved,
            attempts = result.trail.len(),
            saved = estimate.savings_ratio,
            "selection complete"
        );
        result
    }
}
