//! Spend and limit projection over recorded iteration costs.
//!
//! Projection is pure arithmetic over already-persisted iterations plus the
//! in-flight iteration's own usage. Separating actual exceedance from
//! projected exceedance lets the loop warn ahead of an overage without
//! aborting a session that has not yet breached its real limit.

use crate::session::{IterationResult, UsageInfo};

/// Fraction of the session ceiling at which the total counts as approaching.
const APPROACH_THRESHOLD: f64 = 0.8;

/// Inputs for one projection. Prior iterations must already be persisted.
#[derive(Debug, Clone)]
pub struct CostInputs<'a> {
    /// Usage for the in-flight iteration, when the agent reported any.
    pub usage: Option<&'a UsageInfo>,
    /// Cumulative session cost before this iteration.
    pub session_cost_so_far: f64,
    /// Configured session ceiling in USD.
    pub max_cost_per_session: Option<f64>,
    /// Ordinal of the in-flight iteration (1-based).
    pub current_iteration: u32,
    /// Total planned iteration count for this run.
    pub total_iterations: u32,
    pub prior_iterations: &'a [IterationResult],
}

/// Derived cost state for one iteration. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CostProjection {
    pub iteration_cost: f64,
    pub session_total: f64,
    /// Mean cost of prior iterations that reported a strictly positive cost.
    pub average_cost_per_iteration: Option<f64>,
    pub projected_total_cost: Option<f64>,
    pub projected_remaining_cost: Option<f64>,
    /// Linear projection would end above the ceiling (strict comparison).
    pub projection_would_exceed_limit: bool,
    /// Session total is at or above 80% of the ceiling.
    pub is_approaching_limit: bool,
    /// Session total has met or exceeded the ceiling.
    pub has_exceeded_limit: bool,
}

/// Project session spend from the in-flight iteration's usage.
///
/// Returns `None` when no usage is available: there is nothing to project.
pub fn project_cost(inputs: &CostInputs<'_>) -> Option<CostProjection> {
    let usage = inputs.usage?;
    let iteration_cost = usage.total_cost_usd;
    let session_total = inputs.session_cost_so_far + iteration_cost;

    let positive_prior_costs: Vec<f64> = inputs
        .prior_iterations
        .iter()
        .filter_map(|result| result.usage.as_ref())
        .map(|usage| usage.total_cost_usd)
        .filter(|cost| *cost > 0.0)
        .collect();

    let average_cost_per_iteration = if positive_prior_costs.is_empty() {
        None
    } else {
        Some(positive_prior_costs.iter().sum::<f64>() / positive_prior_costs.len() as f64)
    };

    let remaining_iterations = inputs
        .total_iterations
        .saturating_sub(inputs.current_iteration);
    let projected_remaining_cost =
        average_cost_per_iteration.map(|average| average * f64::from(remaining_iterations));
    let projected_total_cost = projected_remaining_cost.map(|remaining| session_total + remaining);

    let ceiling = inputs.max_cost_per_session;
    let projection_would_exceed_limit = match (ceiling, projected_total_cost) {
        (Some(limit), Some(projected)) => projected > limit,
        _ => false,
    };
    let is_approaching_limit =
        ceiling.is_some_and(|limit| session_total >= APPROACH_THRESHOLD * limit);
    let has_exceeded_limit = ceiling.is_some_and(|limit| session_total >= limit);

    Some(CostProjection {
        iteration_cost,
        session_total,
        average_cost_per_iteration,
        projected_total_cost,
        projected_remaining_cost,
        projection_would_exceed_limit,
        is_approaching_limit,
        has_exceeded_limit,
    })
}
