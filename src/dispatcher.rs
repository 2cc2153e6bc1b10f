//! Priority dispatcher: sends a batch to the scoring oracle and reduces the
//! answer to a single winning vehicle id.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::collector::parse_id;
use crate::error::{DispatchError, DispatchResult};
use crate::oracle::ScoringOracle;
use crate::types::{encode_batch, Batch, DispatchOutcome, PriorityVerdict, VehiclePriority};

/// Bounded retry for unreachable-oracle failures. The default performs a
/// single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    oracle: Arc<dyn ScoringOracle>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(oracle: Arc<dyn ScoringOracle>, timeout: Duration) -> Self {
        Self {
            oracle,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Dispatch with the configured timeout.
    pub async fn dispatch(&self, batch: &Batch) -> DispatchResult<DispatchOutcome> {
        self.dispatch_with_timeout(batch, self.timeout).await
    }

    /// Validate, call the oracle once (plus any configured retries), and
    /// interpret the answer. `timeout` is a deadline for the whole call:
    /// retries and backoff share it rather than each getting a fresh one.
    pub async fn dispatch_with_timeout(
        &self,
        batch: &Batch,
        timeout: Duration,
    ) -> DispatchResult<DispatchOutcome> {
        if batch.is_empty() {
            return Err(DispatchError::MalformedInput("batch contains no vehicles".into()));
        }

        let rows = encode_batch(batch);
        let deadline = Instant::now() + timeout;
        let mut attempt = 0;
        let body = loop {
            let result = match tokio::time::timeout_at(deadline, self.oracle.score(&rows)).await {
                Ok(result) => result,
                Err(_) => Err(DispatchError::OracleTimeout(timeout)),
            };

            match result {
                Ok(body) => break body,
                Err(e)
                    if e.is_retryable()
                        && attempt < self.retry.max_retries
                        && Instant::now() + self.retry.backoff < deadline =>
                {
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        max_retries = self.retry.max_retries,
                        "oracle call failed, retrying"
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => return Err(e),
            }
        };

        let verdict = interpret(batch, &body)?;
        let outcome = resolve(batch, verdict)?;
        info!(
            vehicles = batch.len(),
            winner = outcome.winning_vehicle_id,
            scored = outcome.priorities.is_some(),
            "dispatch complete"
        );
        Ok(outcome)
    }
}

/// Parse an oracle response body into a verdict checked against `batch`.
///
/// Accepted shapes:
/// - `{"car_id": 7}`
/// - `[0.2, 0.9]` or `[{"predicted_priority": 0.2}, ...]`
/// - `{"predicted_priorities": [...]}` with either element form
pub fn interpret(batch: &Batch, body: &[u8]) -> DispatchResult<PriorityVerdict> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        DispatchError::OracleContractViolation(format!("response is not valid JSON: {e}"))
    })?;

    match value {
        Value::Array(items) => scores_verdict(batch, &items),
        Value::Object(map) => {
            if let Some(winner) = map.get("car_id") {
                let id = parse_id(winner).ok_or_else(|| {
                    DispatchError::OracleContractViolation(format!("car_id {winner} is not an integer"))
                })?;
                if !batch.contains(id) {
                    return Err(DispatchError::OracleContractViolation(format!(
                        "oracle picked vehicle {id}, which is not in the submitted batch"
                    )));
                }
                debug!(id, "oracle returned single winner");
                Ok(PriorityVerdict::Winner(id))
            } else if let Some(scores) = map.get("predicted_priorities") {
                match scores {
                    Value::Array(items) => scores_verdict(batch, items),
                    other => Err(DispatchError::OracleContractViolation(format!(
                        "predicted_priorities is not an array: {other}"
                    ))),
                }
            } else {
                Err(DispatchError::OracleContractViolation(
                    "response object has neither car_id nor predicted_priorities".into(),
                ))
            }
        }
        other => Err(DispatchError::OracleContractViolation(format!(
            "unexpected response shape: {other}"
        ))),
    }
}

fn scores_verdict(batch: &Batch, items: &[Value]) -> DispatchResult<PriorityVerdict> {
    if items.len() != batch.len() {
        return Err(DispatchError::OracleContractViolation(format!(
            "oracle returned {} scores for {} vehicles",
            items.len(),
            batch.len()
        )));
    }

    let scores = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            score_of(item).ok_or_else(|| {
                DispatchError::OracleContractViolation(format!("score {i} is not a finite number: {item}"))
            })
        })
        .collect::<DispatchResult<Vec<f64>>>()?;

    debug!(count = scores.len(), "oracle returned per-vehicle scores");
    Ok(PriorityVerdict::Scores(scores))
}

fn score_of(item: &Value) -> Option<f64> {
    let raw = match item {
        Value::Object(map) => ["predicted_priority", "priority", "score"]
            .iter()
            .find_map(|k| map.get(*k))?,
        other => other,
    };
    raw.as_f64().filter(|f| f.is_finite())
}

/// Index of the largest score; ties resolve to the lowest index.
pub fn argmax(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

fn resolve(batch: &Batch, verdict: PriorityVerdict) -> DispatchResult<DispatchOutcome> {
    match verdict {
        PriorityVerdict::Winner(id) => Ok(DispatchOutcome {
            winning_vehicle_id: id,
            priorities: None,
        }),
        PriorityVerdict::Scores(scores) => {
            let winner = argmax(&scores)
                .and_then(|i| batch.id_at(i))
                .ok_or_else(|| DispatchError::OracleContractViolation("no scores to rank".into()))?;
            let priorities = batch
                .ids()
                .zip(scores)
                .map(|(id, score)| VehiclePriority { id, score })
                .collect();
            Ok(DispatchOutcome {
                winning_vehicle_id: winner,
                priorities: Some(priorities),
            })
        }
    }
}
