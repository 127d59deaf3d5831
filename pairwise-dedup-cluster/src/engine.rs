use crate::partition::{Partitioning, WorkerAssignment};
use pairwise_dedup::datasets::DatasetProvider;
use pairwise_dedup::dto::{Pair, PairSet, Record};
use pairwise_dedup::error::{DedupError, Result};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// What a worker does when the provider fails on a pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and treat the pair as a non-duplicate.
    #[default]
    Lenient,
    /// Stop the failing worker; its partial pairs and the other workers still count.
    AbortWorker,
    /// Fail the whole run.
    Strict,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Lenient => "lenient",
            FailurePolicy::AbortWorker => "abort-worker",
            FailurePolicy::Strict => "strict",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lenient" => Ok(FailurePolicy::Lenient),
            "abort-worker" => Ok(FailurePolicy::AbortWorker),
            "strict" => Ok(FailurePolicy::Strict),
            other => Err(DedupError::config(format!(
                "unknown failure policy '{}', expected lenient, abort-worker or strict",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker: usize,
    pub assigned: usize,
    pub comparisons: u64,
    pub pairs_found: usize,
    pub aborted: bool,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
pub struct DedupResult {
    pub pairs: PairSet,
    pub total_comparisons: u64,
    pub workers: Vec<WorkerSummary>,
    pub cancelled: bool,
}

impl DedupResult {
    /// Fails with `Cancelled` unless every worker ran to completion.
    pub fn into_complete(self) -> Result<Self> {
        if self.cancelled {
            Err(DedupError::Cancelled)
        } else {
            Ok(self)
        }
    }
}

///
/// Compares every record pair once, spreading the work over a partitioning
/// of left indices and running each worker as a rayon task.
///
pub struct DedupEngine<'a> {
    provider: &'a dyn DatasetProvider,
    policy: FailurePolicy,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> DedupEngine<'a> {
    pub fn new(provider: &'a dyn DatasetProvider) -> Self {
        DedupEngine {
            provider,
            policy: FailurePolicy::default(),
            cancel: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Flag checked before every comparison; once set, workers return what they have.
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn run(&self, records: &[Record], workers: usize) -> Result<DedupResult> {
        let partitioning = Partitioning::greedy(records.len(), workers)?;
        if partitioning.is_empty() {
            info!("No records to compare");
            return Ok(DedupResult::default());
        }
        info!(
            "Comparing {} records in {} workers ({} comparisons, target {} each)",
            partitioning.records,
            partitioning.len(),
            partitioning.total_comparisons,
            partitioning.target
        );
        self.run_partitioned(records, &partitioning)
    }

    pub fn run_partitioned(
        &self,
        records: &[Record],
        partitioning: &Partitioning,
    ) -> Result<DedupResult> {
        let outcomes: Vec<(WorkerSummary, PairSet)> = partitioning
            .workers
            .par_iter()
            .map(|assignment| self.run_worker(records, assignment))
            .collect::<Result<_>>()?;

        let mut result = DedupResult::default();
        for (summary, pairs) in outcomes {
            result.total_comparisons += summary.comparisons;
            result.cancelled |= summary.cancelled;
            result.pairs.extend(pairs);
            result.workers.push(summary);
        }
        result.workers.sort_by_key(|summary| summary.worker);
        info!(
            "Found {} pairs in {} comparisons",
            result.pairs.len(),
            result.total_comparisons
        );
        Ok(result)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn run_worker(
        &self,
        records: &[Record],
        assignment: &WorkerAssignment,
    ) -> Result<(WorkerSummary, PairSet)> {
        let threshold = self.provider.dataset_threshold();
        let mut summary = WorkerSummary {
            worker: assignment.worker,
            assigned: assignment.indices.len(),
            ..Default::default()
        };
        let mut pairs = PairSet::default();

        'outer: for &i in &assignment.indices {
            let left = &records[i];
            for right in &records[i + 1..] {
                if self.is_cancelled() {
                    summary.cancelled = true;
                    break 'outer;
                }
                summary.comparisons += 1;
                let sim = match self.provider.calculate_similarity(left, right, None) {
                    Ok(sim) => sim.clamp(0.0, 1.0),
                    Err(err) => {
                        let err = DedupError::provider(left.id(), right.id(), err);
                        match self.policy {
                            FailurePolicy::Lenient => {
                                warn!("Worker {}: {}", assignment.worker, err);
                                continue;
                            }
                            FailurePolicy::AbortWorker => {
                                warn!("Worker {} aborted: {}", assignment.worker, err);
                                summary.aborted = true;
                                break 'outer;
                            }
                            FailurePolicy::Strict => return Err(err),
                        }
                    }
                };
                if sim >= threshold {
                    pairs.insert(Pair::new(left.id(), right.id()));
                }
            }
        }

        summary.pairs_found = pairs.len();
        info!(
            "Worker {} finished: {} comparisons, {} pairs",
            summary.worker, summary.comparisons, summary.pairs_found
        );
        Ok((summary, pairs))
    }
}
