use pairwise_dedup::error::{DedupError, Result};
use tracing::debug;

/// Left-record indices handed to one worker. Index `i` stands for the
/// comparisons `(i, j)` with every `j > i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerAssignment {
    pub worker: usize,
    pub indices: Vec<usize>,
    pub comparisons: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partitioning {
    pub records: usize,
    pub total_comparisons: u64,
    /// Per-worker comparison target, `total / workers` rounded down.
    pub target: u64,
    pub workers: Vec<WorkerAssignment>,
}

fn comparisons_from(i: usize, m: usize) -> u64 {
    (m - 1 - i) as u64
}

impl Partitioning {
    ///
    /// Greedy split of the upper triangle of an `m x m` comparison matrix.
    ///
    /// Indices are walked in order and piled onto the current worker until
    /// its load reaches the target, at which point the worker is sealed.
    /// Whatever is left after the last index forms one trailing, possibly
    /// short, worker, so up to `workers + 1` assignments come back.
    ///
    /// ## Arguments
    ///
    /// * `m` - Number of records.
    /// * `workers` - Requested number of workers, at least one.
    ///
    pub fn greedy(m: usize, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(DedupError::config("number of workers must be positive"));
        }
        let total = (m as u64) * (m.saturating_sub(1) as u64) / 2;
        let target = total / workers as u64;

        let mut assignments = Vec::new();
        let mut indices = Vec::new();
        let mut load = 0u64;
        for i in 0..m {
            load += comparisons_from(i, m);
            indices.push(i);
            if load >= target {
                assignments.push(WorkerAssignment {
                    worker: assignments.len(),
                    indices: std::mem::take(&mut indices),
                    comparisons: load,
                });
                load = 0;
            }
        }
        if !indices.is_empty() {
            assignments.push(WorkerAssignment {
                worker: assignments.len(),
                indices,
                comparisons: load,
            });
        }

        for assignment in &assignments {
            debug!(
                "Worker {} gets {} left indices, {} comparisons",
                assignment.worker,
                assignment.indices.len(),
                assignment.comparisons
            );
        }
        Ok(Partitioning {
            records: m,
            total_comparisons: total,
            target,
            workers: assignments,
        })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn indices(p: &Partitioning) -> Vec<Vec<usize>> {
        p.workers.iter().map(|w| w.indices.clone()).collect()
    }

    #[test]
    fn ten_records_three_workers() {
        let p = Partitioning::greedy(10, 3).unwrap();
        assert_eq!(p.total_comparisons, 45);
        assert_eq!(p.target, 15);
        assert_eq!(
            indices(&p),
            vec![vec![0, 1], vec![2, 3, 4], vec![5, 6, 7, 8, 9]]
        );
        let loads: Vec<u64> = p.workers.iter().map(|w| w.comparisons).collect();
        assert_eq!(loads, vec![17, 18, 10]);
    }

    #[test]
    fn exact_split_has_no_trailing_worker() {
        // 4 records: loads 3, 2, 1, 0 with target 3
        let p = Partitioning::greedy(4, 2).unwrap();
        assert_eq!(indices(&p), vec![vec![0], vec![1, 2], vec![3]]);
        assert_eq!(p.workers[2].comparisons, 0);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(Partitioning::greedy(0, 4).unwrap().is_empty());
        let single = Partitioning::greedy(1, 4).unwrap();
        assert_eq!(single.total_comparisons, 0);
        assert_eq!(indices(&single), vec![vec![0]]);
        assert!(matches!(
            Partitioning::greedy(5, 0),
            Err(DedupError::Config(_))
        ));
    }

    #[test]
    fn more_workers_than_comparisons_only_emits_assigned_workers() {
        let p = Partitioning::greedy(2, 8).unwrap();
        assert_eq!(p.target, 0);
        assert!(p.workers.iter().all(|w| !w.indices.is_empty()));
        assert_eq!(p.workers.iter().map(|w| w.comparisons).sum::<u64>(), 1);
    }

    proptest! {
        #[test]
        fn every_pair_is_compared_exactly_once(m in 0usize..60, n in 1usize..12) {
            let p = Partitioning::greedy(m, n).unwrap();
            let mut seen = HashSet::new();
            for w in &p.workers {
                for &i in &w.indices {
                    for j in (i + 1)..m {
                        prop_assert!(seen.insert((i, j)), "pair ({}, {}) compared twice", i, j);
                    }
                }
            }
            prop_assert_eq!(seen.len() as u64, p.total_comparisons);
        }

        #[test]
        fn sealed_workers_overshoot_by_at_most_their_last_index(m in 2usize..80, n in 1usize..10) {
            prop_assume!(m * (m - 1) / 2 >= n);
            let p = Partitioning::greedy(m, n).unwrap();
            prop_assert!(p.workers.len() <= n + 1);
            for w in &p.workers {
                let last = *w.indices.last().unwrap();
                let without_last = w.comparisons - comparisons_from(last, m);
                prop_assert!(without_last < p.target || w.indices.len() == 1);
                let sealed = w.comparisons >= p.target;
                let trailing = w.worker == p.workers.len() - 1;
                prop_assert!(sealed || trailing);
            }
        }
    }
}
