use crate::dto::{GoldRow, Pair, PairSet};
use crate::error::Result;
use crate::union_find::UnionFind;
use crate::util::read_gold_rows;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::thread;
use std::time::Instant;
use sysinfo::System;
use tracing::{debug, info};

const MB: u64 = 1024 * 1024;

/// Outcome of scoring a pair set against the gold standard.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub tp: u64,
    pub tn: i64,
    pub fp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
    pub total_comparisons: u64,
    pub execution_time_ms: u128,
    pub available_processors: usize,
    pub memory: MemorySample,
}

///
/// Memory at evaluation time, in MB. `total` and `used` describe this
/// process (virtual size and resident set); `max` and `free` describe the
/// machine it runs on.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySample {
    pub total_mb: u64,
    pub max_mb: u64,
    pub used_mb: u64,
    pub free_mb: u64,
}

impl MemorySample {
    pub fn take() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let (total, used) = match sysinfo::get_current_pid() {
            Ok(pid) if sys.refresh_process(pid) => sys
                .process(pid)
                .map(|process| (process.virtual_memory(), process.memory()))
                .unwrap_or_default(),
            Ok(_) => (0, 0),
            Err(err) => {
                debug!("Cannot sample process memory: {}", err);
                (0, 0)
            }
        };
        MemorySample {
            total_mb: total / MB,
            max_mb: sys.total_memory() / MB,
            used_mb: used / MB,
            free_mb: sys.available_memory() / MB,
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl Evaluation {
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f_measure(&self) -> f64 {
        self.f_beta(1.0)
    }

    /// `(1 + b^2) * p * r / (b^2 * p + r)`, 0 when both are 0.
    pub fn f_beta(&self, beta: f64) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        let b2 = beta * beta;
        let den = b2 * p + r;
        if den == 0.0 {
            0.0
        } else {
            (1.0 + b2) * p * r / den
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "tp: {} tn: {} fp: {} fn: {} precision: {} recall: {} fmeasure: {} \
             executionTime (ms): {} totalComparisons: {} availableProcessors: {} \
             totalMemory: {} maxMemory: {} usedMemory: {} freeMemory: {}",
            self.tp,
            self.tn,
            self.fp,
            self.fn_,
            self.precision(),
            self.recall(),
            self.f_measure(),
            self.execution_time_ms,
            self.total_comparisons,
            self.available_processors,
            self.memory.total_mb,
            self.memory.max_mb,
            self.memory.used_mb,
            self.memory.free_mb,
        )
    }
}

///
/// Scores algorithm output against a gold standard under transitive closure
/// on both sides: every pair implied by chaining counts, not only the pairs
/// that were listed.
///
pub struct Evaluator {
    gold: UnionFind<String>,
    start: Instant,
    total_comparisons: u64,
}

fn intra_pairs(component: &[String]) -> impl Iterator<Item = (&String, &String)> {
    component
        .iter()
        .enumerate()
        .flat_map(move |(i, a)| component[i + 1..].iter().map(move |b| (a, b)))
}

impl Evaluator {
    pub fn new<I: IntoIterator<Item = Pair>>(gold: I) -> Self {
        Evaluator {
            gold: pairs_to_union_find(gold),
            start: Instant::now(),
            total_comparisons: 0,
        }
    }

    /// Gold rows with an empty id are rejected.
    pub fn from_gold_rows<I: IntoIterator<Item = GoldRow>>(rows: I) -> Result<Self> {
        let mut gold = UnionFind::new();
        for row in rows {
            gold.try_union(row.id1, row.id2)?;
        }
        Ok(Evaluator {
            gold,
            start: Instant::now(),
            total_comparisons: 0,
        })
    }

    pub fn from_gold_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rows = read_gold_rows(path.as_ref())?;
        info!(
            "Loaded {} gold pairs from {}",
            rows.len(),
            path.as_ref().display()
        );
        Self::from_gold_rows(rows)
    }

    pub fn set_total_comparisons(&mut self, total_comparisons: u64) {
        self.total_comparisons = total_comparisons;
    }

    pub fn gold(&self) -> &UnionFind<String> {
        &self.gold
    }

    pub fn evaluate(&mut self, pairs: &PairSet) -> Evaluation {
        self.evaluate_union_find(pairs_to_union_find(pairs.iter().cloned()))
    }

    pub fn evaluate_union_find(&mut self, mut found: UnionFind<String>) -> Evaluation {
        let (mut tp, mut fp, mut fn_) = (0u64, 0u64, 0u64);

        for component in found.components() {
            for (a, b) in intra_pairs(&component) {
                if self.gold.connected(a, b) {
                    tp += 1;
                } else {
                    fp += 1;
                }
            }
        }

        let (mut gold_pairs, mut gold_entries) = (0u64, 0u64);
        for component in self.gold.components() {
            gold_entries += component.len() as u64;
            for (a, b) in intra_pairs(&component) {
                gold_pairs += 1;
                if !found.connected(a, b) {
                    fn_ += 1;
                }
            }
        }
        debug!(
            "Gold standard closure: {} entries, {} pairs",
            gold_entries, gold_pairs
        );

        let all_pairs = gold_entries * gold_entries.saturating_sub(1) / 2;
        let tn = all_pairs as i64 - gold_pairs as i64 - fp as i64;

        Evaluation {
            tp,
            tn,
            fp,
            fn_,
            total_comparisons: self.total_comparisons,
            execution_time_ms: self.start.elapsed().as_millis(),
            available_processors: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            memory: MemorySample::take(),
        }
    }
}

pub fn pairs_to_union_find<I: IntoIterator<Item = Pair>>(pairs: I) -> UnionFind<String> {
    let mut uf = UnionFind::new();
    for pair in pairs {
        uf.union(pair.first().to_string(), pair.second().to_string());
    }
    uf
}
