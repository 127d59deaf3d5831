use crate::engine::{DedupEngine, DedupResult, FailurePolicy};
use pairwise_dedup::datasets::{DatasetProvider, ProviderKind};
use pairwise_dedup::error::{DedupError, Result};
use pairwise_dedup::evaluation::{Evaluation, Evaluator};
use pairwise_dedup::util::{load_dataset, write_pairs_to_path};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Instant;
use tracing::{debug, info};

/// Everything a single evaluation run needs.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub provider: ProviderKind,
    pub identifiers: Option<String>,
    pub dataset: PathBuf,
    pub gold_standard: PathBuf,
    pub workers: usize,
    pub policy: FailurePolicy,
    pub threads: Option<usize>,
    pub pairs_out: Option<PathBuf>,
}

impl RunConfig {
    /// Config with the provider's default files, 8 workers and the lenient policy.
    pub fn for_provider(provider: ProviderKind) -> Self {
        RunConfig {
            provider,
            identifiers: None,
            dataset: provider.default_dataset_path(),
            gold_standard: provider.default_gold_path(),
            workers: 8,
            policy: FailurePolicy::default(),
            threads: None,
            pairs_out: None,
        }
    }
}

fn dedup_on_pool(
    engine: &DedupEngine,
    records: &[pairwise_dedup::Record],
    config: &RunConfig,
) -> Result<DedupResult> {
    match config.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| DedupError::config(format!("cannot build thread pool: {}", e)))?;
            pool.install(|| engine.run(records, config.workers))
        }
        None => engine.run(records, config.workers),
    }
}

///
/// Loads the dataset and gold standard, deduplicates and scores the result.
///
/// The evaluation clock starts once the gold standard is loaded, so the
/// reported execution time covers deduplication and scoring only.
///
pub fn run_evaluation(config: &RunConfig, cancel: Option<&AtomicBool>) -> Result<Evaluation> {
    let provider: Box<dyn DatasetProvider> = config.provider.build(config.identifiers.as_deref())?;

    let start = Instant::now();
    let records = load_dataset(&config.dataset, provider.as_ref())?;
    info!(
        "Loaded {} {} records in {:.4} secs",
        records.len(),
        provider.name(),
        start.elapsed().as_secs_f64()
    );

    let mut evaluator = Evaluator::from_gold_file(&config.gold_standard)?;

    let start = Instant::now();
    let mut engine = DedupEngine::new(provider.as_ref()).with_policy(config.policy);
    if let Some(cancel) = cancel {
        engine = engine.with_cancel(cancel);
    }
    let result = dedup_on_pool(&engine, &records, config)?;
    for worker in &result.workers {
        debug!(
            "Worker {}: {} left indices, {} comparisons, {} pairs{}{}",
            worker.worker,
            worker.assigned,
            worker.comparisons,
            worker.pairs_found,
            if worker.aborted { ", aborted" } else { "" },
            if worker.cancelled { ", cancelled" } else { "" },
        );
    }
    let result = result.into_complete()?;
    info!(
        "Dedup completed in {:.4} secs",
        start.elapsed().as_secs_f64()
    );

    if let Some(path) = &config.pairs_out {
        write_pairs_to_path(path, &result.pairs)?;
        info!("Wrote {} pairs to {}", result.pairs.len(), path.display());
    }

    evaluator.set_total_comparisons(result.total_comparisons);
    Ok(evaluator.evaluate(&result.pairs))
}
