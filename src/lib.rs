//! Pairwise entity-resolution: dataset similarity providers, a union–find
//! forest and a transitive-closure evaluator for duplicate pair sets.

pub mod datasets;
pub mod dto;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod report;
pub mod union_find;
pub mod util;

pub use datasets::{DatasetProvider, ProviderKind};
pub use dto::{AttrValue, Pair, PairSet, Record};
pub use error::{DedupError, Result};
pub use evaluation::{Evaluation, Evaluator};
pub use union_find::UnionFind;
