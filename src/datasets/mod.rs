//! Per-dataset similarity semantics.
//!
//! Every dataset supplies a [`DatasetProvider`]: how raw TSV rows become typed
//! records, how two records (or two attribute values) compare, and the cutoff
//! above which a score means "duplicate".

pub mod cd;
pub mod cora;
pub mod febrl;
pub mod movies;
pub mod ncvoters;

use crate::dto::{AttrValue, Parameters, RawRecord, Record, Similarities};
use crate::error::{DedupError, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use cd::CdProvider;
pub use cora::CoraProvider;
pub use febrl::FebrlProvider;
pub use movies::MoviesProvider;
pub use ncvoters::{VoterVariant, VotersProvider};

/// Environment variable overriding the base directory of provider-default files.
pub const DATA_DIR_VAR: &str = "DEDUP_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "/data/datasets/incremental_duplicate_detection";

///
/// Similarity capability of one dataset. Implementations are shared across
/// worker threads, so every comparison method takes `&self`.
///
pub trait DatasetProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Normalizes a raw row into a typed record.
    fn parse_record(&self, raw: &RawRecord) -> Result<Record>;

    /// Score of one attribute pair in `[-1, 1]`; negative values are mismatch penalties.
    fn compare_attribute_value(&self, attribute: &str, v1: &AttrValue, v2: &AttrValue)
        -> Result<f64>;

    /// Whole-record score in `[0, 1]`.
    fn calculate_similarity(
        &self,
        r1: &Record,
        r2: &Record,
        params: Option<&Parameters>,
    ) -> Result<f64>;

    /// Combines pre-computed attribute scores into a score in `[0, 1]`.
    fn calculate_attribute_similarity(&self, similarities: &Similarities) -> Result<f64>;

    fn dataset_threshold(&self) -> f64;

    /// Duplicate decision on pre-computed attribute scores.
    fn is_match(&self, similarities: &Similarities) -> Result<bool> {
        Ok(self.calculate_attribute_similarity(similarities)? >= self.dataset_threshold())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Cora,
    Cd,
    Movies,
    NcVoters,
    NcVotersNaive,
    Febrl,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Cora,
        ProviderKind::Cd,
        ProviderKind::Movies,
        ProviderKind::NcVoters,
        ProviderKind::NcVotersNaive,
        ProviderKind::Febrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Cora => "cora",
            ProviderKind::Cd => "cd",
            ProviderKind::Movies => "movies",
            ProviderKind::NcVoters => "ncvoters",
            ProviderKind::NcVotersNaive => "ncvoters-naive",
            ProviderKind::Febrl => "febrl",
        }
    }

    ///
    /// Builds the provider. `identifiers` is a Febrl identifier declaration
    /// (JSON) and is rejected for every other dataset.
    ///
    pub fn build(&self, identifiers: Option<&str>) -> Result<Box<dyn DatasetProvider>> {
        if identifiers.is_some() && *self != ProviderKind::Febrl {
            return Err(DedupError::config(format!(
                "identifier declarations only apply to febrl, not {}",
                self
            )));
        }
        Ok(match self {
            ProviderKind::Cora => Box::new(CoraProvider),
            ProviderKind::Cd => Box::new(CdProvider),
            ProviderKind::Movies => Box::new(MoviesProvider::new()),
            ProviderKind::NcVoters => Box::new(VotersProvider::new(VoterVariant::Idd)),
            ProviderKind::NcVotersNaive => Box::new(VotersProvider::new(VoterVariant::Naive)),
            ProviderKind::Febrl => match identifiers {
                Some(json) => Box::new(FebrlProvider::from_json(json)?),
                None => Box::new(FebrlProvider::new()?),
            },
        })
    }

    fn files(&self) -> (&'static str, &'static str) {
        match self {
            ProviderKind::Cora => ("cora/cora_v3.tsv", "cora/cora_ground_truth.tsv"),
            ProviderKind::Cd => ("cd/cd.tsv", "cd/cd_ground_truth.tsv"),
            ProviderKind::Movies => ("movies/movies.tsv", "movies/movies_ground_truth.tsv"),
            ProviderKind::NcVoters | ProviderKind::NcVotersNaive => {
                ("ncvoters/ncvoters.tsv", "ncvoters/ncvoters_ground_truth.tsv")
            }
            ProviderKind::Febrl => ("febrl/febrl.tsv", "febrl/febrl_ground_truth.tsv"),
        }
    }

    pub fn default_dataset_path(&self) -> PathBuf {
        data_dir().join(self.files().0)
    }

    pub fn default_gold_path(&self) -> PathBuf {
        data_dir().join(self.files().1)
    }
}

fn data_dir() -> PathBuf {
    env::var(DATA_DIR_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR))
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self> {
        ProviderKind::ALL
            .iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| {
                DedupError::config(format!(
                    "unknown provider '{}', expected one of: {}",
                    s,
                    ProviderKind::ALL.map(|k| k.as_str()).join(", ")
                ))
            })
    }
}

/// Cell text of `key`, empty when the column is absent.
pub(crate) fn raw_text(raw: &RawRecord, key: &str) -> String {
    raw.get(key).cloned().unwrap_or_default()
}

pub(crate) fn expect_text<'a>(
    provider: &'static str,
    attribute: &str,
    value: &'a AttrValue,
) -> Result<&'a str> {
    value.as_text().ok_or_else(|| {
        DedupError::parse(format!(
            "{} attribute '{}' expects text, got '{}'",
            provider, attribute, value
        ))
    })
}

pub(crate) fn expect_list<'a>(
    provider: &'static str,
    attribute: &str,
    value: &'a AttrValue,
) -> Result<&'a [String]> {
    value.as_list().ok_or_else(|| {
        DedupError::parse(format!(
            "{} attribute '{}' expects a list, got '{}'",
            provider, attribute, value
        ))
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn parsed(provider: &dyn DatasetProvider, pairs: &[(&str, &str)]) -> Record {
        provider.parse_record(&raw(pairs)).unwrap()
    }

    pub fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }
}
