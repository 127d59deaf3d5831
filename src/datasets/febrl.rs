//! Synthetic person records (Febrl), scored from a JSON identifier declaration.

use super::DatasetProvider;
use crate::dto::{AttrValue, Parameters, RawRecord, Record, Similarities};
use crate::error::{DedupError, Result};
use crate::metrics::{
    damerau_levenshtein_similarity, jaro, jaro_winkler, lcs_similarity, levenshtein_similarity,
    monge_elkan_levenshtein, replace_non_word, sorensen_dice,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub const THRESHOLD: f64 = 0.8;

pub const DEFAULT_IDENTIFIERS: &str = r#"[[
    {"attribute": "given_name", "similarityFunction": "JaroWinkler", "weight": 0.2},
    {"attribute": "surname", "similarityFunction": "Levenshtein", "weight": 0.4},
    {"attribute": "soc_sec_id", "similarityFunction": "Levenshtein", "weight": 0.3},
    {"attribute": "age", "similarityFunction": "Equal", "weight": 0.1}
]]"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityFunction {
    Equal,
    Levenshtein,
    DamerauLevenshtein,
    Jaro,
    JaroWinkler,
    MongeElkan,
    LongestCommonSubsequence,
    SorensenDice,
}

impl SimilarityFunction {
    ///
    /// Scores two cell values. `Equal` compares the raw text; every other
    /// metric runs on lower-cased text with non-word runs collapsed to a blank.
    /// A missing or empty value on either side scores 0.
    ///
    pub fn compare(&self, v1: Option<&AttrValue>, v2: Option<&AttrValue>) -> f64 {
        let (s1, s2) = match (v1, v2) {
            (Some(a), Some(b)) => (a.to_string(), b.to_string()),
            _ => return 0.0,
        };
        if s1.is_empty() || s2.is_empty() {
            return 0.0;
        }
        let metric: fn(&str, &str) -> f64 = match self {
            SimilarityFunction::Equal => return if s1 == s2 { 1.0 } else { 0.0 },
            SimilarityFunction::Levenshtein => levenshtein_similarity,
            SimilarityFunction::DamerauLevenshtein => damerau_levenshtein_similarity,
            SimilarityFunction::Jaro => jaro,
            SimilarityFunction::JaroWinkler => jaro_winkler,
            SimilarityFunction::MongeElkan => monge_elkan_levenshtein,
            SimilarityFunction::LongestCommonSubsequence => lcs_similarity,
            SimilarityFunction::SorensenDice => sorensen_dice,
        };
        metric(
            &replace_non_word(&s1.to_lowercase()),
            &replace_non_word(&s2.to_lowercase()),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub attribute: String,
    pub similarity_function: SimilarityFunction,
    pub weight: f32,
}

#[derive(Clone, Debug)]
pub struct FebrlProvider {
    groups: Vec<Vec<Identifier>>,
    by_attribute: FxHashMap<String, Identifier>,
}

impl FebrlProvider {
    /// Provider over the built-in identifier declaration.
    pub fn new() -> Result<Self> {
        Self::from_json(DEFAULT_IDENTIFIERS)
    }

    ///
    /// Loads a declaration: a list of identifier groups, each a list of
    /// `{attribute, similarityFunction, weight}`.
    ///
    pub fn from_json(json: &str) -> Result<Self> {
        let groups: Vec<Vec<Identifier>> = serde_json::from_str(json)
            .map_err(|e| DedupError::config(format!("invalid febrl identifiers: {}", e)))?;
        Self::from_groups(groups)
    }

    pub fn from_groups(groups: Vec<Vec<Identifier>>) -> Result<Self> {
        if groups.is_empty() {
            return Err(DedupError::config("febrl identifiers declare no group"));
        }
        let by_attribute = groups
            .iter()
            .flatten()
            .map(|identifier| (identifier.attribute.clone(), identifier.clone()))
            .collect();
        Ok(FebrlProvider {
            groups,
            by_attribute,
        })
    }

    /// Attribute names per identifier group, in declaration order.
    pub fn identifier_groups(&self) -> Vec<Vec<&str>> {
        self.groups
            .iter()
            .map(|group| group.iter().map(|i| i.attribute.as_str()).collect())
            .collect()
    }
}

impl DatasetProvider for FebrlProvider {
    fn name(&self) -> &'static str {
        "febrl"
    }

    fn parse_record(&self, raw: &RawRecord) -> Result<Record> {
        Record::new(
            raw.iter()
                .map(|(k, v)| (k.clone(), AttrValue::Text(v.clone())))
                .collect(),
        )
    }

    fn compare_attribute_value(
        &self,
        attribute: &str,
        v1: &AttrValue,
        v2: &AttrValue,
    ) -> Result<f64> {
        let identifier = self
            .by_attribute
            .get(attribute)
            .ok_or_else(|| DedupError::unknown_attribute(self.name(), attribute))?;
        Ok(identifier.similarity_function.compare(Some(v1), Some(v2)))
    }

    fn calculate_similarity(
        &self,
        r1: &Record,
        r2: &Record,
        _params: Option<&Parameters>,
    ) -> Result<f64> {
        let total: f64 = self
            .groups
            .iter()
            .flatten()
            .map(|identifier| {
                let name = identifier.attribute.as_str();
                f64::from(identifier.weight)
                    * identifier
                        .similarity_function
                        .compare(r1.get(name), r2.get(name))
            })
            .sum();
        Ok(total / self.groups.len() as f64)
    }

    fn calculate_attribute_similarity(&self, _similarities: &Similarities) -> Result<f64> {
        Err(DedupError::Unsupported {
            provider: self.name(),
            operation: "calculate_attribute_similarity",
        })
    }

    fn dataset_threshold(&self) -> f64 {
        THRESHOLD
    }

    /// Weighted mean over declared attributes; any undeclared attribute is a non-match.
    fn is_match(&self, similarities: &Similarities) -> Result<bool> {
        let mut sum = 0.0;
        let mut total_weight = 0.0;
        for (attribute, sim) in similarities {
            let identifier = match self.by_attribute.get(attribute) {
                Some(identifier) => identifier,
                None => return Ok(false),
            };
            let weight = f64::from(identifier.weight);
            sum += weight * sim;
            total_weight += weight;
        }
        if total_weight <= 0.0 {
            return Ok(false);
        }
        Ok(sum / total_weight >= THRESHOLD)
    }
}
