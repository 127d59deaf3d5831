//! Bibliographic citations (Cora).

use super::{raw_text, DatasetProvider};
use crate::dto::{AttrValue, Parameters, RawRecord, Record, Similarities};
use crate::error::{DedupError, Result};
use crate::metrics::{lcs_similarity, levenshtein_similarity, monge_elkan_levenshtein};
use std::collections::BTreeMap;

pub const THRESHOLD: f64 = 0.8;

const AUTHORS: &str = "Authors";
const TITLE: &str = "title";
const PAGES: &str = "pages";
const BOOK_OR_TECH: &str = "book_or_tech";

/// Penalty for page ranges whose longest common subsequence similarity is below one half.
const PAGES_PENALTY: f64 = -0.1;
/// Penalty for a technical report matched against a book chapter.
const PUBLICATION_PENALTY: f64 = -1.0;

#[derive(Clone, Copy, Debug, Default)]
pub struct CoraProvider;

fn is_tech(kind: &str) -> bool {
    kind == "tech" || kind == "both"
}

fn is_book(kind: &str) -> bool {
    kind == "book" || kind == "both"
}

fn publication_conflict(a: &str, b: &str) -> bool {
    (is_tech(a) && is_book(b)) || (is_book(a) && is_tech(b))
}

fn pages_adjustment(a: &str, b: &str) -> f64 {
    if lcs_similarity(a, b) < 0.5 {
        PAGES_PENALTY
    } else {
        0.0
    }
}

fn publication_adjustment(a: &str, b: &str) -> f64 {
    if publication_conflict(a, b) {
        PUBLICATION_PENALTY
    } else {
        0.0
    }
}

fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b == 0.0 {
        0.0
    } else {
        2.0 * a * b / (a + b)
    }
}

/// Derives `book_or_tech` from the `tech` and `bookTitle` columns of the unprocessed export.
fn derive_publication_kind(tech: &str, book_title: &str) -> &'static str {
    match (!tech.is_empty(), !book_title.is_empty()) {
        (true, false) => "tech",
        (false, true) => "book",
        (false, false) => "neither",
        (true, true) => "both",
    }
}

impl DatasetProvider for CoraProvider {
    fn name(&self) -> &'static str {
        "cora"
    }

    fn parse_record(&self, raw: &RawRecord) -> Result<Record> {
        let mut values: BTreeMap<String, AttrValue> = raw
            .iter()
            .map(|(k, v)| (k.clone(), AttrValue::Text(v.clone())))
            .collect();
        if !raw.contains_key(BOOK_OR_TECH)
            && (raw.contains_key("tech") || raw.contains_key("bookTitle"))
        {
            let kind = derive_publication_kind(
                raw_text(raw, "tech").trim(),
                raw_text(raw, "bookTitle").trim(),
            );
            values.insert(BOOK_OR_TECH.to_string(), kind.into());
        }
        Record::new(values)
    }

    fn compare_attribute_value(
        &self,
        attribute: &str,
        v1: &AttrValue,
        v2: &AttrValue,
    ) -> Result<f64> {
        let (a, b) = (v1.to_string(), v2.to_string());
        match attribute {
            AUTHORS => Ok(monge_elkan_levenshtein(&a, &b)),
            TITLE => Ok(levenshtein_similarity(&a, &b)),
            PAGES => Ok(pages_adjustment(&a, &b)),
            BOOK_OR_TECH => Ok(publication_adjustment(&a, &b)),
            other => Err(DedupError::unknown_attribute(self.name(), other)),
        }
    }

    fn calculate_similarity(
        &self,
        r1: &Record,
        r2: &Record,
        _params: Option<&Parameters>,
    ) -> Result<f64> {
        let authors = monge_elkan_levenshtein(r1.text(AUTHORS)?, r2.text(AUTHORS)?);
        let title = levenshtein_similarity(r1.text(TITLE)?, r2.text(TITLE)?);
        let mut sim = harmonic_mean(authors, title);
        sim += pages_adjustment(r1.text(PAGES)?, r2.text(PAGES)?);
        sim += publication_adjustment(r1.text(BOOK_OR_TECH)?, r2.text(BOOK_OR_TECH)?);
        Ok(sim.clamp(0.0, 1.0))
    }

    // Adjustments are summed onto the harmonic mean and clamped once at the end.
    fn calculate_attribute_similarity(&self, similarities: &Similarities) -> Result<f64> {
        let get = |name: &str| {
            similarities
                .get(name)
                .copied()
                .ok_or_else(|| DedupError::missing_attribute("similarities", name))
        };
        let sim = harmonic_mean(get(AUTHORS)?, get(TITLE)?) + get(PAGES)? + get(BOOK_OR_TECH)?;
        Ok(sim.clamp(0.0, 1.0))
    }

    fn dataset_threshold(&self) -> f64 {
        THRESHOLD
    }
}
