//! CD records (freedb).

use super::{expect_list, expect_text, raw_text, DatasetProvider};
use crate::dto::{AttrValue, Parameters, RawRecord, Record, Similarities, ID};
use crate::error::{DedupError, Result};
use crate::metrics::{jaccard, strip_diacritics};
use std::collections::BTreeMap;

pub const THRESHOLD: f64 = 0.7;

const SEPARATOR: char = '|';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CdAttribute {
    Artist,
    Title,
    Category,
    Genre,
    Year,
    CdExtra,
    Tracks,
}

impl CdAttribute {
    pub const ALL: [CdAttribute; 7] = [
        CdAttribute::Artist,
        CdAttribute::Title,
        CdAttribute::Category,
        CdAttribute::Genre,
        CdAttribute::Year,
        CdAttribute::CdExtra,
        CdAttribute::Tracks,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CdAttribute::Artist => "artist",
            CdAttribute::Title => "dtitle",
            CdAttribute::Category => "category",
            CdAttribute::Genre => "genre",
            CdAttribute::Year => "year",
            CdAttribute::CdExtra => "cdextra",
            CdAttribute::Tracks => "tracks",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            CdAttribute::Artist => 5.0,
            CdAttribute::Title => 4.0,
            CdAttribute::Tracks => 3.0,
            CdAttribute::CdExtra => 0.0,
            CdAttribute::Category | CdAttribute::Genre | CdAttribute::Year => 1.0,
        }
    }

    pub fn total_weight() -> f64 {
        CdAttribute::ALL.iter().map(CdAttribute::weight).sum()
    }

    pub fn from_name(name: &str) -> Result<Self> {
        CdAttribute::ALL
            .iter()
            .find(|a| a.name() == name)
            .copied()
            .ok_or_else(|| DedupError::unknown_attribute("cd", name))
    }

    fn is_text(&self) -> bool {
        !matches!(self, CdAttribute::Year | CdAttribute::Tracks)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CdProvider;

///
/// `1 - levenshtein / max(len)` on lower-cased text.
///
/// An empty side yields the dataset threshold: a missing value is treated
/// as "similar enough" rather than as a mismatch.
///
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return THRESHOLD;
    }
    let distance = strsim::levenshtein(&a.to_lowercase(), &b.to_lowercase());
    let longest = a.chars().count().max(b.chars().count());
    1.0 - distance as f64 / longest as f64
}

fn digit_count(n: i32) -> u32 {
    let mut n = n.unsigned_abs();
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

fn nth_digit(n: i32, i: u32) -> i32 {
    ((n.unsigned_abs() / 10u32.pow(i)) % 10) as i32
}

///
/// Positional digit distance: digit `i` (0 = least significant) weighs
/// `i + 1`, and the weighted absolute digit differences are scaled by their
/// maximum `9 * sum(weights)`. An absent year yields the dataset threshold.
///
pub fn year_similarity(a: Option<i16>, b: Option<i16>) -> f64 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (i32::from(a), i32::from(b)),
        _ => return THRESHOLD,
    };
    let digits = digit_count(a).max(digit_count(b));
    let (mut diff, mut max) = (0i32, 0i32);
    for i in 0..digits {
        let weight = i as i32 + 1;
        max += weight * 9;
        diff += weight * (nth_digit(a, i) - nth_digit(b, i)).abs();
    }
    1.0 - f64::from(diff) / f64::from(max)
}

pub fn tracks_similarity(a: &[String], b: &[String]) -> f64 {
    jaccard(a, b)
}

/// Drops a leading track number followed by whitespace, e.g. `"03 intro"`.
fn trim_track_number(s: &str) -> &str {
    let rest = s.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == s.len() {
        return s;
    }
    let stripped = rest.trim_start();
    if stripped.len() == rest.len() {
        s
    } else {
        stripped
    }
}

fn normalize(s: &str) -> String {
    strip_diacritics(&s.to_lowercase()).trim().to_string()
}

fn parse_tracks(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(SEPARATOR)
        .map(|track| normalize(trim_track_number(track)))
        .collect()
}

impl CdProvider {
    /// Every attribute's score for a record pair, keyed by attribute name.
    pub fn attribute_similarities(&self, r1: &Record, r2: &Record) -> Result<Similarities> {
        let mut sims = Similarities::new();
        for attribute in CdAttribute::ALL {
            let name = attribute.name();
            let sim = match attribute {
                CdAttribute::Year => year_similarity(year_of(r1), year_of(r2)),
                CdAttribute::Tracks => tracks_similarity(r1.list(name)?, r2.list(name)?),
                _ => string_similarity(r1.text(name)?, r2.text(name)?),
            };
            sims.insert(name.to_string(), sim);
        }
        Ok(sims)
    }
}

fn year_of(record: &Record) -> Option<i16> {
    record.get(CdAttribute::Year.name()).and_then(AttrValue::as_short)
}

impl DatasetProvider for CdProvider {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn parse_record(&self, raw: &RawRecord) -> Result<Record> {
        let mut values = BTreeMap::new();
        values.insert(ID.to_string(), AttrValue::Text(raw_text(raw, ID)));
        for attribute in CdAttribute::ALL.iter().filter(|a| a.is_text()) {
            let name = attribute.name();
            values.insert(name.to_string(), AttrValue::Text(raw_text(raw, name)));
        }
        let year = raw_text(raw, CdAttribute::Year.name());
        if !year.is_empty() {
            let year: i16 = year
                .parse()
                .map_err(|_| DedupError::parse(format!("invalid cd year '{}'", year)))?;
            values.insert(CdAttribute::Year.name().to_string(), AttrValue::Short(year));
        }
        values.insert(
            CdAttribute::Tracks.name().to_string(),
            AttrValue::List(parse_tracks(&raw_text(raw, CdAttribute::Tracks.name()))),
        );
        Record::new(values)
    }

    fn compare_attribute_value(
        &self,
        attribute: &str,
        v1: &AttrValue,
        v2: &AttrValue,
    ) -> Result<f64> {
        let attr = CdAttribute::from_name(attribute)?;
        Ok(match attr {
            CdAttribute::Year => year_similarity(v1.as_short(), v2.as_short()),
            CdAttribute::Tracks => tracks_similarity(
                expect_list(self.name(), attribute, v1)?,
                expect_list(self.name(), attribute, v2)?,
            ),
            _ => string_similarity(
                expect_text(self.name(), attribute, v1)?,
                expect_text(self.name(), attribute, v2)?,
            ),
        })
    }

    fn calculate_similarity(
        &self,
        r1: &Record,
        r2: &Record,
        _params: Option<&Parameters>,
    ) -> Result<f64> {
        let sims = self.attribute_similarities(r1, r2)?;
        self.calculate_attribute_similarity(&sims)
    }

    fn calculate_attribute_similarity(&self, similarities: &Similarities) -> Result<f64> {
        let mut result = 0.0;
        for (name, sim) in similarities {
            result += CdAttribute::from_name(name)?.weight() * sim;
        }
        Ok(result / CdAttribute::total_weight())
    }

    fn dataset_threshold(&self) -> f64 {
        THRESHOLD
    }
}
