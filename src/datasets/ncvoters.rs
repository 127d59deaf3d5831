//! North Carolina voter rolls.
//!
//! Two scoring variants share the same hard rules (sex, race, status, age):
//! the incremental (`Idd`) variant used by default, and a `Naive` weighted
//! sum kept for comparison runs.

use super::DatasetProvider;
use crate::dto::{AttrValue, Parameters, RawRecord, Record, Similarities, ID};
use crate::error::{DedupError, Result};
use crate::metrics::{
    hamming_similarity, jaro_winkler, levenshtein_similarity, monge_elkan,
};
use lazy_static::lazy_static;
use rphonetic::{DoubleMetaphone, Encoder};
use std::collections::BTreeMap;

pub const THRESHOLD: f64 = 0.75;

pub const FIRST_NAME: &str = "first_name";
pub const MIDDLE_NAME: &str = "midl_name";
pub const LAST_NAME: &str = "last_name";
pub const HOUSE_NUM: &str = "house_num";
pub const STREET: &str = "street_name";
pub const ZIP_CODE: &str = "zip_code";
pub const AGE: &str = "age";
pub const SEX: &str = "sex_code";
pub const BIRTH_PLACE: &str = "birth_place";
pub const STATUS: &str = "voter_status_desc";
pub const STATUS_REASON: &str = "voter_status_reason_desc";
pub const RACE: &str = "race_desc";
pub const PARTY: &str = "party_cd";
pub const COUNTY: &str = "county_id";

const INT_COLUMNS: [&str; 4] = [HOUSE_NUM, ZIP_CODE, AGE, COUNTY];

const ATTRIBUTES: [&str; 15] = [
    ID,
    FIRST_NAME,
    MIDDLE_NAME,
    LAST_NAME,
    HOUSE_NUM,
    STREET,
    ZIP_CODE,
    AGE,
    SEX,
    BIRTH_PLACE,
    STATUS,
    STATUS_REASON,
    RACE,
    PARTY,
    COUNTY,
];

const ACTIVE: &str = "ACTIVE";
const DECEASED: &str = "DECEASED";
const UNKNOWN_STREET: &str = "UNKNOWN";
const MOVED_FROM_COUNTY: &str = "MOVED FROM COUNTY";
const MOVED_WITHIN_STATE: &str = "MOVED WITHIN STATE";
const NEUTRAL_RACES: [&str; 2] = ["UNDESIGNATED", "OTHER"];

/// Sentinel of the empty string attributes
const EMPTY_TEXT: AttrValue = AttrValue::Text(String::new());
/// Sentinel of the integer attributes
const ZERO: AttrValue = AttrValue::Int(0);

lazy_static! {
    static ref UNKNOWN_STREET_VALUE: AttrValue = AttrValue::Text(UNKNOWN_STREET.to_string());
    static ref DOUBLE_METAPHONE: DoubleMetaphone = DoubleMetaphone::default();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VoterVariant {
    #[default]
    Idd,
    Naive,
}

impl VoterVariant {
    fn from_param(value: &str) -> Result<Self> {
        match value {
            "idd" => Ok(VoterVariant::Idd),
            "naive" => Ok(VoterVariant::Naive),
            other => Err(DedupError::config(format!(
                "unknown voter similarity variant '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VotersProvider {
    variant: VoterVariant,
}

///
/// Counts the attributes that take part in a score. Comparing a value with
/// its "unknown" sentinel on one side only scores zero and drops the
/// attribute from the count.
///
struct AttributeTally {
    count: i32,
}

impl AttributeTally {
    fn similarity(&mut self, v1: &AttrValue, v2: &AttrValue, unknown: &AttrValue) -> f64 {
        match (v1 == unknown, v2 == unknown) {
            (true, true) => 1.0,
            (true, false) | (false, true) => {
                self.count -= 1;
                0.0
            }
            (false, false) => value_similarity(v1, v2),
        }
    }
}

/// Integers score `1 - hamming`, so identical zip codes and house numbers add nothing.
fn value_similarity(v1: &AttrValue, v2: &AttrValue) -> f64 {
    match (v1, v2) {
        (AttrValue::Int(a), AttrValue::Int(b)) => {
            1.0 - hamming_similarity(&a.to_string(), &b.to_string())
        }
        _ => levenshtein_similarity(&v1.to_string(), &v2.to_string()),
    }
}

fn field<'a>(record: &'a Record, attribute: &str) -> Result<&'a AttrValue> {
    record
        .get(attribute)
        .ok_or_else(|| DedupError::missing_attribute(record.id(), attribute))
}

fn double_metaphone_equal(a: &str, b: &str) -> bool {
    DOUBLE_METAPHONE.encode(a) == DOUBLE_METAPHONE.encode(b)
}

/// Hard decisions taken before any attribute is scored.
fn special_case(r1: &Record, r2: &Record) -> Result<Option<f64>> {
    if r1.id() == r2.id() {
        return Ok(Some(1.0));
    }

    let (sex1, sex2) = (r1.text(SEX)?, r2.text(SEX)?);
    if (sex1 == "M" && sex2 == "F") || (sex1 == "F" && sex2 == "M") {
        return Ok(Some(0.0));
    }

    let (race1, race2) = (r1.text(RACE)?, r2.text(RACE)?);
    if !race1.is_empty()
        && !race2.is_empty()
        && race1 != race2
        && !NEUTRAL_RACES.contains(&race1)
        && !NEUTRAL_RACES.contains(&race2)
    {
        return Ok(Some(0.0));
    }

    let (status1, status2) = (r1.text(STATUS)?, r2.text(STATUS)?);
    let (reason1, reason2) = (r1.text(STATUS_REASON)?, r2.text(STATUS_REASON)?);
    // only one registration is active at a time, and a person dies once
    if status1 == ACTIVE && status2 == ACTIVE {
        return Ok(Some(0.0));
    }
    if reason1 == DECEASED && reason2 == DECEASED {
        return Ok(Some(0.0));
    }
    if (status1 == ACTIVE && reason2 == DECEASED) || (status2 == ACTIVE && reason1 == DECEASED) {
        return Ok(Some(0.0));
    }

    if r1.int(AGE)? != r2.int(AGE)? {
        return Ok(Some(0.0));
    }
    Ok(None)
}

impl VotersProvider {
    pub fn new(variant: VoterVariant) -> Self {
        VotersProvider { variant }
    }

    pub fn variant(&self) -> VoterVariant {
        self.variant
    }

    ///
    /// Weighted sum of name, street and house-number similarities.
    ///
    /// The house-number term only applies when the two records carry a
    /// different number of fields, and is then divided by the field count of
    /// `r1`.
    ///
    pub fn naive_similarity(&self, r1: &Record, r2: &Record) -> Result<f64> {
        if let Some(sim) = special_case(r1, r2)? {
            return Ok(sim);
        }
        let mut tally = AttributeTally { count: 0 };
        let first = tally.similarity(field(r1, FIRST_NAME)?, field(r2, FIRST_NAME)?, &EMPTY_TEXT);
        let middle = tally.similarity(field(r1, MIDDLE_NAME)?, field(r2, MIDDLE_NAME)?, &EMPTY_TEXT);
        let last = tally.similarity(field(r1, LAST_NAME)?, field(r2, LAST_NAME)?, &EMPTY_TEXT);

        let tokens1: Vec<&str> = r1.text(STREET)?.split_whitespace().collect();
        let tokens2: Vec<&str> = r2.text(STREET)?.split_whitespace().collect();
        let street = monge_elkan(&tokens1, &tokens2, levenshtein_similarity);

        let house = if r1.len() != r2.len() {
            hamming_similarity(
                &field(r1, HOUSE_NUM)?.to_string(),
                &field(r2, HOUSE_NUM)?.to_string(),
            ) / r1.len() as f64
        } else {
            0.0
        };

        Ok(first * 0.15 + middle * 0.1 + last * 0.25 + street * 0.35 + house * 0.15)
    }

    /// Rule-based score averaged over the attributes that could be compared.
    pub fn idd_similarity(&self, r1: &Record, r2: &Record) -> Result<f64> {
        if let Some(sim) = special_case(r1, r2)? {
            return Ok(sim);
        }

        let mut tally = AttributeTally { count: 5 };
        let mut sum = 0.0;

        sum += tally.similarity(field(r1, BIRTH_PLACE)?, field(r2, BIRTH_PLACE)?, &EMPTY_TEXT);
        sum += if r1.text(PARTY)? == r2.text(PARTY)? { 1.0 } else { 0.0 };

        // first names rarely change, so a distant first name pulls the score down
        let (first1, first2) = (r1.text(FIRST_NAME)?, r2.text(FIRST_NAME)?);
        sum += jaro_winkler(first1, first2) * 2.0 - 1.0;

        let (middle1, middle2) = (r1.text(MIDDLE_NAME)?, r2.text(MIDDLE_NAME)?);
        let (last1, last2) = (r1.text(LAST_NAME)?, r2.text(LAST_NAME)?);
        if middle1 == last2 || middle2 == last1 {
            // the former last name became the middle name, e.g. after marriage
            tally.count -= 2;
        } else {
            let agreeing = [(first1, first2), (middle1, middle2), (last1, last2)]
                .iter()
                .filter(|(a, b)| double_metaphone_equal(a, b))
                .count();
            if agreeing < 2 {
                return Ok(0.0);
            }
            sum += tally.similarity(field(r1, MIDDLE_NAME)?, field(r2, MIDDLE_NAME)?, &EMPTY_TEXT);
            sum += tally.similarity(field(r1, LAST_NAME)?, field(r2, LAST_NAME)?, &EMPTY_TEXT);
        }

        let counted = tally.count;
        let mut street =
            tally.similarity(field(r1, STREET)?, field(r2, STREET)?, &UNKNOWN_STREET_VALUE);
        let mut address = street;
        if counted != tally.count {
            street = 1.0;
        }
        address += tally.similarity(field(r1, ZIP_CODE)?, field(r2, ZIP_CODE)?, &ZERO) * street;
        address += tally.similarity(field(r1, HOUSE_NUM)?, field(r2, HOUSE_NUM)?, &ZERO) * street;
        // the address block absorbs the sentinels it met
        let address_attributes = 3 + (counted - tally.count);
        tally.count = counted;

        let (reason1, reason2) = (r1.text(STATUS_REASON)?, r2.text(STATUS_REASON)?);
        let moved_county = (reason1 == MOVED_FROM_COUNTY || reason2 == MOVED_FROM_COUNTY)
            && r1.int(COUNTY)? != r2.int(COUNTY)?;
        let moved_state = reason1 == MOVED_WITHIN_STATE || reason2 == MOVED_WITHIN_STATE;
        if moved_county || moved_state {
            // after a move the address only counts as one averaged attribute
            sum += address / f64::from(address_attributes);
            tally.count += 1;
        } else {
            sum += address;
            tally.count += address_attributes;
        }

        Ok(f64::max(sum / f64::from(tally.count), 0.0))
    }
}

impl DatasetProvider for VotersProvider {
    fn name(&self) -> &'static str {
        "ncvoters"
    }

    fn parse_record(&self, raw: &RawRecord) -> Result<Record> {
        let values: BTreeMap<String, AttrValue> = raw
            .iter()
            .map(|(key, value)| {
                let value = if INT_COLUMNS.contains(&key.as_str()) {
                    AttrValue::Int(value.trim().parse().unwrap_or(0))
                } else {
                    AttrValue::Text(value.clone())
                };
                (key.clone(), value)
            })
            .collect();
        Record::new(values)
    }

    fn compare_attribute_value(
        &self,
        attribute: &str,
        v1: &AttrValue,
        v2: &AttrValue,
    ) -> Result<f64> {
        if !ATTRIBUTES.contains(&attribute) {
            return Err(DedupError::unknown_attribute(self.name(), attribute));
        }
        Ok(match (v1, v2) {
            (AttrValue::Int(a), AttrValue::Int(b)) => {
                hamming_similarity(&a.to_string(), &b.to_string())
            }
            (AttrValue::Text(a), AttrValue::Text(b)) => jaro_winkler(a, b),
            _ => jaro_winkler(&v1.to_string(), &v2.to_string()),
        })
    }

    fn calculate_similarity(
        &self,
        r1: &Record,
        r2: &Record,
        params: Option<&Parameters>,
    ) -> Result<f64> {
        let variant = match params.and_then(|p| p.get("variant")) {
            Some(value) => VoterVariant::from_param(value)?,
            None => self.variant,
        };
        match variant {
            VoterVariant::Idd => self.idd_similarity(r1, r2),
            VoterVariant::Naive => self.naive_similarity(r1, r2),
        }
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

    ///
    /// First names count twice, every other attribute once. Duplicates in the
    /// rolls always share their age, so anything but a perfect age score is a
    /// non-match.
    ///
    fn is_match(&self, similarities: &Similarities) -> Result<bool> {
        let mut similarity = 0.0;
        let mut count = 0u32;
        for (attribute, sim) in similarities {
            count += 1;
            match attribute.as_str() {
                FIRST_NAME => {
                    similarity += 2.0 * sim;
                    count += 1;
                }
                AGE => {
                    if *sim != 1.0 {
                        return Ok(false);
                    }
                }
                _ => similarity += sim,
            }
        }
        if count == 0 {
            return Ok(false);
        }
        Ok(similarity / f64::from(count) >= THRESHOLD)
    }
}
