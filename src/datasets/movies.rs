//! Movies: title similarity gated by sequel numbers and actor overlap.

use super::{expect_list, expect_text, DatasetProvider};
use crate::dto::{AttrValue, Parameters, RawRecord, Record, Similarities, ID};
use crate::error::{DedupError, Result};
use crate::metrics::{levenshtein_similarity, subset_similarity};
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

pub const THRESHOLD: f64 = 0.93;

const TITLE: &str = "title";
const ACTORS: &str = "actors";
const RECORD_ID: &str = "record_id";

/// Returned by actor comparison when either side lists no actors.
pub const NO_ACTORS: f64 = -1.0;

const NO_SEQUEL: i32 = -1;

/// Title parts that name an award, serial or studio rather than the film.
const EXCLUDED_PART_WORDS: [&str; 4] = ["award", "serial", "prix", "films"];

/// Escaped special-character artefacts found in the raw titles.
const HEX_ARTEFACTS: [&str; 7] = ["00ED", "00EE", "00E8", "00E9", "00F6", "00F5", "00F3"];

lazy_static! {
    static ref ROMAN_NUMERALS: FxHashMap<&'static str, i32> = [
        "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII", "XIII", "XIV",
        "XV", "XVI", "XVII", "XVIII", "XIX", "XX",
    ]
    .iter()
    .enumerate()
    .map(|(i, numeral)| (*numeral, i as i32 + 1))
    .collect();
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MoviesProvider;

impl MoviesProvider {
    pub fn new() -> Self {
        MoviesProvider
    }
}

/// Byte offset and char position of the last blank.
fn last_blank(s: &str) -> Option<(usize, usize)> {
    let byte = s.rfind(' ')?;
    Some((byte, s[..byte].chars().count()))
}

/// Decimal or Roman (I to XX) number, or `NO_SEQUEL`.
fn parse_number(s: &str) -> i32 {
    match s.parse::<i32>() {
        Ok(n) if n > 0 => n,
        _ => ROMAN_NUMERALS.get(s).copied().unwrap_or(NO_SEQUEL),
    }
}

/// Sequel number of a title from its last word, e.g. 3 for "Rocky III".
pub fn find_sequel(title: &str) -> i32 {
    match last_blank(title) {
        Some((byte, pos)) if pos > 2 => parse_number(&title[byte + 1..]),
        _ => NO_SEQUEL,
    }
}

fn remove_special_characters(s: &str) -> String {
    let result = s.replace("ï¿½", "").replace("0101", "");
    if !result.contains("00") {
        return result;
    }
    HEX_ARTEFACTS
        .iter()
        .fold(result, |acc, artefact| acc.replace(artefact, ""))
}

fn remove_punctuation_marks(s: &str) -> &str {
    s.trim_end_matches(['.', '!', '?'])
}

///
/// Moves a trailing article back to the front: `"dentist, the"` becomes
/// `"the dentist"`. The elided French article joins without a blank.
///
pub fn reorder_article(s: &str) -> String {
    let (byte, pos) = match last_blank(s) {
        Some(found) => found,
        None => return s.to_string(),
    };
    if pos < 2 || !s[..byte].ends_with(',') {
        return s.to_string();
    }
    let article = &s[byte + 1..];
    if article.chars().count() > 3 || article.ends_with('.') || article == "het" {
        return s.to_string();
    }
    let head = &s[..byte - 1];
    if article == "l'" {
        format!("{}{}", article, head)
    } else {
        format!("{} {}", article, head)
    }
}

/// Splits on `|`, dropping trailing empty parts but keeping at least one.
fn title_parts(s: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = s.split('|').collect();
    while parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

fn is_excluded_part(part: &str) -> bool {
    EXCLUDED_PART_WORDS.iter().any(|word| part.contains(word))
}

/// Best part-to-part similarity of two cleaned, lower-cased titles.
fn title_part_similarity(s1: &str, s2: &str) -> f64 {
    let parts1 = title_parts(s1);
    let parts2 = title_parts(s2);
    if parts1.len() > 1 && parts2.len() > 1 {
        return 0.0;
    }
    let mut result = 0.0;
    for p1 in parts1.iter().filter(|p| !is_excluded_part(p)) {
        let p1 = reorder_article(remove_punctuation_marks(p1));
        for p2 in parts2.iter().filter(|p| !is_excluded_part(p)) {
            let p2 = reorder_article(remove_punctuation_marks(p2));
            result = f64::max(result, levenshtein_similarity(&p1, &p2));
        }
    }
    result
}

pub fn title_similarity(s1: &str, s2: &str) -> f64 {
    if find_sequel(s1) != find_sequel(s2) {
        return 0.0;
    }
    let s1 = remove_special_characters(s1).to_lowercase();
    let s2 = remove_special_characters(s2).to_lowercase();
    title_part_similarity(&s1, &s2)
}

/// Subset overlap of the actor lists, or `NO_ACTORS` when either is empty.
pub fn actors_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return NO_ACTORS;
    }
    subset_similarity(a, b)
}

fn parse_actors(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split('|').map(str::to_string).collect()
}

impl DatasetProvider for MoviesProvider {
    fn name(&self) -> &'static str {
        "movies"
    }

    fn parse_record(&self, raw: &RawRecord) -> Result<Record> {
        let mut values = BTreeMap::new();
        for (key, value) in raw {
            match key.as_str() {
                ID | RECORD_ID => {
                    values.insert(ID.to_string(), AttrValue::Text(value.clone()));
                }
                ACTORS => {
                    values.insert(key.clone(), AttrValue::List(parse_actors(value)));
                }
                _ => {
                    values.insert(key.clone(), AttrValue::Text(value.clone()));
                }
            }
        }
        values
            .entry(ACTORS.to_string())
            .or_insert_with(|| AttrValue::List(Vec::new()));
        Record::new(values)
    }

    fn compare_attribute_value(
        &self,
        attribute: &str,
        v1: &AttrValue,
        v2: &AttrValue,
    ) -> Result<f64> {
        match attribute {
            TITLE => Ok(title_similarity(
                expect_text(self.name(), attribute, v1)?,
                expect_text(self.name(), attribute, v2)?,
            )),
            ACTORS => Ok(actors_similarity(
                expect_list(self.name(), attribute, v1)?,
                expect_list(self.name(), attribute, v2)?,
            )),
            other => Err(DedupError::unknown_attribute(self.name(), other)),
        }
    }

    // Movies sharing no actor, or lacking an actor list, never match.
    fn calculate_similarity(
        &self,
        r1: &Record,
        r2: &Record,
        _params: Option<&Parameters>,
    ) -> Result<f64> {
        let actors = actors_similarity(r1.list(ACTORS)?, r2.list(ACTORS)?);
        if actors <= 0.0 {
            return Ok(0.0);
        }
        Ok(title_similarity(r1.text(TITLE)?, r2.text(TITLE)?))
    }

    fn calculate_attribute_similarity(&self, similarities: &Similarities) -> Result<f64> {
        Ok(similarities.get(TITLE).copied().unwrap_or(0.0))
    }

    fn dataset_threshold(&self) -> f64 {
        THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::datasets::testing::{close, parsed};

    fn movie(id: &str, title: &str, actors: &str) -> Record {
        parsed(&MoviesProvider, &[("id", id), ("title", title), ("actors", actors)])
    }

    #[test]
    fn sequel_numbers_gate_titles() {
        assert_eq!(find_sequel("Rocky II"), 2);
        assert_eq!(find_sequel("Rocky III"), 3);
        assert_eq!(find_sequel("Rocky 4"), 4);
        assert_eq!(find_sequel("Rocky"), NO_SEQUEL);
        assert_eq!(find_sequel("Up 2"), NO_SEQUEL);
        assert!(close(title_similarity("Rocky II", "Rocky III"), 0.0));
        let a = movie("1", "Rocky II", "Sylvester Stallone");
        let b = movie("2", "Rocky III", "Sylvester Stallone");
        assert!(close(MoviesProvider.calculate_similarity(&a, &b, None).unwrap(), 0.0));
    }

    #[test]
    fn trailing_articles_move_to_the_front() {
        assert_eq!(reorder_article("dentist, the"), "the dentist");
        assert_eq!(reorder_article("avventura, l'"), "l'avventura");
        assert_eq!(reorder_article("jardin, het"), "jardin, het");
        assert_eq!(reorder_article("dentist, dr."), "dentist, dr.");
        assert_eq!(reorder_article("the dentist"), "the dentist");
        assert!(close(title_similarity("Dentist, The", "The Dentist!"), 1.0));
    }

    #[test]
    fn award_parts_are_ignored() {
        assert!(close(
            title_similarity("Heat|Academy Award Winners", "Heat"),
            1.0
        ));
        assert!(close(title_similarity("Heat|Alias", "Heat|Other"), 0.0));
    }

    #[test]
    fn hex_artefacts_are_removed() {
        assert!(close(title_similarity("Am00E9lie", "Amlie"), 1.0));
    }

    #[test]
    fn actors_gate_the_record_score() {
        let a = movie("1", "Heat", "Al Pacino|Robert De Niro");
        let b = movie("2", "Heat", "Robert De Niro");
        assert!(close(MoviesProvider.calculate_similarity(&a, &b, None).unwrap(), 1.0));
        let c = movie("3", "Heat", "Val Kilmer");
        assert!(close(MoviesProvider.calculate_similarity(&a, &c, None).unwrap(), 0.0));
        let d = movie("4", "Heat", "");
        assert!(close(MoviesProvider.calculate_similarity(&a, &d, None).unwrap(), 0.0));
        assert!(close(
            MoviesProvider
                .compare_attribute_value(ACTORS, a.get(ACTORS).unwrap(), d.get(ACTORS).unwrap())
                .unwrap(),
            NO_ACTORS
        ));
    }

    #[test]
    fn two_empty_actor_lists_never_match() {
        let a = movie("1", "Heat", "");
        let b = movie("2", "Heat", "");
        assert!(close(MoviesProvider.calculate_similarity(&a, &b, None).unwrap(), 0.0));
    }

    #[test]
    fn record_id_column_becomes_id() {
        let rec = parsed(&MoviesProvider, &[("record_id", "m7"), ("title", "Heat")]);
        assert_eq!(rec.id(), "m7");
        assert!(rec.list(ACTORS).unwrap().is_empty());
    }

    fn title_strategy() -> impl Strategy<Value = String> {
        let word = prop::sample::select(vec![
            "rocky", "heat", "the", "dentist,", "II", "3", "amlie", "up", "|Alias", "!",
        ]);
        prop::collection::vec(word, 1..4).prop_map(|words| words.join(" "))
    }

    fn actors_strategy() -> impl Strategy<Value = String> {
        let actor = prop::sample::select(vec!["Al Pacino", "Robert De Niro", "Val Kilmer"]);
        prop::collection::vec(actor, 0..3).prop_map(|actors| actors.join("|"))
    }

    proptest! {
        #[test]
        fn similarity_is_symmetric_and_in_range(
            titles in (title_strategy(), title_strategy()),
            actors in (actors_strategy(), actors_strategy()),
        ) {
            let a = movie("1", &titles.0, &actors.0);
            let b = movie("2", &titles.1, &actors.1);
            let ab = MoviesProvider.calculate_similarity(&a, &b, None).unwrap();
            let ba = MoviesProvider.calculate_similarity(&b, &a, None).unwrap();
            prop_assert!((ab - ba).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&ab));
        }
    }
}
