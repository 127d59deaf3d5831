use crate::error::{DedupError, Result};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const ID: &str = "id";

/// Raw row as read from a dataset file: column name to cell text.
pub type RawRecord = HashMap<String, String>;

/// Free-form parameters passed through to a provider's comparison.
pub type Parameters = HashMap<String, String>;

/// Pre-computed per-attribute similarity scores keyed by attribute name.
pub type Similarities = HashMap<String, f64>;

pub type PairSet = FxHashSet<Pair>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Short(i16),
    List(Vec<String>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Short(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_short(&self) -> Option<i16> {
        match self {
            AttrValue::Short(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AttrValue::Text(s) => write!(f, "{}", s),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Short(v) => write!(f, "{}", v),
            AttrValue::List(items) => write!(f, "{}", items.join("|")),
        }
    }
}

///
/// A parsed record. Immutable once built; always carries a textual `id`.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    values: BTreeMap<String, AttrValue>,
}

impl Record {
    pub fn new(values: BTreeMap<String, AttrValue>) -> Result<Self> {
        let id = match values.get(ID) {
            Some(AttrValue::Text(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => return Err(DedupError::parse("record has no 'id' attribute")),
        };
        Ok(Record { id, values })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, attribute: &str) -> Option<&AttrValue> {
        self.values.get(attribute)
    }

    /// Text value of `attribute`, failing when it is absent or not text.
    pub fn text(&self, attribute: &str) -> Result<&str> {
        self.get(attribute)
            .and_then(AttrValue::as_text)
            .ok_or_else(|| DedupError::missing_attribute(&self.id, attribute))
    }

    pub fn int(&self, attribute: &str) -> Result<i64> {
        self.get(attribute)
            .and_then(AttrValue::as_int)
            .ok_or_else(|| DedupError::missing_attribute(&self.id, attribute))
    }

    pub fn list(&self, attribute: &str) -> Result<&[String]> {
        self.get(attribute)
            .and_then(AttrValue::as_list)
            .ok_or_else(|| DedupError::missing_attribute(&self.id, attribute))
    }

    /// Number of fields, `id` included.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

///
/// An unordered duplicate assertion. The two ids are kept in lexicographic
/// order so that `(a, b)` and `(b, a)` hash and compare equal.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    first: String,
    second: String,
}

impl Pair {
    pub fn new<A: Into<String>, B: Into<String>>(a: A, b: B) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Pair {
                first: a,
                second: b,
            }
        } else {
            Pair {
                first: b,
                second: a,
            }
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn contains(&self, id: &str) -> bool {
        self.first == id || self.second == id
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Row of a gold-standard file. Empty cells come back as `None`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GoldRow {
    pub id1: Option<String>,
    pub id2: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, AttrValue)]) -> Result<Record> {
        Record::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn pair_is_order_insensitive() {
        let mut set = PairSet::default();
        set.insert(Pair::new("b", "a"));
        assert!(set.contains(&Pair::new("a", "b")));
        assert_eq!(Pair::new("b", "a").first(), "a");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn record_requires_id() {
        assert!(matches!(
            record(&[("title", "x".into())]),
            Err(DedupError::Parse(_))
        ));
        let rec = record(&[("id", "7".into()), ("year", AttrValue::Short(1998))]).unwrap();
        assert_eq!(rec.id(), "7");
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.get("year").and_then(AttrValue::as_short), Some(1998));
    }

    #[test]
    fn missing_attribute_is_reported() {
        let rec = record(&[("id", "1".into())]).unwrap();
        match rec.text("title") {
            Err(DedupError::MissingAttribute { record, attribute }) => {
                assert_eq!(record, "1");
                assert_eq!(attribute, "title");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn list_renders_with_pipes() {
        let v = AttrValue::List(vec!["a".into(), "b".into()]);
        assert_eq!(v.to_string(), "a|b");
        assert_eq!(v.as_list().map(|l| l.len()), Some(2));
        assert_eq!(AttrValue::Short(12).as_int(), Some(12));
    }
}
