use crate::error::{DedupError, Result};
use rustc_hash::FxHashMap;
use std::hash::Hash;

///
/// Disjoint-set forest over arbitrary hashable elements, with union by rank
/// and path halving.
///
/// Components are not tracked as explicit child sets; they are rebuilt on
/// demand by grouping every element under its root.
///
#[derive(Clone, Debug)]
pub struct UnionFind<T> {
    /// Element to slot lookup
    index: FxHashMap<T, usize>,
    /// Slot to element, in insertion order
    elements: Vec<T>,
    /// `None` at a root
    parent: Vec<Option<usize>>,
    rank: Vec<u8>,
    /// Number of disjoint components
    count: usize,
}

impl<T> Default for UnionFind<T>
where
    T: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> UnionFind<T>
where
    T: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        UnionFind {
            index: FxHashMap::default(),
            elements: Vec::new(),
            parent: Vec::new(),
            rank: Vec::new(),
            count: 0,
        }
    }

    /// Builds a forest by repeatedly merging the two sides of every pair.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, T)>,
    {
        let mut uf = Self::new();
        for (t, u) in pairs {
            uf.union(t, u);
        }
        uf
    }

    /// Number of disjoint components.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, t: &T) -> bool {
        self.index.contains_key(t)
    }

    fn insert(&mut self, t: T) -> usize {
        let slot = self.elements.len();
        self.index.insert(t.clone(), slot);
        self.elements.push(t);
        self.parent.push(None);
        self.rank.push(0);
        self.count += 1;
        slot
    }

    fn slot_or_insert(&mut self, t: T) -> usize {
        match self.index.get(&t) {
            Some(&slot) => slot,
            None => self.insert(t),
        }
    }

    /// Walks to the root, repointing every visited slot to its grandparent.
    fn root(&mut self, mut slot: usize) -> usize {
        while let Some(parent) = self.parent[slot] {
            match self.parent[parent] {
                Some(grandparent) => {
                    self.parent[slot] = Some(grandparent);
                    slot = grandparent;
                }
                None => return parent,
            }
        }
        slot
    }

    /// Root element of the component holding `t`, or `None` for an unknown element.
    pub fn find(&mut self, t: &T) -> Option<&T> {
        let slot = *self.index.get(t)?;
        let root = self.root(slot);
        Some(&self.elements[root])
    }

    ///
    /// Merges the components of `t` and `u`, inserting either when absent.
    /// Returns `true` when two distinct components were merged.
    ///
    pub fn union(&mut self, t: T, u: T) -> bool {
        let slot_t = self.slot_or_insert(t);
        let slot_u = self.slot_or_insert(u);
        let root_t = self.root(slot_t);
        let root_u = self.root(slot_u);
        if root_t == root_u {
            return false;
        }
        self.count -= 1;
        match self.rank[root_t].cmp(&self.rank[root_u]) {
            std::cmp::Ordering::Less => self.parent[root_t] = Some(root_u),
            std::cmp::Ordering::Greater => self.parent[root_u] = Some(root_t),
            std::cmp::Ordering::Equal => {
                self.parent[root_u] = Some(root_t);
                self.rank[root_t] += 1;
            }
        }
        true
    }

    /// `union` for possibly absent elements; an absent side is a `NullElement` error.
    pub fn try_union(&mut self, t: Option<T>, u: Option<T>) -> Result<bool> {
        match (t, u) {
            (Some(t), Some(u)) => Ok(self.union(t, u)),
            _ => Err(DedupError::NullElement),
        }
    }

    /// True iff both elements are known and share a root.
    pub fn connected(&mut self, t: &T, u: &T) -> bool {
        let (slot_t, slot_u) = match (self.index.get(t), self.index.get(u)) {
            (Some(&a), Some(&b)) => (a, b),
            _ => return false,
        };
        self.root(slot_t) == self.root(slot_u)
    }

    /// Elements sharing a component with `t`, `t` included. Empty for an unknown element.
    pub fn component(&mut self, t: &T) -> Vec<T> {
        let slot = match self.index.get(t) {
            Some(&slot) => slot,
            None => return Vec::new(),
        };
        let root = self.root(slot);
        let mut members = Vec::new();
        for s in 0..self.elements.len() {
            if self.root(s) == root {
                members.push(self.elements[s].clone());
            }
        }
        members
    }

    fn grouped_slots(&mut self) -> Vec<Vec<usize>> {
        let mut groups: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for slot in 0..self.elements.len() {
            let root = self.root(slot);
            groups.entry(root).or_default().push(slot);
        }
        groups.into_values().collect()
    }

    /// Every component exactly once, in unspecified order.
    pub fn components(&mut self) -> Vec<Vec<T>> {
        self.grouped_slots()
            .into_iter()
            .map(|group| group.into_iter().map(|s| self.elements[s].clone()).collect())
            .collect()
    }

    #[cfg(test)]
    fn max_rank(&self) -> u8 {
        self.rank.iter().copied().max().unwrap_or(0)
    }
}

impl<T> IntoIterator for UnionFind<T>
where
    T: Hash + Eq + Clone,
{
    type Item = Vec<T>;
    type IntoIter = std::vec::IntoIter<Vec<T>>;

    fn into_iter(mut self) -> Self::IntoIter {
        let groups = self.grouped_slots();
        let mut elements: Vec<Option<T>> = self.elements.into_iter().map(Some).collect();
        groups
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .filter_map(|s| elements[s].take())
                    .collect::<Vec<T>>()
            })
            .collect::<Vec<_>>()
            .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn union_and_connected() {
        let mut uf = UnionFind::new();
        assert!(uf.union("a", "b"));
        assert!(uf.union("c", "d"));
        assert_eq!(uf.count(), 2);
        assert!(uf.connected(&"a", &"b"));
        assert!(!uf.connected(&"a", &"c"));
        assert!(uf.union("b", "d"));
        assert!(uf.connected(&"a", &"c"));
        assert_eq!(uf.count(), 1);
        assert_eq!(uf.len(), 4);
    }

    #[test]
    fn unknown_elements_are_not_connected() {
        let mut uf = UnionFind::new();
        uf.union(1, 2);
        assert!(!uf.connected(&1, &3));
        assert!(!uf.connected(&3, &3));
        assert!(uf.find(&3).is_none());
        assert!(uf.component(&3).is_empty());
    }

    #[test]
    fn repeated_union_is_idempotent() {
        let mut uf = UnionFind::new();
        assert!(uf.union("a", "b"));
        let before = uf.count();
        let root = uf.find(&"a").cloned();
        assert!(!uf.union("a", "b"));
        assert!(!uf.union("b", "a"));
        assert_eq!(uf.count(), before);
        assert_eq!(uf.find(&"b").cloned(), root);
    }

    #[test]
    fn null_element_is_rejected() {
        let mut uf: UnionFind<String> = UnionFind::new();
        assert!(matches!(
            uf.try_union(Some("a".to_string()), None),
            Err(DedupError::NullElement)
        ));
        assert!(matches!(
            uf.try_union(None, None),
            Err(DedupError::NullElement)
        ));
        assert!(uf.is_empty());
        assert!(uf.try_union(Some("a".into()), Some("b".into())).unwrap());
    }

    #[test]
    fn tie_hangs_second_under_first() {
        let mut uf = UnionFind::new();
        uf.union("x", "y");
        assert_eq!(uf.find(&"y"), Some(&"x"));
        uf.union("z", "x");
        // rank(z) = 0 < rank(x) = 1
        assert_eq!(uf.find(&"z"), Some(&"x"));
    }

    #[test]
    fn rank_stays_logarithmic() {
        let mut uf = UnionFind::new();
        let n = 1024;
        let mut step = 1;
        while step < n {
            for i in (0..n).step_by(step * 2) {
                uf.union(i, i + step);
            }
            step *= 2;
        }
        assert_eq!(uf.count(), 1);
        assert!(uf.max_rank() <= 10);
    }

    #[test]
    fn components_partition_the_elements() {
        let mut uf = UnionFind::from_pairs(vec![("a", "b"), ("b", "c"), ("d", "e")]);
        uf.union("f", "f");
        let mut comps: Vec<BTreeSet<&str>> = uf
            .components()
            .into_iter()
            .map(|c| c.into_iter().collect())
            .collect();
        comps.sort();
        assert_eq!(comps.len(), uf.count());
        assert_eq!(
            comps,
            vec![
                ["a", "b", "c"].into_iter().collect::<BTreeSet<_>>(),
                ["d", "e"].into_iter().collect(),
                ["f"].into_iter().collect(),
            ]
        );
        let mut c = uf.component(&"c");
        c.sort();
        assert_eq!(c, vec!["a", "b", "c"]);
        let owned: usize = uf.into_iter().map(|c| c.len()).sum();
        assert_eq!(owned, 6);
    }

    proptest! {
        #[test]
        fn matches_naive_closure(pairs in proptest::collection::vec((0u8..20, 0u8..20), 0..40)) {
            let mut uf = UnionFind::from_pairs(pairs.clone());
            // naive labelling by repeated relaxation
            let mut label: Vec<u8> = (0..20).collect();
            let mut changed = true;
            while changed {
                changed = false;
                for &(a, b) in &pairs {
                    let m = label[a as usize].min(label[b as usize]);
                    for x in [a, b] {
                        if label[x as usize] != m {
                            label[x as usize] = m;
                            changed = true;
                        }
                    }
                }
            }
            for a in 0u8..20 {
                for b in 0u8..20 {
                    let known = uf.contains(&a) && uf.contains(&b);
                    let expected = known && label[a as usize] == label[b as usize];
                    prop_assert_eq!(uf.connected(&a, &b), expected);
                }
            }
            prop_assert_eq!(uf.components().len(), uf.count());
        }
    }
}
