use std::fmt;

use indexmap::IndexMap;
use serde::{de, ser::SerializeSeq, Deserialize, Serialize};

use crate::logic::classify::Classification;
use crate::logic::Formula;

/// Insertion-ordered set of formulas with O(1) membership by canonical
/// formula key and a canonical set key that is independent of insertion
/// order.
#[derive(Debug, Clone, Default)]
pub struct FormulaSet {
    members: IndexMap<String, Formula>,
}

impl FormulaSet {
    pub fn new() -> Self {
        FormulaSet {
            members: IndexMap::new(),
        }
    }

    pub fn singleton(formula: Formula) -> Self {
        let mut set = FormulaSet::new();
        set.insert(formula);
        set
    }

    /// Inserts, returning whether the formula was new.
    pub fn insert(&mut self, formula: Formula) -> bool {
        self.members.insert(formula.key(), formula).is_none()
    }

    pub fn contains(&self, formula: &Formula) -> bool {
        self.members.contains_key(&formula.key())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.members.contains_key(key)
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.members.values()
    }

    /// Clone of this set with one more member.
    pub fn with(&self, formula: Formula) -> Self {
        let mut clone = self.clone();
        clone.insert(formula);
        clone
    }

    pub fn unite(&mut self, other: &FormulaSet) {
        for formula in other.iter() {
            self.insert(formula.clone());
        }
    }

    pub fn is_subset_of(&self, other: &FormulaSet) -> bool {
        self.members.keys().all(|k| other.contains_key(k))
    }

    /// Canonical set key: the lexicographically sorted member keys joined
    /// by `|`. Two sets are equal iff their keys coincide.
    pub fn key(&self) -> String {
        let mut keys: Vec<&str> = self.members.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys.join("|")
    }

    /// Whether some ψ occurs alongside ¬ψ.
    pub fn is_patently_inconsistent(&self) -> bool {
        self.iter().any(|f| match f {
            Formula::Not(inner) => self.contains(inner),
            _ => false,
        })
    }

    /// Every α-member has all of its components present and every β-member
    /// at least one.
    pub fn is_fully_expanded(&self) -> bool {
        self.iter().all(|f| match f.classify() {
            Classification::Elementary => true,
            Classification::Alpha(comps) => comps.iter().all(|c| self.contains(c)),
            Classification::Beta(comps) => comps.iter().any(|c| self.contains(c)),
        })
    }
}

impl PartialEq for FormulaSet {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.is_subset_of(other)
    }
}

impl Eq for FormulaSet {}

impl FromIterator<Formula> for FormulaSet {
    fn from_iter<I: IntoIterator<Item = Formula>>(iter: I) -> Self {
        let mut set = FormulaSet::new();
        for formula in iter {
            set.insert(formula);
        }
        set
    }
}

impl fmt::Display for FormulaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut members = String::new();
        for (i, m) in self.iter().enumerate() {
            members.push_str(&m.to_string());
            if i < self.size() - 1 {
                members.push_str(", ");
            }
        }
        write!(f, "{{{}}}", members)
    }
}

impl Serialize for FormulaSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.size()))?;
        for formula in self.iter() {
            seq.serialize_element(formula)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for FormulaSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let members = Vec::<Formula>::deserialize(deserializer)?;
        Ok(members.into_iter().collect())
    }
}
