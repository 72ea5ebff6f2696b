use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{TableauxErr, TableauxResult};
use crate::logic::Formula;
use crate::set::FormulaSet;

/// Handle of a node within one run. Ids are minted by a per-run monotonic
/// counter and are unique across prestates and states of that run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw formula set awaiting expansion (rule SR).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prestate {
    pub id: NodeId,
    pub formulas: FormulaSet,
}

/// Fully expanded, non-patently-inconsistent formula set. Frozen once
/// created; Phase 3 removes states but never rewrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub id: NodeId,
    pub formulas: FormulaSet,
}

/// Search edge from a prestate to one of its expansions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashedEdge {
    pub from: NodeId,
    pub to: NodeId,
}

/// Transition edge labeled by the diamond `¬D_A φ` that demanded it. In the
/// pretableau it points from a state to a prestate; after prestate
/// elimination from state to state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolidEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub label: Formula,
}

impl fmt::Display for SolidEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} →[{}] {}", self.from, self.label, self.to)
    }
}

trait GraphNode {
    fn node_id(&self) -> NodeId;
}

impl GraphNode for Prestate {
    fn node_id(&self) -> NodeId {
        self.id
    }
}

impl GraphNode for State {
    fn node_id(&self) -> NodeId {
        self.id
    }
}

/// Serializes a node map as the sequence of its nodes (each node carries its
/// own id) and rebuilds the map on the way in.
mod node_seq {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use super::{GraphNode, NodeId};

    pub(super) fn serialize<T, S>(
        map: &BTreeMap<NodeId, T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: serde::Serializer,
    {
        serializer.collect_seq(map.values())
    }

    pub(super) fn deserialize<'de, T, D>(deserializer: D) -> Result<BTreeMap<NodeId, T>, D::Error>
    where
        T: Deserialize<'de> + GraphNode,
        D: serde::Deserializer<'de>,
    {
        let nodes = Vec::<T>::deserialize(deserializer)?;
        Ok(nodes.into_iter().map(|n| (n.node_id(), n)).collect())
    }
}

/// Bipartite graph of prestates and states produced by Phase 1. Dashed
/// edges are prestate → state search edges; solid edges are state → prestate
/// transitions labeled by the triggering diamond.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pretableau {
    #[serde(with = "node_seq")]
    pub prestates: BTreeMap<NodeId, Prestate>,
    #[serde(with = "node_seq")]
    pub states: BTreeMap<NodeId, State>,
    pub dashed: Vec<DashedEdge>,
    pub solid: Vec<SolidEdge>,
}

impl Pretableau {
    pub fn prestate_count(&self) -> usize {
        self.prestates.len()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Structural invariants: ids agree with map keys, set keys are unique
    /// per kind, edges connect the right kinds, solid labels are diamonds,
    /// and states are saturated and consistent. Violations indicate a bug
    /// in the engine, not a property of the input.
    pub fn verify(&self) -> TableauxResult<()> {
        let mut keys = HashSet::new();
        for (id, prestate) in &self.prestates {
            if prestate.id != *id {
                return Err(TableauxErr::Corrupt(format!(
                    "prestate {} stored under id {}",
                    prestate.id, id
                )));
            }
            if !keys.insert(prestate.formulas.key()) {
                return Err(TableauxErr::Corrupt(format!(
                    "duplicate prestate {}",
                    prestate.formulas
                )));
            }
        }
        keys.clear();
        for (id, state) in &self.states {
            if state.id != *id {
                return Err(TableauxErr::Corrupt(format!(
                    "state {} stored under id {}",
                    state.id, id
                )));
            }
            if !keys.insert(state.formulas.key()) {
                return Err(TableauxErr::Corrupt(format!(
                    "duplicate state {}",
                    state.formulas
                )));
            }
            if state.formulas.is_patently_inconsistent() {
                return Err(TableauxErr::Corrupt(format!(
                    "state {} is patently inconsistent",
                    id
                )));
            }
            if !state.formulas.is_fully_expanded() {
                return Err(TableauxErr::Corrupt(format!(
                    "state {} is not fully expanded",
                    id
                )));
            }
        }
        for edge in &self.dashed {
            if !self.prestates.contains_key(&edge.from) || !self.states.contains_key(&edge.to) {
                return Err(TableauxErr::Corrupt(format!(
                    "dashed edge {} ⤏ {} has a dangling endpoint",
                    edge.from, edge.to
                )));
            }
        }
        for edge in &self.solid {
            if !self.states.contains_key(&edge.from) || !self.prestates.contains_key(&edge.to) {
                return Err(TableauxErr::Corrupt(format!(
                    "solid edge {} has a dangling endpoint",
                    edge
                )));
            }
            if !edge.label.is_diamond() {
                return Err(TableauxErr::Corrupt(format!(
                    "solid edge {} is not labeled by a diamond",
                    edge
                )));
            }
        }
        Ok(())
    }
}

/// State-only graph: the initial tableau after prestate elimination, and the
/// final tableau after state elimination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tableau {
    #[serde(with = "node_seq")]
    pub states: BTreeMap<NodeId, State>,
    pub edges: Vec<SolidEdge>,
}

impl Tableau {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains_formula(&self, formula: &Formula) -> bool {
        self.states.values().any(|s| s.formulas.contains(formula))
    }

    /// Targets of the edges leaving `from` under the given diamond label.
    pub fn successors<'a>(
        &'a self,
        from: NodeId,
        label: &'a Formula,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from == from && &e.label == label)
            .map(|e| e.to)
    }

    /// Removes a state and prunes every edge touching it.
    pub(crate) fn remove_state(&mut self, id: NodeId) -> Option<State> {
        let state = self.states.remove(&id)?;
        self.edges.retain(|e| e.from != id && e.to != id);
        Some(state)
    }
}

/// Why a state was removed during state elimination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EliminationRule {
    /// A diamond of the state lost its last successor.
    #[serde(rename = "E1")]
    MissingSuccessor,
    /// An eventuality of the state cannot be realized on any path.
    #[serde(rename = "E2")]
    UnrealizedEventuality,
}

impl fmt::Display for EliminationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EliminationRule::MissingSuccessor => "E1",
            EliminationRule::UnrealizedEventuality => "E2",
        };
        write!(f, "{}", s)
    }
}

/// Diagnostic record of one removal: which state fell, to which rule, on
/// which formula, with a snapshot of the state's set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminationRecord {
    pub state_id: NodeId,
    pub rule: EliminationRule,
    pub formula: Formula,
    pub formulas: FormulaSet,
}

impl fmt::Display for EliminationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state {} removed ({}) on {}",
            self.state_id, self.rule, self.formula
        )
    }
}
