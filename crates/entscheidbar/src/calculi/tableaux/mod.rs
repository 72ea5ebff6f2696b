use std::fmt;

use serde::{Deserialize, Serialize};

pub mod epistemic;
pub mod expansion;
pub mod graph;

pub use epistemic::{decide, decide_with_observer, TableauResult};
pub use expansion::{expand, ExpansionParams};
pub use graph::{EliminationRecord, EliminationRule, NodeId, Pretableau, Tableau};

pub type TableauxResult<T> = Result<T, TableauxErr>;

/// Failures the engine can surface. Unsatisfiability is a result, not an
/// error; these cover the optional node cap and detected graph corruption
/// only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableauxErr {
    NodeLimit(usize),
    Corrupt(String),
}

impl fmt::Display for TableauxErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableauxErr::NodeLimit(limit) => write!(
                f,
                "Construction exceeded the configured limit of {} nodes",
                limit
            ),
            TableauxErr::Corrupt(msg) => write!(f, "Tableau graph is corrupt: {}", msg),
        }
    }
}

/// Pipeline stages, reported to the progress observer as each begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "construction")]
    Construction,
    #[serde(rename = "prestate-elim")]
    PrestateElimination,
    #[serde(rename = "state-elim")]
    StateElimination,
    #[serde(rename = "verdict")]
    Verdict,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Construction => "construction",
            Stage::PrestateElimination => "prestate-elim",
            Stage::StateElimination => "state-elim",
            Stage::Verdict => "verdict",
        };
        write!(f, "{}", s)
    }
}

/// Options for the full decision pipeline. Cuts are always on during
/// construction; `restricted_cuts` limits them by the coalition
/// side-conditions. `node_limit` is the defensive cap, off by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    pub restricted_cuts: bool,
    pub node_limit: Option<usize>,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            restricted_cuts: true,
            node_limit: None,
        }
    }
}
