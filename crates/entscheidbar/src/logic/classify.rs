use serde::{Deserialize, Serialize};

use super::{Coalition, Formula};

/// How a formula decomposes. The truth of an α-formula entails all of its
/// components, the truth of a β-formula at least one of them. Elementary
/// formulas (atoms, negated atoms, diamonds) do not decompose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    Elementary,
    Alpha(Vec<Formula>),
    Beta(Vec<Formula>),
}

impl Classification {
    pub fn is_elementary(&self) -> bool {
        matches!(self, Classification::Elementary)
    }

    pub fn is_alpha(&self) -> bool {
        matches!(self, Classification::Alpha(_))
    }

    pub fn is_beta(&self) -> bool {
        matches!(self, Classification::Beta(_))
    }

    pub fn components(&self) -> &[Formula] {
        match self {
            Classification::Elementary => &[],
            Classification::Alpha(comps) | Classification::Beta(comps) => comps,
        }
    }
}

impl Formula {
    /// α/β/elementary classification, components in deterministic order.
    ///
    /// `D_A φ` is reflexive, so it is an α-formula with itself and φ as
    /// components. `C_A φ` unfolds to `φ ∧ ⋀_{a∈A} D_a C_A φ`; its negation
    /// dualizes into the matching β-formula. The per-agent components come
    /// in canonical coalition order.
    pub fn classify(&self) -> Classification {
        match self {
            Formula::Atom(_) => Classification::Elementary,
            Formula::And(l, r) => Classification::Alpha(vec![(**l).clone(), (**r).clone()]),
            Formula::Dist(_, sub) => Classification::Alpha(vec![self.clone(), (**sub).clone()]),
            Formula::Common(coalition, sub) => {
                let mut comps = vec![(**sub).clone()];
                comps.extend(unfolding(coalition, self, false));
                Classification::Alpha(comps)
            }
            Formula::Not(inner) => match &**inner {
                Formula::Atom(_) => Classification::Elementary,
                Formula::Not(sub) => Classification::Alpha(vec![(**sub).clone()]),
                Formula::And(l, r) => Classification::Beta(vec![l.negated(), r.negated()]),
                Formula::Dist(_, _) => Classification::Elementary,
                Formula::Common(coalition, sub) => {
                    let mut comps = vec![sub.negated()];
                    comps.extend(unfolding(coalition, inner, true));
                    Classification::Beta(comps)
                }
            },
        }
    }
}

/// `D_a common` per agent of the coalition in canonical order, each negated
/// for the β case.
fn unfolding(coalition: &Coalition, common: &Formula, negate: bool) -> Vec<Formula> {
    coalition
        .iter()
        .map(|agent| {
            let step = Formula::Dist(Coalition::solo(agent.clone()), Box::new(common.clone()));
            if negate {
                step.negated()
            } else {
                step
            }
        })
        .collect()
}
