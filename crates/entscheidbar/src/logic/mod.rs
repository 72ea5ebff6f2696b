pub mod classify;
pub mod closure;
pub mod coalition;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use coalition::{Agent, Coalition};

/// Formula of multiagent epistemic logic. `Dist` is distributed knowledge
/// `D_A` (the pooled knowledge of coalition A entails the body), `Common`
/// is common knowledge `C_A`. Disjunction, implication and single-agent
/// knowledge are definable; the constructors below desugar them, so only
/// these five shapes are ever stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Formula {
    Atom(String),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Dist(Coalition, Box<Formula>),
    Common(Coalition, Box<Formula>),
}

impl Formula {
    pub fn atom<S: Into<String>>(name: S) -> Self {
        Formula::Atom(name.into())
    }

    pub fn not(self) -> Self {
        Formula::Not(Box::new(self))
    }

    pub fn and(self, right: Self) -> Self {
        Formula::And(Box::new(self), Box::new(right))
    }

    /// `φ ∨ ψ ≡ ¬(¬φ ∧ ¬ψ)`
    pub fn or(self, right: Self) -> Self {
        self.not().and(right.not()).not()
    }

    /// `φ → ψ ≡ ¬(φ ∧ ¬ψ)`
    pub fn implies(self, right: Self) -> Self {
        self.and(right.not()).not()
    }

    pub fn dist(coalition: Coalition, sub: Self) -> Self {
        Formula::Dist(coalition, Box::new(sub))
    }

    pub fn common(coalition: Coalition, sub: Self) -> Self {
        Formula::Common(coalition, Box::new(sub))
    }

    /// `K_a φ ≡ D_{a} φ`
    pub fn knows(agent: Agent, sub: Self) -> Self {
        Formula::Dist(Coalition::solo(agent), Box::new(sub))
    }

    /// `¬φ` over a borrowed formula. Double negations are kept as written;
    /// they decompose as α-formulas.
    pub fn negated(&self) -> Self {
        Formula::Not(Box::new(self.clone()))
    }

    /// Canonical key: the display rendering. It is fully parenthesized and
    /// coalitions are canonically ordered, so keys agree exactly with
    /// structural equality as long as atom names stay identifier-like
    /// (no connective characters), which the surface syntax guarantees.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Atom(name) => write!(f, "{}", name),
            Formula::Not(sub) => write!(f, "¬{}", sub),
            Formula::And(l, r) => write!(f, "({} ∧ {})", l, r),
            Formula::Dist(coalition, sub) => write!(f, "D{{{}}}{}", coalition, sub),
            Formula::Common(coalition, sub) => write!(f, "C{{{}}}{}", coalition, sub),
        }
    }
}
