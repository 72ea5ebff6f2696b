use super::{Coalition, Formula};
use crate::set::FormulaSet;

impl Formula {
    /// `¬D_A ψ`: demands a successor in the model.
    pub fn is_diamond(&self) -> bool {
        self.diamond_parts().is_some()
    }

    /// `D_A ψ`.
    pub fn is_box(&self) -> bool {
        self.box_parts().is_some()
    }

    /// `¬C_A ψ`: demands a finite witness path in the model.
    pub fn is_eventuality(&self) -> bool {
        self.eventuality_parts().is_some()
    }

    pub fn diamond_parts(&self) -> Option<(&Coalition, &Formula)> {
        match self {
            Formula::Not(inner) => match &**inner {
                Formula::Dist(coalition, sub) => Some((coalition, sub)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn box_parts(&self) -> Option<(&Coalition, &Formula)> {
        match self {
            Formula::Dist(coalition, sub) => Some((coalition, sub)),
            _ => None,
        }
    }

    pub fn eventuality_parts(&self) -> Option<(&Coalition, &Formula)> {
        match self {
            Formula::Not(inner) => match &**inner {
                Formula::Common(coalition, sub) => Some((coalition, sub)),
                _ => None,
            },
            _ => None,
        }
    }

    /// All nodes of the formula tree, pre-order, the formula itself included.
    pub fn subformulas(&self) -> FormulaSet {
        let mut out = FormulaSet::new();
        collect_subformulas(self, &mut out);
        out
    }

    /// Least set containing the formula, closed under α- and β-components
    /// and under `¬D_A ψ ⇒ ¬ψ`.
    pub fn closure(&self) -> FormulaSet {
        let mut out = FormulaSet::new();
        let mut queue = vec![self.clone()];
        while let Some(next) = queue.pop() {
            if !out.insert(next.clone()) {
                continue;
            }
            for comp in next.classify().components() {
                queue.push(comp.clone());
            }
            if let Some((_, sub)) = next.diamond_parts() {
                queue.push(sub.negated());
            }
        }
        out
    }

    /// `{ψ, ¬ψ}` for every ψ in the closure: the universe the analytic cut
    /// rule draws from.
    pub fn extended_closure(&self) -> FormulaSet {
        let mut out = FormulaSet::new();
        for sub in self.closure().iter() {
            out.insert(sub.clone());
            out.insert(sub.negated());
        }
        out
    }
}

fn collect_subformulas(formula: &Formula, out: &mut FormulaSet) {
    out.insert(formula.clone());
    match formula {
        Formula::Atom(_) => {}
        Formula::Not(sub) | Formula::Dist(_, sub) | Formula::Common(_, sub) => {
            collect_subformulas(sub, out)
        }
        Formula::And(l, r) => {
            collect_subformulas(l, out);
            collect_subformulas(r, out);
        }
    }
}
