use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::logic::classify::Classification;
use crate::logic::{Coalition, Formula};
use crate::set::FormulaSet;

/// Options for formula-set saturation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionParams {
    pub cuts: bool,
    pub restricted_cuts: bool,
}

impl Default for ExpansionParams {
    fn default() -> Self {
        ExpansionParams {
            cuts: true,
            restricted_cuts: true,
        }
    }
}

/// Saturates Γ into the family of fully expanded, non-patently-inconsistent
/// sets. The family is empty iff every branch closes, in particular when Γ
/// itself is patently inconsistent.
pub fn expand(gamma: &FormulaSet, params: &ExpansionParams) -> Vec<FormulaSet> {
    Expander::new(gamma, params).run()
}

enum Step {
    /// α-components were added in place; keep working on the same set.
    Rewritten,
    /// The set was replaced by its descendants.
    Branched(Vec<FormulaSet>),
    /// New sibling sets were spawned; the original set stays live.
    Siblings(Vec<FormulaSet>),
    /// No rule applies; the set is fully expanded.
    Exhausted,
}

struct Expander<'p> {
    params: &'p ExpansionParams,
    /// Keys of the eventualities of the original Γ; rules scan these first.
    priority: Vec<String>,
    /// (set key, formula key) pairs the ¬C sibling rule has fired on.
    /// Memoized so each site fires at most once.
    sibling_sites: HashSet<(String, String)>,
    queue: VecDeque<FormulaSet>,
    enqueued: HashSet<String>,
    done: Vec<FormulaSet>,
    done_keys: HashSet<String>,
}

impl<'p> Expander<'p> {
    fn new(gamma: &FormulaSet, params: &'p ExpansionParams) -> Self {
        let priority = gamma
            .iter()
            .filter(|f| f.is_eventuality())
            .map(Formula::key)
            .collect();
        let mut queue = VecDeque::new();
        queue.push_back(gamma.clone());
        Expander {
            params,
            priority,
            sibling_sites: HashSet::new(),
            queue,
            enqueued: HashSet::new(),
            done: Vec::new(),
            done_keys: HashSet::new(),
        }
    }

    fn run(mut self) -> Vec<FormulaSet> {
        while let Some(mut delta) = self.queue.pop_front() {
            if delta.is_patently_inconsistent() {
                continue;
            }
            self.enqueued.insert(delta.key());
            match self.step(&mut delta) {
                Step::Rewritten => self.queue.push_front(delta),
                Step::Branched(children) => {
                    for child in children {
                        self.enqueue(child);
                    }
                }
                Step::Siblings(siblings) => {
                    for sibling in siblings {
                        self.enqueue(sibling);
                    }
                    self.queue.push_front(delta);
                }
                Step::Exhausted => {
                    if self.done_keys.insert(delta.key()) {
                        self.done.push(delta);
                    }
                }
            }
        }
        self.done
    }

    fn enqueue(&mut self, set: FormulaSet) {
        if self.enqueued.insert(set.key()) {
            self.queue.push_back(set);
        }
    }

    /// Applies the first applicable rule: α, then β, then the ¬C sibling
    /// rule, then cut.
    fn step(&mut self, delta: &mut FormulaSet) -> Step {
        let alpha = scan_order(delta, &self.priority).find_map(|f| match f.classify() {
            Classification::Alpha(comps) => {
                let missing: Vec<Formula> =
                    comps.into_iter().filter(|c| !delta.contains(c)).collect();
                if missing.is_empty() {
                    None
                } else {
                    Some(missing)
                }
            }
            _ => None,
        });
        if let Some(missing) = alpha {
            for comp in missing {
                delta.insert(comp);
            }
            return Step::Rewritten;
        }

        let beta = scan_order(delta, &self.priority).find_map(|f| match f.classify() {
            Classification::Beta(comps) if comps.iter().all(|c| !delta.contains(c)) => Some(comps),
            _ => None,
        });
        if let Some(comps) = beta {
            return Step::Branched(comps.into_iter().map(|c| delta.with(c)).collect());
        }

        // ¬C_A ψ whose witness ¬ψ was skipped in favor of another branch
        // still spawns the witness set as an extra sibling.
        let set_key = delta.key();
        let candidates: Vec<(String, Formula)> = scan_order(delta, &self.priority)
            .filter_map(|f| {
                let (_, sub) = f.eventuality_parts()?;
                let witness = sub.negated();
                if delta.contains(&witness) {
                    return None;
                }
                let comps = match f.classify() {
                    Classification::Beta(comps) => comps,
                    _ => return None,
                };
                if !comps.iter().skip(1).any(|c| delta.contains(c)) {
                    return None;
                }
                if self.sibling_sites.contains(&(set_key.clone(), f.key())) {
                    return None;
                }
                Some((f.key(), witness))
            })
            .collect();
        if !candidates.is_empty() {
            let mut siblings = Vec::with_capacity(candidates.len());
            for (formula_key, witness) in candidates {
                self.sibling_sites.insert((set_key.clone(), formula_key));
                siblings.push(delta.with(witness));
            }
            return Step::Siblings(siblings);
        }

        if self.params.cuts {
            let cut = scan_order(delta, &self.priority).find_map(|ambient| {
                let subs = ambient.subformulas();
                let found = subs.iter().find_map(|chi| {
                    if !matches!(chi, Formula::Dist(..) | Formula::Common(..)) {
                        return None;
                    }
                    if delta.contains(chi) || delta.contains(&chi.negated()) {
                        return None;
                    }
                    if self.params.restricted_cuts && !cut_enabled(delta, ambient, chi) {
                        return None;
                    }
                    Some(chi.clone())
                });
                found
            });
            if let Some(chi) = cut {
                let negated = chi.negated();
                return Step::Branched(vec![delta.with(chi), delta.with(negated)]);
            }
        }

        Step::Exhausted
    }
}

/// Members of Δ in rule-scan order: eventualities of the original Γ first,
/// then the rest, each group in insertion order.
fn scan_order<'s>(
    delta: &'s FormulaSet,
    priority: &'s [String],
) -> impl Iterator<Item = &'s Formula> {
    let first = delta.iter().filter(move |f| priority.contains(&f.key()));
    let rest = delta.iter().filter(move |f| !priority.contains(&f.key()));
    first.chain(rest)
}

enum AmbientShape<'a> {
    /// `D_B δ` or `¬D_B δ` — both share the same side-condition.
    Dist(&'a Coalition),
    /// `¬C_B δ`.
    NegCommon(&'a Coalition),
    Other,
}

fn ambient_shape(formula: &Formula) -> AmbientShape<'_> {
    match formula {
        Formula::Dist(b, _) => AmbientShape::Dist(b),
        Formula::Not(inner) => match &**inner {
            Formula::Dist(b, _) => AmbientShape::Dist(b),
            Formula::Common(b, _) => AmbientShape::NegCommon(b),
            _ => AmbientShape::Other,
        },
        _ => AmbientShape::Other,
    }
}

/// Coalition side-conditions for restricted cuts. χ is the cut candidate,
/// `ambient` the member of Δ it occurs in; enabling always requires a
/// diamond `¬D_E ε` in Δ whose coalition covers the right parts.
fn cut_enabled(delta: &FormulaSet, ambient: &Formula, chi: &Formula) -> bool {
    let diamonds = || delta.iter().filter_map(|f| f.diamond_parts().map(|(e, _)| e));
    match (chi, ambient_shape(ambient)) {
        (Formula::Dist(a, _), AmbientShape::Dist(b)) => {
            diamonds().any(|e| a.is_subset_of(e) && b.is_subset_of(e))
        }
        (Formula::Dist(a, _), AmbientShape::NegCommon(b)) => {
            diamonds().any(|e| a.is_subset_of(e) && b.intersects(e))
        }
        (Formula::Common(a, _), AmbientShape::Dist(b)) => {
            diamonds().any(|e| b.is_subset_of(e) && a.intersects(e))
        }
        (Formula::Common(a, _), AmbientShape::NegCommon(b)) => {
            diamonds().any(|e| a.intersects(e) && b.intersects(e))
        }
        _ => false,
    }
}
