use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::expansion::{expand, ExpansionParams};
use super::graph::{
    DashedEdge, EliminationRecord, EliminationRule, NodeId, Prestate, Pretableau, SolidEdge, State,
    Tableau,
};
use super::{Params, Stage, TableauxErr, TableauxResult};
use crate::logic::Formula;
use crate::set::FormulaSet;

/// Everything one `decide` run produces: the verdict, the graphs of all
/// three phases, and the removal trace. The graphs are plain owned values;
/// nothing mutates them after the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableauResult {
    pub formula: Formula,
    pub satisfiable: bool,
    pub pretableau: Pretableau,
    pub initial_tableau: Tableau,
    pub final_tableau: Tableau,
    pub elimination_trace: Vec<EliminationRecord>,
}

impl TableauResult {
    pub fn verdict_msg(&self) -> String {
        if self.satisfiable {
            format!(
                "{} is satisfiable: {} of {} states survive elimination",
                self.formula,
                self.final_tableau.state_count(),
                self.initial_tableau.state_count()
            )
        } else {
            format!(
                "{} is unsatisfiable: no surviving state contains it ({} eliminations)",
                self.formula,
                self.elimination_trace.len()
            )
        }
    }
}

/// Decides satisfiability of `theta` with the three-phase tableau procedure.
pub fn decide(theta: &Formula, params: &Params) -> TableauxResult<TableauResult> {
    decide_with_observer(theta, params, |_| {})
}

/// As `decide`, reporting each pipeline stage to `on_progress` as it begins.
pub fn decide_with_observer(
    theta: &Formula,
    params: &Params,
    mut on_progress: impl FnMut(Stage),
) -> TableauxResult<TableauResult> {
    on_progress(Stage::Construction);
    let pretableau = Construction::new(params).run(theta.clone())?;
    debug_assert_eq!(pretableau.verify(), Ok(()));

    on_progress(Stage::PrestateElimination);
    let initial_tableau = eliminate_prestates(&pretableau);

    on_progress(Stage::StateElimination);
    let mut trace = Vec::new();
    let final_tableau = eliminate_states(&initial_tableau, &mut trace);

    on_progress(Stage::Verdict);
    let satisfiable = final_tableau.contains_formula(theta);
    Ok(TableauResult {
        formula: theta.clone(),
        satisfiable,
        pretableau,
        initial_tableau,
        final_tableau,
        elimination_trace: trace,
    })
}

/// Phase 1 driver: builds the pretableau from the seed prestate {θ}. Rule SR
/// expands a prestate into states, rule DR spawns the successor prestate a
/// state's diamond demands. Nodes are reused through per-kind set-key
/// indices, which bounds the graph and lets it close cycles.
struct Construction<'p> {
    params: &'p Params,
    expansion: ExpansionParams,
    next_id: usize,
    pretableau: Pretableau,
    prestate_index: HashMap<String, NodeId>,
    state_index: HashMap<String, NodeId>,
    sr_queue: VecDeque<NodeId>,
    dr_queue: VecDeque<(NodeId, Formula)>,
    dr_done: HashSet<(NodeId, String)>,
}

impl<'p> Construction<'p> {
    fn new(params: &'p Params) -> Self {
        Construction {
            params,
            expansion: ExpansionParams {
                cuts: true,
                restricted_cuts: params.restricted_cuts,
            },
            next_id: 0,
            pretableau: Pretableau::default(),
            prestate_index: HashMap::new(),
            state_index: HashMap::new(),
            sr_queue: VecDeque::new(),
            dr_queue: VecDeque::new(),
            dr_done: HashSet::new(),
        }
    }

    fn run(mut self, theta: Formula) -> TableauxResult<Pretableau> {
        self.intern_prestate(FormulaSet::singleton(theta))?;
        loop {
            if let Some(prestate_id) = self.sr_queue.pop_front() {
                self.apply_sr(prestate_id)?;
            } else if let Some((state_id, diamond)) = self.dr_queue.pop_front() {
                self.apply_dr(state_id, diamond)?;
            } else {
                break;
            }
        }
        Ok(self.pretableau)
    }

    fn mint_id(&mut self) -> TableauxResult<NodeId> {
        if let Some(limit) = self.params.node_limit {
            if self.next_id >= limit {
                return Err(TableauxErr::NodeLimit(limit));
            }
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Ok(id)
    }

    /// Reuses the prestate with this set key or mints a new one; new
    /// prestates are enqueued for SR.
    fn intern_prestate(&mut self, formulas: FormulaSet) -> TableauxResult<NodeId> {
        let key = formulas.key();
        if let Some(id) = self.prestate_index.get(&key) {
            return Ok(*id);
        }
        let id = self.mint_id()?;
        self.prestate_index.insert(key, id);
        self.pretableau.prestates.insert(id, Prestate { id, formulas });
        self.sr_queue.push_back(id);
        Ok(id)
    }

    /// Reuses the state with this set key or mints a new one; new states get
    /// their diamonds enqueued for DR.
    fn intern_state(&mut self, formulas: FormulaSet) -> TableauxResult<NodeId> {
        let key = formulas.key();
        if let Some(id) = self.state_index.get(&key) {
            return Ok(*id);
        }
        let id = self.mint_id()?;
        for diamond in formulas.iter().filter(|f| f.is_diamond()) {
            self.dr_queue.push_back((id, diamond.clone()));
        }
        self.state_index.insert(key, id);
        self.pretableau.states.insert(id, State { id, formulas });
        Ok(id)
    }

    fn apply_sr(&mut self, prestate_id: NodeId) -> TableauxResult<()> {
        let gamma = self.pretableau.prestates[&prestate_id].formulas.clone();
        for delta in expand(&gamma, &self.expansion) {
            let state_id = self.intern_state(delta)?;
            self.pretableau.dashed.push(DashedEdge {
                from: prestate_id,
                to: state_id,
            });
        }
        Ok(())
    }

    /// For χ = ¬D_A φ in Δ, the successor prestate collects ¬φ together with
    /// every member of Δ that survives the transition: boxes over
    /// subcoalitions of A, other diamonds over subcoalitions of A, and
    /// eventualities whose coalition meets A.
    fn apply_dr(&mut self, state_id: NodeId, diamond: Formula) -> TableauxResult<()> {
        if !self.dr_done.insert((state_id, diamond.key())) {
            return Ok(());
        }
        let delta = self.pretableau.states[&state_id].formulas.clone();
        let gamma = {
            let (coalition, sub) = match diamond.diamond_parts() {
                Some(parts) => parts,
                None => {
                    return Err(TableauxErr::Corrupt(format!(
                        "DR scheduled on non-diamond {}",
                        diamond
                    )))
                }
            };
            let mut gamma = FormulaSet::singleton(sub.negated());
            for member in delta.iter() {
                if let Some((c, _)) = member.box_parts() {
                    if c.is_subset_of(coalition) {
                        gamma.insert(member.clone());
                    }
                }
            }
            for member in delta.iter() {
                if let Some((c, _)) = member.diamond_parts() {
                    if c.is_subset_of(coalition) && member != &diamond {
                        gamma.insert(member.clone());
                    }
                }
            }
            for member in delta.iter() {
                if let Some((c, _)) = member.eventuality_parts() {
                    if c.intersects(coalition) {
                        gamma.insert(member.clone());
                    }
                }
            }
            gamma
        };
        let target = self.intern_prestate(gamma)?;
        self.pretableau.solid.push(SolidEdge {
            from: state_id,
            to: target,
            label: diamond,
        });
        Ok(())
    }
}

/// Phase 2, rule PR: project every solid edge through the dashed edges of
/// its target prestate, yielding the state-only initial tableau. A prestate
/// whose expansion was empty contributes no edges.
fn eliminate_prestates(pretableau: &Pretableau) -> Tableau {
    let mut edges = Vec::new();
    for solid in &pretableau.solid {
        for dashed in pretableau.dashed.iter().filter(|d| d.from == solid.to) {
            edges.push(SolidEdge {
                from: solid.from,
                to: dashed.to,
                label: solid.label.clone(),
            });
        }
    }
    Tableau {
        states: pretableau.states.clone(),
        edges,
    }
}

/// Phase 3: successor-less states and states with unrealizable eventualities
/// are removed in dovetailed passes until nothing changes.
fn eliminate_states(initial: &Tableau, trace: &mut Vec<EliminationRecord>) -> Tableau {
    let mut tableau = initial.clone();

    let eventualities: Vec<Formula> = {
        let mut by_key: BTreeMap<String, Formula> = BTreeMap::new();
        for state in tableau.states.values() {
            for f in state.formulas.iter().filter(|f| f.is_eventuality()) {
                by_key.entry(f.key()).or_insert_with(|| f.clone());
            }
        }
        by_key.into_values().collect()
    };

    loop {
        let removed_before = trace.len();
        remove_successorless(&mut tableau, trace);
        for eventuality in &eventualities {
            remove_unrealized(&mut tableau, eventuality, trace);
            remove_successorless(&mut tableau, trace);
        }
        if trace.len() == removed_before {
            break;
        }
    }
    tableau
}

/// A state one of whose diamonds has no surviving successor edge is removed;
/// repeated to fixpoint.
fn remove_successorless(tableau: &mut Tableau, trace: &mut Vec<EliminationRecord>) {
    loop {
        let victim = tableau.states.values().find_map(|state| {
            state
                .formulas
                .iter()
                .find(|&f| f.is_diamond() && tableau.successors(state.id, f).next().is_none())
                .map(|f| (state.id, f.clone()))
        });
        match victim {
            Some((id, diamond)) => record_removal(
                tableau,
                id,
                EliminationRule::MissingSuccessor,
                diamond,
                trace,
            ),
            None => break,
        }
    }
}

/// Eventuality realization by least-fixpoint marking. A state containing
/// ζ = ¬C_A φ survives only if the witness ¬φ is reachable from it along
/// edges whose label coalition meets A.
fn remove_unrealized(
    tableau: &mut Tableau,
    eventuality: &Formula,
    trace: &mut Vec<EliminationRecord>,
) {
    let (coalition, sub) = match eventuality.eventuality_parts() {
        Some(parts) => parts,
        None => return,
    };
    let witness = sub.negated();

    let mut marked: BTreeSet<NodeId> = tableau
        .states
        .values()
        .filter(|s| s.formulas.contains(&witness))
        .map(|s| s.id)
        .collect();

    loop {
        let mut changed = false;
        for state in tableau.states.values() {
            if marked.contains(&state.id) || !state.formulas.contains(eventuality) {
                continue;
            }
            let reaches = tableau.edges.iter().any(|e| {
                e.from == state.id
                    && marked.contains(&e.to)
                    && e.label
                        .diamond_parts()
                        .map_or(false, |(b, _)| b.intersects(coalition))
            });
            if reaches {
                marked.insert(state.id);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let victims: Vec<NodeId> = tableau
        .states
        .values()
        .filter(|s| s.formulas.contains(eventuality) && !marked.contains(&s.id))
        .map(|s| s.id)
        .collect();
    for id in victims {
        record_removal(
            tableau,
            id,
            EliminationRule::UnrealizedEventuality,
            eventuality.clone(),
            trace,
        );
    }
}

fn record_removal(
    tableau: &mut Tableau,
    id: NodeId,
    rule: EliminationRule,
    formula: Formula,
    trace: &mut Vec<EliminationRecord>,
) {
    if let Some(state) = tableau.remove_state(id) {
        trace.push(EliminationRecord {
            state_id: id,
            rule,
            formula,
            formulas: state.formulas,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{Agent, Coalition};

    fn coal(names: &[&str]) -> Coalition {
        Coalition::new(names.iter().map(|n| Agent::new(*n)))
    }

    fn atom(name: &str) -> Formula {
        Formula::atom(name)
    }

    fn knows(agent: &str, sub: Formula) -> Formula {
        Formula::knows(Agent::new(agent), sub)
    }

    fn decide_restricted(f: &Formula) -> TableauResult {
        decide(f, &Params::default()).unwrap()
    }

    fn decide_unrestricted(f: &Formula) -> TableauResult {
        decide(
            f,
            &Params {
                restricted_cuts: false,
                node_limit: None,
            },
        )
        .unwrap()
    }

    mod scenarios {
        use super::*;

        #[test]
        fn atom_is_satisfiable() {
            let p = atom("p");
            let result = decide_restricted(&p);
            assert!(result.satisfiable);
            assert!(!result.final_tableau.is_empty());
            assert!(result.final_tableau.contains_formula(&p));
        }

        #[test]
        fn propositional_contradiction() {
            let result = decide_restricted(&atom("p").and(atom("p").not()));
            assert!(!result.satisfiable);
            assert_eq!(result.final_tableau.state_count(), 0);
        }

        #[test]
        fn knowledge_contradiction_under_both_cut_modes() {
            let f = knows("a", atom("p")).and(knows("a", atom("p")).not());
            assert!(!decide_restricted(&f).satisfiable);
            assert!(!decide_unrestricted(&f).satisfiable);
        }

        #[test]
        fn knowledge_is_veridical() {
            // K_a p ∧ ¬p closes because D_{a} is reflexive
            let f = knows("a", atom("p")).and(atom("p").not());
            assert!(!decide_restricted(&f).satisfiable);
        }

        #[test]
        fn common_knowledge_implies_individual_knowledge() {
            let f = Formula::common(coal(&["a", "b"]), atom("p"))
                .and(knows("a", atom("p")).not());
            assert!(!decide_restricted(&f).satisfiable);
        }

        #[test]
        fn agents_may_differ_in_knowledge() {
            let f = knows("a", atom("p")).and(knows("b", atom("p")).not());
            let result = decide_restricted(&f);
            assert!(result.satisfiable);
            assert!(result.final_tableau.contains_formula(&f));
        }

        #[test]
        fn unrealizable_group_eventuality() {
            // ¬D{a,c}C{a,b}p ∧ C{a,b}(p ∧ q): every state carries p, so the
            // eventuality ¬C{a,b}p can never reach its witness ¬p.
            let f = Formula::dist(
                coal(&["a", "c"]),
                Formula::common(coal(&["a", "b"]), atom("p")),
            )
            .not()
            .and(Formula::common(coal(&["a", "b"]), atom("p").and(atom("q"))));

            let result = decide_restricted(&f);
            assert!(!result.satisfiable);
            assert!(result.pretableau.state_count() > 0);
            assert!(result.final_tableau.is_empty());
            assert!(result
                .elimination_trace
                .iter()
                .any(|r| r.rule == EliminationRule::UnrealizedEventuality));
        }

        #[test]
        fn closure_needs_the_cut_rule() {
            // ¬D{a,b}p ∧ ¬D{a,c}¬K_a p is unsatisfiable, but only the
            // analytic cut on D{a}p exposes the contradiction.
            let f = Formula::dist(coal(&["a", "b"]), atom("p"))
                .not()
                .and(Formula::dist(coal(&["a", "c"]), knows("a", atom("p")).not()).not());

            assert!(!decide_restricted(&f).satisfiable);
            assert!(!decide_unrestricted(&f).satisfiable);
        }

        #[test]
        fn cut_restriction_is_an_economy_not_a_semantics() {
            // C{a,b}K_a p → ¬C{b,c}K_b p: same verdict under both modes,
            // strictly fewer pretableau states under the side-conditions.
            let f = Formula::common(coal(&["a", "b"]), knows("a", atom("p")))
                .implies(Formula::common(coal(&["b", "c"]), knows("b", atom("p"))).not());

            let restricted = decide_restricted(&f);
            let unrestricted = decide_unrestricted(&f);
            assert_eq!(restricted.satisfiable, unrestricted.satisfiable);
            assert!(
                restricted.pretableau.state_count() < unrestricted.pretableau.state_count()
            );
        }

        #[test]
        fn validity_round_trips_through_negation() {
            // C{a,b}p → K_a p is valid: it is satisfiable and its negation
            // is not.
            let valid = Formula::common(coal(&["a", "b"]), atom("p"))
                .implies(knows("a", atom("p")));
            assert!(decide_restricted(&valid).satisfiable);
            assert!(!decide_restricted(&valid.negated()).satisfiable);
        }

        #[test]
        fn realizable_eventuality_survives_through_a_cycle() {
            // ¬C{a,b}p on its own is satisfiable. Every diamond branch loops
            // back to the seed prestate, so realization rides the marking
            // propagation: the ¬p witness state marks its predecessors.
            let f = Formula::common(coal(&["a", "b"]), atom("p")).not();
            let result = decide_restricted(&f);

            assert!(result.satisfiable);
            // all diamonds lead back to the single seed prestate {¬C{a,b}p}
            assert_eq!(result.pretableau.prestate_count(), 1);
            assert_eq!(result.pretableau.state_count(), 5);
            // nothing was eliminated: the witness is reachable everywhere
            assert!(result.elimination_trace.is_empty());
            assert_eq!(
                result.final_tableau.state_count(),
                result.initial_tableau.state_count()
            );
        }
    }

    mod construction {
        use super::*;

        #[test]
        fn successor_prestates_keep_only_transferable_formulas() {
            // Δ = {K_a p ∧ ¬K_b p, D{a}p, ¬D{b}p, p}: the ¬D{b}p transition
            // carries ¬p alone, since D{a}p is not a box over a subcoalition
            // of {b}.
            let f = knows("a", atom("p")).and(knows("b", atom("p")).not());
            let result = decide_restricted(&f);

            assert_eq!(result.pretableau.prestate_count(), 2);
            assert_eq!(result.pretableau.state_count(), 2);
            assert_eq!(result.pretableau.solid.len(), 1);

            let edge = &result.pretableau.solid[0];
            assert_eq!(edge.label, knows("b", atom("p")).not());
            let target = &result.pretableau.prestates[&edge.to];
            assert_eq!(target.formulas, FormulaSet::singleton(atom("p").negated()));
        }

        #[test]
        fn ids_are_minted_in_visit_order() {
            let f = knows("a", atom("p")).and(knows("b", atom("p")).not());
            let result = decide_restricted(&f);

            let mut ids: Vec<NodeId> = result
                .pretableau
                .prestates
                .keys()
                .chain(result.pretableau.states.keys())
                .copied()
                .collect();
            ids.sort();
            let expected: Vec<NodeId> = (0..ids.len()).map(NodeId).collect();
            assert_eq!(ids, expected);
            // the seed prestate is node 0 and holds exactly {θ}
            assert_eq!(
                result.pretableau.prestates[&NodeId(0)].formulas,
                FormulaSet::singleton(f)
            );
        }

        #[test]
        fn runs_are_reproducible() {
            let f = Formula::common(coal(&["a", "b"]), atom("p"))
                .implies(knows("a", atom("p")));
            let first = decide_restricted(&f);
            let second = decide_restricted(&f);
            assert_eq!(first, second);
        }
    }

    mod pipeline {
        use super::*;

        #[test]
        fn observer_sees_the_stages_in_order() {
            let mut stages = Vec::new();
            decide_with_observer(&atom("p"), &Params::default(), |s| stages.push(s)).unwrap();
            assert_eq!(
                stages,
                vec![
                    Stage::Construction,
                    Stage::PrestateElimination,
                    Stage::StateElimination,
                    Stage::Verdict
                ]
            );
            let tags: Vec<String> = stages.iter().map(ToString::to_string).collect();
            assert_eq!(
                tags,
                vec!["construction", "prestate-elim", "state-elim", "verdict"]
            );
        }

        #[test]
        fn initial_tableau_keeps_all_states_and_diamond_labels() {
            let f = knows("a", atom("p")).and(knows("b", atom("p")).not());
            let result = decide_restricted(&f);
            assert_eq!(
                result.initial_tableau.state_count(),
                result.pretableau.state_count()
            );
            assert!(result
                .initial_tableau
                .edges
                .iter()
                .all(|e| e.label.is_diamond()));
        }

        #[test]
        fn elimination_trace_records_failing_formulas() {
            // ¬D{a,b}p ∧ ¬D{a,c}¬K_a p builds states first and only then
            // closes through missing successors, so removals are recorded.
            let f = Formula::dist(coal(&["a", "b"]), atom("p"))
                .not()
                .and(Formula::dist(coal(&["a", "c"]), knows("a", atom("p")).not()).not());
            let result = decide_restricted(&f);
            assert!(!result.satisfiable);
            assert!(!result.elimination_trace.is_empty());

            for record in &result.elimination_trace {
                match record.rule {
                    EliminationRule::MissingSuccessor => assert!(record.formula.is_diamond()),
                    EliminationRule::UnrealizedEventuality => {
                        assert!(record.formula.is_eventuality())
                    }
                }
                assert!(!result.final_tableau.states.contains_key(&record.state_id));
            }
        }

        #[test]
        fn node_limit_aborts_construction() {
            let f = knows("a", atom("p")).and(knows("b", atom("p")).not());
            let err = decide(
                &f,
                &Params {
                    restricted_cuts: true,
                    node_limit: Some(1),
                },
            )
            .unwrap_err();
            assert_eq!(err, TableauxErr::NodeLimit(1));
        }

        #[test]
        fn verdict_messages_read_naturally() {
            let sat = decide_restricted(&atom("p"));
            assert!(sat.verdict_msg().contains("satisfiable"));

            let unsat = decide_restricted(&atom("p").and(atom("p").not()));
            assert!(unsat.verdict_msg().contains("unsatisfiable"));
        }

        #[test]
        fn results_serialize_and_round_trip() {
            let result = decide_restricted(&knows("a", atom("p")));
            let json = serde_json::to_string(&result).unwrap();
            let back: TableauResult = serde_json::from_str(&json).unwrap();
            assert_eq!(back, result);
        }
    }
}
