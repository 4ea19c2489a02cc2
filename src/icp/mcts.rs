/*!
The Monte-Carlo tree search engine.

The tree's nodes own boxes; a node's children are the two halves of its box under the brancher's bisection, pruned on creation.
One iteration is the usual four phases:

- *Selection*: descend from the root by UCT (`w/v + c·√(ln V / v)`, c = √2), preferring unvisited children and never entering a decided subtree.
- *Expansion*: a selected leaf bisects its box and bears two children.
- *Simulation*: from a fresh child, a bounded random descent --- bisect, keep a random half, prune with the *heuristic* contractor, re-evaluate --- yields a reward in [0, 1].
- *Backpropagation*: visits and wins accumulate along the selection path, and decided flags flow upward: a node is unsat when all its children are, and δ-sat (with a witness box) when any child is.

The heuristic contractor is a [strict subset](crate::contractor::Contractor::heuristic_subset) of the full contractor, omitting the quantified and linear-relaxation children: simulation stays sound while paying less per step.

# Ownership

A parent owns its children exclusively; the tree is dropped in post-order with the root.
Backpropagation never follows a pointer upward --- the selection path is recorded on the way down and replayed on the way up, and each node keeps only its stable index for identification.
*/

use std::cell::Cell;

use rand::Rng;

use crate::contractor::status::ContractorStatus;
use crate::contractor::{Contractor, DynamicBitset};
use crate::context::Counters;
use crate::evaluator::{Evaluation, FormulaEvaluator};
use crate::interval::boxes::IntervalBox;
use crate::misc::interrupt;
use crate::misc::log::targets;
use crate::types::err::ErrorKind;

use super::brancher::{self, BranchStrategy};
use super::seq::IcpSeq;

/// The UCT exploration constant.
const EXPLORATION: f64 = std::f64::consts::SQRT_2;

/// Bisection steps a single simulation may take.
const SIMULATION_STEPS: usize = 32;

/// A search-tree node owning its box and its children.
pub struct MctsNode {
    node_box: IntervalBox,

    /// A δ-sat box found at or below this node.
    delta_sat_box: Option<IntervalBox>,

    children: Vec<MctsNode>,

    visits: f64,
    wins: f64,

    /// The UCT value as last computed, dropped whenever visits change.
    cached_uct: Cell<Option<f64>>,

    unsat: bool,
    delta_sat: bool,
    terminal: bool,

    /// The active dimensions as last evaluated.
    active: Option<DynamicBitset>,

    /// A stable identifier, assigned in creation order.
    index: usize,
}

impl MctsNode {
    fn new(node_box: IntervalBox, index: usize) -> Self {
        MctsNode {
            node_box,
            delta_sat_box: None,
            children: Vec::new(),
            visits: 0.0,
            wins: 0.0,
            cached_uct: Cell::new(None),
            unsat: false,
            delta_sat: false,
            terminal: false,
            active: None,
            index,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn visits(&self) -> f64 {
        self.visits
    }

    fn uct(&self, parent_visits: f64, exploration: f64) -> f64 {
        if self.visits == 0.0 {
            return f64::INFINITY;
        }
        if let Some(value) = self.cached_uct.get() {
            return value;
        }
        let value = self.wins / self.visits
            + exploration * (parent_visits.max(1.0).ln() / self.visits).sqrt();
        self.cached_uct.set(Some(value));
        value
    }

    /// Re-derives decided flags from the children, lifting a witness upward.
    fn refresh_from_children(&mut self) {
        if self.children.is_empty() {
            return;
        }
        if self.children.iter().all(|c| c.terminal && c.unsat) {
            self.unsat = true;
            self.terminal = true;
        }
        if let Some(decided) = self.children.iter().find(|c| c.delta_sat) {
            self.delta_sat = true;
            self.terminal = true;
            if self.delta_sat_box.is_none() {
                self.delta_sat_box = decided.delta_sat_box.clone();
            }
        }
    }
}

/// Follows a path of child positions from the root.
fn node_at_mut<'t>(root: &'t mut MctsNode, path: &[usize]) -> &'t mut MctsNode {
    let mut node = root;
    for &i in path {
        node = &mut node.children[i];
    }
    node
}

/// The Monte-Carlo engine: precision, branching, and an iteration budget.
pub struct IcpMcts {
    precision: f64,
    strategy: BranchStrategy,
    iterations: usize,
    stack_left_first: bool,
}

/// What evaluating a box established, with the active set when undecided.
enum BoxClass {
    DeltaSat,
    Refuted,
    Undecided(DynamicBitset),
}

impl IcpMcts {
    pub fn new(
        precision: f64,
        stack_left_first: bool,
        strategy: BranchStrategy,
        iterations: usize,
    ) -> Self {
        IcpMcts {
            precision,
            strategy,
            iterations,
            stack_left_first,
        }
    }

    fn classify(
        &self,
        evaluators: &[FormulaEvaluator],
        status: &mut ContractorStatus,
        counters: &mut Counters,
    ) -> BoxClass {
        let _eval_timing = counters.eval_time.guard();

        let mut active = DynamicBitset::with_capacity(status.current().size());
        let mut all_true = true;

        for evaluator in evaluators {
            match evaluator.evaluate(status.current()) {
                Evaluation::True => {}
                Evaluation::False => {
                    status.add_used_constraint(evaluator.literal());
                    return BoxClass::Refuted;
                }
                Evaluation::Unknown => {
                    all_true = false;
                    evaluator.mark_dimensions(status.current(), &mut active);
                }
            }
        }

        if all_true {
            BoxClass::DeltaSat
        } else {
            BoxClass::Undecided(active)
        }
    }

    fn max_active_diam(b: &IntervalBox, active: &DynamicBitset) -> f64 {
        let mut max_diam = 0.0_f64;
        for i in active.ones() {
            max_diam = max_diam.max(b.get(i).diam());
        }
        max_diam
    }

    /// Prunes and classifies a node's box, setting its flags.
    fn evaluate_node(
        &self,
        node: &mut MctsNode,
        contractor: &Contractor,
        evaluators: &[FormulaEvaluator],
        status: &mut ContractorStatus,
        counters: &mut Counters,
    ) -> Result<(), ErrorKind> {
        status.set_current(node.node_box.clone());
        {
            let _prune_timing = counters.prune_time.guard();
            contractor.prune(status)?;
            counters.prunes += 1;
        }
        node.node_box = status.current().clone();

        if node.node_box.is_empty() {
            node.unsat = true;
            node.terminal = true;
            return Ok(());
        }

        match self.classify(evaluators, status, counters) {
            BoxClass::DeltaSat => {
                node.delta_sat = true;
                node.terminal = true;
                node.delta_sat_box = Some(node.node_box.clone());
            }
            BoxClass::Refuted => {
                node.unsat = true;
                node.terminal = true;
            }
            BoxClass::Undecided(active) => {
                if active.count_ones(..) == 0
                    || Self::max_active_diam(&node.node_box, &active) <= self.precision
                {
                    node.delta_sat = true;
                    node.terminal = true;
                    node.delta_sat_box = Some(node.node_box.clone());
                } else {
                    node.active = Some(active);
                }
            }
        }
        Ok(())
    }

    /// Descends by UCT to a leaf or to a node whose children are all decided.
    fn select_path(&self, root: &MctsNode) -> Vec<usize> {
        let mut path = Vec::new();
        let mut node = root;

        while !node.children.is_empty() {
            let mut chosen = None;

            for (i, child) in node.children.iter().enumerate() {
                if !child.terminal && child.visits == 0.0 {
                    chosen = Some(i);
                    break;
                }
            }

            if chosen.is_none() {
                let mut best = f64::NEG_INFINITY;
                for (i, child) in node.children.iter().enumerate() {
                    if child.terminal {
                        continue;
                    }
                    let value = child.uct(node.visits, EXPLORATION);
                    if value > best {
                        best = value;
                        chosen = Some(i);
                    }
                }
            }

            match chosen {
                Some(i) => {
                    node = &node.children[i];
                    path.push(i);
                }
                None => break,
            }
        }

        path
    }

    /// A bounded random descent from `start`, rewarding in [0, 1].
    ///
    /// A δ-sat box found on the way is returned with the full reward.
    fn simulate<R: Rng>(
        &self,
        start: &IntervalBox,
        heuristic: &Contractor,
        evaluators: &[FormulaEvaluator],
        status: &mut ContractorStatus,
        counters: &mut Counters,
        rng: &mut R,
    ) -> Result<(f64, Option<IntervalBox>), ErrorKind> {
        counters.mcts_simulations += 1;
        let mut sim_box = start.clone();

        for _step in 0..SIMULATION_STEPS {
            if interrupt::is_set() {
                return Err(ErrorKind::Interrupted);
            }

            status.set_current(sim_box.clone());
            {
                let _prune_timing = counters.prune_time.guard();
                heuristic.prune(status)?;
            }
            if status.current().is_empty() {
                return Ok((0.0, None));
            }
            sim_box = status.current().clone();

            let active = match self.classify(evaluators, status, counters) {
                BoxClass::DeltaSat => return Ok((1.0, Some(sim_box))),
                BoxClass::Refuted => return Ok((0.0, None)),
                BoxClass::Undecided(active) => active,
            };

            if active.count_ones(..) == 0
                || Self::max_active_diam(&sim_box, &active) <= self.precision
            {
                return Ok((1.0, Some(sim_box)));
            }

            let Some(dim) = brancher::choose_dimension(&self.strategy, &sim_box, &active) else {
                return Ok((1.0, Some(sim_box)));
            };
            let Some((left, right)) = sim_box.bisect(dim) else {
                return Ok((1.0, Some(sim_box)));
            };
            counters.branches += 1;

            sim_box = if rng.random_bool(0.5) { left } else { right };
        }

        Ok((self.preferred_width_ratio(&sim_box), None))
    }

    /// The fraction of preferred-variable diameters already below the
    /// threshold --- of every diameter below the precision, when no variable
    /// is preferred.
    fn preferred_width_ratio(&self, b: &IntervalBox) -> f64 {
        let (names, threshold) = match &self.strategy {
            BranchStrategy::PreferredFirst {
                preferred,
                threshold,
            } if !preferred.is_empty() => (Some(preferred), *threshold),
            _ => (None, self.precision),
        };

        let mut total = 0_usize;
        let mut narrow = 0_usize;
        for i in 0..b.size() {
            if let Some(names) = names {
                if !names.contains(b.variable(i).name()) {
                    continue;
                }
            }
            total += 1;
            if b.get(i).diam() <= threshold {
                narrow += 1;
            }
        }

        if total == 0 {
            return 0.0;
        }
        (narrow as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Searches the current box of `status` for a δ-sat sub-box.
    pub fn check_sat<R: Rng>(
        &self,
        contractor: &Contractor,
        evaluators: &[FormulaEvaluator],
        status: &mut ContractorStatus,
        counters: &mut Counters,
        rng: &mut R,
    ) -> Result<Option<IntervalBox>, ErrorKind> {
        let width = status.current().size();
        let heuristic = contractor
            .heuristic_subset()
            .unwrap_or_else(|| Contractor::id(width));

        let mut next_index = 0;
        let mut root = MctsNode::new(status.current().clone(), next_index);
        next_index += 1;

        self.evaluate_node(&mut root, contractor, evaluators, status, counters)?;

        'iterations: for _ in 0..self.iterations {
            if root.terminal {
                break 'iterations;
            }
            if interrupt::is_set() {
                log::debug!(target: targets::MCTS, "Interrupt observed.");
                return Err(ErrorKind::Interrupted);
            }
            counters.mcts_iterations += 1;
            counters.icp_pops += 1;

            let mut path = self.select_path(&root);
            let node = node_at_mut(&mut root, &path);

            let reward;

            if node.children.is_empty() {
                // Expansion.
                let expanded = match &node.active {
                    Some(active) => {
                        match brancher::choose_dimension(&self.strategy, &node.node_box, active) {
                            Some(dim) => node.node_box.bisect(dim),
                            None => None,
                        }
                    }
                    None => None,
                };

                match expanded {
                    None => {
                        // Nothing to split; the box stands as an answer.
                        node.delta_sat = true;
                        node.terminal = true;
                        node.delta_sat_box = Some(node.node_box.clone());
                        reward = 1.0;
                    }

                    Some((left, right)) => {
                        counters.branches += 1;

                        let (first, second) = match self.stack_left_first {
                            true => (left, right),
                            false => (right, left),
                        };
                        for half in [first, second] {
                            let mut child = MctsNode::new(half, next_index);
                            next_index += 1;
                            self.evaluate_node(
                                &mut child, contractor, evaluators, status, counters,
                            )?;
                            node.children.push(child);
                        }

                        let fresh = node.children.iter().position(|c| !c.terminal);
                        match fresh {
                            Some(i) => {
                                let (value, witness) = self.simulate(
                                    &node.children[i].node_box,
                                    &heuristic,
                                    evaluators,
                                    status,
                                    counters,
                                    rng,
                                )?;
                                reward = value;
                                if let Some(found) = witness {
                                    let child = &mut node.children[i];
                                    child.delta_sat = true;
                                    child.terminal = true;
                                    child.delta_sat_box = Some(found);
                                }
                                path.push(i);
                            }
                            None => {
                                node.refresh_from_children();
                                reward = if node.delta_sat { 1.0 } else { 0.0 };
                            }
                        }
                    }
                }
            } else {
                // Every child decided; lift their verdicts.
                node.refresh_from_children();
                reward = if node.delta_sat { 1.0 } else { 0.0 };
            }

            // Backpropagation, along the recorded path.
            for depth in (0..=path.len()).rev() {
                let ancestor = node_at_mut(&mut root, &path[..depth]);
                ancestor.visits += 1.0;
                ancestor.wins += reward;
                ancestor.cached_uct.set(None);
                for child in &ancestor.children {
                    child.cached_uct.set(None);
                }
                ancestor.refresh_from_children();
            }

            if root.delta_sat || root.unsat {
                break 'iterations;
            }
        }

        if root.delta_sat {
            log::debug!(target: targets::MCTS, "δ-sat after {} iterations.", counters.mcts_iterations);
            let witness = root.delta_sat_box.take();
            return Ok(witness.or_else(|| Some(root.node_box.clone())));
        }
        if root.unsat {
            log::debug!(target: targets::MCTS, "Tree exhausted unsat after {} iterations.", counters.mcts_iterations);
            return Ok(None);
        }

        // Budget spent without a decision: the tree holds no witness, so finish
        // the root box with the sequential engine to keep the two-valued
        // contract.
        log::debug!(target: targets::MCTS, "Iteration budget spent; falling back to the sequential engine.");
        status.set_current(root.node_box.clone());
        let fallback = IcpSeq::new(self.precision, self.stack_left_first, self.strategy.clone());
        fallback.check_sat(contractor, evaluators, status, counters)
    }
}

#[cfg(test)]
mod mcts_tests {
    use super::*;
    use crate::generic::minimal_pcg::MinimalPCG32;
    use crate::interval::Interval;
    use crate::symbolic::{Expression, Formula, Variable, VariableType};
    use rand::SeedableRng;

    const DELTA: f64 = 0.001;

    fn solve(atoms: &[Formula], b: IntervalBox) -> Option<IntervalBox> {
        let children = atoms
            .iter()
            .filter_map(|a| Contractor::fwd_bwd(a, &b))
            .collect::<Vec<_>>();
        let contractor = Contractor::fixpoint(
            b.size(),
            crate::contractor::default_termination_condition(0.01),
            children,
        );
        let evaluators = atoms
            .iter()
            .map(|a| FormulaEvaluator::new(a, DELTA).expect("atom"))
            .collect::<Vec<_>>();

        let mut status = ContractorStatus::new(b);
        let mut counters = Counters::default();
        let mut rng = MinimalPCG32::from_seed(0_u64.to_le_bytes());

        let icp = IcpMcts::new(DELTA, false, BranchStrategy::LargestFirst, 200);
        icp.check_sat(&contractor, &evaluators, &mut status, &mut counters, &mut rng)
            .expect("uninterrupted")
    }

    #[test]
    fn sqrt_two_is_delta_sat() {
        let x = Variable::fresh("x", VariableType::Real);
        let xe = Expression::from(&x);

        let atoms = [
            Formula::geq(xe.clone(), Expression::constant(-10.0)),
            Formula::leq(xe.clone(), Expression::constant(10.0)),
            Formula::eq(xe.clone() * xe, Expression::constant(2.0)),
        ];
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(-10.0, 10.0))]);

        let witness = solve(&atoms, b).expect("δ-sat");
        let m = witness.get(0).mid();
        assert!((m * m - 2.0).abs() <= 0.1);
    }

    #[test]
    fn infeasible_bound_is_unsat() {
        let x = Variable::fresh("x", VariableType::Real);
        let xe = Expression::from(&x);

        let atoms = [
            Formula::geq(xe.clone(), Expression::constant(0.0)),
            Formula::leq(xe.clone(), Expression::constant(1.0)),
            Formula::geq(xe, Expression::constant(2.0)),
        ];
        let b = IntervalBox::new(vec![(x.clone(), Interval::new(0.0, 1.0))]);

        assert!(solve(&atoms, b).is_none());
    }

    #[test]
    fn fixed_seeds_agree() {
        let x = Variable::fresh("x", VariableType::Real);
        let y = Variable::fresh("y", VariableType::Real);
        let xe = Expression::from(&x);
        let ye = Expression::from(&y);

        let atoms = [
            Formula::geq(xe.clone(), Expression::constant(-5.0)),
            Formula::leq(xe.clone(), Expression::constant(5.0)),
            Formula::geq(ye.clone(), Expression::constant(-5.0)),
            Formula::leq(ye.clone(), Expression::constant(5.0)),
            Formula::eq(xe.clone().sin() + ye.clone(), Expression::constant(0.0)),
            Formula::eq(ye, xe),
        ];
        let make_box = || {
            IntervalBox::new(vec![
                (x.clone(), Interval::new(-5.0, 5.0)),
                (y.clone(), Interval::new(-5.0, 5.0)),
            ])
        };

        let one = solve(&atoms, make_box()).expect("δ-sat");
        let two = solve(&atoms, make_box()).expect("δ-sat");

        assert_eq!(one.interval_vector(), two.interval_vector());
    }
}
