/*!
The boolean backend --- a compact conflict-driven clause-learning solver.

The [bridge](crate::bridge) drives the backend through a small, IPASIR-like surface: fresh variables, clause addition, incremental [push](SatSolver::push)/[pop](SatSolver::pop) frames, a [solve](SatSolver::solve), values, and an in-memory [clausal core](SatSolver::clausal_core).
Literals are nonzero `i32`, negative for negated atoms, as in DIMACS.

Inside is the usual machinery, kept small:
- two-watched-literal propagation, binary and long clauses alike;
- first-UIP conflict analysis with non-chronological backjumping;
- clause learning, with each learned clause carrying the set of *original* clauses it was resolved from --- the ancestry that makes the clausal core of a refutation available without a proof log;
- a configurable [default phase](SatDefaultPhase) for free decisions.

Each solve starts from a clean assignment: clauses and learned clauses persist across solves (and are trimmed by frame on pop), while the trail, values, and watch lists are rebuilt.
Rebuilding keeps the incremental interface honest under pop at a cost only noticeable on formulas far larger than a theory skeleton.
*/

use rand::{Rng, SeedableRng};

use crate::config::SatDefaultPhase;
use crate::generic::minimal_pcg::MinimalPCG32;
use crate::misc::log::targets;

/// A boolean literal: a variable index, negative when negated. Never zero.
pub type SatLiteral = i32;

/// The outcome of a solve.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SatReport {
    Satisfiable,
    Unsatisfiable,

    /// Neither established --- not produced by this backend, surfaced as an
    /// error by the bridge if it ever appears.
    Unknown,
}

/// A reference to a stored clause.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ClauseRef {
    Original(usize),
    Learned(usize),
}

struct LearnedClause {
    literals: Vec<SatLiteral>,

    /// The original clauses this clause was resolved from, ascending.
    origins: Vec<usize>,
}

/// The conflict-driven solver.
pub struct SatSolver {
    variable_count: usize,

    originals: Vec<Vec<SatLiteral>>,
    learned: Vec<LearnedClause>,

    /// `originals.len()` at each open frame.
    frames: Vec<usize>,

    // Per-solve state, rebuilt by [solve](SatSolver::solve).
    values: Vec<Option<bool>>,
    levels: Vec<u32>,
    reasons: Vec<Option<ClauseRef>>,
    trail: Vec<SatLiteral>,
    level_indices: Vec<usize>,
    q_head: usize,
    watches: Vec<Vec<ClauseRef>>,
    jw_scores: Vec<f64>,

    phase: SatDefaultPhase,
    rng: MinimalPCG32,

    trace_cores: bool,
    core: Option<Vec<usize>>,
}

/// The watch-list index of a literal.
fn watch_index(literal: SatLiteral) -> usize {
    ((literal.unsigned_abs() as usize) << 1) | usize::from(literal < 0)
}

fn variable_of(literal: SatLiteral) -> usize {
    literal.unsigned_abs() as usize
}

impl SatSolver {
    pub fn new(phase: SatDefaultPhase, seed: u64, trace_cores: bool) -> Self {
        SatSolver {
            variable_count: 0,
            originals: Vec::default(),
            learned: Vec::default(),
            frames: Vec::default(),
            values: Vec::default(),
            levels: Vec::default(),
            reasons: Vec::default(),
            trail: Vec::default(),
            level_indices: Vec::default(),
            q_head: 0,
            watches: Vec::default(),
            jw_scores: Vec::default(),
            phase,
            rng: MinimalPCG32::from_seed(seed.to_le_bytes()),
            trace_cores,
            core: None,
        }
    }

    /// Expands the solver by one variable, returning its positive literal.
    pub fn fresh_variable(&mut self) -> SatLiteral {
        self.variable_count += 1;
        self.variable_count as SatLiteral
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    /// Adds a clause to the current frame.
    ///
    /// Duplicate literals are dropped and tautologies discarded whole.
    pub fn add_clause(&mut self, literals: Vec<SatLiteral>) {
        let mut kept: Vec<SatLiteral> = Vec::with_capacity(literals.len());
        for literal in literals {
            debug_assert!(literal != 0 && variable_of(literal) <= self.variable_count);
            if kept.contains(&-literal) {
                log::trace!(target: targets::BACKEND, "Tautology skipped.");
                return;
            }
            if !kept.contains(&literal) {
                kept.push(literal);
            }
        }
        self.originals.push(kept);
    }

    /// Opens a frame: clauses added from here are removed by the matching pop.
    pub fn push(&mut self) {
        self.frames.push(self.originals.len());
    }

    /// Closes the most recent frame.
    ///
    /// Clauses of the frame go, and with them every learned clause resolved
    /// from one of them. Variables persist.
    pub fn pop(&mut self) {
        let Some(mark) = self.frames.pop() else {
            return;
        };
        self.originals.truncate(mark);
        self.learned
            .retain(|c| c.origins.last().is_none_or(|&last| last < mark));
    }

    /// The value of `literal` on the last satisfying assignment.
    ///
    /// None for a variable no clause constrained.
    pub fn value(&self, literal: SatLiteral) -> Option<bool> {
        let polarity = self.values.get(variable_of(literal)).copied().flatten()?;
        Some(polarity == (literal > 0))
    }

    /// The original clauses of the last refutation, when tracing was enabled.
    pub fn clausal_core(&self) -> Option<Vec<Vec<SatLiteral>>> {
        let ids = self.core.as_ref()?;
        Some(ids.iter().map(|&i| self.originals[i].clone()).collect())
    }

    /// Determines the satisfiability of the stored clauses.
    pub fn solve(&mut self) -> SatReport {
        self.core = None;
        self.reset_state();

        if let Some(conflict) = self.attach_clauses() {
            if self.trace_cores {
                self.core = Some(self.collect_core(conflict));
            }
            return SatReport::Unsatisfiable;
        }

        'solve_loop: loop {
            match self.propagate() {
                Some(conflict) => {
                    if self.level_indices.is_empty() {
                        if self.trace_cores {
                            self.core = Some(self.collect_core(conflict));
                        }
                        log::debug!(target: targets::BACKEND, "Refutation at the ground level.");
                        return SatReport::Unsatisfiable;
                    }

                    let (literals, backjump_level, origins) = self.analyze(conflict);
                    self.backjump(backjump_level);

                    let asserting = literals[0];
                    let second_watch = literals.get(1).copied();
                    self.learned.push(LearnedClause { literals, origins });
                    let reference = ClauseRef::Learned(self.learned.len() - 1);

                    if let Some(second) = second_watch {
                        self.watches[watch_index(asserting)].push(reference);
                        self.watches[watch_index(second)].push(reference);
                    }

                    self.assign(asserting, Some(reference));
                }

                None => match self.choose_literal() {
                    Some(decision) => {
                        self.level_indices.push(self.trail.len());
                        self.assign(decision, None);
                        continue 'solve_loop;
                    }
                    None => {
                        log::debug!(target: targets::BACKEND, "Assignment complete.");
                        return SatReport::Satisfiable;
                    }
                },
            }
        }
    }

    fn reset_state(&mut self) {
        let n = self.variable_count;
        self.values = vec![None; n + 1];
        self.levels = vec![0; n + 1];
        self.reasons = vec![None; n + 1];
        self.trail.clear();
        self.level_indices.clear();
        self.q_head = 0;
        self.watches = vec![Vec::new(); 2 * (n + 1)];

        self.jw_scores = vec![0.0; 2 * (n + 1)];
        if self.phase == SatDefaultPhase::JeroslowWang {
            for clause in &self.originals {
                if clause.is_empty() {
                    continue;
                }
                let weight = (2.0_f64).powi(-(clause.len() as i32));
                for &literal in clause {
                    self.jw_scores[watch_index(literal)] += weight;
                }
            }
        }
    }

    /// Installs watches and enqueues unit clauses; a conflict here is a
    /// ground-level refutation.
    fn attach_clauses(&mut self) -> Option<ClauseRef> {
        let original_count = self.originals.len();
        for index in 0..original_count {
            let reference = ClauseRef::Original(index);
            match self.originals[index].len() {
                0 => return Some(reference),
                1 => {
                    let unit = self.originals[index][0];
                    if self.enqueue_checked(unit, reference).is_err() {
                        return Some(reference);
                    }
                }
                _ => {
                    let (first, second) = (self.originals[index][0], self.originals[index][1]);
                    self.watches[watch_index(first)].push(reference);
                    self.watches[watch_index(second)].push(reference);
                }
            }
        }

        let learned_count = self.learned.len();
        for index in 0..learned_count {
            let reference = ClauseRef::Learned(index);
            match self.learned[index].literals.len() {
                0 => return Some(reference),
                1 => {
                    let unit = self.learned[index].literals[0];
                    if self.enqueue_checked(unit, reference).is_err() {
                        return Some(reference);
                    }
                }
                _ => {
                    let (first, second) =
                        (self.learned[index].literals[0], self.learned[index].literals[1]);
                    self.watches[watch_index(first)].push(reference);
                    self.watches[watch_index(second)].push(reference);
                }
            }
        }

        None
    }

    fn clause_literals(&self, reference: ClauseRef) -> &[SatLiteral] {
        match reference {
            ClauseRef::Original(i) => &self.originals[i],
            ClauseRef::Learned(i) => &self.learned[i].literals,
        }
    }

    fn clause_literals_mut(&mut self, reference: ClauseRef) -> &mut Vec<SatLiteral> {
        match reference {
            ClauseRef::Original(i) => &mut self.originals[i],
            ClauseRef::Learned(i) => &mut self.learned[i].literals,
        }
    }

    /// The original-clause ancestry of a stored clause.
    fn origin_ids(&self, reference: ClauseRef) -> Vec<usize> {
        match reference {
            ClauseRef::Original(i) => vec![i],
            ClauseRef::Learned(i) => self.learned[i].origins.clone(),
        }
    }

    fn assign(&mut self, literal: SatLiteral, reason: Option<ClauseRef>) {
        let variable = variable_of(literal);
        self.values[variable] = Some(literal > 0);
        self.levels[variable] = self.level_indices.len() as u32;
        self.reasons[variable] = reason;
        self.trail.push(literal);
    }

    /// Enqueues a literal unless it conflicts with the current value.
    fn enqueue_checked(&mut self, literal: SatLiteral, reason: ClauseRef) -> Result<(), ()> {
        match self.value(literal) {
            Some(true) => Ok(()),
            Some(false) => Err(()),
            None => {
                self.assign(literal, Some(reason));
                Ok(())
            }
        }
    }

    /// Boolean constraint propagation over the two watched literals.
    fn propagate(&mut self) -> Option<ClauseRef> {
        while self.q_head < self.trail.len() {
            let literal = self.trail[self.q_head];
            self.q_head += 1;

            let false_literal = -literal;
            let list_index = watch_index(false_literal);
            let mut list = std::mem::take(&mut self.watches[list_index]);

            let mut i = 0;
            while i < list.len() {
                let reference = list[i];

                // Normalise: the falsified literal sits at position 1.
                {
                    let literals = self.clause_literals_mut(reference);
                    if literals[0] == false_literal {
                        literals.swap(0, 1);
                    }
                }

                let watched = self.clause_literals(reference)[0];
                if self.value(watched) == Some(true) {
                    i += 1;
                    continue;
                }

                // Search for a replacement watch.
                let mut replacement = None;
                for (k, &candidate) in self.clause_literals(reference).iter().enumerate().skip(2)
                {
                    if self.value(candidate) != Some(false) {
                        replacement = Some(k);
                        break;
                    }
                }

                match replacement {
                    Some(k) => {
                        let literals = self.clause_literals_mut(reference);
                        literals.swap(1, k);
                        let moved = literals[1];
                        self.watches[watch_index(moved)].push(reference);
                        list.swap_remove(i);
                    }

                    None => match self.value(watched) {
                        None => {
                            self.assign(watched, Some(reference));
                            i += 1;
                        }
                        Some(false) => {
                            self.watches[list_index] = list;
                            return Some(reference);
                        }
                        Some(true) => {
                            i += 1;
                        }
                    },
                }
            }

            self.watches[list_index] = list;
        }

        None
    }

    /// First-UIP conflict analysis.
    ///
    /// Returns the learned clause --- asserting literal first, a literal of the
    /// backjump level second --- the backjump level, and the original-clause
    /// ancestry of the resolution.
    fn analyze(&self, conflict: ClauseRef) -> (Vec<SatLiteral>, usize, Vec<usize>) {
        use std::collections::BTreeSet;

        let current_level = self.level_indices.len() as u32;
        let mut seen = vec![false; self.variable_count + 1];
        let mut learned: Vec<SatLiteral> = vec![0];
        let mut origins: BTreeSet<usize> = BTreeSet::new();
        let mut ground_variables: Vec<usize> = Vec::new();

        let mut counter = 0_usize;
        let mut reference = conflict;
        let mut trail_index = self.trail.len();
        let mut resolvent: Option<usize> = None;

        loop {
            origins.extend(self.origin_ids(reference));

            for &literal in self.clause_literals(reference) {
                let variable = variable_of(literal);
                if seen[variable] || Some(variable) == resolvent {
                    continue;
                }
                seen[variable] = true;
                if self.levels[variable] == 0 {
                    // Settled ground literals drop out of the clause; their
                    // derivations still belong to the ancestry.
                    ground_variables.push(variable);
                } else if self.levels[variable] == current_level {
                    counter += 1;
                } else {
                    learned.push(literal);
                }
            }

            // The most recent seen literal of the current level resolves next.
            let literal = loop {
                trail_index -= 1;
                let candidate = self.trail[trail_index];
                if seen[variable_of(candidate)]
                    && self.levels[variable_of(candidate)] == current_level
                {
                    break candidate;
                }
            };

            counter -= 1;
            seen[variable_of(literal)] = false;

            if counter == 0 {
                // The first unique implication point; at worst the decision.
                learned[0] = -literal;
                break;
            }

            resolvent = Some(variable_of(literal));
            reference = match self.reasons[variable_of(literal)] {
                Some(r) => r,
                None => {
                    learned[0] = -literal;
                    break;
                }
            };
        }

        self.expand_ground_origins(ground_variables, &mut origins);

        // Watch a literal of the backjump level alongside the asserting one.
        let mut backjump_level = 0_usize;
        let mut position = 1_usize;
        for (k, &literal) in learned.iter().enumerate().skip(1) {
            let level = self.levels[variable_of(literal)] as usize;
            if level > backjump_level {
                backjump_level = level;
                position = k;
            }
        }
        if learned.len() > 1 {
            learned.swap(1, position);
        }

        (learned, backjump_level, origins.into_iter().collect())
    }

    /// Closes the ancestry over the reasons of ground-level literals.
    fn expand_ground_origins(
        &self,
        mut pending: Vec<usize>,
        origins: &mut std::collections::BTreeSet<usize>,
    ) {
        let mut visited = vec![false; self.variable_count + 1];
        while let Some(variable) = pending.pop() {
            if visited[variable] {
                continue;
            }
            visited[variable] = true;

            let Some(reason) = self.reasons[variable] else {
                continue;
            };
            origins.extend(self.origin_ids(reason));
            for &literal in self.clause_literals(reason) {
                let v = variable_of(literal);
                if v != variable && !visited[v] {
                    pending.push(v);
                }
            }
        }
    }

    /// The ancestry of a ground-level conflict.
    fn collect_core(&self, conflict: ClauseRef) -> Vec<usize> {
        use std::collections::BTreeSet;

        let mut origins: BTreeSet<usize> = BTreeSet::new();
        origins.extend(self.origin_ids(conflict));

        let pending = self
            .clause_literals(conflict)
            .iter()
            .map(|&l| variable_of(l))
            .collect::<Vec<_>>();
        self.expand_ground_origins(pending, &mut origins);

        origins.into_iter().collect()
    }

    fn backjump(&mut self, level: usize) {
        let Some(&mark) = self.level_indices.get(level) else {
            return;
        };
        for &literal in &self.trail[mark..] {
            let variable = variable_of(literal);
            self.values[variable] = None;
            self.reasons[variable] = None;
            self.levels[variable] = 0;
        }
        self.trail.truncate(mark);
        self.level_indices.truncate(level);
        self.q_head = self.trail.len();
    }

    /// The lowest unvalued variable, valued by the default phase.
    fn choose_literal(&mut self) -> Option<SatLiteral> {
        let variable = (1..=self.variable_count).find(|&v| self.values[v].is_none())?;
        let literal = variable as SatLiteral;

        let polarity = match self.phase {
            SatDefaultPhase::False => false,
            SatDefaultPhase::True => true,
            SatDefaultPhase::JeroslowWang => {
                self.jw_scores[watch_index(literal)] >= self.jw_scores[watch_index(-literal)]
            }
            SatDefaultPhase::Random => self.rng.random_bool(0.5),
        };

        log::trace!(target: targets::BACKEND, "Decision {}{variable}.", if polarity { "" } else { "-" });
        Some(if polarity { literal } else { -literal })
    }
}

#[cfg(test)]
mod sat_tests {
    use super::*;

    fn solver() -> SatSolver {
        SatSolver::new(SatDefaultPhase::JeroslowWang, 0, true)
    }

    #[test]
    fn one_literal() {
        let mut solver = solver();
        let p = solver.fresh_variable();

        solver.add_clause(vec![p]);

        assert_eq!(solver.solve(), SatReport::Satisfiable);
        assert_eq!(solver.value(p), Some(true));
    }

    #[test]
    fn conflict() {
        let mut solver = solver();
        let p = solver.fresh_variable();
        let q = solver.fresh_variable();

        solver.add_clause(vec![p, q]);
        solver.add_clause(vec![-p, -q]);
        solver.add_clause(vec![p, -q]);
        solver.add_clause(vec![-p, q]);

        assert_eq!(solver.solve(), SatReport::Unsatisfiable);
    }

    #[test]
    fn unit_conjunct() {
        let mut solver = solver();
        let p = solver.fresh_variable();
        let q = solver.fresh_variable();

        solver.add_clause(vec![p, q]);
        solver.add_clause(vec![-p]);

        assert_eq!(solver.solve(), SatReport::Satisfiable);
        assert_eq!(solver.value(p), Some(false));
        assert_eq!(solver.value(q), Some(true));
    }

    #[test]
    fn propagation_chain() {
        let mut solver = solver();
        let literals = (0..6).map(|_| solver.fresh_variable()).collect::<Vec<_>>();

        for window in literals.windows(2) {
            solver.add_clause(vec![-window[0], window[1]]);
        }
        solver.add_clause(vec![literals[0]]);

        assert_eq!(solver.solve(), SatReport::Satisfiable);
        for &literal in &literals {
            assert_eq!(solver.value(literal), Some(true));
        }
    }

    #[test]
    fn core_points_at_the_refutation() {
        let mut solver = solver();
        let p = solver.fresh_variable();
        let q = solver.fresh_variable();
        let r = solver.fresh_variable();

        solver.add_clause(vec![r, p]); // irrelevant
        solver.add_clause(vec![q]);
        solver.add_clause(vec![-q]);

        assert_eq!(solver.solve(), SatReport::Unsatisfiable);

        let core = solver.clausal_core().expect("tracing enabled");
        assert!(core.contains(&vec![q]));
        assert!(core.contains(&vec![-q]));
        assert!(!core.contains(&vec![r, p]));
    }

    #[test]
    fn pop_restores_satisfiability() {
        let mut solver = solver();
        let p = solver.fresh_variable();

        solver.add_clause(vec![p]);
        assert_eq!(solver.solve(), SatReport::Satisfiable);

        solver.push();
        solver.add_clause(vec![-p]);
        assert_eq!(solver.solve(), SatReport::Unsatisfiable);

        solver.pop();
        assert_eq!(solver.solve(), SatReport::Satisfiable);
        assert_eq!(solver.value(p), Some(true));
    }

    #[test]
    fn learned_clauses_from_a_popped_frame_do_not_linger() {
        let mut solver = solver();
        let p = solver.fresh_variable();
        let q = solver.fresh_variable();
        let r = solver.fresh_variable();

        solver.add_clause(vec![p, q, r]);

        solver.push();
        solver.add_clause(vec![-p]);
        solver.add_clause(vec![-q]);
        solver.add_clause(vec![-r]);
        assert_eq!(solver.solve(), SatReport::Unsatisfiable);
        solver.pop();

        assert_eq!(solver.solve(), SatReport::Satisfiable);
    }

    #[test]
    fn tautologies_are_dropped() {
        let mut solver = solver();
        let p = solver.fresh_variable();

        solver.add_clause(vec![p, -p]);
        assert_eq!(solver.solve(), SatReport::Satisfiable);
    }

    #[test]
    fn pigeonhole_two_into_one_is_unsatisfiable() {
        // Two pigeons, one hole.
        let mut solver = solver();
        let a = solver.fresh_variable();
        let b = solver.fresh_variable();

        solver.add_clause(vec![a]);
        solver.add_clause(vec![b]);
        solver.add_clause(vec![-a, -b]);

        assert_eq!(solver.solve(), SatReport::Unsatisfiable);
    }
}
