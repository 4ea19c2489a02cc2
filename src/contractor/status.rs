/*!
The mutable state threaded through a pruning pass.

A [ContractorStatus] carries:
- the current box, narrowed in place by each contractor;
- an *output* bitset, accumulating the dimensions changed since the caller last cleared it --- the other half of the input/output protocol that lets a [worklist](crate::contractor::ContractorKind::WorklistFixpoint) re-schedule only the contractors whose inputs moved;
- the *used constraints*: the atoms whose contractors actually narrowed the box, in first-use order.

The used constraints are what the outer loop negates into a blocking clause when a branch is refuted, so a contractor records its atom only on a strict narrowing --- a zero-effect prune teaches the boolean layer nothing.
*/

use std::collections::HashSet;

use crate::interval::boxes::IntervalBox;
use crate::symbolic::Formula;

use super::DynamicBitset;

/// Box, output bits, and used constraints for one pruning pass.
pub struct ContractorStatus {
    current: IntervalBox,
    output: DynamicBitset,
    used: Vec<Formula>,
    used_set: HashSet<Formula>,
}

impl ContractorStatus {
    pub fn new(b: IntervalBox) -> Self {
        let width = b.size();
        ContractorStatus {
            current: b,
            output: DynamicBitset::with_capacity(width),
            used: Vec::default(),
            used_set: HashSet::default(),
        }
    }

    pub fn current(&self) -> &IntervalBox {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut IntervalBox {
        &mut self.current
    }

    /// Installs a box, leaving output bits and used constraints as they are.
    pub fn set_current(&mut self, b: IntervalBox) {
        self.current = b;
    }

    pub fn output(&self) -> &DynamicBitset {
        &self.output
    }

    /// Marks dimension `i` as changed.
    pub fn mark_output(&mut self, i: usize) {
        self.output.insert(i);
    }

    /// Marks every dimension as changed, the convention for an emptied box.
    pub fn mark_all_output(&mut self) {
        self.output.insert_range(..);
    }

    /// Clears the output bits, returning the previous set.
    pub fn take_output(&mut self) -> DynamicBitset {
        let width = self.output.len();
        std::mem::replace(&mut self.output, DynamicBitset::with_capacity(width))
    }

    /// Restores output bits taken with [take_output](Self::take_output), unioned with anything set since.
    pub fn restore_output(&mut self, bits: DynamicBitset) {
        self.output.union_with(&bits);
    }

    /// Records that `constraint` narrowed the box.
    pub fn add_used_constraint(&mut self, constraint: &Formula) {
        if self.used_set.insert(constraint.clone()) {
            self.used.push(constraint.clone());
        }
    }

    pub fn used_constraints(&self) -> &[Formula] {
        &self.used
    }

    /// The length of the used-constraint list, for later [truncation](Self::truncate_used).
    pub fn used_len(&self) -> usize {
        self.used.len()
    }

    /// Discards used constraints recorded after `len`.
    ///
    /// An inner search (a quantified instantiation, say) records constraints that are not atoms of the outer problem; the caller snapshots, runs, and truncates.
    pub fn truncate_used(&mut self, len: usize) {
        for dropped in self.used.split_off(len) {
            self.used_set.remove(&dropped);
        }
    }
}
