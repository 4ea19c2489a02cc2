/*!
Boxes --- finite ordered products of intervals, indexed by variable.

An [IntervalBox] pairs a fixed, ordered list of [variables](Variable) with one [Interval] per variable.
The variable order defines a stable dimension index `0..n`, shared by every box derived from the same product: the variable list is reference counted and never mutated, so bisection and copying touch only the interval vector.

A box is empty exactly when some component is empty.
*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::symbolic::Variable;

use super::Interval;

/// An n-dimensional interval vector with a variable index.
#[derive(Clone, Debug)]
pub struct IntervalBox {
    variables: Rc<Vec<Variable>>,
    index: Rc<HashMap<Variable, usize>>,
    values: Vec<Interval>,
}

impl IntervalBox {
    /// A box over the given components.
    ///
    /// Every variable appears exactly once; a repeated variable keeps the intersection of its intervals.
    pub fn new(components: Vec<(Variable, Interval)>) -> Self {
        let mut variables = Vec::with_capacity(components.len());
        let mut index = HashMap::with_capacity(components.len());
        let mut values = Vec::with_capacity(components.len());

        for (variable, interval) in components {
            match index.get(&variable) {
                Some(&i) => {
                    let narrowed: Interval = values[i];
                    values[i] = narrowed.intersect(&interval);
                }
                None => {
                    index.insert(variable.clone(), variables.len());
                    variables.push(variable);
                    values.push(interval);
                }
            }
        }

        IntervalBox {
            variables: Rc::new(variables),
            index: Rc::new(index),
            values,
        }
    }

    /// A box over the given variables, each component the whole line.
    pub fn over<I: IntoIterator<Item = Variable>>(variables: I) -> Self {
        Self::new(
            variables
                .into_iter()
                .map(|v| (v, Interval::ENTIRE))
                .collect(),
        )
    }

    /// The dimension of the box.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// The dimension index of `variable`, stable across all boxes over the same product.
    pub fn index(&self, variable: &Variable) -> Option<usize> {
        self.index.get(variable).copied()
    }

    /// The variable of dimension `i`.
    pub fn variable(&self, i: usize) -> &Variable {
        &self.variables[i]
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn get(&self, i: usize) -> Interval {
        self.values[i]
    }

    pub fn set(&mut self, i: usize, interval: Interval) {
        self.values[i] = interval;
    }

    /// The component of `variable`, if the box has one.
    pub fn interval_of(&self, variable: &Variable) -> Option<Interval> {
        self.index(variable).map(|i| self.values[i])
    }

    pub fn interval_vector(&self) -> &[Interval] {
        &self.values
    }

    /// Overwrites every component at once.
    ///
    /// The replacement must have the dimension of the box.
    pub fn set_interval_vector(&mut self, values: &[Interval]) {
        debug_assert_eq!(values.len(), self.values.len());
        self.values.copy_from_slice(values);
    }

    /// True iff some component is empty.
    pub fn is_empty(&self) -> bool {
        self.values.iter().any(Interval::is_empty)
    }

    /// Empties every component, the canonical refuted box.
    pub fn set_empty(&mut self) {
        for value in self.values.iter_mut() {
            *value = Interval::EMPTY;
        }
    }

    /// Splits the box at the midpoint of dimension `i`.
    ///
    /// The halves are identical to the box except in dimension i, where their union is the original component and their intersection the midpoint alone.
    /// None if component i is not bisectable.
    pub fn bisect(&self, i: usize) -> Option<(IntervalBox, IntervalBox)> {
        let (left_i, right_i) = self.values[i].bisect()?;

        let mut left = self.clone();
        let mut right = self.clone();
        left.values[i] = left_i;
        right.values[i] = right_i;

        Some((left, right))
    }

    /// The maximum component diameter and the lowest dimension attaining it.
    pub fn max_diam(&self) -> (f64, usize) {
        let mut max_diam = 0.0;
        let mut max_idx = 0;
        for (i, value) in self.values.iter().enumerate() {
            let d = value.diam();
            if d > max_diam {
                max_diam = d;
                max_idx = i;
            }
        }
        (max_diam, max_idx)
    }

    /// Component-wise hull with another box over the same product.
    pub fn hull_assign(&mut self, other: &IntervalBox) {
        debug_assert_eq!(self.size(), other.size());
        for (value, other_value) in self.values.iter_mut().zip(other.values.iter()) {
            *value = value.hull(other_value);
        }
    }
}

impl PartialEq for IntervalBox {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.variables, &other.variables) && self.values == other.values
    }
}

impl std::fmt::Display for IntervalBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, variable) in self.variables.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{} : {}", variable, self.values[i])?;
        }
        Ok(())
    }
}
