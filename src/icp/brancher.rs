/*!
Variable-selection heuristics for bisection.

A brancher picks the dimension to split, given a box and the *active set* --- the dimensions still read by some undecided atom.
Whatever the strategy, a degenerate or otherwise unbisectable component is never chosen; when nothing in the active set can be split, there is no choice to make and the searching engine accepts the box.
*/

use std::collections::HashSet;

use crate::contractor::DynamicBitset;
use crate::interval::boxes::IntervalBox;

/// How to choose among the active dimensions.
#[derive(Clone)]
pub enum BranchStrategy {
    /// The bisectable active dimension of maximum diameter, lowest index on ties.
    LargestFirst,

    /// As [LargestFirst](BranchStrategy::LargestFirst), restricted to the named
    /// variables while any of them is wider than the threshold.
    PreferredFirst {
        preferred: HashSet<String>,
        threshold: f64,
    },
}

/// The maximum diameter over the bisectable active dimensions, with its dimension.
fn find_max_diam(b: &IntervalBox, active: &DynamicBitset) -> (f64, Option<usize>) {
    let mut max_diam = 0.0_f64;
    let mut max_diam_idx = None;
    for idx in active.ones() {
        let component = b.get(idx);
        let diam = component.diam();
        if diam > max_diam && component.is_bisectable() {
            max_diam = diam;
            max_diam_idx = Some(idx);
        }
    }
    (max_diam, max_diam_idx)
}

/// The widest splittable dimension, preferring the named variables while one
/// of them remains wider than `threshold`.
///
/// Scanning ascends through the active set, so between two preferred
/// dimensions of infinite diameter the lower index is kept.
fn find_preferred_diam(
    b: &IntervalBox,
    active: &DynamicBitset,
    preferred: &HashSet<String>,
    threshold: f64,
) -> (f64, Option<usize>) {
    let mut max_diam = f64::MIN_POSITIVE;
    let mut max_diam_idx: Option<usize> = None;
    let mut found_preferred = false;

    for idx in active.ones() {
        let component = b.get(idx);
        let diam = component.diam();
        let idx_preferred = preferred.contains(b.variable(idx).name());

        // A preferred variable is only worth splitting above the threshold, as
        // it may already have converged.
        let can_split = ((idx_preferred && diam > threshold)
            || (!idx_preferred && diam > max_diam))
            && component.is_bisectable();

        if max_diam_idx.is_none() && can_split {
            found_preferred = idx_preferred;
            max_diam = diam;
            max_diam_idx = Some(idx);
        } else if idx_preferred
            && can_split
            && (!found_preferred
                || (diam.is_infinite()
                    && max_diam.is_infinite()
                    && Some(idx) < max_diam_idx)
                || (!diam.is_infinite() && diam > max_diam))
        {
            found_preferred = idx_preferred;
            max_diam = diam;
            max_diam_idx = Some(idx);
        } else if !found_preferred && can_split && diam > max_diam {
            found_preferred = idx_preferred;
            max_diam = diam;
            max_diam_idx = Some(idx);
        }
    }

    (max_diam, max_diam_idx)
}

/// The dimension to bisect, or None when no active dimension can be split.
pub fn choose_dimension(
    strategy: &BranchStrategy,
    b: &IntervalBox,
    active: &DynamicBitset,
) -> Option<usize> {
    match strategy {
        BranchStrategy::LargestFirst => find_max_diam(b, active).1,
        BranchStrategy::PreferredFirst {
            preferred,
            threshold,
        } => find_preferred_diam(b, active, preferred, *threshold).1,
    }
}

#[cfg(test)]
mod brancher_tests {
    use super::*;
    use crate::interval::Interval;
    use crate::symbolic::{Variable, VariableType};

    fn active_over(n: usize) -> DynamicBitset {
        let mut bits = DynamicBitset::with_capacity(n);
        bits.insert_range(..);
        bits
    }

    fn named_box(components: Vec<(&str, Interval)>) -> IntervalBox {
        IntervalBox::new(
            components
                .into_iter()
                .map(|(name, interval)| (Variable::fresh(name, VariableType::Real), interval))
                .collect(),
        )
    }

    #[test]
    fn largest_first_takes_the_widest() {
        let b = named_box(vec![
            ("x", Interval::new(0.0, 1.0)),
            ("y", Interval::new(0.0, 4.0)),
            ("z", Interval::new(0.0, 2.0)),
        ]);

        assert_eq!(
            choose_dimension(&BranchStrategy::LargestFirst, &b, &active_over(3)),
            Some(1)
        );
    }

    #[test]
    fn ties_break_to_the_lowest_index() {
        let b = named_box(vec![
            ("x", Interval::new(0.0, 4.0)),
            ("y", Interval::new(0.0, 4.0)),
        ]);

        assert_eq!(
            choose_dimension(&BranchStrategy::LargestFirst, &b, &active_over(2)),
            Some(0)
        );
    }

    #[test]
    fn degenerate_components_are_never_chosen() {
        let b = named_box(vec![
            ("x", Interval::point(3.0)),
            ("y", Interval::new(0.0, 1.0)),
        ]);

        assert_eq!(
            choose_dimension(&BranchStrategy::LargestFirst, &b, &active_over(2)),
            Some(1)
        );

        let all_points = named_box(vec![("x", Interval::point(1.0))]);
        assert_eq!(
            choose_dimension(&BranchStrategy::LargestFirst, &all_points, &active_over(1)),
            None
        );
    }

    #[test]
    fn inactive_dimensions_are_ignored() {
        let b = named_box(vec![
            ("x", Interval::new(0.0, 8.0)),
            ("y", Interval::new(0.0, 1.0)),
        ]);

        let mut active = DynamicBitset::with_capacity(2);
        active.insert(1);

        assert_eq!(
            choose_dimension(&BranchStrategy::LargestFirst, &b, &active),
            Some(1)
        );
    }

    #[test]
    fn preferred_variables_win_above_the_threshold() {
        let b = named_box(vec![
            ("x", Interval::new(0.0, 10.0)),
            ("p", Interval::new(0.0, 1.0)),
        ]);

        let strategy = BranchStrategy::PreferredFirst {
            preferred: HashSet::from(["p".to_string()]),
            threshold: 0.01,
        };

        assert_eq!(choose_dimension(&strategy, &b, &active_over(2)), Some(1));
    }

    #[test]
    fn converged_preferred_variables_give_way() {
        let b = named_box(vec![
            ("x", Interval::new(0.0, 10.0)),
            ("p", Interval::new(0.0, 0.001)),
        ]);

        let strategy = BranchStrategy::PreferredFirst {
            preferred: HashSet::from(["p".to_string()]),
            threshold: 0.01,
        };

        assert_eq!(choose_dimension(&strategy, &b, &active_over(2)), Some(0));
    }

    #[test]
    fn infinite_preferred_ties_keep_the_lowest_index() {
        let b = named_box(vec![
            ("p", Interval::ENTIRE),
            ("q", Interval::ENTIRE),
        ]);

        let strategy = BranchStrategy::PreferredFirst {
            preferred: HashSet::from(["p".to_string(), "q".to_string()]),
            threshold: 0.01,
        };

        assert_eq!(choose_dimension(&strategy, &b, &active_over(2)), Some(0));
    }
}
