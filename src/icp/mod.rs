/*!
Interval constraint propagation --- branch-and-prune search over boxes.

Given a contractor and the evaluators of the asserted atoms, an engine searches the box in its [status](crate::contractor::status::ContractorStatus) for a sub-box every atom classifies [True](crate::evaluator::Evaluation::True), pruning as it descends.
A search ends in one of two ways:

- *δ-sat*, with an accepted box: every atom δ-holds on it, or every dimension still read by an undecided atom is at most the precision across.
- *unsat*: every branch was pruned empty or refuted by some atom, and the used constraints accumulated in the status say which atoms did the refuting.

Two engines share this contract: a depth-first [sequential search](seq) and a [Monte-Carlo tree search](mcts).
Both poll the process-wide [interrupt flag](crate::misc::interrupt) at every popped or selected box.
*/

pub mod brancher;
pub mod mcts;
pub mod seq;
