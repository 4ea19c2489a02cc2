//! The default polarity of a free boolean decision.

/// How the backend values an atom it is free to choose.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SatDefaultPhase {
    /// Always false.
    False,

    /// Always true.
    True,

    /// The polarity with the greater Jeroslow-Wang score --- the sum of 2^(−|c|)
    /// over the clauses c the literal appears in.
    JeroslowWang,

    /// A coin flip from the seeded generator.
    Random,
}
