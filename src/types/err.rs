/*!
Error types used in the library.

- Most of these are very unlikely to occur during use.
- [Interrupted](ErrorKind::Interrupted) is external --- it is raised only when the process-wide [interrupt flag](crate::misc::interrupt) was set by some asynchronous handler during a solve.
- Everything else that can happen during a solve --- empty boxes, zero-effect prunes, refuted boolean assignments --- is normal control flow and does not appear here.

All errors unwind to the solver entry point and are surfaced to the caller.
There is no automatic retry.
*/

/// A union of varied error kinds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The process-wide interrupt flag was observed set during a solve.
    ///
    /// No partial result is returned, though any statistics gathered remain readable on the context.
    Interrupted,

    /// The boolean backend failed to decide its formula.
    Backend(BackendError),

    /// The formula contains a construct the theory layer cannot handle.
    Unsupported(UnsupportedError),

    /// The configuration given is invalid for a solve.
    Config(ConfigError),
}

/// An error from the boolean backend.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendError {
    /// The backend returned neither satisfiable nor unsatisfiable.
    Unknown,
}

impl From<BackendError> for ErrorKind {
    fn from(e: BackendError) -> Self {
        ErrorKind::Backend(e)
    }
}

/// A construct outside the supported fragment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnsupportedError {
    /// A quantifier inside the body of a quantified subformula.
    NestedQuantifier,

    /// A boolean variable inside the body of a quantified subformula.
    QuantifiedBoolean,

    /// A quantified subformula asserted negatively --- an existential the theory layer cannot refute.
    NegatedQuantifier,

    /// A literal handed to the theory layer which is not an arithmetic or quantified atom.
    NonArithmeticLiteral,
}

impl From<UnsupportedError> for ErrorKind {
    fn from(e: UnsupportedError) -> Self {
        ErrorKind::Unsupported(e)
    }
}

/// An invalid configuration, noticed when a solve is requested.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The precision (δ) is not a strictly positive finite number.
    NonPositivePrecision,

    /// A request for parallel search --- only one job is supported.
    NumberOfJobs,

    /// A zero iteration budget for the Monte-Carlo search.
    MctsIterations,

    /// The preferred precision is not a finite non-negative number.
    PreferredPrecision,
}

impl From<ConfigError> for ErrorKind {
    fn from(e: ConfigError) -> Self {
        ErrorKind::Config(e)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupted => write!(f, "interrupted"),
            Self::Backend(e) => write!(f, "backend error: {e:?}"),
            Self::Unsupported(e) => write!(f, "unsupported construct: {e:?}"),
            Self::Config(e) => write!(f, "invalid configuration: {e:?}"),
        }
    }
}
