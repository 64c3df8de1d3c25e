use thiserror::Error;

/// Errors raised while deriving WHIR parameters from a configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParametersError {
    /// The folding factor array is empty.
    #[error("Folding factor array is empty.")]
    EmptyFoldingFactor,

    /// A folding factor of zero does not reduce the number of variables.
    #[error("Folding factor at round {0} shouldn't be zero.")]
    ZeroFactor(usize),

    /// A per-round array does not cover every round.
    #[error("`{name}` has {len} entries but {n_rounds} rounds are configured")]
    MissingRoundValues {
        name: &'static str,
        len: usize,
        n_rounds: usize,
    },

    /// The folding factors fold more variables than the polynomial has.
    #[error("Folding factors sum to {total}, more than the {n_vars} variables")]
    TooManyFoldedVariables { total: usize, n_vars: usize },

    /// A folding factor exceeds the log size of the domain it folds.
    #[error("Folding factor {factor} at round {round} exceeds the log domain size {log_domain}")]
    FoldingExceedsDomain {
        round: usize,
        factor: usize,
        log_domain: usize,
    },

    /// The evaluation domain does not fit in a `usize`.
    #[error("Domain of 2^{0} points is too large")]
    DomainTooLarge(usize),

    /// A proof-of-work difficulty exceeds the supported maximum.
    #[error("Proof-of-work difficulty {bits} for `{name}` exceeds {max}")]
    PowTooLarge {
        name: &'static str,
        bits: usize,
        max: usize,
    },

    /// The batch size must be at least one.
    #[error("Batch size must be positive.")]
    ZeroBatchSize,

    /// The domain generator is not a decimal integer.
    #[error("Invalid domain generator `{0}`")]
    InvalidGenerator(String),

    /// The domain generator does not have the order of the domain.
    #[error("Domain generator does not have order {0}")]
    WrongGeneratorOrder(usize),

    /// A batched WHIR run needs at least one commitment.
    #[error("Batched mode needs at least one commitment.")]
    NoCommitments,

    /// Parameters of two components disagree.
    #[error("{0}")]
    Inconsistent(String),
}
