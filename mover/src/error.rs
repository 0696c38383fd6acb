use thiserror::Error;

/// Configuration problems found while validating a mover.
///
/// None of these abort the process: a mover with configuration errors simply does not
/// simulate, and its ticks echo their input state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configured starting mode does not name a registered mode.
    #[error("starting movement mode `{0}` is not registered")]
    StartingModeNotRegistered(String),
    /// No starting mode was configured at all.
    #[error("no starting movement mode configured")]
    NoStartingMode,
    /// A registered mode reported itself as not instantiable.
    #[error("movement mode `{0}` is abstract and cannot be used")]
    AbstractMode(String),
    /// A mode needs a shared settings object that was never supplied.
    #[error("movement mode `{mode}` requires shared settings `{kind}`")]
    MissingSharedSettings { mode: String, kind: &'static str },
    /// A transition names a target mode that does not exist.
    #[error("transition on `{owner}` targets unregistered mode `{target}`")]
    UnknownTransitionTarget { owner: String, target: String },
}

/// Errors returned by fallible mover operations.
#[derive(Debug, Error)]
pub enum MoverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A type-erased payload did not match the registered type for its name.
    #[error("type mismatch: expected `{expected}`, found {found}")]
    TypeMismatch { expected: String, found: String },
    /// A type-erased payload named a type that was never registered.
    #[error("unknown movement type `{0}`")]
    UnknownType(String),
    /// Tried to register a mode that cannot be used.
    #[error("movement mode `{0}` rejected")]
    InvalidMode(String),
    /// A correction referenced a frame no longer held in history.
    #[error("frame {0} is not in the simulation history")]
    FrameNotInHistory(i64),
}
