//! Error types for the autobridge-dom crate.

/// Errors raised while evaluating lookup strategies.
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    /// A strategy carried a CSS selector the parser rejected.
    #[error("invalid selector `{selector}`: {reason}")]
    Selector {
        /// The offending selector text.
        selector: String,
        /// Parser diagnostic.
        reason: String,
    },
}

/// Convenience type alias for autobridge-dom results.
pub type Result<T> = std::result::Result<T, DomError>;
