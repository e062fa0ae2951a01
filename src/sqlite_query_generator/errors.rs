use thiserror::Error;

use crate::properties::PropertyError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlGeneratorError {
    #[error("Unknown variable '{0}' (not bound by a previous clause)")]
    UnknownVariable(String),
    #[error("Variable '{0}' is already bound")]
    DuplicateVariable(String),
    #[error("Missing query parameter '${0}'")]
    MissingParameter(String),
    #[error(transparent)]
    InvalidProperty(#[from] PropertyError),
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Function '{function}' expects {expected} argument(s)")]
    WrongArgumentCount {
        function: String,
        expected: String,
    },
    #[error("Aggregate function '{0}' is not allowed here")]
    MisplacedAggregate(String),
    #[error("Relationship type is required when creating an edge")]
    EdgeTypeRequired,
    #[error("At most one variable-length relationship is supported per query")]
    MultipleVariableLength,
    #[error("Unsupported query shape: {0}")]
    Unsupported(&'static str),
}
