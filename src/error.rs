//! Generation errors.
//!
//! Every definition or differentiation problem is reported when the procedures are generated,
//! never deferred to the generated code.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("generator already opened")]
    AlreadyOpen,

    #[error("generator is not open")]
    NotOpen,

    #[error("generator already closed")]
    Closed,

    #[error("predict already generated")]
    PredictAlreadyGenerated,

    #[error("predict must be generated first")]
    PredictNotGenerated,

    #[error("duplicate measurement model `{0}`")]
    DuplicateMeasurement(String),

    #[error("invalid measurement name `{0}`, expected an identifier")]
    InvalidName(String),

    #[error("measurement `{name}`: expected measurement has {expected} rows but transform has {transform}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        transform: usize,
    },

    #[error("{what}: expected {expected} entries, found {found}")]
    Dimension {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("{what}: `{expr}` is not a symbol")]
    NotASymbol { what: String, expr: String },

    #[error("symbol `{0}` declared more than once")]
    DuplicateSymbol(String),

    #[error("undeclared symbol `{symbol}` in {context}")]
    UndeclaredSymbol { symbol: String, context: String },

    #[error("process noise {index} is negative: {value}")]
    NegativeProcessNoise { index: usize, value: f64 },

    #[error("initial state: {0}")]
    InitialState(&'static str),

    #[error("undefined derivative of `{expr}` with respect to `{var}`: {reason}")]
    UndefinedDerivative {
        expr: String,
        var: String,
        reason: &'static str,
    },

    #[error("undefined expression `{expr}` in {context}: {reason}")]
    UndefinedExpression {
        expr: String,
        context: String,
        reason: &'static str,
    },
}

pub type GenResult<T> = Result<T, GenerationError>;
