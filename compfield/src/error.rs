//! Module containing the compfield universal error type
use thiserror::Error;

/// Universal error type for compfield
#[derive(Error, Debug)]
pub enum Error {
    /// Field is not present in this `FieldModule`
    #[error("field is not present in this `FieldModule`")]
    BadField,

    /// A field with this name already exists in the module
    #[error("a field named \"{0}\" already exists in this `FieldModule`")]
    DuplicateName(String),

    /// Source field does not have numerical components
    #[error("source field does not have numerical components")]
    NonNumericSource,

    /// Source field component counts are mismatched
    #[error("source field component counts are mismatched ({0} vs {1})")]
    ComponentCountMismatch(usize, usize),

    /// Invalid arguments for field construction
    #[error("invalid arguments for field construction")]
    InvalidArguments,

    /// Field could not be evaluated at the current cache location
    #[error("field is not defined at the current cache location")]
    NotDefined,

    /// Derivative operator applied at an incompatible location
    #[error("derivative operator requires an element location")]
    WrongLocationKind,

    /// Derivative operator does not match the location's mesh dimension
    #[error("derivative operator dimension ({0}) does not match location dimension ({1})")]
    BadDerivativeDimension(usize, usize),

    /// Field type name is already registered
    #[error("field type \"{0}\" is already registered")]
    DuplicateType(String),

    /// Field type name is not registered
    #[error("unknown field type \"{0}\"")]
    UnknownType(String),

    /// Named field was not found in the module
    #[error("unknown field \"{0}\"")]
    UnknownField(String),

    /// Command text could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),
}
