use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CadenceError {
    DatabaseError(String),
    StateTransitionError(String),
    EngineError(String),
    EventError(String),
    ValidationError(String),
    ConfigurationError(String),
}

impl fmt::Display for CadenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CadenceError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            CadenceError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            CadenceError::EngineError(msg) => write!(f, "Engine error: {msg}"),
            CadenceError::EventError(msg) => write!(f, "Event error: {msg}"),
            CadenceError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            CadenceError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for CadenceError {}

impl From<sqlx::Error> for CadenceError {
    fn from(err: sqlx::Error) -> Self {
        CadenceError::DatabaseError(err.to_string())
    }
}

impl From<crate::store::StoreError> for CadenceError {
    fn from(err: crate::store::StoreError) -> Self {
        CadenceError::DatabaseError(err.to_string())
    }
}

impl From<crate::state_machine::TransitionError> for CadenceError {
    fn from(err: crate::state_machine::TransitionError) -> Self {
        CadenceError::StateTransitionError(err.to_string())
    }
}

impl From<crate::engine::EngineError> for CadenceError {
    fn from(err: crate::engine::EngineError) -> Self {
        CadenceError::EngineError(err.to_string())
    }
}

impl From<crate::events::PublishError> for CadenceError {
    fn from(err: crate::events::PublishError) -> Self {
        CadenceError::EventError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CadenceError>;
