pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Schema translation error: {0}")]
    SchemaTranslation(String),
    #[error("Condition compilation error: {0}")]
    ConditionCompilation(String),
    #[error("Plan assembly error: {0}")]
    PlanAssembly(String),
    #[error("Native invocation error: {0}")]
    NativeInvocation(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid operator state: {0}")]
    InvalidState(String),
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn schema_translation(msg: impl Into<String>) -> Self {
        Error::SchemaTranslation(msg.into())
    }

    pub fn condition_compilation(msg: impl Into<String>) -> Self {
        Error::ConditionCompilation(msg.into())
    }

    pub fn plan_assembly(msg: impl Into<String>) -> Self {
        Error::PlanAssembly(msg.into())
    }

    pub fn native_invocation(msg: impl Into<String>) -> Self {
        Error::NativeInvocation(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Errors raised while translating a join, before any record is processed.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Error::SchemaTranslation(_) | Error::ConditionCompilation(_) | Error::PlanAssembly(_)
        )
    }
}
