/// Convenience result type used across layerstack.
pub type SceneResult<T> = Result<T, SceneError>;

/// Top-level error taxonomy used by scene and item APIs.
#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    /// Invalid user-provided data (bad record, bad argument).
    #[error("validation error: {0}")]
    Validation(String),

    /// A source that cannot be placed in a scene.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// Errors when serializing or deserializing layer-stack records.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SceneError {
    /// Build a [`SceneError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SceneError::InvalidSource`] value.
    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSource(msg.into())
    }

    /// Build a [`SceneError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
