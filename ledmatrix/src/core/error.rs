use std::fmt;

use thiserror::Error;

/// Failures reported by application code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Message(String),

    #[error("unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn invalid_setting(
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleStage {
    Activate,
    Deactivate,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activate => write!(f, "activate"),
            Self::Deactivate => write!(f, "deactivate"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickPhase {
    Update,
    Render,
}

impl fmt::Display for TickPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => write!(f, "update"),
            Self::Render => write!(f, "render"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("app '{0}' is not registered")]
    NotFound(String),

    #[error("failed to instantiate app '{id}': {source}")]
    Instantiation {
        id: String,
        #[source]
        source: AppError,
    },

    #[error("app '{id}' failed during {stage}: {source}")]
    Lifecycle {
        id: String,
        stage: LifecycleStage,
        #[source]
        source: AppError,
    },

    #[error("app '{id}' failed during {phase}: {source}")]
    Tick {
        id: String,
        phase: TickPhase,
        #[source]
        source: AppError,
    },

    #[error("background job of app '{id}' failed: {source}")]
    BackgroundJob {
        id: String,
        #[source]
        source: AppError,
    },

    #[error("app '{0}' is not currently active")]
    NotActive(String),

    #[error("settings persistence failed: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("control request failed: {0}")]
    Control(String),
}

impl MatrixError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type MatrixResult<T> = Result<T, MatrixError>;
