use thiserror::Error;

use crate::event::WindowId;

pub type DisplayResult<T> = Result<T, DisplayError>;

#[derive(Debug, Error)]
pub enum DisplayError {
    /// Bad construction request: no native handle and no size/title, or an
    /// unsupported render engine.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A raw event named a window identity that was never registered.
    /// This is a bug in the native binding, not a benign race.
    #[error("invariant violation: event for unregistered window {window}")]
    InvariantViolation { window: WindowId },

    #[error("config error: {0}")]
    Config(String),

    #[error("native display error: {0}")]
    Native(String),

    #[error("render error: {source}")]
    Render {
        #[source]
        source: anyhow::Error,
    },
}

impl DisplayError {
    #[inline]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
