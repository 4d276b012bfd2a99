//! Runner errors.

use thiserror::Error;

/// Errors raised while driving an external tool.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("tool not found")]
    ToolNotFound(String),

    #[error("failed to launch '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{tool}' exited with status {code:?}: {stderr}")]
    Exit {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("invalid tool output: {0}")]
    Output(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
