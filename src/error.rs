use thiserror::Error;

/// Errors surfaced by pipeline nodes to the driving engine.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("model: {0}")]
    Model(String),

    #[error("node `{node}` cannot {action} while {state}")]
    Lifecycle {
        node: String,
        action: &'static str,
        state: &'static str,
    },

    #[cfg(feature = "torch")]
    #[error("torch: {0}")]
    Torch(#[from] tch::TchError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
