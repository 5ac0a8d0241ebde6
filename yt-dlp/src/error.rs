use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("yt-dlp binary not executable: {0}")]
    BinaryNotExecutable(PathBuf),

    #[error("failed to execute yt-dlp: {0}")]
    ExecutionFailed(#[from] std::io::Error),

    #[error("failed to parse JSON output: {0}")]
    JsonParseFailed(#[from] serde_json::Error)
}

pub type Result<T> = std::result::Result<T, Error>;
