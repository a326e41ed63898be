use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job already exists: {0}")]
    DuplicateJob(String),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("admission queue is full")]
    QueueFull,

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
