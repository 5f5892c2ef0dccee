// Error types for the memory view engine

use jdwp_client::JdwpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MemoryViewError>;

#[derive(Debug, Error)]
pub enum MemoryViewError {
    #[error("JDWP error: {0}")]
    Jdwp(#[from] JdwpError),

    #[error("Debuggee error: {0}")]
    Backend(String),

    #[error("{0} must run on the command worker")]
    OffWorker(&'static str),

    #[error("Command scheduler is shut down")]
    SchedulerClosed,

    #[error("No tokio runtime available")]
    NoRuntime,

    #[error("Config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Config format error: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}
