use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HwError {
    #[error("mount disconnected")]
    Disconnected,
    #[error("guide pulse rejected: {0}")]
    PulseRejected(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
