use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("bus error: {0}")]
    Bus(String),
    #[error("device did not acknowledge")]
    Nack,
    #[error("bus timeout")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
