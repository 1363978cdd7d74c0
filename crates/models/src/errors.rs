use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("expected SI or NO, got `{0}`")]
    InvalidYesNo(String),
}
