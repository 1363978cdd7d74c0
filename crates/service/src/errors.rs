use thiserror::Error;

/// Failure inside a backing medium driver.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("workbook error: {0}")]
    Workbook(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sheets api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("auth error: {0}")]
    Auth(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("injected failure: {0}")]
    Injected(String),
}

impl From<calamine::XlsxError> for StoreError {
    fn from(e: calamine::XlsxError) -> Self { Self::Workbook(e.to_string()) }
}

impl From<rust_xlsxwriter::XlsxError> for StoreError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self { Self::Workbook(e.to_string()) }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Reading the table failed (missing credentials, network, unreadable workbook).
    #[error("medium unavailable: {0}")]
    MediumUnavailable(#[source] StoreError),
    #[error("write failed: {0}")]
    WriteFailure(#[source] StoreError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self { Self::NotFound(format!("{} not found", entity)) }
}
