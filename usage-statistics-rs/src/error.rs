use error_handling::{Error, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum UsageStatisticsError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl From<UsageStatisticsError> for Error {
    fn from(err: UsageStatisticsError) -> Self {
        let kind = match &err {
            UsageStatisticsError::InvalidRecord(_) => ErrorKind::Rejected,
            UsageStatisticsError::Serialization(_) => ErrorKind::Serialization,
            UsageStatisticsError::HttpClient(_) => ErrorKind::Initialization,
        };
        Error::new(kind, err.to_string()).cause(err)
    }
}
