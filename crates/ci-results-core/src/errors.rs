use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// Failures of a pass-rate query.
///
/// Malformed input is the caller's fault and is safe to echo back; storage
/// failures are not.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("invalid filter term: {0}")]
    InvalidFilterTerm(String),

    #[error("invalid period {value:?}: {reason}")]
    InvalidPeriod { value: String, reason: String },

    #[error("unknown column {0}")]
    UnknownColumn(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl StatsError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, StatsError::Storage(_))
    }
}

impl From<rusqlite::Error> for StatsError {
    fn from(e: rusqlite::Error) -> Self {
        StatsError::Storage(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_distinguished_from_storage() {
        assert!(StatsError::InvalidFilterTerm("A".into()).is_client_error());
        assert!(StatsError::UnknownColumn("x".into()).is_client_error());
        assert!(StatsError::InvalidPeriod {
            value: "-1".into(),
            reason: "negative".into()
        }
        .is_client_error());
        assert!(!StatsError::Storage(anyhow::anyhow!("disk I/O error")).is_client_error());
    }
}
